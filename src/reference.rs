//! Static reference data: countries, pump prices, spot prices, demo farms.
//!
//! Pump prices are a 16 Jun 2025 snapshot (USD/L); spot prices are 21 Jun 2025
//! mid-points (USD/kg). `None` marks a price that was not available.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use crate::config::FuelKind;
use crate::spatial::Coord;

/// Supported commodities
pub const COMMODITIES: &[&str] = &["Barley", "Maize", "Sorghum", "Wheat", "Beef"];

/// Supported countries (ISO3, display name)
pub const COUNTRIES: &[(&str, &str)] = &[
    ("BWA", "Botswana"),
    ("ZAF", "South Africa"),
    ("ZMB", "Zambia"),
    ("NAM", "Namibia"),
    ("MOZ", "Mozambique"),
    ("ZWE", "Zimbabwe"),
    ("TZA", "Tanzania"),
    ("AGO", "Angola"),
    ("MWI", "Malawi"),
    ("KEN", "Kenya"),
];

pub fn country_name(iso: &str) -> Option<&'static str> {
    COUNTRIES
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(iso))
        .map(|(_, name)| *name)
}

/// Retail pump price for a country, if known
pub fn pump_price(iso: &str, fuel: FuelKind) -> Option<Decimal> {
    let price = match (fuel, iso.to_ascii_uppercase().as_str()) {
        (FuelKind::Diesel, "BWA") => dec!(1.118),
        (FuelKind::Diesel, "ZAF") => dec!(1.171),
        (FuelKind::Diesel, "ZMB") => dec!(1.032),
        (FuelKind::Diesel, "NAM") => dec!(1.157),
        (FuelKind::Diesel, "MOZ") => dec!(1.357),
        (FuelKind::Diesel, "ZWE") => dec!(1.500),
        (FuelKind::Diesel, "TZA") => dec!(1.088),
        (FuelKind::Diesel, "AGO") => dec!(0.328),
        (FuelKind::Diesel, "MWI") => dec!(1.577),
        (FuelKind::Diesel, "KEN") => dec!(1.248),
        (FuelKind::Petrol, "BWA") => dec!(1.104),
        (FuelKind::Petrol, "ZAF") => dec!(1.162),
        (FuelKind::Petrol, "ZMB") => dec!(1.289),
        (FuelKind::Petrol, "NAM") => dec!(1.159),
        (FuelKind::Petrol, "MOZ") => dec!(1.342),
        (FuelKind::Petrol, "ZWE") => dec!(1.540),
        (FuelKind::Petrol, "TZA") => dec!(1.111),
        (FuelKind::Petrol, "AGO") => dec!(0.328),
        (FuelKind::Petrol, "MWI") => dec!(1.460),
        (FuelKind::Petrol, "KEN") => dec!(1.359),
        _ => return None,
    };
    Some(price)
}

// Columns: Barley, Beef, Maize, Sorghum, Wheat
const SPOT_COLUMNS: [&str; 5] = ["Barley", "Beef", "Maize", "Sorghum", "Wheat"];

const SPOT_PRICES: &[(&str, [Option<f64>; 5])] = &[
    ("BWA", [Some(0.27), Some(3.59), Some(0.425), Some(0.30), Some(0.30)]),
    ("ZAF", [Some(0.955), Some(2.90), Some(0.235), Some(0.25), Some(0.35)]),
    ("ZMB", [Some(0.295), Some(3.00), Some(0.35), Some(2.155), Some(0.30)]),
    ("NAM", [Some(0.48), Some(3.78), Some(0.22), Some(2.20), Some(0.30)]),
    ("MOZ", [Some(0.72), Some(0.705), Some(0.425), Some(4.47), Some(0.30)]),
    ("ZWE", [Some(0.27), Some(7.50), None, None, None]),
    ("TZA", [Some(0.185), Some(1.685), Some(0.285), Some(0.385), Some(0.30)]),
    ("AGO", [Some(1.73), Some(3.415), Some(0.57), Some(0.22), Some(0.30)]),
    ("MWI", [Some(5.00), None, Some(0.175), None, Some(0.30)]),
    ("KEN", [Some(0.24), Some(3.15), Some(0.375), Some(0.37), Some(0.46)]),
];

/// Country/commodity spot price (USD/kg); commodity names match exactly
pub fn spot_price(iso: &str, commodity: &str) -> Option<f64> {
    let column = SPOT_COLUMNS.iter().position(|c| *c == commodity)?;
    SPOT_PRICES
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(iso))
        .and_then(|(_, row)| row[column])
}

const FARMS: &[(&str, [(&str, f64, f64); 3])] = &[
    ("BWA", [("F01", -24.2, 26.1), ("F02", -24.9, 26.4), ("F03", -25.1, 25.6)]),
    ("ZAF", [("F01", -28.5, 26.8), ("F02", -25.7, 28.1), ("F03", -33.2, 18.9)]),
    ("ZMB", [("F01", -15.4, 28.3), ("F02", -13.0, 27.0), ("F03", -17.3, 24.3)]),
    ("NAM", [("F01", -22.6, 17.1), ("F02", -19.8, 15.9), ("F03", -25.0, 17.4)]),
    ("MOZ", [("F01", -19.1, 34.8), ("F02", -25.0, 33.6), ("F03", -16.8, 33.2)]),
    ("ZWE", [("F01", -18.9, 29.8), ("F02", -20.0, 28.6), ("F03", -17.3, 31.5)]),
    ("TZA", [("F01", -6.2, 35.8), ("F02", -3.3, 36.0), ("F03", -8.6, 33.4)]),
    ("AGO", [("F01", -8.8, 13.2), ("F02", -11.7, 15.0), ("F03", -14.9, 13.5)]),
    ("MWI", [("F01", -13.1, 34.2), ("F02", -14.0, 33.8), ("F03", -9.7, 33.0)]),
    ("KEN", [("F01", 0.3, 37.5), ("F02", -1.1, 36.9), ("F03", 0.1, 34.8)]),
];

/// Demo farm coordinates inside each country's main farming corridors
pub fn demo_farms(iso: &str) -> Option<BTreeMap<String, Coord>> {
    FARMS
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(iso))
        .map(|(_, farms)| {
            farms
                .iter()
                .map(|(id, lat, lon)| (id.to_string(), Coord::new(*lat, *lon)))
                .collect()
        })
}
