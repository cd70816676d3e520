pub mod forecast;
pub mod route;
pub mod state;

pub use forecast::*;
pub use route::*;
pub use state::*;
