use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Agent;
use crate::domain::{keys, PipelineState};
use crate::error::Result;

/// Buffered points needed before a refit
pub const MIN_FEEDBACK: usize = 10;
pub const CONFIDENCE_DECAY_DAYS: f64 = 30.0;
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Observed outcome of a past plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub weather_score: Option<f64>,
    pub conflict_risk: Option<f64>,
    pub logistics_cost: Option<f64>,
    pub actual_price: Option<f64>,
}

impl Feedback {
    fn complete(&self) -> Option<([f64; 3], f64)> {
        Some((
            [self.weather_score?, self.conflict_risk?, self.logistics_cost?],
            self.actual_price?,
        ))
    }
}

/// `price = b0 + b1*weather + b2*conflict + b3*logistics`
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeModel {
    pub coefficients: [f64; 4],
    pub r_squared: f64,
    pub training_points: usize,
    pub updated_at: DateTime<Utc>,
}

impl OutcomeModel {
    pub fn predict(&self, x: [f64; 3]) -> f64 {
        let b = self.coefficients;
        b[0] + b[1] * x[0] + b[2] * x[1] + b[3] * x[2]
    }

    /// Least squares through the normal equations; None when they are singular
    pub fn fit(samples: &[([f64; 3], f64)], now: DateTime<Utc>) -> Option<Self> {
        let mut xtx = [[0.0f64; 4]; 4];
        let mut xty = [0.0f64; 4];
        for (x, y) in samples {
            let row = [1.0, x[0], x[1], x[2]];
            for i in 0..4 {
                xty[i] += row[i] * y;
                for j in 0..4 {
                    xtx[i][j] += row[i] * row[j];
                }
            }
        }
        let coefficients = solve4(xtx, xty)?;

        let mut model = Self {
            coefficients,
            r_squared: 0.0,
            training_points: samples.len(),
            updated_at: now,
        };
        let mean = samples.iter().map(|(_, y)| y).sum::<f64>() / samples.len() as f64;
        let ss_tot: f64 = samples.iter().map(|(_, y)| (y - mean).powi(2)).sum();
        let ss_res: f64 = samples.iter().map(|(x, y)| (y - model.predict(*x)).powi(2)).sum();
        model.r_squared = if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot };
        Some(model)
    }
}

// Gaussian elimination with partial pivoting
fn solve4(mut a: [[f64; 4]; 4], mut b: [f64; 4]) -> Option<[f64; 4]> {
    for col in 0..4 {
        let pivot = (col..4).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..4 {
            let factor = a[row][col] / a[col][col];
            for k in col..4 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0; 4];
    for row in (0..4).rev() {
        let tail: f64 = (row + 1..4).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

/// Learns from plan outcomes and reports how much to trust its model
#[derive(Debug, Default)]
pub struct LearningAgent {
    buffer: Vec<Feedback>,
    model: Option<OutcomeModel>,
    history: Vec<(DateTime<Utc>, f64)>,
}

impl LearningAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feedback(&mut self, feedback: Feedback) {
        self.buffer.push(feedback);
    }

    pub fn model(&self) -> Option<&OutcomeModel> {
        self.model.as_ref()
    }

    pub fn iterations(&self) -> usize {
        self.history.len()
    }

    /// Refit from the buffer once it holds enough complete points; the
    /// buffer is cleared only after a successful fit.
    pub fn update(&mut self, now: DateTime<Utc>) -> bool {
        if self.buffer.len() < MIN_FEEDBACK {
            return false;
        }
        let samples: Vec<([f64; 3], f64)> = self.buffer.iter().filter_map(Feedback::complete).collect();
        if samples.len() < MIN_FEEDBACK {
            debug!("Only {} complete feedback points", samples.len());
            return false;
        }
        let Some(model) = OutcomeModel::fit(&samples, now) else {
            debug!("Feedback is collinear, keeping previous model");
            return false;
        };

        info!(
            "Outcome model refit on {} points, r2={:.4}",
            model.training_points, model.r_squared
        );
        self.history.push((now, model.r_squared));
        self.model = Some(model);
        self.buffer.clear();
        true
    }

    /// R² decayed linearly to zero over 30 days; 0.5 without a model
    pub fn confidence(&self, now: DateTime<Utc>) -> f64 {
        match &self.model {
            Some(m) => {
                let days = (now - m.updated_at).num_days() as f64;
                m.r_squared * (1.0 - days / CONFIDENCE_DECAY_DAYS).max(0.0)
            }
            None => DEFAULT_CONFIDENCE,
        }
    }
}

#[async_trait]
impl Agent for LearningAgent {
    fn id(&self) -> &str {
        "learning"
    }

    fn name(&self) -> &str {
        "Adaptive Learning"
    }

    async fn process(&mut self, mut state: PipelineState) -> Result<PipelineState> {
        let now = Utc::now();
        self.update(now);
        let confidence = self.confidence(now);
        info!("Model confidence {:.2}", confidence);

        state.set(keys::MODEL_CONFIDENCE, &confidence)?;
        state.set(keys::LEARNING_ITERATION, &self.iterations())?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn linear_feedback(n: usize) -> Vec<Feedback> {
        (0..n)
            .map(|i| {
                let (w, c, l) = (i as f64, (i * i % 7) as f64, (i % 3) as f64 * 10.0);
                Feedback {
                    weather_score: Some(w),
                    conflict_risk: Some(c),
                    logistics_cost: Some(l),
                    actual_price: Some(5.0 + 2.0 * w - c + 0.5 * l),
                }
            })
            .collect()
    }

    #[test]
    fn test_fit_recovers_exact_relation() {
        let now = Utc::now();
        let samples: Vec<_> = linear_feedback(12).iter().filter_map(Feedback::complete).collect();
        let model = OutcomeModel::fit(&samples, now).unwrap();
        let expected = [5.0, 2.0, -1.0, 0.5];
        for (got, want) in model.coefficients.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
        assert!((model.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_needs_ten_complete_points() {
        let mut agent = LearningAgent::new();
        for f in linear_feedback(9) {
            agent.add_feedback(f);
        }
        agent.add_feedback(Feedback::default());
        assert!(!agent.update(Utc::now()));
        assert_eq!(agent.confidence(Utc::now()), DEFAULT_CONFIDENCE);

        agent.add_feedback(linear_feedback(10)[9]);
        assert!(agent.update(Utc::now()));
        assert_eq!(agent.iterations(), 1);
    }

    #[test]
    fn test_confidence_decays() {
        let mut agent = LearningAgent::new();
        for f in linear_feedback(10) {
            agent.add_feedback(f);
        }
        let t0 = Utc::now();
        assert!(agent.update(t0));
        assert!((agent.confidence(t0) - 1.0).abs() < 1e-9);
        assert!((agent.confidence(t0 + Duration::days(15)) - 0.5).abs() < 1e-9);
        assert_eq!(agent.confidence(t0 + Duration::days(45)), 0.0);
    }

    #[tokio::test]
    async fn test_process_writes_confidence() {
        let mut agent = LearningAgent::new();
        let out = agent.process(PipelineState::new()).await.unwrap();
        assert_eq!(out.require::<f64>(keys::MODEL_CONFIDENCE).unwrap(), 0.5);
        assert_eq!(out.require::<usize>(keys::LEARNING_ITERATION).unwrap(), 0);
    }
}
