//! Monte Carlo compounding of a scenario's monthly impact
//!
//! Every trial perturbs the deterministic impact by a uniform ±20% of its
//! magnitude and projects twelve months forward. Percentiles are read from
//! the sorted outcomes at index `floor(N × q)`, which is deliberately not an
//! interpolated order statistic: small trial counts shift the cut points.

use crate::effects::PROJECTION_MONTHS;
use crate::models::{FinancialContext, MonteCarloResult, Percentiles, Trial, TrialStatistics};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

pub const DEFAULT_TRIALS: usize = 100;

/// Maximum relative perturbation applied to the impact in each trial
const VARIATION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    trials: usize,
    seed: Option<u64>,
}

impl MonteCarloSimulator {
    pub fn new() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            seed: None,
        }
    }

    /// At least one trial always runs
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials.max(1);
        self
    }

    /// Fix the generator seed so runs are reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_optional_seed(self, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => self.with_seed(seed),
            None => self,
        }
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    pub fn simulate(&self, monthly_impact: f64, context: &FinancialContext) -> MonteCarloResult {
        let mut rng = self.rng();
        let spread = monthly_impact.abs() * VARIATION;
        let months = f64::from(PROJECTION_MONTHS);

        let trials: Vec<Trial> = (0..self.trials)
            .map(|_| {
                let impact = monthly_impact + rng.gen_range(-1.0..=1.0) * spread;
                let final_balance =
                    context.current_balance + months * (context.available_income() + impact);
                Trial {
                    monthly_impact: impact,
                    final_balance,
                }
            })
            .collect();

        let mut outcomes: Vec<f64> = trials.iter().map(|t| t.final_balance).collect();
        outcomes.sort_by(|a, b| a.total_cmp(b));

        let statistics = TrialStatistics {
            mean: outcomes.iter().sum::<f64>() / outcomes.len() as f64,
            min: outcomes[0],
            max: outcomes[outcomes.len() - 1],
        };
        let percentiles = percentiles(&outcomes);

        debug!(
            trials = self.trials,
            seeded = self.seed.is_some(),
            p50 = percentiles.p50,
            "Monte Carlo simulation complete"
        );

        MonteCarloResult {
            trials,
            statistics,
            percentiles,
        }
    }
}

impl Default for MonteCarloSimulator {
    fn default() -> Self {
        Self::new()
    }
}

/// `floor(n × quantile)`, clamped to the last element
pub fn percentile_index(n: usize, quantile: f64) -> usize {
    ((n as f64 * quantile).floor() as usize).min(n.saturating_sub(1))
}

/// Cut points of an ascending, non-empty slice
pub fn percentiles(sorted: &[f64]) -> Percentiles {
    let at = |q: f64| sorted[percentile_index(sorted.len(), q)];

    Percentiles {
        p05: at(0.05),
        p25: at(0.25),
        p50: at(0.50),
        p75: at(0.75),
        p95: at(0.95),
    }
}
