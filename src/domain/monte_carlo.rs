//! Bootstrap Monte Carlo over the historical per-trade P/L pool.

use super::error::BtlensError;
use super::metrics::{cumulative, max_drawdown};
use super::table::{Cell, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloConfig {
    pub simulations: usize,
    /// Samples drawn per trial.
    pub days: usize,
    pub confidence_level: f64,
    /// `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            simulations: 1000,
            days: 252,
            confidence_level: 0.95,
            seed: None,
        }
    }
}

/// Outcome of one synthetic equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialResult {
    #[serde(rename = "Total Profit")]
    pub total_profit: f64,
    #[serde(rename = "Max Drawdown")]
    pub max_drawdown: f64,
    #[serde(rename = "Final Equity")]
    pub final_equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloSummary {
    pub confidence_level: f64,
    pub mean_total_profit: f64,
    pub std_dev_total_profit: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub mean_max_drawdown: f64,
    pub mean_final_equity: f64,
}

impl MonteCarloSummary {
    /// Labelled statistics in report order.
    pub fn to_pairs(&self) -> Vec<(String, f64)> {
        let pct = self.confidence_level * 100.0;
        vec![
            ("Mean Total Profit".to_string(), self.mean_total_profit),
            ("Std Dev Total Profit".to_string(), self.std_dev_total_profit),
            (format!("{pct}% CI Lower"), self.ci_lower),
            (format!("{pct}% CI Upper"), self.ci_upper),
            ("Mean Max Drawdown".to_string(), self.mean_max_drawdown),
            ("Mean Final Equity".to_string(), self.mean_final_equity),
        ]
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(vec!["Statistic".into(), "Value".into()]);
        for (label, value) in self.to_pairs() {
            table.push_row(vec![Cell::Text(label), Cell::Number(value)]);
        }
        table
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloRun {
    pub trials: Vec<TrialResult>,
    pub summary: MonteCarloSummary,
}

#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    config: MonteCarloConfig,
}

impl MonteCarloSimulator {
    pub fn new(config: MonteCarloConfig) -> Result<Self, BtlensError> {
        if config.simulations == 0 {
            return Err(invalid("simulations", "must be at least 1"));
        }
        if config.days == 0 {
            return Err(invalid("days", "must be at least 1"));
        }
        if !(config.confidence_level > 0.0 && config.confidence_level < 1.0) {
            return Err(invalid(
                "confidence_level",
                "must be strictly between 0 and 1",
            ));
        }
        Ok(Self { config })
    }

    /// Runs every trial against `pool` and summarises them.
    pub fn run(&self, pool: &[f64]) -> Result<MonteCarloRun, BtlensError> {
        if pool.is_empty() {
            return Err(BtlensError::InsufficientData {
                reason: "the P/L pool is empty".to_string(),
            });
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        debug!(
            simulations = self.config.simulations,
            days = self.config.days,
            pool = pool.len(),
            "running monte carlo"
        );

        let trials: Vec<TrialResult> = (0..self.config.simulations)
            .map(|_| run_trial(pool, self.config.days, &mut rng))
            .collect();
        let summary = summarise(&trials, self.config.confidence_level);

        Ok(MonteCarloRun { trials, summary })
    }
}

fn run_trial(pool: &[f64], days: usize, rng: &mut StdRng) -> TrialResult {
    let samples: Vec<f64> = (0..days)
        .map(|_| pool[rng.gen_range(0..pool.len())])
        .collect();
    let curve = cumulative(&samples);
    let final_value = curve.last().copied().unwrap_or(0.0);
    TrialResult {
        total_profit: final_value,
        max_drawdown: max_drawdown(&curve),
        final_equity: final_value,
    }
}

fn summarise(trials: &[TrialResult], confidence_level: f64) -> MonteCarloSummary {
    let profits: Vec<f64> = trials.iter().map(|t| t.total_profit).collect();
    let drawdowns: Vec<f64> = trials.iter().map(|t| t.max_drawdown).collect();
    let equities: Vec<f64> = trials.iter().map(|t| t.final_equity).collect();

    let lower = (1.0 - confidence_level) / 2.0;
    let mut sorted = profits.clone();
    sorted.sort_by(f64::total_cmp);

    MonteCarloSummary {
        confidence_level,
        mean_total_profit: mean(&profits),
        std_dev_total_profit: sample_stddev(&profits),
        ci_lower: quantile(&sorted, lower),
        ci_upper: quantile(&sorted, 1.0 - lower),
        mean_max_drawdown: mean(&drawdowns),
        mean_final_equity: mean(&equities),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 0 for fewer than two values.
fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Linear interpolation between the order statistics around `q * (n - 1)`.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn invalid(name: &str, reason: &str) -> BtlensError {
    BtlensError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seeded(simulations: usize, days: usize, seed: u64) -> MonteCarloSimulator {
        MonteCarloSimulator::new(MonteCarloConfig {
            simulations,
            days,
            confidence_level: 0.95,
            seed: Some(seed),
        })
        .unwrap()
    }

    #[test]
    fn empty_pool_is_insufficient_data() {
        let err = seeded(10, 5, 1).run(&[]).unwrap_err();
        assert!(matches!(err, BtlensError::InsufficientData { .. }));
    }

    #[test]
    fn rejects_bad_parameters() {
        for config in [
            MonteCarloConfig {
                simulations: 0,
                ..MonteCarloConfig::default()
            },
            MonteCarloConfig {
                days: 0,
                ..MonteCarloConfig::default()
            },
            MonteCarloConfig {
                confidence_level: 1.0,
                ..MonteCarloConfig::default()
            },
            MonteCarloConfig {
                confidence_level: 0.0,
                ..MonteCarloConfig::default()
            },
        ] {
            assert!(matches!(
                MonteCarloSimulator::new(config),
                Err(BtlensError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn fixed_seed_reproduces_results() {
        let pool = [120.0, -80.0, 45.5, -10.0, 300.0, -150.0];
        let a = seeded(200, 30, 42).run(&pool).unwrap();
        let b = seeded(200, 30, 42).run(&pool).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.trials.len(), 200);
    }

    #[test]
    fn different_seeds_diverge() {
        let pool = [120.0, -80.0, 45.5, -10.0, 300.0, -150.0];
        let a = seeded(50, 30, 1).run(&pool).unwrap();
        let b = seeded(50, 30, 2).run(&pool).unwrap();
        assert_ne!(a.trials, b.trials);
    }

    #[test]
    fn constant_pool_is_deterministic() {
        let run = seeded(20, 10, 7).run(&[5.0]).unwrap();
        for trial in &run.trials {
            assert_relative_eq!(trial.total_profit, 50.0);
            assert_eq!(trial.max_drawdown, 0.0);
            assert_eq!(trial.final_equity, trial.total_profit);
        }
        assert_relative_eq!(run.summary.mean_total_profit, 50.0);
        assert_eq!(run.summary.std_dev_total_profit, 0.0);
        assert_relative_eq!(run.summary.ci_lower, 50.0);
        assert_relative_eq!(run.summary.ci_upper, 50.0);
    }

    #[test]
    fn losing_pool_has_drawdown() {
        let run = seeded(10, 4, 3).run(&[-1.0]).unwrap();
        // curve -1, -2, -3, -4 against a running max of -1
        assert_relative_eq!(run.summary.mean_max_drawdown, 3.0);
    }

    #[test]
    fn confidence_interval_brackets_mean() {
        let pool = [100.0, -100.0, 50.0, -50.0, 25.0, -25.0, 10.0, -10.0];
        for level in [0.5, 0.8, 0.9, 0.95, 0.99] {
            let run = MonteCarloSimulator::new(MonteCarloConfig {
                simulations: 2000,
                days: 50,
                confidence_level: level,
                seed: Some(11),
            })
            .unwrap()
            .run(&pool)
            .unwrap();
            let s = &run.summary;
            assert!(s.ci_lower <= s.mean_total_profit, "level {level}");
            assert!(s.mean_total_profit <= s.ci_upper, "level {level}");
        }
    }

    #[test]
    fn final_equity_equals_total_profit() {
        let run = seeded(100, 20, 5).run(&[3.0, -2.0, 7.5]).unwrap();
        for t in &run.trials {
            assert_eq!(t.final_equity, t.total_profit);
        }
        assert_eq!(
            run.summary.mean_final_equity,
            run.summary.mean_total_profit
        );
    }

    #[test]
    fn quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile(&sorted, 0.0), 1.0);
        assert_relative_eq!(quantile(&sorted, 0.5), 3.0);
        assert_relative_eq!(quantile(&sorted, 0.025), 1.1);
        assert_relative_eq!(quantile(&sorted, 1.0), 5.0);
    }

    #[test]
    fn summary_labels_follow_confidence_level() {
        let run = seeded(5, 5, 9).run(&[1.0, -1.0]).unwrap();
        let labels: Vec<String> = run.summary.to_pairs().into_iter().map(|(l, _)| l).collect();
        assert_eq!(
            labels,
            vec![
                "Mean Total Profit",
                "Std Dev Total Profit",
                "95% CI Lower",
                "95% CI Upper",
                "Mean Max Drawdown",
                "Mean Final Equity",
            ]
        );
        assert_eq!(run.summary.to_table().rows.len(), 6);
    }
}
