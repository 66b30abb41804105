//! Pluggable performance metrics and the name-keyed registry.
//!
//! Every metric reduces a subset of trade records to one `f64`. Degenerate inputs
//! (empty groups, zero denominators) resolve to documented fallback values rather
//! than errors:
//!
//! - empty group: `0.0` for every built-in metric;
//! - ratio with a zero denominator on a non-empty group: `f64::INFINITY`.

use super::error::BtlensError;
use super::trade::TradeRecord;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub const TOTAL_PROFIT: &str = "Total Profit";
pub const WIN_PERCENTAGE: &str = "Win %";
pub const AVG_PROFIT_ON_WINNING: &str = "Avg Profit on Winning Trades";
pub const AVG_LOSS_ON_LOSING: &str = "Avg Loss on Losing Trades";
pub const MAX_PROFIT_IN_SINGLE_TRADE: &str = "Max Profit in Single Trade";
pub const MAX_LOSS_IN_SINGLE_TRADE: &str = "Max Loss in Single Trade";
pub const REWARD_TO_RISK_RATIO: &str = "Reward to Risk Ratio";
pub const MAX_DRAWDOWN: &str = "Max Drawdown";
pub const SHARPE_RATIO: &str = "Sharpe Ratio";
pub const SORTINO_RATIO: &str = "Sortino Ratio";
pub const CALMAR_RATIO: &str = "Calmar Ratio";

/// A performance metric over a group of trades.
pub trait Metric: Send + Sync {
    fn calculate(&self, records: &[&TradeRecord]) -> f64;

    /// Whether larger values rank better when selecting an optimum.
    fn is_higher_better(&self) -> bool {
        true
    }
}

pub struct TotalProfit;

impl Metric for TotalProfit {
    fn calculate(&self, records: &[&TradeRecord]) -> f64 {
        records.iter().map(|r| r.pnl).sum()
    }
}

pub struct WinPercentage;

impl Metric for WinPercentage {
    fn calculate(&self, records: &[&TradeRecord]) -> f64 {
        if records.is_empty() {
            return 0.0;
        }
        let winners = records.iter().filter(|r| r.pnl > 0.0).count();
        100.0 * winners as f64 / records.len() as f64
    }
}

pub struct AvgProfitOnWinning;

impl Metric for AvgProfitOnWinning {
    fn calculate(&self, records: &[&TradeRecord]) -> f64 {
        mean_or_zero(records.iter().map(|r| r.pnl).filter(|&p| p > 0.0))
    }
}

/// Mean of the losing trades. Negative, so closer to zero is better.
pub struct AvgLossOnLosing;

impl Metric for AvgLossOnLosing {
    fn calculate(&self, records: &[&TradeRecord]) -> f64 {
        mean_or_zero(records.iter().map(|r| r.pnl).filter(|&p| p < 0.0))
    }
}

pub struct MaxProfitInSingleTrade;

impl Metric for MaxProfitInSingleTrade {
    fn calculate(&self, records: &[&TradeRecord]) -> f64 {
        records
            .iter()
            .map(|r| r.pnl)
            .reduce(f64::max)
            .unwrap_or(0.0)
    }
}

pub struct MaxLossInSingleTrade;

impl Metric for MaxLossInSingleTrade {
    fn calculate(&self, records: &[&TradeRecord]) -> f64 {
        records
            .iter()
            .map(|r| r.pnl)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }
}

pub struct RewardToRiskRatio;

impl Metric for RewardToRiskRatio {
    fn calculate(&self, records: &[&TradeRecord]) -> f64 {
        if records.is_empty() {
            return 0.0;
        }
        let total_profit: f64 = records.iter().map(|r| r.pnl).filter(|&p| p > 0.0).sum();
        let total_loss: f64 = records
            .iter()
            .map(|r| r.pnl)
            .filter(|&p| p < 0.0)
            .sum::<f64>()
            .abs();
        if total_loss == 0.0 {
            f64::INFINITY
        } else {
            total_profit / total_loss
        }
    }
}

/// Largest peak-to-trough fall of the cumulative P/L, trades taken in entry-date order.
pub struct MaxDrawdown;

impl Metric for MaxDrawdown {
    fn calculate(&self, records: &[&TradeRecord]) -> f64 {
        let pnl: Vec<f64> = sorted_by_entry(records).iter().map(|r| r.pnl).collect();
        max_drawdown(&cumulative(&pnl))
    }

    fn is_higher_better(&self) -> bool {
        false
    }
}

/// Mean over stdev of the excess percentage-change series.
///
/// The series is the period-over-period change of the raw per-trade P/L values, not
/// of an equity curve. It depends on record order, so records are sorted by entry date
/// first.
pub struct SharpeRatio {
    pub risk_free_rate: f64,
}

impl Metric for SharpeRatio {
    fn calculate(&self, records: &[&TradeRecord]) -> f64 {
        let excess = excess_changes(records, self.risk_free_rate);
        if excess.len() < 2 {
            return 0.0;
        }
        let stddev = sample_stddev(&excess);
        if stddev == 0.0 {
            f64::INFINITY
        } else {
            mean(&excess) / stddev
        }
    }
}

/// Like [`SharpeRatio`], but divides by the dispersion of the negative excess values only.
pub struct SortinoRatio {
    pub risk_free_rate: f64,
}

impl Metric for SortinoRatio {
    fn calculate(&self, records: &[&TradeRecord]) -> f64 {
        let excess = excess_changes(records, self.risk_free_rate);
        if excess.len() < 2 {
            return 0.0;
        }
        let downside: Vec<f64> = excess.iter().copied().filter(|&r| r < 0.0).collect();
        let downside_stddev = if downside.len() < 2 {
            0.0
        } else {
            sample_stddev(&downside)
        };
        if downside_stddev == 0.0 {
            f64::INFINITY
        } else {
            mean(&excess) / downside_stddev
        }
    }
}

pub struct CalmarRatio;

impl Metric for CalmarRatio {
    fn calculate(&self, records: &[&TradeRecord]) -> f64 {
        if records.is_empty() {
            return 0.0;
        }
        let n = records.len() as f64;
        let total: f64 = records.iter().map(|r| r.pnl).sum();
        let annualized_return = (1.0 + total).powf(TRADING_DAYS_PER_YEAR / n) - 1.0;
        let drawdown = MaxDrawdown.calculate(records).abs();
        if drawdown == 0.0 {
            f64::INFINITY
        } else {
            annualized_return / drawdown
        }
    }
}

/// Metric values of one group, in registry order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricVector {
    values: Vec<(String, f64)>,
}

impl MetricVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Name-keyed metric table. Registration order is preserved and is the column order of
/// every metrics table built from this registry.
#[derive(Default)]
pub struct MetricRegistry {
    metrics: Vec<(String, Box<dyn Metric>)>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with every built-in metric.
    pub fn with_builtins(risk_free_rate: f64) -> Self {
        let mut registry = Self::new();
        registry.register(TOTAL_PROFIT, TotalProfit);
        registry.register(WIN_PERCENTAGE, WinPercentage);
        registry.register(AVG_PROFIT_ON_WINNING, AvgProfitOnWinning);
        registry.register(AVG_LOSS_ON_LOSING, AvgLossOnLosing);
        registry.register(MAX_PROFIT_IN_SINGLE_TRADE, MaxProfitInSingleTrade);
        registry.register(MAX_LOSS_IN_SINGLE_TRADE, MaxLossInSingleTrade);
        registry.register(REWARD_TO_RISK_RATIO, RewardToRiskRatio);
        registry.register(MAX_DRAWDOWN, MaxDrawdown);
        registry.register(SHARPE_RATIO, SharpeRatio { risk_free_rate });
        registry.register(SORTINO_RATIO, SortinoRatio { risk_free_rate });
        registry.register(CALMAR_RATIO, CalmarRatio);
        registry
    }

    /// Adds `metric` under `name`, replacing any metric already registered there.
    pub fn register<M: Metric + 'static>(&mut self, name: impl Into<String>, metric: M) {
        let name = name.into();
        let boxed: Box<dyn Metric> = Box::new(metric);
        match self.metrics.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = boxed,
            None => self.metrics.push((name, boxed)),
        }
    }

    pub fn get(&self, name: &str) -> Result<&dyn Metric, BtlensError> {
        self.metrics
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m.as_ref())
            .ok_or_else(|| BtlensError::UnknownMetric {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.metrics.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn compute_all(&self, records: &[&TradeRecord]) -> MetricVector {
        MetricVector {
            values: self
                .metrics
                .iter()
                .map(|(name, metric)| (name.clone(), metric.calculate(records)))
                .collect(),
        }
    }
}

fn mean_or_zero(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with one degree of freedom removed. Callers ensure `len >= 2`.
fn sample_stddev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Stable sort, so trades sharing an entry date keep their ingestion order.
fn sorted_by_entry<'a>(records: &[&'a TradeRecord]) -> Vec<&'a TradeRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.entry_date);
    sorted
}

fn excess_changes(records: &[&TradeRecord], risk_free_rate: f64) -> Vec<f64> {
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    sorted_by_entry(records)
        .windows(2)
        .map(|w| (w[1].pnl - w[0].pnl) / w[0].pnl)
        .filter(|change| change.is_finite())
        .map(|change| change - daily_rf)
        .collect()
}

pub(crate) fn cumulative(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, &v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

/// max(runningMax(curve) - curve), 0 for an empty curve.
pub(crate) fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &value in curve {
        if value > peak {
            peak = value;
        }
        let dd = peak - value;
        if dd > max_dd {
            max_dd = dd;
        }
    }
    max_dd
}
