//! Analysis session over one loaded trade record set.
//!
//! [`BacktestAnalyzer`] starts empty; every query fails with [`BtlensError::NotReady`]
//! until [`BacktestAnalyzer::load`] (or [`BacktestAnalyzer::load_records`]) succeeds.

use super::aggregation::{
    AggregationEngine, Dimension, Grouping, ListFilter, MetricsTable, PivotView, RecordFilter,
};
use super::error::BtlensError;
use super::metrics::MetricRegistry;
use super::monte_carlo::{MonteCarloConfig, MonteCarloRun, MonteCarloSimulator};
use super::optimizer::{OptimalSetup, SearchMode, SetupOptimizer};
use super::trade::{PeriodGranularity, TradeRecordSet};
use crate::ports::trade_source::TradeSource;
use tracing::info;

pub struct BacktestAnalyzer {
    engine: AggregationEngine,
    records: Option<TradeRecordSet>,
}

impl BacktestAnalyzer {
    pub fn new(registry: MetricRegistry) -> Self {
        Self {
            engine: AggregationEngine::new(registry),
            records: None,
        }
    }

    /// Session over the built-in metrics.
    pub fn with_builtins(risk_free_rate: f64) -> Self {
        Self::new(MetricRegistry::with_builtins(risk_free_rate))
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    /// Ingests every record from `source`, replacing any previous set.
    /// Returns the number of records loaded.
    pub fn load(&mut self, source: &dyn TradeSource) -> Result<usize, BtlensError> {
        let records = source.load_record_set()?;
        Ok(self.load_records(records))
    }

    pub fn load_records(&mut self, records: TradeRecordSet) -> usize {
        let count = records.len();
        info!(
            records = count,
            stop_losses = records.stop_losses().len(),
            strategies = records.strategies().len(),
            "trade records loaded"
        );
        self.records = Some(records);
        count
    }

    pub fn is_loaded(&self) -> bool {
        self.records.is_some()
    }

    pub fn records(&self) -> Result<&TradeRecordSet, BtlensError> {
        self.records.as_ref().ok_or(BtlensError::NotReady)
    }

    /// Number of distinct entry dates.
    pub fn total_days(&self) -> Result<usize, BtlensError> {
        Ok(self.records()?.trading_days())
    }

    /// Per-day optimal selection of `metric` over the default grouping.
    pub fn analyze(&self, filter: &RecordFilter, metric: &str) -> Result<MetricsTable, BtlensError> {
        let records = self.records()?;
        let table = self
            .engine
            .metrics_table(records, &Grouping::default(), filter);
        self.engine.optimal_selection(&table, metric)
    }

    /// Full metrics table over the optional window, optionally for one stop-loss label.
    pub fn summary(
        &self,
        last_days: Option<u32>,
        stop_loss: Option<&str>,
    ) -> Result<MetricsTable, BtlensError> {
        let records = self.records()?;
        let mut filter = RecordFilter::default();
        if let Some(days) = last_days {
            filter = filter.last_days(days);
        }
        if let Some(sl) = stop_loss {
            filter = filter.stop_losses(ListFilter::Include(vec![sl.to_string()]));
        }
        Ok(self
            .engine
            .metrics_table(records, &Grouping::default(), &filter))
    }

    /// Metrics table with the period bucket as the leading key.
    pub fn time_breakdown(
        &self,
        granularity: PeriodGranularity,
        filter: &RecordFilter,
    ) -> Result<MetricsTable, BtlensError> {
        let records = self.records()?;
        let grouping = Grouping::default().with_period(granularity);
        Ok(self.engine.metrics_table(records, &grouping, filter))
    }

    /// Metrics table over an explicit dimension list.
    pub fn grouped(
        &self,
        dimensions: Vec<Dimension>,
        filter: &RecordFilter,
    ) -> Result<MetricsTable, BtlensError> {
        let records = self.records()?;
        Ok(self
            .engine
            .metrics_table(records, &Grouping::new(dimensions), filter))
    }

    pub fn pivot(&self, filter: &RecordFilter) -> Result<PivotView, BtlensError> {
        Ok(self.engine.pivot_view(self.records()?, filter))
    }

    pub fn optimize(
        &self,
        last_days: Option<u32>,
        mode: SearchMode,
    ) -> Result<OptimalSetup, BtlensError> {
        let records = self.records()?;
        let window = match last_days {
            Some(days) => RecordFilter::default().last_days(days).apply(records),
            None => records.clone(),
        };
        SetupOptimizer::new(mode).optimize(&window)
    }

    /// Bootstraps over the P/L of every loaded record.
    pub fn simulate(&self, config: MonteCarloConfig) -> Result<MonteCarloRun, BtlensError> {
        let pool = self.records()?.pnl_pool();
        MonteCarloSimulator::new(config)?.run(&pool)
    }
}
