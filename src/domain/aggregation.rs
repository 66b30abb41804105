//! Grouping, filtering and per-group metric tables.
//!
//! Records are filtered first ([`RecordFilter`]), then partitioned by an ordered list of
//! [`Dimension`]s. Group keys live in a `BTreeMap`, so table rows come out sorted by key
//! tuple: days in calendar order, labels lexicographically, periods chronologically.

use super::error::BtlensError;
use super::metrics::{MetricRegistry, MetricVector};
use super::table::{Cell, Table};
use super::trade::{DayOfWeek, Period, PeriodGranularity, TradeRecord, TradeRecordSet};
use chrono::Days;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

pub const DAY_OF_WEEK_COLUMN: &str = "Day of Week";
pub const STOP_LOSS_COLUMN: &str = "Stop Loss %";
pub const STRATEGY_COLUMN: &str = "Strategy Type";
pub const PERIOD_COLUMN: &str = "Period";
pub const TRADES_COLUMN: &str = "Trades";
pub const BEST_COLUMN: &str = "Best Column";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    DayOfWeek,
    StopLoss,
    Strategy,
    Period(PeriodGranularity),
}

impl Dimension {
    pub fn column_name(&self) -> &'static str {
        match self {
            Dimension::DayOfWeek => DAY_OF_WEEK_COLUMN,
            Dimension::StopLoss => STOP_LOSS_COLUMN,
            Dimension::Strategy => STRATEGY_COLUMN,
            Dimension::Period(_) => PERIOD_COLUMN,
        }
    }

    fn key_of(&self, record: &TradeRecord) -> KeyValue {
        match self {
            Dimension::DayOfWeek => KeyValue::Day(record.day_of_week),
            Dimension::StopLoss => KeyValue::Label(record.stop_loss.clone()),
            Dimension::Strategy => KeyValue::Label(record.strategy.clone()),
            Dimension::Period(g) => KeyValue::Period(record.period(*g)),
        }
    }
}

/// One component of a group key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Day(DayOfWeek),
    Label(String),
    Period(Period),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Day(d) => write!(f, "{d}"),
            KeyValue::Label(s) => f.write_str(s),
            KeyValue::Period(p) => write!(f, "{p}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(pub Vec<KeyValue>);

/// Ordered dimension list records are grouped by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    dimensions: Vec<Dimension>,
}

impl Default for Grouping {
    fn default() -> Self {
        Self {
            dimensions: vec![Dimension::DayOfWeek, Dimension::StopLoss, Dimension::Strategy],
        }
    }
}

impl Grouping {
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self { dimensions }
    }

    /// Puts a period bucket in front of the existing dimensions.
    pub fn with_period(mut self, granularity: PeriodGranularity) -> Self {
        self.dimensions.retain(|d| !matches!(d, Dimension::Period(_)));
        self.dimensions.insert(0, Dimension::Period(granularity));
        self
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn key_of(&self, record: &TradeRecord) -> GroupKey {
        GroupKey(self.dimensions.iter().map(|d| d.key_of(record)).collect())
    }
}

/// Inclusion or exclusion list over one record field. An empty list filters nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter<T> {
    Include(Vec<T>),
    Exclude(Vec<T>),
}

impl<T: PartialEq> ListFilter<T> {
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            ListFilter::Include(list) => list.is_empty() || list.contains(value),
            ListFilter::Exclude(list) => !list.contains(value),
        }
    }
}

/// Pre-grouping filters. Applied in field order: time window first, then the lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// Keep records with `entry_date >= latest entry date - last_days`.
    pub last_days: Option<u32>,
    pub days: Option<ListFilter<DayOfWeek>>,
    pub stop_losses: Option<ListFilter<String>>,
    pub strategies: Option<ListFilter<String>>,
}

impl RecordFilter {
    pub fn last_days(mut self, days: u32) -> Self {
        self.last_days = Some(days);
        self
    }

    pub fn days(mut self, filter: ListFilter<DayOfWeek>) -> Self {
        self.days = Some(filter);
        self
    }

    pub fn stop_losses(mut self, filter: ListFilter<String>) -> Self {
        self.stop_losses = Some(filter);
        self
    }

    pub fn strategies(mut self, filter: ListFilter<String>) -> Self {
        self.strategies = Some(filter);
        self
    }

    pub fn apply(&self, records: &TradeRecordSet) -> TradeRecordSet {
        let cutoff = match (self.last_days, records.latest_date()) {
            // a window reaching past the earliest representable date keeps everything
            (Some(days), Some(latest)) => latest.checked_sub_days(Days::new(u64::from(days))),
            _ => None,
        };
        records.subset(|r| {
            cutoff.is_none_or(|c| r.entry_date >= c)
                && self.days.as_ref().is_none_or(|f| f.accepts(&r.day_of_week))
                && self
                    .stop_losses
                    .as_ref()
                    .is_none_or(|f| f.accepts(&r.stop_loss))
                && self
                    .strategies
                    .as_ref()
                    .is_none_or(|f| f.accepts(&r.strategy))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub key: GroupKey,
    pub trades: usize,
    pub metrics: MetricVector,
}

/// One row per group, ordered by group key.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsTable {
    pub dimensions: Vec<Dimension>,
    pub metric_names: Vec<String>,
    pub rows: Vec<MetricsRow>,
}

impl MetricsTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn position_of(&self, dimension: Dimension) -> Option<usize> {
        self.dimensions.iter().position(|d| *d == dimension)
    }

    /// First row whose key equals `key`.
    pub fn find(&self, key: &[KeyValue]) -> Option<&MetricsRow> {
        self.rows.iter().find(|r| r.key.0 == key)
    }

    pub fn to_table(&self) -> Table {
        let mut columns: Vec<String> = self
            .dimensions
            .iter()
            .map(|d| d.column_name().to_string())
            .collect();
        columns.push(TRADES_COLUMN.to_string());
        columns.extend(self.metric_names.iter().cloned());

        let mut table = Table::new(columns);
        for row in &self.rows {
            let mut cells: Vec<Cell> = row.key.0.iter().map(|k| Cell::Text(k.to_string())).collect();
            cells.push(Cell::Count(row.trades));
            cells.extend(row.metrics.iter().map(|(_, v)| Cell::Number(v)));
            table.push_row(cells);
        }
        table
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub day: DayOfWeek,
    /// Mean P/L per column, 0 where the group is absent.
    pub values: Vec<f64>,
    /// Index of the best column; `None` only when there are no columns.
    pub best: Option<usize>,
}

/// Mean P/L by day (rows) and `(strategy, stop loss)` pair (columns).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotView {
    pub columns: Vec<(String, String)>,
    pub rows: Vec<PivotRow>,
}

impl PivotView {
    pub fn column_label(&self, index: usize) -> Option<String> {
        self.columns
            .get(index)
            .map(|(strategy, stop_loss)| format!("{strategy} {stop_loss}"))
    }

    pub fn row(&self, day: DayOfWeek) -> Option<&PivotRow> {
        self.rows.iter().find(|r| r.day == day)
    }

    pub fn to_table(&self) -> Table {
        let mut columns = vec![DAY_OF_WEEK_COLUMN.to_string()];
        columns.extend((0..self.columns.len()).filter_map(|i| self.column_label(i)));
        columns.push(BEST_COLUMN.to_string());

        let mut table = Table::new(columns);
        for row in &self.rows {
            let mut cells = vec![Cell::Text(row.day.to_string())];
            cells.extend(row.values.iter().map(|&v| Cell::Number(v)));
            let best = row
                .best
                .and_then(|i| self.column_label(i))
                .unwrap_or_default();
            cells.push(Cell::Text(best));
            table.push_row(cells);
        }
        table
    }
}

/// Computes grouped metric tables and the views derived from them.
pub struct AggregationEngine {
    registry: MetricRegistry,
}

impl AggregationEngine {
    pub fn new(registry: MetricRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn metrics_table(
        &self,
        records: &TradeRecordSet,
        grouping: &Grouping,
        filter: &RecordFilter,
    ) -> MetricsTable {
        let filtered = filter.apply(records);
        let groups = group_records(&filtered, grouping);
        debug!(
            records = filtered.len(),
            groups = groups.len(),
            "computing metrics table"
        );

        let rows = groups
            .into_iter()
            .map(|(key, members)| MetricsRow {
                key,
                trades: members.len(),
                metrics: self.registry.compute_all(&members),
            })
            .collect();

        MetricsTable {
            dimensions: grouping.dimensions().to_vec(),
            metric_names: self.registry.names().into_iter().map(String::from).collect(),
            rows,
        }
    }

    /// Per day, the row with the best value of `metric`.
    ///
    /// Direction follows the metric's `is_higher_better()`. On ties the earliest row
    /// in table order wins; NaN values never win.
    pub fn optimal_selection(
        &self,
        table: &MetricsTable,
        metric: &str,
    ) -> Result<MetricsTable, BtlensError> {
        let higher_is_better = self.registry.get(metric)?.is_higher_better();
        let day_pos =
            table
                .position_of(Dimension::DayOfWeek)
                .ok_or_else(|| BtlensError::MissingDimension {
                    dimension: DAY_OF_WEEK_COLUMN.to_string(),
                })?;

        let mut best: BTreeMap<DayOfWeek, (f64, &MetricsRow)> = BTreeMap::new();
        for row in &table.rows {
            let KeyValue::Day(day) = &row.key.0[day_pos] else {
                continue;
            };
            let day = *day;
            let Some(value) = row.metrics.get(metric) else {
                continue;
            };
            if value.is_nan() {
                continue;
            }
            match best.get(&day) {
                Some(&(current, _)) => {
                    let better = if higher_is_better {
                        value > current
                    } else {
                        value < current
                    };
                    if better {
                        best.insert(day, (value, row));
                    }
                }
                None => {
                    best.insert(day, (value, row));
                }
            }
        }

        Ok(MetricsTable {
            dimensions: table.dimensions.clone(),
            metric_names: table.metric_names.clone(),
            rows: best.into_values().map(|(_, row)| row.clone()).collect(),
        })
    }

    pub fn pivot_view(&self, records: &TradeRecordSet, filter: &RecordFilter) -> PivotView {
        let filtered = filter.apply(records);
        if filtered.is_empty() {
            return PivotView::default();
        }

        let mut sums: BTreeMap<(DayOfWeek, &str, &str), (f64, usize)> = BTreeMap::new();
        let mut columns: BTreeSet<(String, String)> = BTreeSet::new();
        for r in &filtered {
            let entry = sums
                .entry((r.day_of_week, r.strategy.as_str(), r.stop_loss.as_str()))
                .or_insert((0.0, 0));
            entry.0 += r.pnl;
            entry.1 += 1;
            columns.insert((r.strategy.clone(), r.stop_loss.clone()));
        }
        let columns: Vec<(String, String)> = columns.into_iter().collect();

        let rows = DayOfWeek::ALL
            .iter()
            .map(|&day| {
                let values: Vec<f64> = columns
                    .iter()
                    .map(|(strategy, stop_loss)| {
                        sums.get(&(day, strategy.as_str(), stop_loss.as_str()))
                            .map(|&(sum, count)| sum / count as f64)
                            .unwrap_or(0.0)
                    })
                    .collect();
                let best = first_argmax(&values);
                PivotRow { day, values, best }
            })
            .collect();

        PivotView { columns, rows }
    }
}

/// Groups records by key, each group keeping record order.
pub fn group_records<'a>(
    records: &'a TradeRecordSet,
    grouping: &Grouping,
) -> BTreeMap<GroupKey, Vec<&'a TradeRecord>> {
    let mut groups: BTreeMap<GroupKey, Vec<&TradeRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(grouping.key_of(record)).or_default().push(record);
    }
    groups
}

fn first_argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some(b) if v <= values[b] => {}
            _ => best = Some(i),
        }
    }
    best
}
