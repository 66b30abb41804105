//! Per-day setup search.
//!
//! A day's profit depends only on that day's own configuration, so the best assignment
//! is the per-day argmax over candidate `(stop loss, strategy)` pairs. The exhaustive
//! odometer over all `K^5` assignments gives the same answer and is kept, bounded, as a
//! cross-check.

use super::error::BtlensError;
use super::table::{Cell, Table};
use super::trade::{DayOfWeek, TradeRecordSet};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

pub const DEFAULT_MAX_ASSIGNMENTS: u128 = 1_000_000;

const DAYS: usize = DayOfWeek::ALL.len();

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaySetup {
    Configured { stop_loss: String, strategy: String },
    Excluded,
}

impl DaySetup {
    pub fn configured(stop_loss: impl Into<String>, strategy: impl Into<String>) -> Self {
        DaySetup::Configured {
            stop_loss: stop_loss.into(),
            strategy: strategy.into(),
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, DaySetup::Excluded)
    }
}

impl fmt::Display for DaySetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaySetup::Configured {
                stop_loss,
                strategy,
            } => write!(f, "{strategy} {stop_loss}"),
            DaySetup::Excluded => f.write_str("Excluded"),
        }
    }
}

/// The configuration chosen for every trading day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupConfiguration {
    days: [DaySetup; DAYS],
}

impl Default for SetupConfiguration {
    fn default() -> Self {
        Self {
            days: std::array::from_fn(|_| DaySetup::Excluded),
        }
    }
}

impl SetupConfiguration {
    pub fn get(&self, day: DayOfWeek) -> &DaySetup {
        &self.days[day.index()]
    }

    pub fn set(&mut self, day: DayOfWeek, setup: DaySetup) {
        self.days[day.index()] = setup;
    }

    pub fn iter(&self) -> impl Iterator<Item = (DayOfWeek, &DaySetup)> {
        DayOfWeek::ALL.iter().copied().zip(self.days.iter())
    }
}

/// Summed P/L per `(day, candidate)` built once from the windowed records.
///
/// Candidates are the observed `(stop loss, strategy)` pairs, ordered by the
/// first-observed position of the stop loss, then of the strategy.
#[derive(Debug, Clone)]
pub struct ProfitLookup {
    candidates: Vec<(String, String)>,
    sums: HashMap<(DayOfWeek, usize), f64>,
    traded: [bool; DAYS],
}

impl ProfitLookup {
    pub fn build(records: &TradeRecordSet) -> Self {
        let sl_rank = |sl: &str| records.stop_losses().iter().position(|s| s == sl);
        let strat_rank = |st: &str| records.strategies().iter().position(|s| s == st);

        let mut candidates: Vec<(String, String)> = Vec::new();
        for r in records {
            if !candidates
                .iter()
                .any(|(sl, st)| *sl == r.stop_loss && *st == r.strategy)
            {
                candidates.push((r.stop_loss.clone(), r.strategy.clone()));
            }
        }
        candidates.sort_by_key(|(sl, st)| (sl_rank(sl), strat_rank(st)));

        let index: HashMap<(&str, &str), usize> = candidates
            .iter()
            .enumerate()
            .map(|(i, (sl, st))| ((sl.as_str(), st.as_str()), i))
            .collect();

        let mut sums: HashMap<(DayOfWeek, usize), f64> = HashMap::new();
        let mut traded = [false; DAYS];
        for r in records {
            if let Some(&c) = index.get(&(r.stop_loss.as_str(), r.strategy.as_str())) {
                *sums.entry((r.day_of_week, c)).or_insert(0.0) += r.pnl;
                traded[r.day_of_week.index()] = true;
            }
        }

        Self {
            candidates,
            sums,
            traded,
        }
    }

    /// Whether any record falls on `day`.
    pub fn has_trades(&self, day: DayOfWeek) -> bool {
        self.traded[day.index()]
    }

    pub fn candidates(&self) -> &[(String, String)] {
        &self.candidates
    }

    /// Summed P/L of `candidate` on `day`; 0 when no trade matches.
    pub fn profit(&self, day: DayOfWeek, candidate: usize) -> f64 {
        self.sums.get(&(day, candidate)).copied().unwrap_or(0.0)
    }

    fn day_profit(&self, day: DayOfWeek, choice: Option<usize>) -> f64 {
        choice.map_or(0.0, |c| self.profit(day, c))
    }

    fn day_profits(&self, assignment: &Assignment) -> [f64; DAYS] {
        DayOfWeek::ALL.map(|day| self.day_profit(day, assignment[day.index()]))
    }

    fn total(&self, assignment: &Assignment) -> f64 {
        DayOfWeek::ALL
            .iter()
            .map(|&day| self.day_profit(day, assignment[day.index()]))
            .sum()
    }
}

/// Candidate index per day, `None` for excluded.
type Assignment = [Option<usize>; DAYS];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    PerDay,
    /// Enumerate every assignment; fails when `K^5` exceeds `max_assignments`.
    Exhaustive { max_assignments: u128 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimalSetup {
    pub configuration: SetupConfiguration,
    pub total_profit: f64,
    pub day_profits: [f64; DAYS],
}

impl OptimalSetup {
    pub fn day_profit(&self, day: DayOfWeek) -> f64 {
        self.day_profits[day.index()]
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(vec![
            "Day".into(),
            "Optimal Stop Loss".into(),
            "Strategy Type".into(),
            "Day Profit".into(),
            "Total Profit".into(),
        ]);
        for (day, setup) in self.configuration.iter() {
            let (stop_loss, strategy) = match setup {
                DaySetup::Configured {
                    stop_loss,
                    strategy,
                } => (stop_loss.clone(), strategy.clone()),
                DaySetup::Excluded => ("Excluded".to_string(), String::new()),
            };
            table.push_row(vec![
                Cell::Text(day.to_string()),
                Cell::Text(stop_loss),
                Cell::Text(strategy),
                Cell::Number(self.day_profit(day)),
                Cell::Number(self.total_profit),
            ]);
        }
        table
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetupOptimizer {
    mode: SearchMode,
}

impl SetupOptimizer {
    pub fn new(mode: SearchMode) -> Self {
        Self { mode }
    }

    /// Finds the most profitable per-day setup over `records`.
    ///
    /// Phase 1 picks a candidate for every day; phase 2 then tries excluding each day
    /// in turn and keeps an exclusion only if it strictly raises the total. Days with
    /// no trades in `records` are reported as excluded.
    pub fn optimize(&self, records: &TradeRecordSet) -> Result<OptimalSetup, BtlensError> {
        let lookup = ProfitLookup::build(records);
        debug!(
            candidates = lookup.candidates().len(),
            records = records.len(),
            "searching setups"
        );

        let phase_one = match self.mode {
            SearchMode::PerDay => best_per_day(&lookup),
            SearchMode::Exhaustive { max_assignments } => {
                best_exhaustive(&lookup, max_assignments)?
            }
        };
        let mut refined = refine_exclusions(&lookup, phase_one);
        for &day in &DayOfWeek::ALL {
            if !lookup.has_trades(day) {
                refined[day.index()] = None;
            }
        }

        let mut configuration = SetupConfiguration::default();
        let mut day_profits = [0.0; DAYS];
        for &day in &DayOfWeek::ALL {
            let choice = refined[day.index()];
            if let Some(c) = choice {
                let (stop_loss, strategy) = &lookup.candidates[c];
                configuration.set(day, DaySetup::configured(stop_loss, strategy));
            }
            day_profits[day.index()] = lookup.day_profit(day, choice);
        }
        let total_profit = lookup.total(&refined);
        info!(total_profit, "optimal setup found");

        Ok(OptimalSetup {
            configuration,
            total_profit,
            day_profits,
        })
    }
}

/// First candidate with the highest profit, per day.
fn best_per_day(lookup: &ProfitLookup) -> Assignment {
    let mut assignment: Assignment = [None; DAYS];
    for &day in &DayOfWeek::ALL {
        let mut best: Option<(usize, f64)> = None;
        for c in 0..lookup.candidates.len() {
            let profit = lookup.profit(day, c);
            if best.is_none_or(|(_, b)| profit > b) {
                best = Some((c, profit));
            }
        }
        assignment[day.index()] = best.map(|(c, _)| c);
    }
    assignment
}

/// Odometer over all assignments, Monday slowest.
///
/// Assignments are compared on their per-day profits rather than on the summed total,
/// so rounding in the sum cannot break a tie differently from [`best_per_day`]. The
/// incumbent is replaced only by an assignment that is no worse on any day and strictly
/// better on one.
fn best_exhaustive(
    lookup: &ProfitLookup,
    max_assignments: u128,
) -> Result<Assignment, BtlensError> {
    let k = lookup.candidates.len();
    if k == 0 {
        return Ok([None; DAYS]);
    }
    let assignments = (k as u128).checked_pow(DAYS as u32).unwrap_or(u128::MAX);
    if assignments > max_assignments {
        return Err(BtlensError::SearchSpaceTooLarge {
            assignments,
            limit: max_assignments,
        });
    }

    let mut digits = [0usize; DAYS];
    let mut best: Option<(Assignment, [f64; DAYS])> = None;
    loop {
        let assignment: Assignment = digits.map(Some);
        let profits = lookup.day_profits(&assignment);
        if best.is_none_or(|(_, b)| dominates(&profits, &b)) {
            best = Some((assignment, profits));
        }

        let mut pos = DAYS;
        loop {
            if pos == 0 {
                return Ok(best.map(|(a, _)| a).unwrap_or([None; DAYS]));
            }
            pos -= 1;
            digits[pos] += 1;
            if digits[pos] < k {
                break;
            }
            digits[pos] = 0;
        }
    }
}

fn dominates(a: &[f64; DAYS], b: &[f64; DAYS]) -> bool {
    a.iter().zip(b).all(|(x, y)| x >= y) && a.iter().zip(b).any(|(x, y)| x > y)
}

fn refine_exclusions(lookup: &ProfitLookup, mut assignment: Assignment) -> Assignment {
    let mut total = lookup.total(&assignment);
    for &day in &DayOfWeek::ALL {
        if assignment[day.index()].is_none() {
            continue;
        }
        let mut trial = assignment;
        trial[day.index()] = None;
        let trial_total = lookup.total(&trial);
        if trial_total > total {
            debug!(%day, "excluding day");
            assignment = trial;
            total = trial_total;
        }
    }
    assignment
}
