//! CSV trade-log adapter.
//!
//! One file per backtest run, named `<underlying>_<strategy>_..._<stoploss>.csv`.

use crate::domain::error::BtlensError;
use crate::domain::trade::{DayOfWeek, TradeRecord};
use crate::ports::trade_source::TradeSource;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ENTRY_DATE_COLUMN: &str = "Entry Date";
pub const PNL_COLUMN: &str = "P/L";

pub struct CsvTradeAdapter {
    paths: Vec<PathBuf>,
    date_format: String,
}

impl CsvTradeAdapter {
    pub fn new(paths: Vec<PathBuf>, date_format: impl Into<String>) -> Self {
        Self {
            paths,
            date_format: date_format.into(),
        }
    }

    fn load_file(&self, path: &Path) -> Result<Vec<TradeRecord>, BtlensError> {
        let file = path.display().to_string();
        let load_err = |reason: String| BtlensError::Load {
            file: file.clone(),
            reason,
        };

        let (strategy, stop_loss) = labels_from_file_name(path).map_err(&load_err)?;
        let content = fs::read_to_string(path)
            .map_err(|e| load_err(format!("failed to read: {e}")))?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| load_err(format!("CSV header error: {e}")))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| load_err(format!("missing column '{name}'")))
        };
        let date_idx = column(ENTRY_DATE_COLUMN)?;
        let pnl_idx = column(PNL_COLUMN)?;

        let mut trades = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| load_err(format!("CSV parse error: {e}")))?;
            let line = record.position().map_or(0, |p| p.line());

            let date_str = record.get(date_idx).unwrap_or_default();
            let pnl_str = record.get(pnl_idx).unwrap_or_default();
            if date_str.is_empty() || pnl_str.is_empty() {
                debug!(file = %file, line, "skipping roll-up row");
                continue;
            }

            let date = NaiveDate::parse_from_str(date_str, &self.date_format).map_err(|e| {
                load_err(format!("line {line}: invalid entry date '{date_str}': {e}"))
            })?;
            let pnl: f64 = pnl_str
                .parse()
                .map_err(|e| load_err(format!("line {line}: invalid P/L '{pnl_str}': {e}")))?;
            if !pnl.is_finite() {
                return Err(load_err(format!("line {line}: P/L '{pnl_str}' is not finite")));
            }

            if DayOfWeek::from_date(date).is_none() {
                warn!(file = %file, line, %date, "skipping weekend entry");
                continue;
            }
            trades.push(TradeRecord::new(date, pnl, stop_loss.as_str(), strategy.as_str())?);
        }

        debug!(file = %file, trades = trades.len(), %strategy, %stop_loss, "loaded trade log");
        Ok(trades)
    }
}

impl TradeSource for CsvTradeAdapter {
    fn load_trades(&self) -> Result<Vec<TradeRecord>, BtlensError> {
        let mut trades = Vec::new();
        for path in &self.paths {
            trades.extend(self.load_file(path)?);
        }
        Ok(trades)
    }
}

/// `(strategy, stop loss)` from the second and last `_`-separated tokens of the stem.
pub fn labels_from_file_name(path: &Path) -> Result<(String, String), String> {
    let stem = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.strip_suffix(".csv").unwrap_or(n))
        .ok_or_else(|| "file name is not valid UTF-8".to_string())?;
    let parts: Vec<&str> = stem.split('_').collect();
    match parts.as_slice() {
        [_, strategy, .., stop_loss] => Ok((strategy.to_string(), stop_loss.to_string())),
        [_, strategy] => Ok((strategy.to_string(), strategy.to_string())),
        _ => Err(format!(
            "file name '{stem}' does not follow <underlying>_<strategy>_..._<stoploss>.csv"
        )),
    }
}
