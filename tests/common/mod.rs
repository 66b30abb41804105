#![allow(dead_code)]

use btlens::domain::error::BtlensError;
use btlens::domain::trade::{TradeRecord, TradeRecordSet};
use btlens::ports::trade_source::TradeSource;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

pub struct MockTradeSource {
    pub trades: Vec<TradeRecord>,
    pub error: Option<String>,
}

impl MockTradeSource {
    pub fn new() -> Self {
        Self {
            trades: Vec::new(),
            error: None,
        }
    }

    pub fn with_trades(mut self, trades: Vec<TradeRecord>) -> Self {
        self.trades.extend(trades);
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl TradeSource for MockTradeSource {
    fn load_trades(&self) -> Result<Vec<TradeRecord>, BtlensError> {
        if let Some(reason) = &self.error {
            return Err(BtlensError::Load {
                file: "mock".into(),
                reason: reason.clone(),
            });
        }
        Ok(self.trades.clone())
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_trade(entry: &str, pnl: f64, stop_loss: &str, strategy: &str) -> TradeRecord {
    TradeRecord::new(date(entry), pnl, stop_loss, strategy).unwrap()
}

/// Mon +100 / Mon -50 at 10%, Tue +30 at 20%, all StratA. 2024-01-01 is a Monday.
pub fn worked_example() -> Vec<TradeRecord> {
    vec![
        make_trade("2024-01-01", 100.0, "10%", "StratA"),
        make_trade("2024-01-08", -50.0, "10%", "StratA"),
        make_trade("2024-01-02", 30.0, "20%", "StratA"),
    ]
}

pub fn worked_example_set() -> TradeRecordSet {
    TradeRecordSet::new(worked_example())
}

/// Writes a trade log with `Entry Date` in `%d-%m-%y` format.
pub fn write_trade_log(dir: &Path, name: &str, rows: &[(&str, f64)]) -> PathBuf {
    let mut content = String::from("Index,Entry Date,P/L\n");
    for (i, (entry, pnl)) in rows.iter().enumerate() {
        content.push_str(&format!("{},{entry},{pnl}\n", i + 1));
    }
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}
