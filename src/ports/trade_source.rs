//! Trade-log access port trait.

use crate::domain::error::BtlensError;
use crate::domain::trade::{TradeRecord, TradeRecordSet};

/// Supplies the trade records of one or more backtest runs.
pub trait TradeSource {
    fn load_trades(&self) -> Result<Vec<TradeRecord>, BtlensError>;

    /// Ingests every record in one pass into an immutable set.
    fn load_record_set(&self) -> Result<TradeRecordSet, BtlensError> {
        self.load_trades().map(TradeRecordSet::new)
    }
}
