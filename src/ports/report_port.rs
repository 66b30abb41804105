//! Result table output port trait.

use crate::domain::error::BtlensError;
use crate::domain::table::Table;

/// Port for writing named result tables.
pub trait ReportPort {
    fn write_table(&self, name: &str, table: &Table) -> Result<(), BtlensError>;
}
