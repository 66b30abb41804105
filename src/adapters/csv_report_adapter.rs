//! CSV table output adapter.

use crate::domain::error::BtlensError;
use crate::domain::table::Table;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes tables to `<output_dir>/<name>.csv`, or to stdout without an output dir.
pub struct CsvReportAdapter {
    output_dir: Option<PathBuf>,
}

impl CsvReportAdapter {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Serializes `rows` with their serde field names as the header.
    pub fn write_records<S: Serialize>(&self, name: &str, rows: &[S]) -> Result<(), BtlensError> {
        match self.open(name)? {
            Some(file) => write_records_to(file, rows),
            None => write_records_to(io::stdout().lock(), rows),
        }
    }

    fn open(&self, name: &str) -> Result<Option<File>, BtlensError> {
        let Some(dir) = &self.output_dir else {
            return Ok(None);
        };
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.csv"));
        info!(path = %path.display(), "writing report");
        Ok(Some(File::create(path)?))
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_table(&self, name: &str, table: &Table) -> Result<(), BtlensError> {
        match self.open(name)? {
            Some(file) => write_table_to(file, table),
            None => write_table_to(io::stdout().lock(), table),
        }
    }
}

pub fn write_table_to<W: Write>(writer: W, table: &Table) -> Result<(), BtlensError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&table.columns).map_err(io::Error::from)?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|cell| cell.to_string()))
            .map_err(io::Error::from)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_records_to<W: Write, S: Serialize>(writer: W, rows: &[S]) -> Result<(), BtlensError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row).map_err(io::Error::from)?;
    }
    wtr.flush()?;
    Ok(())
}
