// src/io/csv_store.rs
//! Delimited-text persistence for signal tables

use super::{SignalTable, TableStore};
use crate::config::constants::io::{DEFAULT_DELIMITER, MISSING_MARKERS};
use crate::error::{EmgError, EmgResult, IoResultExt};
use std::fs::File;
use std::path::Path;

/// Header row plus one numeric row per sample
#[derive(Debug, Clone)]
pub struct CsvStore {
    delimiter: u8,
}

impl Default for CsvStore {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl CsvStore {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    fn parse_cell(cell: &str, row: usize, column: &str) -> EmgResult<f64> {
        let trimmed = cell.trim();
        if MISSING_MARKERS.contains(&trimmed) {
            return Ok(f64::NAN);
        }
        trimmed.parse::<f64>().map_err(|_| {
            EmgError::data(
                "sample",
                format!("row {} column `{}`: `{}` is not numeric", row + 1, column, trimmed),
            )
        })
    }

    fn format_cell(value: f64) -> String {
        if value.is_finite() {
            // Shortest representation that round-trips exactly
            format!("{}", value)
        } else {
            "NaN".to_string()
        }
    }
}

impl TableStore for CsvStore {
    fn read(&self, path: &Path) -> EmgResult<SignalTable> {
        let file = File::open(path).at_path(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(file);

        let names: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if names.is_empty() || names.iter().all(String::is_empty) {
            return Err(EmgError::data("table", format!("{} has no header row", path.display())));
        }

        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            for ((cell, column), name) in record.iter().zip(columns.iter_mut()).zip(&names) {
                column.push(Self::parse_cell(cell, row, name)?);
            }
        }

        SignalTable::from_columns(names.into_iter().zip(columns))
    }

    fn write(&self, table: &SignalTable, path: &Path) -> EmgResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).at_path(parent)?;
        }

        let file = File::create(path).at_path(path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(file);

        writer.write_record(table.column_names())?;
        let columns: Vec<&[f64]> = table.columns().map(|(_, samples)| samples).collect();
        for row in 0..table.len() {
            writer.write_record(columns.iter().map(|c| Self::format_cell(c[row])))?;
        }
        writer.flush().at_path(path)?;
        Ok(())
    }
}
