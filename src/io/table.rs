// src/io/table.rs
//! Column-oriented signal tables

use crate::error::{EmgError, EmgResult};

/// Named, equal-length columns of samples in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl SignalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(name, samples)` pairs
    pub fn from_columns<I, S>(columns: I) -> EmgResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, samples) in columns {
            table.insert_column(name, samples)?;
        }
        Ok(table)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_count(&self) -> usize {
        self.names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.position(name).map(|i| self.columns[i].as_slice())
    }

    /// Like [`column`](Self::column), but a missing column is a data error
    pub fn require_column(&self, name: &str) -> EmgResult<&[f64]> {
        self.column(name).ok_or_else(|| {
            EmgError::data(
                "table",
                format!("no column `{}` (have: {})", name, self.names.join(", ")),
            )
        })
    }

    /// Append a new column
    pub fn insert_column(&mut self, name: impl Into<String>, samples: Vec<f64>) -> EmgResult<()> {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(EmgError::data("table", format!("duplicate column `{}`", name)));
        }
        if !self.columns.is_empty() && samples.len() != self.len() {
            return Err(EmgError::data(
                "table",
                format!("column `{}` has {} rows, table has {}", name, samples.len(), self.len()),
            ));
        }
        self.names.push(name);
        self.columns.push(samples);
        Ok(())
    }

    /// Swap the samples of an existing column for a same-length replacement
    pub fn replace_column(&mut self, name: &str, samples: Vec<f64>) -> EmgResult<()> {
        let rows = self.len();
        let index = self
            .position(name)
            .ok_or_else(|| EmgError::data("table", format!("no column `{}`", name)))?;
        if samples.len() != rows {
            return Err(EmgError::data(
                "table",
                format!("replacement for `{}` has {} rows, table has {}", name, samples.len(), rows),
            ));
        }
        self.columns[index] = samples;
        Ok(())
    }

    /// Drop `front` rows from the start and `back` rows from the end
    pub fn trim_rows(&mut self, front: usize, back: usize) {
        let rows = self.len();
        let end = rows.saturating_sub(back).max(front.min(rows));
        let start = front.min(end);
        for column in &mut self.columns {
            column.truncate(end);
            column.drain(..start);
        }
    }

    /// True when the column exists and holds at least one missing sample
    pub fn has_missing(&self, name: &str) -> bool {
        self.column(name)
            .map_or(false, |c| c.iter().any(|x| !x.is_finite()))
    }
}
