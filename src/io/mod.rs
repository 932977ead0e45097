// src/io/mod.rs
//! Recording trees and signal table persistence
//!
//! The processing stages only see [`SignalTable`]s and [`FileRef`]s; how a
//! table is laid out on disk is decided by the [`TableStore`] passed in.

pub mod table;
pub mod csv_store;
pub mod traversal;

pub use table::SignalTable;
pub use csv_store::CsvStore;
pub use traversal::{FileRef, FileWalker, SubjectPattern};

use crate::error::EmgResult;
use std::path::Path;

/// On-disk format for signal tables
pub trait TableStore: Send + Sync {
    /// Load the table stored at `path`
    fn read(&self, path: &Path) -> EmgResult<SignalTable>;

    /// Store `table` at `path`, creating parent directories as needed
    fn write(&self, table: &SignalTable, path: &Path) -> EmgResult<()>;
}
