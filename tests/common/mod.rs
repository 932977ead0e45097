// tests/common/mod.rs
//! Synthetic recording trees shared by the integration tests

#![allow(dead_code)]

use emg_batch::io::{CsvStore, SignalTable, TableStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::path::Path;

pub const RATE: u32 = 1000;

/// Route library tracing to the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn sine(freq_hz: f64, amplitude: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| amplitude * (2.0 * PI * freq_hz * i as f64 / RATE as f64).sin())
        .collect()
}

/// Uniform noise in `[-amplitude, amplitude]`, reproducible per seed
pub fn noise(seed: u64, amplitude: f64, n: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-amplitude..=amplitude)).collect()
}

pub fn mix(parts: &[Vec<f64>]) -> Vec<f64> {
    let n = parts.iter().map(Vec::len).min().unwrap_or(0);
    (0..n).map(|i| parts.iter().map(|p| p[i]).sum()).collect()
}

/// Write a table with a `Time` column followed by the given signal columns
pub fn write_recording(root: &Path, relative: &str, columns: Vec<(&str, Vec<f64>)>) {
    let n = columns.first().map_or(0, |(_, c)| c.len());
    let time: Vec<f64> = (0..n).map(|i| i as f64 / RATE as f64).collect();
    let mut table = SignalTable::new();
    table.insert_column("Time", time).unwrap();
    for (name, samples) in columns {
        table.insert_column(name, samples).unwrap();
    }
    CsvStore::default().write(&table, &root.join(relative)).unwrap();
}

pub fn read_column(path: &Path, column: &str) -> Vec<f64> {
    CsvStore::default()
        .read(path)
        .unwrap()
        .column(column)
        .unwrap()
        .to_vec()
}
