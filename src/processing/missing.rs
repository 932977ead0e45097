// src/processing/missing.rs
//! Gap detection and filling for recordings with missing samples
//!
//! Missing samples are NaN (table readers map empty cells and `NaN`/`NA`
//! markers to NaN). Interpolation never extrapolates: leading and trailing
//! missing runs are dropped and reported instead.

use crate::error::{EmgError, EmgResult};
use crate::io::SignalTable;
use crate::processing::filters::validate_sample_rate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How gaps are filled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum FillMethod {
    /// Linear interpolation between the valid neighbours of each gap
    Interpolate,
    /// Replace every missing sample, edges included, by a constant
    Constant { value: f64 },
}

/// A contiguous run of missing samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub start: usize,
    pub len: usize,
}

/// Result of filling one signal
#[derive(Debug, Clone, PartialEq)]
pub struct FilledSignal {
    pub samples: Vec<f64>,
    /// Missing samples removed from the start
    pub leading_dropped: usize,
    /// Missing samples removed from the end
    pub trailing_dropped: usize,
    /// Interior samples that were filled
    pub filled: usize,
}

pub fn is_missing(sample: f64) -> bool {
    !sample.is_finite()
}

/// Runs of missing samples, in order
pub fn find_gaps(signal: &[f64]) -> Vec<Gap> {
    let mut gaps = Vec::new();
    let mut run_start = None;

    for (i, &x) in signal.iter().enumerate() {
        match (is_missing(x), run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                gaps.push(Gap { start, len: i - start });
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        gaps.push(Gap { start, len: signal.len() - start });
    }
    gaps
}

/// Fill gaps in one signal.
///
/// Fails with a data error when every sample is missing.
pub fn fill_missing(signal: &[f64], sample_rate_hz: u32, method: FillMethod) -> EmgResult<FilledSignal> {
    validate_sample_rate(sample_rate_hz)?;

    let first_valid = signal.iter().position(|&x| !is_missing(x));
    let last_valid = signal.iter().rposition(|&x| !is_missing(x));
    let (first, last) = match (first_valid, last_valid) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(EmgError::data(
                "signal",
                format!("all {} samples are missing", signal.len()),
            ))
        }
    };

    let filled = match method {
        FillMethod::Interpolate => {
            let mut samples = signal[first..=last].to_vec();
            let count = interpolate_interior(&mut samples);
            let leading = first;
            let trailing = signal.len() - 1 - last;
            if leading + trailing > 0 {
                debug!(
                    leading,
                    trailing,
                    dropped_seconds = (leading + trailing) as f64 / sample_rate_hz as f64,
                    "dropped missing edge runs"
                );
            }
            FilledSignal {
                samples,
                leading_dropped: leading,
                trailing_dropped: trailing,
                filled: count,
            }
        }
        FillMethod::Constant { value } => {
            let mut count = 0;
            let samples = signal
                .iter()
                .map(|&x| {
                    if is_missing(x) {
                        count += 1;
                        value
                    } else {
                        x
                    }
                })
                .collect();
            FilledSignal {
                samples,
                leading_dropped: 0,
                trailing_dropped: 0,
                filled: count,
            }
        }
    };

    Ok(filled)
}

/// Linearly interpolate interior gaps of a slice whose edges are valid
fn interpolate_interior(samples: &mut [f64]) -> usize {
    let mut filled = 0;
    for gap in find_gaps(samples) {
        let left = samples[gap.start - 1];
        let right = samples[gap.start + gap.len];
        let span = (gap.len + 1) as f64;
        for offset in 0..gap.len {
            let t = (offset + 1) as f64 / span;
            samples[gap.start + offset] = left + t * (right - left);
        }
        filled += gap.len;
    }
    filled
}

/// Summary of a table-level fill
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFill {
    pub rows_dropped_front: usize,
    pub rows_dropped_back: usize,
    pub filled: usize,
}

/// Fill the named columns of a table in place.
///
/// All columns, auxiliary ones included, are trimmed to the rows every filled
/// column could cover, so the table stays rectangular.
pub fn fill_missing_table(
    table: &mut SignalTable,
    columns: &[String],
    sample_rate_hz: u32,
    method: FillMethod,
) -> EmgResult<TableFill> {
    let mut results = Vec::with_capacity(columns.len());
    for name in columns {
        let signal = table.require_column(name)?;
        let filled = fill_missing(signal, sample_rate_hz, method)
            .map_err(|e| EmgError::data(format!("column `{}`", name), e.to_string()))?;
        results.push((name, filled));
    }

    let front = results.iter().map(|(_, f)| f.leading_dropped).max().unwrap_or(0);
    let back = results.iter().map(|(_, f)| f.trailing_dropped).max().unwrap_or(0);
    if front + back >= table.len() && !results.is_empty() {
        return Err(EmgError::data(
            "table",
            "no rows are valid in every filled column",
        ));
    }

    let keep = table.len() - front - back;
    let mut summary = TableFill {
        rows_dropped_front: front,
        rows_dropped_back: back,
        filled: 0,
    };
    let aligned: Vec<(&String, Vec<f64>)> = results
        .into_iter()
        .map(|(name, filled)| {
            summary.filled += filled.filled;
            let skip = front - filled.leading_dropped;
            (name, filled.samples[skip..skip + keep].to_vec())
        })
        .collect();

    table.trim_rows(front, back);
    for (name, samples) in aligned {
        table.replace_column(name, samples)?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const NAN: f64 = f64::NAN;

    #[test]
    fn test_find_gaps() {
        let gaps = find_gaps(&[NAN, 1.0, NAN, NAN, 2.0, NAN]);
        assert_eq!(
            gaps,
            vec![
                Gap { start: 0, len: 1 },
                Gap { start: 2, len: 2 },
                Gap { start: 5, len: 1 },
            ]
        );
        assert!(find_gaps(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_interpolate_interior_gap() {
        let result = fill_missing(&[0.0, NAN, NAN, 3.0], 1000, FillMethod::Interpolate).unwrap();
        assert_eq!(result.samples, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(result.filled, 2);
        assert_eq!(result.leading_dropped, 0);
    }

    #[test]
    fn test_interpolate_drops_edge_runs() {
        let result = fill_missing(&[NAN, NAN, 1.0, NAN, 3.0, NAN], 1000, FillMethod::Interpolate).unwrap();
        assert_eq!(result.samples, vec![1.0, 2.0, 3.0]);
        assert_eq!(result.leading_dropped, 2);
        assert_eq!(result.trailing_dropped, 1);
        assert_eq!(result.filled, 1);
    }

    #[test]
    fn test_constant_fills_edges() {
        let result = fill_missing(&[NAN, 1.0, NAN], 1000, FillMethod::Constant { value: 0.0 }).unwrap();
        assert_eq!(result.samples, vec![0.0, 1.0, 0.0]);
        assert_eq!(result.filled, 2);
    }

    #[test]
    fn test_entirely_missing_is_data_error() {
        let err = fill_missing(&[NAN, NAN], 1000, FillMethod::Interpolate).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
        assert!(fill_missing(&[], 1000, FillMethod::Interpolate).is_err());
    }

    #[test]
    fn test_table_fill_keeps_columns_aligned() {
        let mut table = SignalTable::new();
        table.insert_column("Time", vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        table.insert_column("a", vec![NAN, 1.0, NAN, 3.0, 4.0]).unwrap();
        table.insert_column("b", vec![0.0, 1.0, 2.0, 3.0, NAN]).unwrap();

        let summary = fill_missing_table(
            &mut table,
            &["a".to_string(), "b".to_string()],
            1000,
            FillMethod::Interpolate,
        )
        .unwrap();

        assert_eq!(summary.rows_dropped_front, 1);
        assert_eq!(summary.rows_dropped_back, 1);
        assert_eq!(table.len(), 3);
        assert_eq!(table.column("Time").unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(table.column("a").unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(table.column("b").unwrap(), &[1.0, 2.0, 3.0]);
    }
}
