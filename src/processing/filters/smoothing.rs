// src/processing/filters/smoothing.rs
//! RMS envelope smoothing

use crate::error::{EmgError, EmgResult};

/// Replace each sample by the RMS of a centered window.
///
/// Sample `i` uses `[i - w/2, i - w/2 + w - 1]`; for even `w` the extra
/// sample precedes `i`. Windows are clipped at the signal edges and the RMS is
/// taken over the samples actually covered, never over implicit zeros.
pub fn apply_rms_smooth(signal: &[f64], window_size: usize) -> EmgResult<Vec<f64>> {
    if window_size == 0 {
        return Err(EmgError::parameter("window_size", "RMS window must be at least one sample"));
    }

    let n = signal.len();
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut running = 0.0;
    for &x in signal {
        running += x * x;
        prefix.push(running);
    }

    let before = window_size / 2;
    let after = window_size - before - 1;

    let smoothed = (0..n)
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after + 1).min(n);
            let energy = (prefix[end] - prefix[start]).max(0.0);
            (energy / (end - start) as f64).sqrt()
        })
        .collect();

    Ok(smoothed)
}
