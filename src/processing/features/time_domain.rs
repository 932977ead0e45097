// src/processing/features/time_domain.rs
//! Time domain descriptors of a sample window

/// Arithmetic mean; zero for an empty window.
///
/// Accumulated relative to the first sample so a constant window returns
/// that constant unchanged.
pub fn mean(window: &[f64]) -> f64 {
    match window.first() {
        Some(&origin) => origin + shifted_mean(window, origin),
        None => 0.0,
    }
}

fn shifted_mean(window: &[f64], origin: f64) -> f64 {
    window.iter().map(|&x| x - origin).sum::<f64>() / window.len() as f64
}

/// Population standard deviation.
///
/// Two-pass over samples shifted by the first one, so a constant window
/// gives exactly zero.
pub fn std_dev(window: &[f64]) -> f64 {
    let Some(&origin) = window.first() else {
        return 0.0;
    };
    let m = shifted_mean(window, origin);
    let variance = window
        .iter()
        .map(|&x| {
            let d = (x - origin) - m;
            d * d
        })
        .sum::<f64>()
        / window.len() as f64;
    variance.sqrt()
}

/// Root mean square
pub fn rms(window: &[f64]) -> f64 {
    let Some(&first) = window.first() else {
        return 0.0;
    };
    if window.iter().all(|&x| x == first) {
        return first.abs();
    }
    (window.iter().map(|&x| x * x).sum::<f64>() / window.len() as f64).sqrt()
}

/// Sign changes between adjacent samples. Exact zeros count as positive.
pub fn zero_crossings(window: &[f64]) -> usize {
    window
        .windows(2)
        .filter(|pair| (pair[0] < 0.0) != (pair[1] < 0.0))
        .count()
}

/// Zero crossings per second of signal
pub fn zero_crossing_rate(window: &[f64], sample_rate_hz: u32) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let duration_s = window.len() as f64 / sample_rate_hz as f64;
    zero_crossings(window) as f64 / duration_s
}
