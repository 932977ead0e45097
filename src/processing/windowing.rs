// src/processing/windowing.rs
//! Windowing functions and fixed-size window segmentation

use crate::error::{EmgError, EmgResult};
use std::f64::consts::PI;

/// Periodic Hann window, the spectral-analysis convention
pub fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
        .collect()
}

/// One window of a signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window<'a> {
    pub index: usize,
    pub start: usize,
    pub samples: &'a [f64],
}

/// Fixed-size windows advancing by a fixed step.
///
/// A trailing remainder shorter than the window is dropped, so every window
/// yielded has exactly `window_size` samples.
#[derive(Debug, Clone)]
pub struct SlidingWindows<'a> {
    signal: &'a [f64],
    window_size: usize,
    step_size: usize,
    next_start: usize,
    next_index: usize,
}

impl<'a> SlidingWindows<'a> {
    pub fn new(signal: &'a [f64], window_size: usize, step_size: usize) -> EmgResult<Self> {
        validate_window(window_size, step_size)?;
        Ok(Self {
            signal,
            window_size,
            step_size,
            next_start: 0,
            next_index: 0,
        })
    }

    /// Number of complete windows in a signal of `len` samples
    pub fn count_for(len: usize, window_size: usize, step_size: usize) -> usize {
        if window_size == 0 || step_size == 0 || len < window_size {
            0
        } else {
            (len - window_size) / step_size + 1
        }
    }
}

impl<'a> Iterator for SlidingWindows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.next_start.checked_add(self.window_size)?;
        if end > self.signal.len() {
            return None;
        }

        let window = Window {
            index: self.next_index,
            start: self.next_start,
            samples: &self.signal[self.next_start..end],
        };
        self.next_start += self.step_size;
        self.next_index += 1;
        Some(window)
    }
}

pub fn validate_window(window_size: usize, step_size: usize) -> EmgResult<()> {
    if window_size == 0 {
        return Err(EmgError::parameter("window_size", "window must contain at least one sample"));
    }
    if step_size == 0 {
        return Err(EmgError::parameter("step_size", "step must advance by at least one sample"));
    }
    Ok(())
}
