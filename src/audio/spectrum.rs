//! Frequency decomposition: windowed FFT, temporal smoothing, byte scaling.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::params::AnalyserConfig;

/// Per-analyser FFT state. Owned exclusively by one [`Analyser`](super::Analyser).
pub struct SpectrumNode {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl SpectrumNode {
    pub fn new(config: &AnalyserConfig) -> Self {
        let size = config.fft_size;
        let mut planner = FftPlanner::new();

        Self {
            fft: planner.plan_fft_forward(size),
            window: (0..size).map(|i| blackman_window(i, size)).collect(),
            scratch: vec![Complex::new(0.0, 0.0); size],
            smoothed: vec![0.0; size / 2],
            smoothing: config.smoothing_time_constant,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
        }
    }

    /// Analyse one window of time-domain samples into byte magnitudes.
    ///
    /// `samples` must hold `fft_size` samples and `out` `fft_size / 2` bins.
    pub fn process(&mut self, samples: &[f32], out: &mut [u8]) {
        debug_assert_eq!(samples.len(), self.window.len());
        debug_assert_eq!(out.len(), self.smoothed.len());

        for ((slot, sample), w) in self.scratch.iter_mut().zip(samples).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.window.len() as f32;
        let tau = self.smoothing;
        for ((smoothed, bin), byte) in self
            .smoothed
            .iter_mut()
            .zip(&self.scratch)
            .zip(out.iter_mut())
        {
            let magnitude = bin.norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
            // NaN from a corrupt producer must not stick forever
            if !smoothed.is_finite() {
                *smoothed = 0.0;
            }
            *byte = decibels_to_byte(
                linear_to_decibels(*smoothed),
                self.min_decibels,
                self.max_decibels,
            );
        }
    }
}

/// Blackman window (alpha = 0.16)
pub fn blackman_window(index: usize, size: usize) -> f32 {
    let x = index as f32 / size as f32;
    0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
}

pub fn linear_to_decibels(value: f32) -> f32 {
    if value <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * value.log10()
    }
}

/// Map decibels onto [0, 255] between the configured floor and ceiling
pub fn decibels_to_byte(db: f32, min_decibels: f32, max_decibels: f32) -> u8 {
    let scaled = 255.0 * (db - min_decibels) / (max_decibels - min_decibels);
    if scaled.is_nan() || scaled <= 0.0 {
        0
    } else if scaled >= 255.0 {
        255
    } else {
        scaled.floor() as u8
    }
}
