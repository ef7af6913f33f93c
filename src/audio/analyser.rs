//! Signal analyser producing per-frame frequency snapshots.

use log::debug;

use super::signal::SignalHandle;
use super::spectrum::SpectrumNode;
use crate::error::{EngineError, Result};
use crate::params::AnalyserConfig;

/// Fixed-length byte spectrum, rewritten in place on every update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencySnapshot {
    bins: Box<[u8]>,
}

impl FrequencySnapshot {
    /// All-zero snapshot with `len` bins
    pub fn new(len: usize) -> Self {
        Self {
            bins: vec![0; len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Raw magnitude of one bin; bins past the end read as silence
    pub fn get(&self, bin: usize) -> u8 {
        self.bins.get(bin).copied().unwrap_or(0)
    }

    /// Magnitude of one bin scaled to [0, 1]
    pub fn normalized(&self, bin: usize) -> f32 {
        self.get(bin) as f32 / 255.0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bins
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bins
    }
}

/// Wraps one audio signal and snapshots its spectrum on demand
pub struct Analyser {
    /// Non-owning reference to the external stream (None = silent)
    source: Option<SignalHandle>,
    node: SpectrumNode,
    window: Vec<f32>,
    snapshot: FrequencySnapshot,
}

impl Analyser {
    /// Subscribe a new spectrum node to `signal`
    pub fn connect(signal: Option<&SignalHandle>, config: &AnalyserConfig) -> Result<Self> {
        config.validate().map_err(EngineError::AnalyserInit)?;

        let signal = signal
            .ok_or_else(|| EngineError::AnalyserInit("no audio signal supplied".to_string()))?;
        if signal.is_closed() {
            return Err(EngineError::AnalyserInit(
                "audio signal is already closed".to_string(),
            ));
        }
        if signal.sample_rate_hz() == 0 {
            return Err(EngineError::AnalyserInit(
                "audio signal reports a zero sample rate".to_string(),
            ));
        }

        debug!(
            "Analyser connected: {} Hz, {} bins",
            signal.sample_rate_hz(),
            config.bin_count()
        );

        Ok(Self::with_source(Some(signal.clone()), config))
    }

    /// Analyser with no source; its snapshot stays all zero
    pub fn silent(config: &AnalyserConfig) -> Self {
        Self::with_source(None, config)
    }

    fn with_source(source: Option<SignalHandle>, config: &AnalyserConfig) -> Self {
        Self {
            source,
            node: SpectrumNode::new(config),
            window: vec![0.0; config.fft_size],
            snapshot: FrequencySnapshot::new(config.bin_count()),
        }
    }

    /// Refresh the snapshot from the latest buffered samples
    pub fn update(&mut self) {
        match &self.source {
            Some(signal) => {
                signal.copy_latest(&mut self.window);
                self.node
                    .process(&self.window, self.snapshot.as_mut_slice());
            }
            None => self.snapshot.as_mut_slice().fill(0),
        }
    }

    /// Spectrum as of the last `update()`
    pub fn snapshot(&self) -> &FrequencySnapshot {
        &self.snapshot
    }

    pub fn data(&self) -> &[u8] {
        self.snapshot.as_slice()
    }

    pub fn is_silent(&self) -> bool {
        self.source.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spectrum::{decibels_to_byte, linear_to_decibels};
    use std::f32::consts::PI;

    fn unsmoothed() -> AnalyserConfig {
        AnalyserConfig {
            smoothing_time_constant: 0.0,
            ..Default::default()
        }
    }

    fn push_sine(signal: &SignalHandle, bin: usize, amplitude: f32, fft_size: usize) {
        let samples: Vec<f32> = (0..fft_size)
            .map(|n| amplitude * (2.0 * PI * bin as f32 * n as f32 / fft_size as f32).sin())
            .collect();
        signal.push_samples(&samples);
    }

    #[test]
    fn test_snapshot_starts_zeroed() {
        let config = AnalyserConfig::default();
        let signal = SignalHandle::new(48000, 1024);
        let analyser = Analyser::connect(Some(&signal), &config).unwrap();

        assert_eq!(analyser.data().len(), 32);
        assert!(analyser.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_known_spectrum_matches_expected_bytes() {
        let config = unsmoothed();
        let n = config.fft_size;
        let signal = SignalHandle::new(48000, 1024);
        let amplitude = 0.001;
        push_sine(&signal, 6, amplitude, n);

        // Bin-centered sine through a Blackman window: |X| / N = A / 2 * 0.42
        let expected = decibels_to_byte(
            linear_to_decibels(amplitude / 2.0 * 0.42),
            config.min_decibels,
            config.max_decibels,
        );

        let mut analyser = Analyser::connect(Some(&signal), &config).unwrap();
        for _ in 0..2 {
            analyser.update();
            let got = analyser.snapshot().get(6);
            assert!(
                (got as i32 - expected as i32).abs() <= 1,
                "bin 6: got {}, expected {}",
                got,
                expected
            );
            // Far from the main lobe there is no visible leakage
            for bin in (10..analyser.data().len()).chain(0..3) {
                assert_eq!(analyser.snapshot().get(bin), 0, "bin {} leaked", bin);
            }
        }
    }

    #[test]
    fn test_silent_signal_gives_zero_snapshot() {
        let config = AnalyserConfig::default();
        let signal = SignalHandle::new(48000, 1024);
        signal.push_samples(&vec![0.0; 512]);

        let mut analyser = Analyser::connect(Some(&signal), &config).unwrap();
        analyser.update();
        assert!(analyser.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_snapshot_is_updated_in_place() {
        let config = unsmoothed();
        let signal = SignalHandle::new(48000, 1024);
        let mut analyser = Analyser::connect(Some(&signal), &config).unwrap();
        let before = analyser.data().as_ptr();

        push_sine(&signal, 3, 0.01, config.fft_size);
        analyser.update();

        assert_eq!(analyser.data().as_ptr(), before);
        assert_eq!(analyser.data().len(), config.bin_count());
        assert!(analyser.snapshot().get(3) > 0);
    }

    #[test]
    fn test_missing_signal_fails() {
        let result = Analyser::connect(None, &AnalyserConfig::default());
        assert!(matches!(result, Err(EngineError::AnalyserInit(_))));
    }

    #[test]
    fn test_closed_or_rateless_signal_fails() {
        let config = AnalyserConfig::default();

        let closed = SignalHandle::new(48000, 64);
        closed.close();
        assert!(Analyser::connect(Some(&closed), &config).is_err());

        let rateless = SignalHandle::new(0, 64);
        assert!(Analyser::connect(Some(&rateless), &config).is_err());
    }

    #[test]
    fn test_silent_analyser_never_moves() {
        let mut analyser = Analyser::silent(&AnalyserConfig::default());
        for _ in 0..10 {
            analyser.update();
        }
        assert!(analyser.is_silent());
        assert!(analyser.data().iter().all(|&b| b == 0));
        assert_eq!(analyser.data().len(), 32);
    }
}
