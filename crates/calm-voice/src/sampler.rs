//! Loudness sampling: one RMS value per tick from the analyser's latest frame.

use crate::stream::LevelAnalyser;
use std::time::Duration;

/// Root-mean-square of samples normalized to -1.0..1.0. Empty input is silence.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples
        .iter()
        .map(|&s| {
            let s = s.clamp(-1.0, 1.0);
            s * s
        })
        .sum();
    (sum / samples.len() as f32).sqrt()
}

/// Reads the live stream on a fixed cadence and yields a scalar loudness estimate.
///
/// Keeps only a scratch frame; no history is retained between ticks.
#[derive(Debug)]
pub struct VolumeSampler {
    frame: Vec<f32>,
    cadence: Duration,
    active: bool,
}

impl VolumeSampler {
    pub fn new(frame_size: usize, cadence: Duration) -> Self {
        Self {
            frame: vec![0.0; frame_size],
            cadence,
            active: false,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&mut self) {
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Sample the analyser once. A frame with no samples reads as silence.
    pub fn sample(&mut self, analyser: &mut dyn LevelAnalyser) -> f32 {
        let n = analyser.read_frame(&mut self.frame);
        rms(&self.frame[..n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f32);

    impl LevelAnalyser for Constant {
        fn read_frame(&mut self, frame: &mut [f32]) -> usize {
            frame.fill(self.0);
            frame.len()
        }
    }

    struct Empty;

    impl LevelAnalyser for Empty {
        fn read_frame(&mut self, _frame: &mut [f32]) -> usize {
            0
        }
    }

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        assert!((rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        assert!((rms(&[-0.25; 64]) - 0.25).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn rms_clamps_out_of_range_samples() {
        assert!((rms(&[3.0, -3.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sampler_reads_one_value_per_call() {
        let mut sampler = VolumeSampler::new(256, Duration::from_millis(100));
        assert!(!sampler.is_active());
        sampler.start();
        assert!(sampler.is_active());
        assert!((sampler.sample(&mut Constant(0.3)) - 0.3).abs() < 1e-6);
        assert_eq!(sampler.sample(&mut Empty), 0.0);
        sampler.stop();
        assert!(!sampler.is_active());
    }
}
