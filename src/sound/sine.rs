//! Sine-wave oscillator for rendering notes
//!
//! Samples are generated one frame at a time at 30% of full scale, so a note
//! is never rendered into a buffer up front.

use std::f64::consts::TAU;
use std::time::Duration;

const AMPLITUDE: f64 = 0.3;

/// A tone of fixed frequency and length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SineWave {
    /// Radians advanced per frame
    step: f64,
    phase: f64,
    remaining: u64,
}

impl SineWave {
    /// Tone for `duration` at `sample_rate`, rounded down to whole frames
    pub fn new(frequency: u64, duration: Duration, sample_rate: u32) -> Self {
        let frames = u128::from(sample_rate) * duration.as_millis() / 1000;
        let step = if sample_rate == 0 {
            0.0
        } else {
            TAU * frequency as f64 / f64::from(sample_rate)
        };

        Self {
            step,
            phase: 0.0,
            remaining: u64::try_from(frames).unwrap_or(u64::MAX),
        }
    }

    /// Frames left to play
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    /// Next mono sample in `[-0.3, 0.3]`; silence once the tone has ended
    pub fn next_sample(&mut self) -> f32 {
        if self.remaining == 0 {
            return 0.0;
        }
        self.remaining -= 1;

        let value = self.phase.sin() * AMPLITUDE;
        self.phase = (self.phase + self.step) % TAU;
        value as f32
    }
}
