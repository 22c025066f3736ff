//! Simulated attributes for testing and demos
//!
//! This module provides attributes that behave like instrument channels
//! without any hardware behind them:
//!
//! - **Pattern getters**: generate readings from a [`SimulatedPattern`]
//! - **Recording setters**: remember every value they were given
//! - **Call counters**: count set/get calls, useful for checking skip logic
//! - **Latency**: optionally sleep on every call to mimic slow instruments
//!
//! # Example
//!
//! ```
//! use labsweep::backend::{Attribute, SimulatedAttribute, SimulatedPattern};
//!
//! let counter = SimulatedAttribute::new(SimulatedPattern::Counter { start: 0.0, step: 1.0 });
//! assert_eq!(counter.get().unwrap().first(), Some(0.0));
//! assert_eq!(counter.get().unwrap().first(), Some(1.0));
//! ```

use super::attribute::Attribute;
use crate::error::{Result, SweepError};
use crate::types::AttrValue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Pattern for generating simulated readings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SimulatedPattern {
    /// Constant value
    Constant(f64),
    /// Value that grows by `step` on every read
    Counter { start: f64, step: f64 },
    /// Sine wave over wall-clock time
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Uniform pseudo-random values within a range
    Random { min: f64, max: f64 },
    /// Echo the last value written, or NaN before the first write
    #[default]
    Echo,
}

/// Simple pseudo-random number generator (no external dependency)
pub(crate) fn rand_simple() -> f64 {
    use std::cell::Cell;
    thread_local! {
        static SEED: Cell<u64> = Cell::new(12345);
    }
    SEED.with(|seed| {
        let mut s = seed.get();
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        seed.set(s);
        (s as f64) / (u64::MAX as f64)
    })
}

#[derive(Debug)]
struct SimState {
    reads: usize,
    last_set: Option<AttrValue>,
    history: Vec<AttrValue>,
}

/// Simulated instrument channel
#[derive(Debug)]
pub struct SimulatedAttribute {
    pattern: SimulatedPattern,
    /// Noise amplitude to add (0.0 = no noise)
    noise_amplitude: f64,
    /// Readings per get; 0 returns a scalar
    width: usize,
    latency: Duration,
    start_time: Instant,
    state: Mutex<SimState>,
    set_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl SimulatedAttribute {
    /// Create a simulated attribute with the given pattern
    pub fn new(pattern: SimulatedPattern) -> Self {
        Self {
            pattern,
            noise_amplitude: 0.0,
            width: 0,
            latency: Duration::ZERO,
            start_time: Instant::now(),
            state: Mutex::new(SimState {
                reads: 0,
                last_set: None,
                history: Vec::new(),
            }),
            set_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    /// Attribute that records writes and echoes the last one on read
    pub fn recorder() -> Self {
        Self::new(SimulatedPattern::Echo)
    }

    /// Add noise to the generated values
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    /// Return `width` readings per get instead of a scalar
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Sleep this long inside every set and get
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of set calls so far
    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    /// Number of get calls so far
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Every value written, oldest first
    pub fn history(&self) -> Vec<AttrValue> {
        self.state
            .lock()
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    fn generate(&self, state: &mut SimState) -> f64 {
        let base = match self.pattern {
            SimulatedPattern::Constant(v) => v,
            SimulatedPattern::Counter { start, step } => start + step * state.reads as f64,
            SimulatedPattern::Sine {
                frequency,
                amplitude,
                offset,
            } => {
                let t = self.start_time.elapsed().as_secs_f64();
                offset + amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin()
            }
            SimulatedPattern::Random { min, max } => min + rand_simple() * (max - min),
            SimulatedPattern::Echo => state
                .last_set
                .as_ref()
                .and_then(AttrValue::first)
                .unwrap_or(f64::NAN),
        };
        state.reads += 1;

        if self.noise_amplitude > 0.0 {
            base + (rand_simple() - 0.5) * 2.0 * self.noise_amplitude
        } else {
            base
        }
    }
}

impl Attribute for SimulatedAttribute {
    fn set(&self, value: &AttrValue) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| SweepError::Channel("simulated attribute lock poisoned".to_string()))?;
        state.last_set = Some(value.clone());
        state.history.push(value.clone());
        Ok(())
    }

    fn get(&self) -> Result<AttrValue> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| SweepError::Channel("simulated attribute lock poisoned".to_string()))?;

        // Echo hands back the whole last write, vector included
        if self.pattern == SimulatedPattern::Echo && self.noise_amplitude == 0.0 {
            if let Some(value) = state.last_set.clone() {
                return Ok(value);
            }
        }

        if self.width == 0 {
            Ok(AttrValue::Scalar(self.generate(&mut state)))
        } else {
            let values = (0..self.width).map(|_| self.generate(&mut state)).collect();
            Ok(AttrValue::Vector(values))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_pattern() {
        let attr = SimulatedAttribute::new(SimulatedPattern::Constant(42.0));
        assert_eq!(attr.get().unwrap(), AttrValue::Scalar(42.0));
        assert_eq!(attr.get_calls(), 1);
    }

    #[test]
    fn test_counter_pattern_with_width() {
        let attr = SimulatedAttribute::new(SimulatedPattern::Counter {
            start: 1.0,
            step: 2.0,
        })
        .with_width(3);
        assert_eq!(attr.get().unwrap(), AttrValue::Vector(vec![1.0, 3.0, 5.0]));
    }

    #[test]
    fn test_recorder_echoes_and_counts() {
        let attr = SimulatedAttribute::recorder();
        assert!(attr.get().unwrap().first().unwrap().is_nan());

        attr.set(&AttrValue::Vector(vec![1.0, 2.0])).unwrap();
        attr.set(&AttrValue::Scalar(7.0)).unwrap();

        assert_eq!(attr.set_calls(), 2);
        assert_eq!(attr.get().unwrap(), AttrValue::Scalar(7.0));
        assert_eq!(attr.history().len(), 2);
    }

    #[test]
    fn test_random_stays_in_range() {
        let attr = SimulatedAttribute::new(SimulatedPattern::Random { min: -1.0, max: 1.0 });
        for _ in 0..100 {
            let v = attr.get().unwrap().first().unwrap();
            assert!((-1.0..=1.0).contains(&v));
        }
    }
}
