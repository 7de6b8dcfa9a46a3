//! Virtual clock for discrete-event simulation.
//!
//! Tracks simulation time independently of wall-clock time, advancing only
//! when events are processed. Time is a continuous `f64` in abstract
//! simulation units so arrival and service draws need no quantization.

use serde::{Deserialize, Serialize};

/// Virtual simulation clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    current: f64,
}

impl SimClock {
    /// Create a new clock starting at time zero.
    pub fn new() -> Self {
        Self { current: 0.0 }
    }

    pub fn starting_at(time: f64) -> Self {
        Self { current: time }
    }

    pub fn now(&self) -> f64 {
        self.current
    }

    /// Advance the clock to a specific time.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `time` is in the past.
    pub fn advance_to(&mut self, time: f64) {
        debug_assert!(
            time >= self.current,
            "Cannot move clock backwards: current={}, target={}",
            self.current,
            time,
        );
        self.current = time;
    }

    pub fn advance_by(&mut self, delta: f64) {
        debug_assert!(delta >= 0.0, "Cannot advance by negative delta: {}", delta);
        self.current += delta;
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}
