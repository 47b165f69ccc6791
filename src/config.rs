//! Desk tuning configuration
//!
//! Runtime tuning values for sensing, motion and input handling. Pin
//! assignment is not part of this: it is fixed at compile time by the
//! firmware's board resources.
//!
//! The configuration is built once at startup, validated, and then owned by
//! the [`DeskController`](crate::DeskController) for the rest of its life.

use embassy_time::Duration;

use crate::driver::range_sensor::MAX_READS;
use crate::error::{Error, Result};

/// Default maximum measurable range (cm)
pub const DEFAULT_MAX_RANGE_CM: u32 = 150;

/// Default allowed deviation from a target height (cm)
pub const DEFAULT_ACCURACY_CM: f32 = 0.5;

/// Desk tuning values
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeskConfig {
    /// Farthest distance the sensor is expected to report, sets the echo timeout
    pub max_range_cm: u32,
    /// Raw ranging cycles per filtered sample (median of these)
    pub reads_per_sample: usize,
    /// Sleep between iterations of a move-to-target loop
    pub loop_interval: Duration,
    /// Overshoot tolerated before a correction leg is run (cm)
    pub accuracy_cm: f32,
    /// Pause before a correction leg
    pub correction_pause: Duration,
    /// Maximum correction legs after the initial leg
    pub max_corrections: u8,
    /// How long `interrupt` waits for a running move to acknowledge
    pub settle_timeout: Duration,
    /// Attempts to obtain a non-sentinel reading before giving up
    pub position_attempts: u8,
    /// Joystick polling period
    pub poll_tick: Duration,
    /// Consecutive identical polls before a level change counts
    pub debounce_polls: u8,
    /// Consecutive unchanged readings that mark the bottom during priming
    pub prime_stable_reads: u8,
    /// Upper bound on a priming seek
    pub prime_timeout: Duration,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            max_range_cm: DEFAULT_MAX_RANGE_CM,
            reads_per_sample: 3,
            loop_interval: Duration::from_millis(50),
            accuracy_cm: DEFAULT_ACCURACY_CM,
            correction_pause: Duration::from_millis(500),
            max_corrections: 3,
            settle_timeout: Duration::from_millis(500),
            position_attempts: 20,
            poll_tick: Duration::from_millis(10),
            debounce_polls: 3,
            prime_stable_reads: 5,
            prime_timeout: Duration::from_secs(30),
        }
    }
}

impl DeskConfig {
    /// Checks the configuration for values the controller cannot work with
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_range_cm == 0 {
            return Err(Error::InvalidConfig("max_range_cm must be positive"));
        }
        if self.reads_per_sample == 0 || self.reads_per_sample > MAX_READS {
            return Err(Error::InvalidConfig("reads_per_sample must be in 1..=15"));
        }
        if !(self.accuracy_cm > 0.0) {
            return Err(Error::InvalidConfig("accuracy_cm must be positive"));
        }
        if self.position_attempts == 0 {
            return Err(Error::InvalidConfig("position_attempts must be positive"));
        }
        if self.debounce_polls == 0 {
            return Err(Error::InvalidConfig("debounce_polls must be positive"));
        }
        if self.prime_stable_reads == 0 {
            return Err(Error::InvalidConfig("prime_stable_reads must be positive"));
        }
        if self.poll_tick == Duration::from_ticks(0) {
            return Err(Error::InvalidConfig("poll_tick must be positive"));
        }
        Ok(())
    }

    /// Whether `target_cm` is a height the desk can be asked to reach
    pub fn accepts_target(&self, target_cm: f32) -> bool {
        target_cm.is_finite() && target_cm > 0.0 && target_cm <= self.max_range_cm as f32
    }
}
