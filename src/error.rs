//! Error types
//!
//! Sensor timeouts are not errors: they come back as
//! [`DistanceSample::INVALID`](crate::driver::range_sensor::DistanceSample::INVALID)
//! and the caller's loop retries. Everything else a caller has to react to is
//! an [`Error`].

use core::fmt;

/// Result type for desk operations
pub type Result<T> = core::result::Result<T, Error>;

/// Desk-level errors
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A pin write or read was rejected by the HAL
    Pin,
    /// Target height is not a finite value inside the sensor range
    InvalidTarget,
    /// Direction string is neither `up` nor `down`
    InvalidDirection,
    /// No command matches the request
    UnknownCommand,
    /// Configuration value out of range
    InvalidConfig(&'static str),
    /// No valid reading could be obtained within the configured attempts
    SensorUnavailable,
    /// The move was cancelled before it reached the target
    Interrupted {
        /// Last reading taken before the move stopped
        position: f32,
    },
    /// Correction legs were exhausted without settling inside the accuracy threshold
    NotSettled {
        /// Last reading taken before giving up
        position: f32,
    },
}

impl Error {
    /// Whether the error was caused by the request rather than the desk
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidTarget | Error::InvalidDirection | Error::UnknownCommand
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Pin => write!(f, "pin access failed"),
            Error::InvalidTarget => write!(f, "target height out of range"),
            Error::InvalidDirection => write!(f, "direction must be 'up' or 'down'"),
            Error::UnknownCommand => write!(f, "unknown command"),
            Error::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
            Error::SensorUnavailable => write!(f, "no valid distance reading"),
            Error::Interrupted { position } => {
                write!(f, "move interrupted at {:.2}cm", position)
            }
            Error::NotSettled { position } => {
                write!(f, "could not settle within tolerance, stopped at {:.2}cm", position)
            }
        }
    }
}
