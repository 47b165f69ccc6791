#![cfg_attr(not(test), no_std)]

//! desk-lift - motorized desk controller
//!
//! Drives a two-direction linear actuator to a target height using an
//! ultrasonic time-of-flight sensor for feedback, a four-way joystick for
//! manual override and a command interface for remote control.
//!
//! The library is hardware independent: pins come in through the
//! `embedded-hal` digital traits and all timing goes through `embassy-time`,
//! so the same code runs on the RP2350 firmware and in host tests.

// Logging shim, must come first so the macros are visible to every module
#[macro_use]
mod fmt;

pub mod config;
pub mod error;

/// Shared types, events and state
pub mod system;

/// Hardware drivers (ultrasonic sensor, relay actuator)
pub mod driver;

/// Closed-loop motion control
pub mod control;

/// Long-running loops: joystick polling, command service, notifier
pub mod task;

#[cfg(test)]
mod testing;

pub use config::DeskConfig;
pub use control::DeskController;
pub use error::{Error, Result};
pub use system::direction::{ButtonId, ButtonState, Direction};
pub use system::event::{DeskEvent, EventChannel};
pub use system::state::MotionState;
