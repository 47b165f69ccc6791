//! Relay actuator
//!
//! The desk motor is switched by two relay lines, one per direction.
//!
//! | Up | Down | Desk                        |
//! |----|------|-----------------------------|
//! | 0  | 0    | Stopped                     |
//! | 1  | 0    | Moving up                   |
//! | 0  | 1    | Moving down                 |
//! | 1  | 1    | Never driven (shorts motor) |
//!
//! Every move drops both lines before raising one, so even a direct reversal
//! never passes through the forbidden state. Dropping the actuator also drops
//! both lines, which keeps the relays released on every exit path.

use embedded_hal::digital::OutputPin;

use crate::error::{Error, Result};
use crate::system::direction::Direction;

/// Two-line relay actuator
pub struct Actuator<P: OutputPin> {
    up: P,
    down: P,
    energized: Option<Direction>,
}

impl<P: OutputPin> Actuator<P> {
    /// Takes ownership of both relay lines and drives them low
    ///
    /// # Errors
    ///
    /// Returns `Error::Pin` if either line cannot be driven. There is no safe
    /// way to run the desk with a half-working actuator, so callers treat this
    /// as fatal.
    pub fn new(up: P, down: P) -> Result<Self> {
        let mut actuator = Self {
            up,
            down,
            energized: None,
        };
        actuator.stop()?;
        Ok(actuator)
    }

    /// Energizes the line for `direction`, stopping first
    pub fn move_to(&mut self, direction: Direction) -> Result<()> {
        self.stop()?;
        let line = match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        };
        line.set_high().map_err(|_| Error::Pin)?;
        self.energized = Some(direction);
        Ok(())
    }

    /// Drives both lines low
    ///
    /// Both writes are always attempted, even if the first fails.
    pub fn stop(&mut self) -> Result<()> {
        let up = self.up.set_low();
        let down = self.down.set_low();
        self.energized = None;
        match (up, down) {
            (Ok(()), Ok(())) => Ok(()),
            _ => {
                error!("relay line did not release");
                Err(Error::Pin)
            }
        }
    }

    /// Direction currently energized, if any
    pub fn energized(&self) -> Option<Direction> {
        self.energized
    }

    /// Stops and releases the relay lines
    pub fn close(mut self) -> Result<()> {
        self.stop()
    }
}

impl<P: OutputPin> Drop for Actuator<P> {
    fn drop(&mut self) {
        let _ = self.up.set_low();
        let _ = self.down.set_low();
    }
}
