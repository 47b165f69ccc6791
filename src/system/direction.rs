//! Direction and joystick button types

use core::str::FromStr;

use crate::error::Error;

/// Travel direction of the desk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// The other direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Lowercase name as used in command paths
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            _ => Err(Error::InvalidDirection),
        }
    }
}

/// Joystick buttons, in scan order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonId {
    Up,
    Down,
    Left,
    Right,
}

impl ButtonId {
    /// All buttons in the order they are polled
    pub const SCAN_ORDER: [ButtonId; 4] = [ButtonId::Up, ButtonId::Down, ButtonId::Left, ButtonId::Right];
}

/// Debounced button state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonState {
    Pressed,
    Released,
}

impl ButtonState {
    /// Buttons are wired active-low against pull-ups
    pub fn from_level(is_low: bool) -> Self {
        if is_low {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        }
    }
}
