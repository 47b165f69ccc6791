//! Motion State
//!
//! What the desk is currently doing. Only the controller writes it; the input
//! poller and the command service read it through
//! [`DeskController::is_moving`](crate::DeskController::is_moving).

use crate::system::direction::Direction;

/// Desk motion state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionState {
    /// Actuator is stopped
    #[default]
    Idle,
    /// Up relay energized
    MovingUp,
    /// Down relay energized
    MovingDown,
}

impl MotionState {
    /// State for travel in `direction`
    pub fn moving(direction: Direction) -> Self {
        match direction {
            Direction::Up => MotionState::MovingUp,
            Direction::Down => MotionState::MovingDown,
        }
    }

    pub fn is_moving(self) -> bool {
        self != MotionState::Idle
    }
}
