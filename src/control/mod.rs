//! Closed-loop motion control
pub mod motion;

pub use motion::DeskController;
