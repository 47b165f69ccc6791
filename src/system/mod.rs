//! Core system types shared by drivers, control and tasks
pub mod direction;
pub mod event;
pub mod state;
