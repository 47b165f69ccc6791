//! Desk Events
//!
//! One-slot notification channels that mirror the desk state to whoever
//! listens (the notifier task). Each slot is an embassy-sync `Signal`: sending
//! never blocks and a value nobody has read yet is simply overwritten. These
//! are advisory notifications, not commands, so losing a stale one is fine.

use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::system::direction::Direction;

/// Notification published by the controller or the input poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeskEvent {
    /// The desk started moving in a direction
    Moving(Direction),
    /// The desk stopped
    Stopped,
    /// The user asked for the saved position in a direction
    Preference(Direction),
}

impl DeskEvent {
    /// Web application path this event is reported on
    pub fn path(&self) -> &'static str {
        match self {
            DeskEvent::Moving(Direction::Up) => "/desk/moving/up",
            DeskEvent::Moving(Direction::Down) => "/desk/moving/down",
            DeskEvent::Stopped => "/desk/stopped",
            DeskEvent::Preference(Direction::Up) => "/desk/preferences/up",
            DeskEvent::Preference(Direction::Down) => "/desk/preferences/down",
        }
    }
}

/// The `moving`, `stopped` and `preference` slots
pub struct EventChannel {
    moving: Signal<CriticalSectionRawMutex, Direction>,
    stopped: Signal<CriticalSectionRawMutex, ()>,
    preference: Signal<CriticalSectionRawMutex, Direction>,
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventChannel {
    pub const fn new() -> Self {
        Self {
            moving: Signal::new(),
            stopped: Signal::new(),
            preference: Signal::new(),
        }
    }

    /// Publishes an event, replacing an unread one in the same slot
    pub fn publish(&self, event: DeskEvent) {
        trace!("publish {:?}", event);
        match event {
            DeskEvent::Moving(direction) => self.moving.signal(direction),
            DeskEvent::Stopped => self.stopped.signal(()),
            DeskEvent::Preference(direction) => self.preference.signal(direction),
        }
    }

    /// Waits for the next event from any slot
    pub async fn wait(&self) -> DeskEvent {
        match select3(self.moving.wait(), self.stopped.wait(), self.preference.wait()).await {
            Either3::First(direction) => DeskEvent::Moving(direction),
            Either3::Second(()) => DeskEvent::Stopped,
            Either3::Third(direction) => DeskEvent::Preference(direction),
        }
    }

    /// Takes a pending event without waiting, checking slots in
    /// moving, stopped, preference order
    pub fn try_take(&self) -> Option<DeskEvent> {
        if let Some(direction) = self.moving.try_take() {
            return Some(DeskEvent::Moving(direction));
        }
        if self.stopped.try_take().is_some() {
            return Some(DeskEvent::Stopped);
        }
        self.preference.try_take().map(DeskEvent::Preference)
    }
}
