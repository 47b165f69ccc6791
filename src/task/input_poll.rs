//! Joystick polling
//!
//! Samples the four joystick lines on a fixed tick and turns debounced level
//! changes into desk actions:
//! - Up/Down pressed: manual move, released: stop
//! - Left/Right pressed while idle: preference for the lower/upper position
//!
//! Buttons are active-low against pull-ups and start out released.

use embassy_time::Timer;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::config::DeskConfig;
use crate::control::DeskController;
use crate::system::direction::{ButtonId, ButtonState, Direction};

/// Debounce state of one button
#[derive(Debug, Clone, Copy)]
struct Debounce {
    stable: ButtonState,
    candidate: ButtonState,
    count: u8,
}

impl Debounce {
    const fn new() -> Self {
        Self {
            stable: ButtonState::Released,
            candidate: ButtonState::Released,
            count: 0,
        }
    }

    /// Feeds one reading, returns the new state once it has held for `polls` reads
    fn update(&mut self, reading: ButtonState, polls: u8) -> Option<ButtonState> {
        if reading == self.stable {
            self.count = 0;
            return None;
        }
        if reading == self.candidate && self.count > 0 {
            self.count += 1;
        } else {
            self.candidate = reading;
            self.count = 1;
        }
        if self.count < polls {
            return None;
        }
        self.stable = reading;
        self.count = 0;
        Some(reading)
    }
}

/// Polls the joystick lines, in [`ButtonId::SCAN_ORDER`]
pub struct InputPoller<B: InputPin> {
    buttons: [B; 4],
    debounce: [Debounce; 4],
    polls: u8,
}

impl<B: InputPin> InputPoller<B> {
    /// Takes the up, down, left and right lines
    pub fn new(up: B, down: B, left: B, right: B, config: &DeskConfig) -> Self {
        Self {
            buttons: [up, down, left, right],
            debounce: [Debounce::new(); 4],
            polls: config.debounce_polls,
        }
    }

    /// Debounced state of a button
    pub fn state(&self, id: ButtonId) -> ButtonState {
        self.debounce[id as usize].stable
    }

    /// Reads every line once and acts on debounced transitions
    ///
    /// Returns the number of transitions acted on.
    pub async fn poll_once<R, P: OutputPin>(&mut self, desk: &DeskController<R, P>) -> usize {
        let mut transitions = 0;
        for id in ButtonId::SCAN_ORDER {
            let index = id as usize;
            let is_low = match self.buttons[index].is_low() {
                Ok(is_low) => is_low,
                Err(_) => {
                    warn!("failed to read {:?} button", id);
                    continue;
                }
            };
            let Some(state) = self.debounce[index].update(ButtonState::from_level(is_low), self.polls) else {
                continue;
            };
            debug!("{:?} button {:?}", id, state);
            transitions += 1;
            on_transition(desk, id, state).await;
        }
        transitions
    }

    /// Polls forever, one pass per `poll_tick`
    pub async fn run<R, P: OutputPin>(&mut self, desk: &DeskController<R, P>) -> ! {
        let tick = desk.config().poll_tick;
        info!("joystick polling every {}ms", tick.as_millis());
        loop {
            self.poll_once(desk).await;
            Timer::after(tick).await;
        }
    }
}

async fn on_transition<R, P: OutputPin>(desk: &DeskController<R, P>, id: ButtonId, state: ButtonState) {
    match (id, state) {
        (ButtonId::Up, ButtonState::Pressed) => manual(desk, Direction::Up).await,
        (ButtonId::Down, ButtonState::Pressed) => manual(desk, Direction::Down).await,
        (ButtonId::Up | ButtonId::Down, ButtonState::Released) => desk.stop().await,
        (ButtonId::Left, ButtonState::Pressed) if !desk.is_moving() => desk.preference(Direction::Down),
        (ButtonId::Right, ButtonState::Pressed) if !desk.is_moving() => desk.preference(Direction::Up),
        _ => {}
    }
}

async fn manual<R, P: OutputPin>(desk: &DeskController<R, P>, direction: Direction) {
    if let Err(e) = desk.manual_move(direction).await {
        error!("manual move {:?} failed: {}", direction, e);
    }
}
