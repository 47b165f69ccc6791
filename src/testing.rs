//! Test doubles for pins and the range sensor
//!
//! Output pins record every write into a shared bank so tests can check what
//! the actuator did, including whether two lines of the same bank were ever
//! high together. Input pins are driven from the test through a handle.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embassy_time::{Duration, Timer};
use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};
use embedded_hal_async::digital::Wait;

use crate::config::DeskConfig;
use crate::control::DeskController;
use crate::driver::actuator::Actuator;
use crate::driver::range_sensor::{DistanceSample, Ranging};

#[derive(Debug, Default)]
struct Bank {
    levels: Vec<bool>,
    rising: Vec<usize>,
    both_high_seen: bool,
}

/// Observer for a mock output pin
#[derive(Clone)]
pub struct PinProbe {
    bank: Rc<RefCell<Bank>>,
    index: usize,
}

impl PinProbe {
    fn attach(bank: Rc<RefCell<Bank>>, initial: bool) -> (MockOutput, PinProbe) {
        let index = {
            let mut b = bank.borrow_mut();
            b.levels.push(initial);
            b.rising.push(0);
            b.levels.len() - 1
        };
        let probe = PinProbe { bank, index };
        (MockOutput { probe: probe.clone() }, probe)
    }

    /// Output pin starting low, in its own bank
    pub fn output() -> (MockOutput, PinProbe) {
        Self::attach(Rc::default(), false)
    }

    /// Output pin starting high, in its own bank
    pub fn output_high() -> (MockOutput, PinProbe) {
        Self::attach(Rc::default(), true)
    }

    /// Output pin starting low, in the same bank as `other`
    pub fn output_sharing(other: &PinProbe) -> (MockOutput, PinProbe) {
        Self::attach(other.bank.clone(), false)
    }

    pub fn is_high(&self) -> bool {
        self.bank.borrow().levels[self.index]
    }

    /// Number of low to high transitions
    pub fn rising_edges(&self) -> usize {
        self.bank.borrow().rising[self.index]
    }

    /// Whether two pins of this bank were ever high at the same time
    pub fn ever_both_high(&self) -> bool {
        self.bank.borrow().both_high_seen
    }
}

/// Recording output pin
pub struct MockOutput {
    probe: PinProbe,
}

impl MockOutput {
    fn write(&mut self, high: bool) {
        let mut bank = self.probe.bank.borrow_mut();
        let index = self.probe.index;
        if high && !bank.levels[index] {
            bank.rising[index] += 1;
        }
        bank.levels[index] = high;
        if bank.levels.iter().filter(|level| **level).count() > 1 {
            bank.both_high_seen = true;
        }
    }
}

impl ErrorType for MockOutput {
    type Error = Infallible;
}

impl OutputPin for MockOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true);
        Ok(())
    }
}

/// Error for [`FailingPin`]
#[derive(Debug)]
pub struct PinFault;

impl embedded_hal::digital::Error for PinFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Output pin whose every write fails
pub struct FailingPin;

impl ErrorType for FailingPin {
    type Error = PinFault;
}

impl OutputPin for FailingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Err(PinFault)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Err(PinFault)
    }
}

/// Output pin that accepts a number of writes and fails every one after
pub struct WearingPin {
    writes_left: usize,
}

impl WearingPin {
    pub fn new(writes_left: usize) -> Self {
        Self { writes_left }
    }

    fn write(&mut self) -> Result<(), PinFault> {
        if self.writes_left == 0 {
            return Err(PinFault);
        }
        self.writes_left -= 1;
        Ok(())
    }
}

impl ErrorType for WearingPin {
    type Error = PinFault;
}

impl OutputPin for WearingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write()
    }
}

/// Input pin whose level is set by the test
pub struct MockInput {
    high: Rc<Cell<bool>>,
}

impl MockInput {
    /// Input idling high (button released against its pull-up)
    pub fn pulled_up() -> (MockInput, Rc<Cell<bool>>) {
        let high = Rc::new(Cell::new(true));
        (MockInput { high: high.clone() }, high)
    }
}

impl ErrorType for MockInput {
    type Error = Infallible;
}

impl InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high.get())
    }
}

/// Behavior of the echo line for one ranging cycle
#[derive(Debug, Clone, Copy)]
pub enum EchoScript {
    /// Echo never rises
    Silent,
    /// Echo rises and never falls
    StuckHigh,
    /// Echo rises immediately and falls after the given width
    Pulse(Duration),
    /// Reading the echo line fails
    Fault,
}

/// Echo line following a script, one entry per cycle, the last entry repeating
pub struct MockEcho {
    script: VecDeque<EchoScript>,
    current: EchoScript,
    high: bool,
    active: Rc<Cell<usize>>,
    max_active: Rc<Cell<usize>>,
}

impl MockEcho {
    pub fn new(script: &[EchoScript]) -> Self {
        let mut script: VecDeque<EchoScript> = script.iter().copied().collect();
        let current = script.pop_front().unwrap_or(EchoScript::Silent);
        script.push_front(current);
        Self {
            script,
            current,
            high: false,
            active: Rc::default(),
            max_active: Rc::default(),
        }
    }

    /// Highest number of cycles that were in flight at once
    pub fn overlap_probe(&self) -> Rc<Cell<usize>> {
        self.max_active.clone()
    }

    fn next_cycle(&mut self) -> EchoScript {
        if self.script.len() > 1 {
            self.current = self.script.pop_front().unwrap_or(self.current);
        } else if let Some(last) = self.script.front() {
            self.current = *last;
        }
        self.current
    }
}

impl ErrorType for MockEcho {
    type Error = PinFault;
}

impl InputPin for MockEcho {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

impl Wait for MockEcho {
    async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
        match self.next_cycle() {
            EchoScript::Silent => core::future::pending().await,
            EchoScript::Fault => Err(PinFault),
            EchoScript::StuckHigh | EchoScript::Pulse(_) => {
                self.high = true;
                self.active.set(self.active.get() + 1);
                self.max_active.set(self.max_active.get().max(self.active.get()));
                Ok(())
            }
        }
    }

    async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
        match self.current {
            EchoScript::Pulse(width) if self.high => {
                Timer::after(width).await;
                self.high = false;
                self.active.set(self.active.get() - 1);
                Ok(())
            }
            EchoScript::Silent | EchoScript::Pulse(_) => Ok(()),
            EchoScript::StuckHigh => core::future::pending().await,
            EchoScript::Fault => Err(PinFault),
        }
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
        self.wait_for_high().await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
        self.wait_for_low().await
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
        if self.high {
            self.wait_for_low().await
        } else {
            self.wait_for_high().await
        }
    }
}

/// Range source replaying scripted distances, the last one repeating
pub struct ScriptedRanging {
    readings: RefCell<VecDeque<f32>>,
    last: Cell<f32>,
    calls: Cell<usize>,
    cycle: Duration,
}

impl ScriptedRanging {
    pub fn new(readings: &[f32]) -> Self {
        Self {
            readings: RefCell::new(readings.iter().copied().collect()),
            last: Cell::new(-1.0),
            calls: Cell::new(0),
            cycle: Duration::from_ticks(0),
        }
    }

    /// Makes every raw cycle take `cycle` of real time
    pub fn with_cycle(mut self, cycle: Duration) -> Self {
        self.cycle = cycle;
        self
    }

    /// Number of raw cycles taken so far
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Ranging for ScriptedRanging {
    async fn trigger_and_measure(&self) -> DistanceSample {
        self.calls.set(self.calls.get() + 1);
        if self.cycle > Duration::from_ticks(0) {
            Timer::after(self.cycle).await;
        }
        if let Some(next) = self.readings.borrow_mut().pop_front() {
            self.last.set(next);
        }
        let cm = self.last.get();
        if cm < 0.0 {
            DistanceSample::INVALID
        } else {
            DistanceSample::new(cm)
        }
    }

    fn settle_interval(&self) -> Duration {
        Duration::from_ticks(0)
    }
}

pub type TestDesk = DeskController<ScriptedRanging, MockOutput>;

/// Desk over scripted readings, with both relay lines in one bank
pub fn desk_with(config: DeskConfig, readings: &[f32]) -> (TestDesk, PinProbe, PinProbe) {
    let (up, up_probe) = PinProbe::output();
    let (down, down_probe) = PinProbe::output_sharing(&up_probe);
    let actuator = Actuator::new(up, down).unwrap();
    let desk = DeskController::new(config, ScriptedRanging::new(readings), actuator).unwrap();
    (desk, up_probe, down_probe)
}
