//! Motion Controller
//!
//! Drives the desk to a target height and is the single authority over the
//! actuator while an automated move runs.
//!
//! # Move to target
//! A move runs one or more legs. Each leg energizes the actuator, then reads
//! the filtered distance and sleeps until the target is passed or the move is
//! cancelled, and always ends with the actuator stopped. Moving down, an
//! unreadable distance counts as "not there yet" so the desk keeps descending
//! instead of stopping blind.
//!
//! If a leg overshoots by more than the accuracy threshold, a correction leg
//! runs the other way. Correction legs are bounded; when they run out the move
//! reports `Error::NotSettled`.
//!
//! # Cancellation
//! The actuator, the motion state and the cancel flag share one lock:
//! - `interrupt` sets the flag and stops the actuator in one critical section
//! - a leg checks the flag and energizes the actuator in one critical section
//!
//! so a cancelled move is never re-energized. Once a move is cancelled the
//! actuator belongs to whoever interrupted it, and the move no longer writes
//! to it. After setting the flag, `interrupt` wakes the move out of its sleep
//! and waits (bounded) until the move has ended. Any number of callers may
//! wait at once.

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_sync::signal::Signal;
use embassy_sync::waitqueue::MultiWakerRegistration;
use embassy_time::{with_timeout, Duration, Instant, Timer};
use embedded_hal::digital::OutputPin;

use crate::config::DeskConfig;
use crate::driver::actuator::Actuator;
use crate::driver::range_sensor::{DistanceSample, Ranging};
use crate::error::{Error, Result};
use crate::system::direction::Direction;
use crate::system::event::{DeskEvent, EventChannel};
use crate::system::state::MotionState;

/// Callers that can wait on the end of a move at the same time
const MAX_WAITERS: usize = 4;

/// State guarded by the drive lock
struct Drive<P: OutputPin> {
    actuator: Actuator<P>,
    motion: MotionState,
    cancelled: bool,
    session: bool,
    /// Whether the running session has energized the actuator
    moved: bool,
    /// Bumped every time a session ends
    generation: u32,
    waiters: MultiWakerRegistration<MAX_WAITERS>,
    primed: bool,
}

/// Outcome of a single leg
struct Leg {
    position: DistanceSample,
    cancelled: bool,
}

/// Whether a leg travelling in `direction` has reached `target_cm`
fn arrived(direction: Direction, current: DistanceSample, target_cm: f32) -> bool {
    match direction {
        // The sentinel is below every target, so upward travel keeps going
        Direction::Up => current.cm() >= target_cm,
        Direction::Down => current.is_valid() && current.cm() <= target_cm,
    }
}

/// How far a leg travelling in `direction` went past `target_cm`
fn overshoot(direction: Direction, position: f32, target_cm: f32) -> f32 {
    match direction {
        Direction::Up => position - target_cm,
        Direction::Down => target_cm - position,
    }
}

/// The desk: sensor, actuator and all shared motion state in one object
pub struct DeskController<R, P: OutputPin> {
    config: DeskConfig,
    sensor: R,
    drive: BlockingMutex<CriticalSectionRawMutex, RefCell<Drive<P>>>,
    events: EventChannel,
    /// Held for the whole of an automated move
    session_lock: Mutex<CriticalSectionRawMutex, ()>,
    /// Cuts a move's sleep short when it is interrupted
    wake: Signal<CriticalSectionRawMutex, ()>,
}

/// Marks an automated move as running until dropped
///
/// Dropping ends the move on every path, including early returns and a
/// cancelled future, so the actuator is always left stopped.
struct Session<'a, R, P: OutputPin> {
    desk: &'a DeskController<R, P>,
    _lock: MutexGuard<'a, CriticalSectionRawMutex, ()>,
}

impl<R, P: OutputPin> Drop for Session<'_, R, P> {
    fn drop(&mut self) {
        self.desk.end_session();
    }
}

impl<R, P: OutputPin> DeskController<R, P> {
    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// Notification slots fed by this controller
    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    pub fn motion_state(&self) -> MotionState {
        self.drive.lock(|drive| drive.borrow().motion)
    }

    /// Whether the actuator is commanded to move
    pub fn is_moving(&self) -> bool {
        self.motion_state().is_moving()
    }

    /// Whether the reference position has been sought since startup
    pub fn is_primed(&self) -> bool {
        self.drive.lock(|drive| drive.borrow().primed)
    }

    /// Cancels whatever the desk is doing and stops the actuator
    ///
    /// When this returns the actuator is stopped. If an automated move was
    /// running, this also waits up to `settle_timeout` for it to wind down.
    pub async fn interrupt(&self) {
        let running = self.drive.lock(|drive| {
            let mut drive = drive.borrow_mut();
            drive.cancelled = true;
            if drive.actuator.stop().is_err() {
                error!("actuator stop failed during interrupt");
            }
            drive.motion = MotionState::Idle;
            drive.session.then_some(drive.generation)
        });
        self.wake.signal(());

        let Some(generation) = running else {
            return;
        };
        if with_timeout(self.config.settle_timeout, self.session_ended(generation)).await.is_err() {
            warn!(
                "move did not acknowledge interrupt within {}ms",
                self.config.settle_timeout.as_millis()
            );
        }
    }

    /// Interrupts and halts the desk, publishing `stopped`
    pub async fn stop(&self) {
        self.interrupt().await;
        self.events.publish(DeskEvent::Stopped);
    }

    /// Moves in `direction` until told otherwise, interrupting any automated move
    pub async fn manual_move(&self, direction: Direction) -> Result<()> {
        self.interrupt().await;
        self.drive.lock(|drive| {
            let mut drive = drive.borrow_mut();
            drive.actuator.move_to(direction)?;
            drive.motion = MotionState::moving(direction);
            Ok::<(), Error>(())
        })?;
        info!("manual move {}", direction.as_str());
        self.events.publish(DeskEvent::Moving(direction));
        Ok(())
    }

    /// Publishes a preference for the saved position in `direction`
    pub fn preference(&self, direction: Direction) {
        info!("preference {}", direction.as_str());
        self.events.publish(DeskEvent::Preference(direction));
    }

    /// Stops the actuator and releases its lines
    pub fn close(self) -> Result<()> {
        self.drive.into_inner().into_inner().actuator.close()
    }

    /// Resolves once the session numbered `generation` has ended
    async fn session_ended(&self, generation: u32) {
        poll_fn(|cx| {
            self.drive.lock(|drive| {
                let mut drive = drive.borrow_mut();
                if drive.generation != generation {
                    return Poll::Ready(());
                }
                drive.waiters.register(cx.waker());
                Poll::Pending
            })
        })
        .await
    }

    fn end_session(&self) {
        let report = self.drive.lock(|drive| {
            let mut drive = drive.borrow_mut();
            if !drive.cancelled {
                if drive.actuator.energized().is_some() && drive.actuator.stop().is_err() {
                    error!("actuator stop failed at end of move");
                }
                drive.motion = MotionState::Idle;
            }
            drive.session = false;
            drive.generation = drive.generation.wrapping_add(1);
            drive.waiters.wake();
            // Whoever interrupted reports the new state
            drive.moved && !drive.cancelled
        });
        if report {
            self.events.publish(DeskEvent::Stopped);
        }
    }

    /// Energizes `direction` unless the move was cancelled
    fn energize(&self, direction: Direction) -> Result<bool> {
        self.drive.lock(|drive| {
            let mut drive = drive.borrow_mut();
            if drive.cancelled {
                return Ok(false);
            }
            drive.actuator.move_to(direction)?;
            drive.motion = MotionState::moving(direction);
            drive.moved = true;
            Ok(true)
        })
    }

    /// Stops the actuator unless the move was cancelled, returns whether it was
    fn halt(&self) -> bool {
        self.drive.lock(|drive| {
            let mut drive = drive.borrow_mut();
            if drive.cancelled {
                return true;
            }
            if drive.actuator.stop().is_err() {
                error!("actuator stop failed");
            }
            drive.motion = MotionState::Idle;
            false
        })
    }

    fn is_cancelled(&self) -> bool {
        self.drive.lock(|drive| drive.borrow().cancelled)
    }

    /// Sleeps for `duration` or until interrupted, returns whether cancelled
    async fn pause(&self, duration: Duration) -> bool {
        select(Timer::after(duration), self.wake.wait()).await;
        self.is_cancelled()
    }
}

impl<R, P> DeskController<R, P>
where
    R: Ranging,
    P: OutputPin,
{
    /// Builds the controller
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the configuration does not validate.
    pub fn new(config: DeskConfig, sensor: R, actuator: Actuator<P>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sensor,
            drive: BlockingMutex::new(RefCell::new(Drive {
                actuator,
                motion: MotionState::Idle,
                cancelled: false,
                session: false,
                moved: false,
                generation: 0,
                waiters: MultiWakerRegistration::new(),
                primed: false,
            })),
            events: EventChannel::new(),
            session_lock: Mutex::new(()),
            wake: Signal::new(),
        })
    }

    /// One filtered reading, possibly the sentinel
    pub async fn position(&self) -> DistanceSample {
        self.sensor.read_filtered(self.config.reads_per_sample).await
    }

    /// A valid filtered reading, retrying past sentinels
    ///
    /// # Errors
    ///
    /// Returns `Error::SensorUnavailable` after `position_attempts` sentinels.
    pub async fn settled_position(&self) -> Result<f32> {
        self.read_settled(false).await
    }

    async fn read_settled(&self, cancellable: bool) -> Result<f32> {
        for _ in 0..self.config.position_attempts {
            let sample = self.position().await;
            if cancellable && self.is_cancelled() {
                return Err(Error::Interrupted { position: sample.cm() });
            }
            if let Some(cm) = sample.get() {
                return Ok(cm);
            }
        }
        warn!("no valid reading after {} attempts", self.config.position_attempts);
        Err(Error::SensorUnavailable)
    }

    /// Moves to `target_cm` from wherever the desk is
    ///
    /// Interrupts a running move, reads the current height and moves only if
    /// it is off by more than the accuracy threshold. The reading is part of
    /// the move, so an interrupt that lands while it is taken cancels the move.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidTarget` before anything is touched if the target is out of range
    /// - `Error::SensorUnavailable` if no valid starting height can be read
    /// - `Error::Interrupted` if cancelled at any point
    /// - whatever the legs return, see [`go_up_to`](Self::go_up_to)
    pub async fn go_to(&self, target_cm: f32) -> Result<f32> {
        if !self.config.accepts_target(target_cm) {
            return Err(Error::InvalidTarget);
        }
        let _session = self.begin_session().await;

        let position = self.read_settled(true).await?;
        let delta = target_cm - position;
        info!("go to {}cm from {}cm, delta {}cm", target_cm, position, delta);

        if libm::fabsf(delta) <= self.config.accuracy_cm {
            return Ok(position);
        }
        let direction = if delta > 0.0 { Direction::Up } else { Direction::Down };
        self.drive_legs(direction, target_cm).await
    }

    /// Moves up until `target_cm` is reached, correcting overshoot
    pub async fn go_up_to(&self, target_cm: f32) -> Result<f32> {
        self.go_towards(Direction::Up, target_cm).await
    }

    /// Moves down until `target_cm` is reached, correcting overshoot
    pub async fn go_down_to(&self, target_cm: f32) -> Result<f32> {
        self.go_towards(Direction::Down, target_cm).await
    }

    async fn go_towards(&self, direction: Direction, target_cm: f32) -> Result<f32> {
        if !self.config.accepts_target(target_cm) {
            return Err(Error::InvalidTarget);
        }
        let _session = self.begin_session().await;
        self.drive_legs(direction, target_cm).await
    }

    /// Runs the initial leg and any correction legs, inside a session
    async fn drive_legs(&self, direction: Direction, target_cm: f32) -> Result<f32> {
        let mut direction = direction;
        let mut corrections = 0;
        loop {
            let leg = self.run_leg(direction, target_cm).await?;
            let position = leg.position.cm();
            if leg.cancelled {
                info!("move interrupted at {}cm", position);
                return Err(Error::Interrupted { position });
            }

            let over = overshoot(direction, position, target_cm);
            if over <= self.config.accuracy_cm {
                info!("reached {}cm (target {}cm)", position, target_cm);
                return Ok(position);
            }
            if corrections >= self.config.max_corrections {
                warn!(
                    "gave up after {} corrections at {}cm (target {}cm)",
                    corrections, position, target_cm
                );
                return Err(Error::NotSettled { position });
            }

            corrections += 1;
            debug!("overshot by {}cm, correction {}", over, corrections);
            if self.pause(self.config.correction_pause).await {
                return Err(Error::Interrupted { position });
            }
            direction = direction.opposite();
        }
    }

    /// Drives down until the readings stop changing, then marks the desk primed
    ///
    /// # Errors
    ///
    /// - `Error::Interrupted` if the seek was cancelled
    /// - `Error::NotSettled` if the readings never settled within `prime_timeout`
    pub async fn prime(&self) -> Result<f32> {
        let _session = self.begin_session().await;
        if !self.energize(Direction::Down)? {
            return Err(Error::Interrupted {
                position: self.position().await.cm(),
            });
        }
        self.events.publish(DeskEvent::Moving(Direction::Down));
        info!("seeking reference position");

        let started = Instant::now();
        let mut last = self.position().await;
        let mut stable = 0;
        while !self.is_cancelled()
            && stable < self.config.prime_stable_reads
            && started.elapsed() < self.config.prime_timeout
        {
            self.pause(self.config.loop_interval).await;
            let current = self.position().await;
            if !current.is_valid() {
                continue;
            }
            if last.is_valid() && libm::fabsf(current.cm() - last.cm()) <= self.config.accuracy_cm {
                stable += 1;
            } else {
                stable = 0;
            }
            last = current;
        }

        let position = last.cm();
        if self.halt() {
            return Err(Error::Interrupted { position });
        }
        if stable < self.config.prime_stable_reads {
            warn!("reference seek timed out at {}cm", position);
            return Err(Error::NotSettled { position });
        }

        self.drive.lock(|drive| drive.borrow_mut().primed = true);
        info!("primed at {}cm", position);
        Ok(position)
    }

    async fn begin_session(&self) -> Session<'_, R, P> {
        self.interrupt().await;
        let lock = self.session_lock.lock().await;
        self.wake.reset();
        self.drive.lock(|drive| {
            let mut drive = drive.borrow_mut();
            drive.cancelled = false;
            drive.session = true;
            drive.moved = false;
        });
        Session { desk: self, _lock: lock }
    }

    async fn run_leg(&self, direction: Direction, target_cm: f32) -> Result<Leg> {
        if !self.energize(direction)? {
            return Ok(Leg {
                position: self.position().await,
                cancelled: true,
            });
        }
        self.events.publish(DeskEvent::Moving(direction));

        let mut current = self.position().await;
        debug!("{} to {}cm: at {}cm", direction.as_str(), target_cm, current.cm());
        while !self.is_cancelled() && !arrived(direction, current, target_cm) {
            current = self.position().await;
            debug!("{} to {}cm: at {}cm", direction.as_str(), target_cm, current.cm());
            self.pause(self.config.loop_interval).await;
        }

        let cancelled = self.halt();
        Ok(Leg {
            position: current,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{desk_with, PinProbe, ScriptedRanging, TestDesk};
    use embassy_futures::{block_on, join::join};

    fn test_config() -> DeskConfig {
        DeskConfig {
            reads_per_sample: 1,
            loop_interval: Duration::from_millis(1),
            correction_pause: Duration::from_millis(1),
            settle_timeout: Duration::from_millis(500),
            position_attempts: 3,
            prime_stable_reads: 3,
            ..DeskConfig::default()
        }
    }

    fn desk(readings: &[f32]) -> (TestDesk, PinProbe, PinProbe) {
        desk_with(test_config(), readings)
    }

    #[test]
    fn test_go_up_terminates_and_stops() {
        let (desk, up, down) = desk(&[40.0, 45.0, 50.0, 55.0, 60.0]);

        assert_eq!(block_on(desk.go_up_to(60.0)), Ok(60.0));
        assert!(!up.is_high());
        assert!(!down.is_high());
        assert_eq!(up.rising_edges(), 1);
        assert_eq!(desk.motion_state(), MotionState::Idle);
        assert_eq!(desk.events().try_take(), Some(DeskEvent::Moving(Direction::Up)));
        assert_eq!(desk.events().try_take(), Some(DeskEvent::Stopped));
    }

    #[test]
    fn test_overshoot_is_corrected_downward() {
        let (desk, up, down) = desk(&[40.0, 45.0, 50.0, 55.0, 61.0, 59.8]);

        assert_eq!(block_on(desk.go_up_to(60.0)), Ok(59.8));
        // one initial read, four loop reads, one read on the correction leg
        assert_eq!(desk.sensor.calls(), 6);
        assert_eq!(up.rising_edges(), 1);
        assert_eq!(down.rising_edges(), 1);
        assert!(!up.ever_both_high());
        assert!(!desk.is_moving());
    }

    #[test]
    fn test_correction_is_bounded() {
        let (desk, up, down) = desk(&[40.0, 61.0, 59.0, 61.0, 59.0]);

        assert_eq!(
            block_on(desk.go_up_to(60.0)),
            Err(Error::NotSettled { position: 59.0 })
        );
        assert_eq!(up.rising_edges(), 2);
        assert_eq!(down.rising_edges(), 2);
        assert!(!up.is_high() && !down.is_high());
        assert!(!desk.is_moving());
    }

    #[test]
    fn test_down_keeps_going_through_sentinels() {
        let (desk, _, down) = desk(&[80.0, -1.0, -1.0, 70.0, 59.8]);

        assert_eq!(block_on(desk.go_down_to(60.0)), Ok(59.8));
        assert_eq!(desk.sensor.calls(), 5);
        assert_eq!(down.rising_edges(), 1);
        assert!(!down.is_high());
    }

    #[test]
    fn test_interrupt_ends_move() {
        let config = DeskConfig {
            loop_interval: Duration::from_millis(50),
            ..test_config()
        };
        let (desk, up, _) = desk_with(config, &[40.0]);

        let (result, waited) = block_on(join(desk.go_up_to(60.0), async {
            Timer::after(Duration::from_millis(30)).await;
            let started = Instant::now();
            desk.interrupt().await;
            assert!(!up.is_high());
            started.elapsed()
        }));

        assert_eq!(result, Err(Error::Interrupted { position: 40.0 }));
        assert!(waited < Duration::from_millis(500));
        assert!(!up.is_high());
        assert!(!desk.is_moving());
        // the interrupter reports the new state, not the move
        assert_eq!(desk.events().try_take(), Some(DeskEvent::Moving(Direction::Up)));
        assert_eq!(desk.events().try_take(), None);
    }

    #[test]
    fn test_manual_move_takes_over() {
        let (desk, up, down) = desk(&[40.0]);

        let (result, manual) = block_on(join(desk.go_up_to(60.0), async {
            Timer::after(Duration::from_millis(10)).await;
            desk.manual_move(Direction::Down).await
        }));

        assert!(matches!(result, Err(Error::Interrupted { .. })));
        assert_eq!(manual, Ok(()));
        assert!(down.is_high());
        assert!(!up.is_high());
        assert!(!up.ever_both_high());
        assert_eq!(desk.motion_state(), MotionState::MovingDown);
        assert_eq!(desk.events().try_take(), Some(DeskEvent::Moving(Direction::Down)));
        assert_eq!(desk.events().try_take(), None);
    }

    #[test]
    fn test_stop_idles_and_publishes() {
        let (desk, up, _) = desk(&[40.0]);
        block_on(desk.manual_move(Direction::Up)).unwrap();
        assert!(desk.is_moving());

        block_on(desk.stop());
        assert!(!up.is_high());
        assert!(!desk.is_moving());
        assert_eq!(desk.events().try_take(), Some(DeskEvent::Moving(Direction::Up)));
        assert_eq!(desk.events().try_take(), Some(DeskEvent::Stopped));
    }

    #[test]
    fn test_go_to_rejects_bad_target_untouched() {
        let (desk, up, down) = desk(&[40.0]);
        assert_eq!(block_on(desk.go_to(f32::NAN)), Err(Error::InvalidTarget));
        assert_eq!(block_on(desk.go_to(500.0)), Err(Error::InvalidTarget));
        assert_eq!(desk.sensor.calls(), 0);
        assert_eq!(up.rising_edges() + down.rising_edges(), 0);
    }

    #[test]
    fn test_go_to_within_tolerance_does_not_move() {
        let (desk, up, down) = desk(&[60.3]);
        assert_eq!(block_on(desk.go_to(60.0)), Ok(60.3));
        assert_eq!(up.rising_edges() + down.rising_edges(), 0);
    }

    #[test]
    fn test_go_to_picks_direction() {
        let (desk, up, down) = desk(&[-1.0, 50.0, 50.0, 55.0, 60.0]);
        assert_eq!(block_on(desk.go_to(60.0)), Ok(60.0));
        assert_eq!(up.rising_edges(), 1);
        assert_eq!(down.rising_edges(), 0);
    }

    #[test]
    fn test_settled_position_gives_up() {
        let (desk, _, _) = desk(&[-1.0]);
        assert_eq!(block_on(desk.settled_position()), Err(Error::SensorUnavailable));
        assert_eq!(desk.sensor.calls(), 3);
        assert_eq!(block_on(desk.go_to(60.0)), Err(Error::SensorUnavailable));
    }

    #[test]
    fn test_prime_seeks_bottom() {
        let (desk, _, down) = desk(&[70.0, 65.0, 62.0, 62.1, 62.0, 62.2]);
        assert!(!desk.is_primed());

        assert_eq!(block_on(desk.prime()), Ok(62.2));
        assert!(desk.is_primed());
        assert_eq!(down.rising_edges(), 1);
        assert!(!down.is_high());
    }

    #[test]
    fn test_prime_times_out() {
        let config = DeskConfig {
            prime_timeout: Duration::from_millis(10),
            ..test_config()
        };
        // never settles: alternates between two heights far apart
        let readings: std::vec::Vec<f32> = (0..200).map(|i| if i % 2 == 0 { 80.0 } else { 70.0 }).collect();
        let (desk, _, down) = desk_with(config, &readings);

        assert!(matches!(block_on(desk.prime()), Err(Error::NotSettled { .. })));
        assert!(!desk.is_primed());
        assert!(!down.is_high());
    }

    #[test]
    fn test_stop_during_starting_read_cancels_go_to() {
        let (up, up_probe) = PinProbe::output();
        let (down, down_probe) = PinProbe::output_sharing(&up_probe);
        let actuator = Actuator::new(up, down).unwrap();
        let sensor = ScriptedRanging::new(&[40.0]).with_cycle(Duration::from_millis(20));
        let desk = DeskController::new(test_config(), sensor, actuator).unwrap();

        let (result, up_after_stop) = block_on(join(desk.go_to(60.0), async {
            Timer::after(Duration::from_millis(10)).await;
            desk.stop().await;
            Timer::after(Duration::from_millis(60)).await;
            up_probe.is_high()
        }));

        assert_eq!(result, Err(Error::Interrupted { position: 40.0 }));
        assert!(!up_after_stop);
        assert_eq!(up_probe.rising_edges(), 0);
        assert_eq!(down_probe.rising_edges(), 0);
        assert!(!desk.is_moving());
        assert_eq!(desk.events().try_take(), Some(DeskEvent::Stopped));
        assert_eq!(desk.events().try_take(), None);
    }

    #[test]
    fn test_manual_press_during_starting_read_wins() {
        let (up, up_probe) = PinProbe::output();
        let (down, down_probe) = PinProbe::output_sharing(&up_probe);
        let actuator = Actuator::new(up, down).unwrap();
        let sensor = ScriptedRanging::new(&[40.0]).with_cycle(Duration::from_millis(20));
        let desk = DeskController::new(test_config(), sensor, actuator).unwrap();

        let (result, manual) = block_on(join(desk.go_to(60.0), async {
            Timer::after(Duration::from_millis(10)).await;
            desk.manual_move(Direction::Down).await
        }));

        assert!(matches!(result, Err(Error::Interrupted { .. })));
        assert_eq!(manual, Ok(()));
        assert!(down_probe.is_high());
        assert_eq!(up_probe.rising_edges(), 0);
        assert_eq!(desk.motion_state(), MotionState::MovingDown);
    }

    #[test]
    fn test_concurrent_interrupts_both_return() {
        let config = DeskConfig {
            loop_interval: Duration::from_millis(50),
            settle_timeout: Duration::from_secs(2),
            ..test_config()
        };
        let (desk, up, _) = desk_with(config, &[40.0]);

        let (result, (first, second)) = block_on(join(desk.go_up_to(60.0), async {
            Timer::after(Duration::from_millis(10)).await;
            let started = Instant::now();
            join(
                async {
                    desk.interrupt().await;
                    started.elapsed()
                },
                async {
                    desk.interrupt().await;
                    started.elapsed()
                },
            )
            .await
        }));

        assert!(matches!(result, Err(Error::Interrupted { .. })));
        assert!(first < Duration::from_millis(500), "first waited {}ms", first.as_millis());
        assert!(second < Duration::from_millis(500), "second waited {}ms", second.as_millis());
        assert!(!up.is_high());
    }

    #[test]
    fn test_prime_interrupted() {
        let readings: std::vec::Vec<f32> = (0..2000).map(|i| if i % 2 == 0 { 80.0 } else { 70.0 }).collect();
        let (desk, _, down) = desk(&readings);

        let (result, ()) = block_on(join(desk.prime(), async {
            Timer::after(Duration::from_millis(10)).await;
            desk.interrupt().await;
        }));

        assert!(matches!(result, Err(Error::Interrupted { .. })));
        assert!(!desk.is_primed());
        assert!(!down.is_high());
        assert!(!desk.is_moving());
    }

    #[test]
    fn test_close_releases_actuator() {
        let (desk, up, _) = desk(&[40.0]);
        block_on(desk.manual_move(Direction::Up)).unwrap();
        desk.close().unwrap();
        assert!(!up.is_high());
    }
}
