//! Ultrasonic range sensor
//!
//! HC-SR04 style time-of-flight ranging.
//!
//! # Measurement cycle
//! - Trigger held low for 2µs, then a 10µs high burst
//! - Sensor raises echo when the burst leaves and drops it when the reflection arrives
//! - Distance = half the echo pulse width times the speed of sound
//!
//! # Timeouts
//! Both edges are bounded by a window derived from the maximum range
//! (`2 × range / speed of sound`). A missed edge is not an error: the cycle
//! returns [`DistanceSample::INVALID`] and the caller retries.
//!
//! # Serialization
//! Trigger and echo are one physical resource, so the pins sit behind an async
//! mutex that is held for exactly one cycle. Overlapping cycles would corrupt
//! each other's timing.
//!
//! # Filtering
//! [`Ranging::read_filtered`] takes several raw cycles and returns their
//! median, so a single glitch rarely survives.

use core::cmp::Ordering;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{with_deadline, with_timeout, Delay, Duration, Instant, Timer};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::digital::Wait;
use heapless::Vec;

use crate::config::DEFAULT_MAX_RANGE_CM;
use crate::error::{Error, Result};

/// Speed of sound at room temperature (cm/s)
pub const SPEED_OF_SOUND_CM_PER_S: u32 = 34_320;

/// Upper bound on raw cycles per filtered read
pub const MAX_READS: usize = 15;

/// Time the sensor needs after power-up before its first reading is trustworthy
pub const SENSOR_WARMUP: Duration = Duration::from_secs(2);

/// Trigger low time before the burst (µs)
const TRIGGER_SETTLE_US: u32 = 2;

/// Trigger burst length (µs)
const TRIGGER_PULSE_US: u32 = 10;

/// Extra time granted for the echo to start
const ECHO_START_SLACK: Duration = Duration::from_micros(100);

/// One distance reading in centimeters
///
/// A negative value never escapes this type as a distance: anything that is
/// not a finite, non-negative number becomes [`DistanceSample::INVALID`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DistanceSample(f32);

impl DistanceSample {
    /// Sentinel for "no valid measurement"
    pub const INVALID: Self = Self(-1.0);

    pub fn new(cm: f32) -> Self {
        if cm.is_finite() && cm >= 0.0 {
            Self(cm)
        } else {
            Self::INVALID
        }
    }

    /// Converts an echo pulse width into a distance
    pub fn from_echo(width: Duration) -> Self {
        let seconds = width.as_micros() as f32 / 1_000_000.0;
        Self::new(SPEED_OF_SOUND_CM_PER_S as f32 / 2.0 * seconds)
    }

    /// Raw value, `-1.0` for the sentinel
    pub fn cm(self) -> f32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Distance, `None` for the sentinel
    pub fn get(self) -> Option<f32> {
        self.is_valid().then_some(self.0)
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Median of a batch of samples
///
/// The sentinel sorts below every real distance and is not removed first. With
/// an even count the two middle values are averaged unless the lower one is the
/// sentinel, in which case the sentinel is returned.
pub fn median(samples: &mut [DistanceSample]) -> DistanceSample {
    if samples.is_empty() {
        return DistanceSample::INVALID;
    }
    samples.sort_unstable_by(DistanceSample::total_cmp);

    let mid = samples.len() / 2;
    if samples.len() % 2 == 1 {
        return samples[mid];
    }
    let (lower, upper) = (samples[mid - 1], samples[mid]);
    if !lower.is_valid() {
        return lower;
    }
    DistanceSample::new((lower.0 + upper.0) / 2.0)
}

/// Anything that can produce distance readings
#[allow(async_fn_in_trait)]
pub trait Ranging {
    /// Runs one raw ranging cycle
    async fn trigger_and_measure(&self) -> DistanceSample;

    /// Pause after each cycle so the previous echo has died down
    fn settle_interval(&self) -> Duration;

    /// Median of `reads` raw cycles (clamped to `1..=MAX_READS`)
    async fn read_filtered(&self, reads: usize) -> DistanceSample {
        let reads = reads.clamp(1, MAX_READS);
        let mut samples: Vec<DistanceSample, MAX_READS> = Vec::new();

        for _ in 0..reads {
            // Cannot overflow, reads is clamped to the capacity
            let _ = samples.push(self.trigger_and_measure().await);
            Timer::after(self.settle_interval()).await;
        }

        median(&mut samples)
    }
}

/// Echo timeout for a maximum range: the round trip of `2 × range_cm`
fn timeout_for_range(range_cm: u32) -> Duration {
    Duration::from_micros(u64::from(range_cm) * 2 * 1_000_000 / u64::from(SPEED_OF_SOUND_CM_PER_S))
}

struct SensorPins<T, E> {
    trigger: T,
    echo: E,
}

/// HC-SR04 driver owning the trigger and echo lines
pub struct RangeSensor<T, E> {
    pins: Mutex<CriticalSectionRawMutex, SensorPins<T, E>>,
    timeout: Duration,
}

impl<T, E> RangeSensor<T, E>
where
    T: OutputPin,
    E: InputPin + Wait,
{
    /// Takes ownership of the sensor lines and parks the trigger low
    ///
    /// # Errors
    ///
    /// Returns `Error::Pin` if the trigger line cannot be driven.
    pub fn new(mut trigger: T, echo: E) -> Result<Self> {
        trigger.set_low().map_err(|_| Error::Pin)?;
        let timeout = timeout_for_range(DEFAULT_MAX_RANGE_CM);
        info!("range sensor ready, echo timeout {}us", timeout.as_micros());
        Ok(Self {
            pins: Mutex::new(SensorPins { trigger, echo }),
            timeout,
        })
    }

    /// Recomputes the echo timeout for a maximum range in centimeters
    ///
    /// Must be called before the sensor is shared.
    pub fn set_max_range(&mut self, range_cm: u32) {
        self.timeout = timeout_for_range(range_cm);
        debug!("echo timeout set to {}us for {}cm", self.timeout.as_micros(), range_cm);
    }

    /// Current echo timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Waits out the sensor warm-up after power-on
    pub async fn settle(&self) {
        info!("waiting for range sensor to settle");
        Timer::after(SENSOR_WARMUP).await;
    }
}

/// Low for 2µs, high for 10µs, low again
fn fire_trigger<T: OutputPin>(trigger: &mut T) -> core::result::Result<(), T::Error> {
    let mut delay = Delay;
    trigger.set_low()?;
    delay.delay_us(TRIGGER_SETTLE_US);
    trigger.set_high()?;
    delay.delay_us(TRIGGER_PULSE_US);
    trigger.set_low()
}

impl<T, E> Ranging for RangeSensor<T, E>
where
    T: OutputPin,
    E: InputPin + Wait,
{
    async fn trigger_and_measure(&self) -> DistanceSample {
        let mut pins = self.pins.lock().await;
        let SensorPins { trigger, echo } = &mut *pins;

        let rise_deadline = Instant::now() + self.timeout + ECHO_START_SLACK;
        if fire_trigger(trigger).is_err() {
            warn!("trigger line write failed");
            return DistanceSample::INVALID;
        }

        match with_deadline(rise_deadline, echo.wait_for_high()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                warn!("echo line read failed");
                return DistanceSample::INVALID;
            }
            Err(_) => {
                debug!("timeout while waiting on echo");
                return DistanceSample::INVALID;
            }
        }

        let start = Instant::now();
        match with_timeout(self.timeout, echo.wait_for_low()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                warn!("echo line read failed");
                return DistanceSample::INVALID;
            }
            Err(_) => {
                debug!("timeout while echo high, started {}us ago", start.elapsed().as_micros());
                return DistanceSample::INVALID;
            }
        }

        let sample = DistanceSample::from_echo(start.elapsed());
        trace!("raw distance {}cm", sample.cm());
        sample
    }

    fn settle_interval(&self) -> Duration {
        self.timeout * 2
    }
}
