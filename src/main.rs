//! Desk controller firmware entry point
//!
//! Brings up the sensor and relays, builds the controller and spawns the
//! joystick, command and notifier tasks.

#![no_std]
#![no_main]

use board::{AssignedResources, JoystickResources, RangeSensorResources, RelayResources};
use defmt::{info, unwrap};
use desk_lift::driver::{Actuator, RangeSensor};
use desk_lift::task::command::CommandService;
use desk_lift::task::input_poll::InputPoller;
use desk_lift::task::notify::{self, LogSink};
use desk_lift::{DeskConfig, DeskController};
use embassy_executor::Spawner;
use embassy_rp::block::ImageDef;
use embassy_rp::config::Config;
use embassy_rp::gpio::{Input, Output};
use embassy_sync::once_lock::OnceLock;
use {defmt_rtt as _, panic_probe as _};

/// Firmware image type for bootloader
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// Pin assignment
mod board;

type Desk = DeskController<RangeSensor<Output<'static>, Input<'static>>, Output<'static>>;

static DESK: OnceLock<Desk> = OnceLock::new();

/// Request queue for a network front end
static COMMANDS: CommandService = CommandService::new();

/// Firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());
    let r = split_resources!(p);
    let config = DeskConfig::default();

    // No safe partial-hardware mode: any failure here is fatal
    let (trigger, echo) = r.range_sensor.into_pins();
    let mut sensor = unwrap!(RangeSensor::new(trigger, echo));
    sensor.set_max_range(config.max_range_cm);
    sensor.settle().await;

    let (up, down) = r.relays.into_pins();
    let actuator = unwrap!(Actuator::new(up, down));
    let desk: &'static Desk = DESK.get_or_init(|| unwrap!(DeskController::new(config, sensor, actuator)));

    let [up, down, left, right] = r.joystick.into_pins();
    let poller = InputPoller::new(up, down, left, right, &config);

    info!("desk controller up, {:?}", config);

    // Notifier first so no early event is missed
    spawner.spawn(notify_events(desk)).unwrap();
    spawner.spawn(serve_commands(desk)).unwrap();
    spawner.spawn(poll_joystick(poller, desk)).unwrap();
}

#[embassy_executor::task]
async fn poll_joystick(mut poller: InputPoller<Input<'static>>, desk: &'static Desk) {
    poller.run(desk).await
}

#[embassy_executor::task]
async fn serve_commands(desk: &'static Desk) {
    COMMANDS.run(desk).await
}

#[embassy_executor::task]
async fn notify_events(desk: &'static Desk) {
    notify::run(desk.events(), &mut LogSink).await
}
