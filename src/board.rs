//! Board Resources
//!
//! Fixed pin assignment for the desk controller board, split once in `main`.
//!
//! # Resource Groups
//! - Range sensor: HC-SR04 trigger and echo
//! - Relays: one line per travel direction
//! - Joystick: four active-low buttons with pull-ups

use assign_resources::assign_resources;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals;

assign_resources! {
    /// HC-SR04 ultrasonic sensor pins
    range_sensor: RangeSensorResources {
        trigger_pin: PIN_15,
        echo_pin: PIN_14,
    },
    /// Actuator relay lines
    relays: RelayResources {
        up_pin: PIN_20,
        down_pin: PIN_21,
    },
    /// Four-way joystick
    joystick: JoystickResources {
        up_pin: PIN_16,
        down_pin: PIN_17,
        left_pin: PIN_10,
        right_pin: PIN_11,
    },
}

impl RangeSensorResources {
    pub fn into_pins(self) -> (Output<'static>, Input<'static>) {
        (
            Output::new(self.trigger_pin, Level::Low),
            Input::new(self.echo_pin, Pull::Down),
        )
    }
}

impl RelayResources {
    pub fn into_pins(self) -> (Output<'static>, Output<'static>) {
        (Output::new(self.up_pin, Level::Low), Output::new(self.down_pin, Level::Low))
    }
}

impl JoystickResources {
    /// Up, down, left and right
    pub fn into_pins(self) -> [Input<'static>; 4] {
        [
            Input::new(self.up_pin, Pull::Up),
            Input::new(self.down_pin, Pull::Up),
            Input::new(self.left_pin, Pull::Up),
            Input::new(self.right_pin, Pull::Up),
        ]
    }
}
