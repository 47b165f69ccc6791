//! Hardware drivers
//!
//! Both drivers own their pins for their whole lifetime and are generic over
//! the `embedded-hal` digital traits, so the firmware hands in embassy-rp
//! `Output`/`Input` pins and the tests hand in mocks.
pub mod actuator;
pub mod range_sensor;

pub use actuator::Actuator;
pub use range_sensor::{DistanceSample, RangeSensor, Ranging};
