//! Lamp/photosensor control system simulation.
//!
//! A PWM-driven lamp lights a photosensor whose output frequency rises with
//! brightness. The crate calibrates the sensor span, then runs bang-bang, PID,
//! step-response and tracking tests against it on a millisecond clock.

pub mod component_a;
pub mod component_b;
pub mod utils;
