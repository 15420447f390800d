//! bang_bang.rs
//! Two-level on/off control: full off above the setpoint, full on at or below it.
//!
//! No hysteresis, so the lamp oscillates around the setpoint for the whole run.

use crate::component_a::signal_model::CalibrationRange;
use crate::component_b::{actuator::DutyCycle, driver::ControlLaw};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BangBangController {
    setpoint: i32,
    midpoint: i32,
}

impl BangBangController {
    pub fn new(setpoint: i32, range: CalibrationRange) -> Self {
        Self {
            setpoint,
            midpoint: range.midpoint(),
        }
    }

    pub fn setpoint(&self) -> i32 {
        self.setpoint
    }

    #[inline]
    pub fn output(&self, reading: i32) -> DutyCycle {
        if reading > self.setpoint {
            DutyCycle::MIN
        } else {
            DutyCycle::MAX
        }
    }
}

/// Start from the extreme on the far side of the setpoint.
pub(crate) fn prime_for_setpoint(setpoint: i32, midpoint: i32) -> DutyCycle {
    if setpoint > midpoint {
        DutyCycle::MIN
    } else {
        DutyCycle::MAX
    }
}

impl ControlLaw for BangBangController {
    fn label(&self) -> &'static str {
        "Bang-Bang"
    }

    fn prime_duty(&self) -> DutyCycle {
        prime_for_setpoint(self.setpoint, self.midpoint)
    }

    fn update(&mut self, reading: u32) -> Option<DutyCycle> {
        Some(self.output(reading as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANGE: CalibrationRange = CalibrationRange { min_freq: 20, max_freq: 400 };

    #[test]
    fn constant_reading_below_setpoint_drives_full_on() {
        let mut ctl = BangBangController::new(250, RANGE);
        for _ in 0..250 {
            assert_eq!(ctl.update(100), Some(DutyCycle::MAX));
        }
    }

    #[test]
    fn constant_reading_above_setpoint_drives_full_off() {
        let mut ctl = BangBangController::new(250, RANGE);
        for _ in 0..250 {
            assert_eq!(ctl.update(300), Some(DutyCycle::MIN));
        }
    }

    #[test]
    fn reading_equal_to_setpoint_is_full_on() {
        let ctl = BangBangController::new(250, RANGE);
        assert_eq!(ctl.output(250), DutyCycle::MAX);
    }

    #[test]
    fn primes_opposite_to_setpoint() {
        assert_eq!(BangBangController::new(300, RANGE).prime_duty(), DutyCycle::MIN);
        assert_eq!(BangBangController::new(100, RANGE).prime_duty(), DutyCycle::MAX);
        assert_eq!(BangBangController::new(210, RANGE).prime_duty(), DutyCycle::MAX);
    }
}
