//! actuator.rs
//! PWM actuator capability and the duty-cycle type every controller produces.
//!
//! 0 % and 100 % are not valid operating points for the lamp driver, so every
//! command is clamped to `[MIN_DUTY, MAX_DUTY]` before it leaves a controller.

use log::trace;

use crate::component_a::{clock::SharedClock, sensor::SharedPlant};
use crate::utils::error::ActuatorError;

pub const MIN_DUTY: u8 = 1;
pub const MAX_DUTY: u8 = 99;

/// Duty-cycle midpoint used to pick the opposite extreme for step tests.
pub const DUTY_MIDPOINT: u8 = MAX_DUTY / 2;

/// A duty-cycle command, always within `[1, 99]` percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DutyCycle(u8);

impl DutyCycle {
    pub const MIN: DutyCycle = DutyCycle(MIN_DUTY);
    pub const MAX: DutyCycle = DutyCycle(MAX_DUTY);

    /// Saturate any controller output into the allowed band.
    pub fn clamped(percent: i64) -> Self {
        DutyCycle(percent.clamp(MIN_DUTY as i64, MAX_DUTY as i64) as u8)
    }

    #[inline]
    pub fn percent(self) -> u8 {
        self.0
    }

    /// The extreme on the other side of the duty midpoint.
    pub fn opposite_extreme(self) -> Self {
        if self.0 > DUTY_MIDPOINT {
            DutyCycle::MIN
        } else {
            DutyCycle::MAX
        }
    }
}

impl std::fmt::Display for DutyCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// PWM output stage. Each call stops, reprograms and restarts the timer.
pub trait Actuator {
    fn set_duty_cycle(&mut self, freq_hz: u32, percent: u8) -> Result<(), ActuatorError>;

    /// Timer initialized and able to accept parameters.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Simulated PWM timer driving the lamp plant.
pub struct PwmActuator {
    plant: SharedPlant,
    clock: SharedClock,
    ready: bool,
    freq_hz: u32,
    writes: u64,
}

impl PwmActuator {
    pub fn new(plant: SharedPlant, clock: SharedClock) -> Self {
        Self {
            plant,
            clock,
            ready: true,
            freq_hz: 0,
            writes: 0,
        }
    }

    /// Take the timer offline; later writes fail with `NotReady`.
    pub fn disable(&mut self) {
        self.ready = false;
    }

    pub fn enable(&mut self) {
        self.ready = true;
    }

    pub fn frequency_hz(&self) -> u32 {
        self.freq_hz
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl Actuator for PwmActuator {
    fn set_duty_cycle(&mut self, freq_hz: u32, percent: u8) -> Result<(), ActuatorError> {
        if !self.ready {
            return Err(ActuatorError::NotReady);
        }
        if freq_hz == 0 {
            return Err(ActuatorError::InvalidFrequency(freq_hz));
        }
        if !(MIN_DUTY..=MAX_DUTY).contains(&percent) {
            return Err(ActuatorError::DutyOutOfRange(percent));
        }

        self.plant.lock().set_duty(percent, self.clock.now_ms());
        self.freq_hz = freq_hz;
        self.writes += 1;
        trace!("[PWM] {} Hz @ {}%", freq_hz, percent);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_a::{
        clock::ManualClock,
        sensor::{LampPlant, PlantConfig},
    };
    use std::sync::Arc;

    #[test]
    fn duty_is_clamped_to_operating_band() {
        assert_eq!(DutyCycle::clamped(0), DutyCycle::MIN);
        assert_eq!(DutyCycle::clamped(-500), DutyCycle::MIN);
        assert_eq!(DutyCycle::clamped(100), DutyCycle::MAX);
        assert_eq!(DutyCycle::clamped(i64::MAX), DutyCycle::MAX);
        assert_eq!(DutyCycle::clamped(42).percent(), 42);
    }

    #[test]
    fn opposite_extreme_splits_at_midpoint() {
        assert_eq!(DutyCycle::MIN.opposite_extreme(), DutyCycle::MAX);
        assert_eq!(DutyCycle::MAX.opposite_extreme(), DutyCycle::MIN);
        assert_eq!(DutyCycle::clamped(49).opposite_extreme(), DutyCycle::MAX);
        assert_eq!(DutyCycle::clamped(50).opposite_extreme(), DutyCycle::MIN);
    }

    #[test]
    fn pwm_rejects_invalid_parameters() {
        let plant = LampPlant::shared(PlantConfig::default());
        let mut pwm = PwmActuator::new(plant.clone(), Arc::new(ManualClock::new()));

        assert_eq!(pwm.set_duty_cycle(10_000, 0), Err(ActuatorError::DutyOutOfRange(0)));
        assert_eq!(pwm.set_duty_cycle(10_000, 100), Err(ActuatorError::DutyOutOfRange(100)));
        assert_eq!(pwm.set_duty_cycle(0, 50), Err(ActuatorError::InvalidFrequency(0)));

        pwm.set_duty_cycle(10_000, 50).unwrap();
        assert_eq!(plant.lock().duty(), 50);
        assert_eq!(pwm.writes(), 1);

        pwm.disable();
        assert!(!pwm.is_ready());
        assert_eq!(pwm.set_duty_cycle(10_000, 60), Err(ActuatorError::NotReady));
        assert_eq!(plant.lock().duty(), 50);
    }
}
