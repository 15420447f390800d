//! step_response.rs
//! Open-loop step test: settle at one extreme, snap to the other, record the transient.

use crate::component_b::{actuator::DutyCycle, driver::ControlLaw};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResponseTester {
    start: DutyCycle,
}

impl StepResponseTester {
    pub fn new(start: DutyCycle) -> Self {
        Self { start }
    }

    /// Dark to full brightness.
    pub fn lo_to_hi() -> Self {
        Self::new(DutyCycle::MIN)
    }

    /// Full brightness to dark.
    pub fn hi_to_lo() -> Self {
        Self::new(DutyCycle::MAX)
    }

    pub fn start_duty(&self) -> DutyCycle {
        self.start
    }

    pub fn target_duty(&self) -> DutyCycle {
        self.start.opposite_extreme()
    }
}

impl ControlLaw for StepResponseTester {
    fn label(&self) -> &'static str {
        if self.target_duty() == DutyCycle::MAX {
            "Step Lo->Hi"
        } else {
            "Step Hi->Lo"
        }
    }

    fn prime_duty(&self) -> DutyCycle {
        self.start
    }

    fn step_duty(&self) -> Option<DutyCycle> {
        Some(self.target_duty())
    }

    fn update(&mut self, _reading: u32) -> Option<DutyCycle> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_goes_to_opposite_extreme() {
        let up = StepResponseTester::lo_to_hi();
        assert_eq!(up.prime_duty(), DutyCycle::MIN);
        assert_eq!(up.step_duty(), Some(DutyCycle::MAX));
        assert_eq!(up.label(), "Step Lo->Hi");

        let down = StepResponseTester::hi_to_lo();
        assert_eq!(down.prime_duty(), DutyCycle::MAX);
        assert_eq!(down.step_duty(), Some(DutyCycle::MIN));
        assert_eq!(down.label(), "Step Hi->Lo");
    }

    #[test]
    fn mid_band_start_steps_up() {
        let t = StepResponseTester::new(DutyCycle::clamped(49));
        assert_eq!(t.step_duty(), Some(DutyCycle::MAX));
        let t = StepResponseTester::new(DutyCycle::clamped(50));
        assert_eq!(t.step_duty(), Some(DutyCycle::MIN));
    }

    #[test]
    fn open_loop_never_commands() {
        let mut t = StepResponseTester::lo_to_hi();
        for reading in [0, 100, u32::MAX] {
            assert_eq!(t.update(reading), None);
        }
    }
}
