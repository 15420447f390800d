//! Mock actuator/counter pair for testing.
//!
//! The counter reports whatever frequency `response(duty)` gives for the last
//! duty cycle the actuator accepted, so control laws and the calibration sweep
//! can be checked against an exact synthetic plant.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::component_a::{sensor::FrequencyCounter, sensor::interval_for_frequency, signal_model::RawInterval};
use crate::component_b::actuator::Actuator;
use crate::utils::error::ActuatorError;

type Response = Box<dyn Fn(u8) -> u32 + Send>;

#[derive(Debug, Default)]
struct RigState {
    duty: u8,
    history: Vec<u8>,
    reads: usize,
    fail_at_write: Option<usize>,
    self_test_ok: bool,
}

/// Handle for inspecting and steering the mock pair from a test.
#[derive(Clone)]
pub struct MockRig {
    state: Arc<Mutex<RigState>>,
}

impl MockRig {
    /// Build an actuator/counter pair sharing one synthetic plant.
    pub fn new<F>(response: F) -> (Self, MockActuator, MockCounter)
    where
        F: Fn(u8) -> u32 + Send + 'static,
    {
        let state = Arc::new(Mutex::new(RigState {
            self_test_ok: true,
            ..RigState::default()
        }));
        let rig = Self { state: state.clone() };
        let actuator = MockActuator { state: state.clone() };
        let counter = MockCounter {
            state,
            response: Box::new(response),
        };
        (rig, actuator, counter)
    }

    /// Every duty cycle written so far, in order.
    pub fn history(&self) -> Vec<u8> {
        self.state.lock().history.clone()
    }

    pub fn duty(&self) -> u8 {
        self.state.lock().duty
    }

    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    /// Make the n-th write (0-based, counted from now) fail with `NotReady`.
    pub fn fail_after(&self, writes: usize) {
        let mut s = self.state.lock();
        s.fail_at_write = Some(s.history.len() + writes);
    }

    pub fn set_self_test(&self, ok: bool) {
        self.state.lock().self_test_ok = ok;
    }
}

pub struct MockActuator {
    state: Arc<Mutex<RigState>>,
}

impl Actuator for MockActuator {
    fn set_duty_cycle(&mut self, _freq_hz: u32, percent: u8) -> Result<(), ActuatorError> {
        let mut s = self.state.lock();
        if s.fail_at_write == Some(s.history.len()) {
            return Err(ActuatorError::NotReady);
        }
        s.duty = percent;
        s.history.push(percent);
        Ok(())
    }
}

pub struct MockCounter {
    state: Arc<Mutex<RigState>>,
    response: Response,
}

impl FrequencyCounter for MockCounter {
    fn read_interval(&mut self) -> RawInterval {
        let duty = {
            let mut s = self.state.lock();
            s.reads += 1;
            s.duty
        };
        interval_for_frequency((self.response)(duty) as f64)
    }

    fn self_test(&mut self) -> bool {
        self.state.lock().self_test_ok
    }
}
