//! pid.rs
//! Integer PID control law with a windup band and a clamped integrator.
//!
//! Per tick:
//! - `error = setpoint - reading`, `p = Kp * error`
//! - the integrator only accumulates while `|error| < setpoint / 8`, then clamps to `[i_min, i_max]`
//! - `i = Ki * acc / 128` (fixed-point attenuation)
//! - `d = Kd * (error - last_error)`; zero on the first tick of a fresh state
//! - output clamped to `[1, 99]` %
//!
//! The state outlives a single run so gains and the integrator carry over
//! between runs until `reset` is called.

use log::trace;

use crate::component_a::signal_model::CalibrationRange;
use crate::component_b::{
    actuator::DutyCycle,
    bang_bang::prime_for_setpoint,
    driver::ControlLaw,
};

pub const DEFAULT_I_MIN: i32 = -1_000;
pub const DEFAULT_I_MAX: i32 = 1_000;

/// Fixed-point divisor applied to the integral term.
pub const I_TERM_SCALE: i64 = 128;

/// Integrate only inside ±setpoint/8 (12.5 %) of the setpoint.
pub const WINDUP_BAND_DIVISOR: i64 = 8;

/// Immutable gain snapshot handed to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PidGains {
    pub p: i32,
    pub i: i32,
    pub d: i32,
}

impl PidGains {
    pub fn new(p: i32, i: i32, d: i32) -> Self {
        Self { p, i, d }
    }
}

/// Individual contributions of one tick, before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidTerms {
    pub error: i64,
    pub p: i64,
    pub i: i64,
    pub d: i64,
    pub output: DutyCycle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidState {
    gains: PidGains,
    i_accumulator: i32,
    i_min: i32,
    i_max: i32,
    last_error: Option<i64>,
}

impl PidState {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            i_accumulator: 0,
            i_min: DEFAULT_I_MIN,
            i_max: DEFAULT_I_MAX,
            last_error: None,
        }
    }

    /// Integrator bounds; swapped if given inverted.
    pub fn with_integral_limits(mut self, i_min: i32, i_max: i32) -> Self {
        self.i_min = i_min.min(i_max);
        self.i_max = i_max.max(i_min);
        self.i_accumulator = self.i_accumulator.clamp(self.i_min, self.i_max);
        self
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Swap in a new gain snapshot; integrator and history are kept.
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn i_accumulator(&self) -> i32 {
        self.i_accumulator
    }

    pub fn integral_limits(&self) -> (i32, i32) {
        (self.i_min, self.i_max)
    }

    pub fn last_error(&self) -> Option<i64> {
        self.last_error
    }

    /// Clear integrator and derivative history.
    pub fn reset(&mut self) {
        self.i_accumulator = 0;
        self.last_error = None;
    }

    /// One control tick.
    pub fn update(&mut self, setpoint: i32, reading: i32) -> PidTerms {
        let g = self.gains;
        let error = setpoint as i64 - reading as i64;

        let p = (g.p as i64).saturating_mul(error);

        let band = setpoint as i64 / WINDUP_BAND_DIVISOR;
        if error.abs() < band {
            let acc = (self.i_accumulator as i64 + error).clamp(self.i_min as i64, self.i_max as i64);
            self.i_accumulator = acc as i32;
        }
        let i = g.i as i64 * self.i_accumulator as i64 / I_TERM_SCALE;

        let last = self.last_error.unwrap_or(error);
        let d = (g.d as i64).saturating_mul(error - last);
        self.last_error = Some(error);

        let output = DutyCycle::clamped(p.saturating_add(i).saturating_add(d));
        trace!(
            "[PID] err={} p={} i={} d={} acc={} -> {}",
            error, p, i, d, self.i_accumulator, output
        );

        PidTerms { error, p, i, d, output }
    }
}

/// PID law bound to a setpoint for one run. Hand the state back with `into_state`.
#[derive(Debug, Clone)]
pub struct PidController {
    setpoint: i32,
    midpoint: i32,
    state: PidState,
}

impl PidController {
    pub fn new(setpoint: i32, range: CalibrationRange, state: PidState) -> Self {
        Self {
            setpoint,
            midpoint: range.midpoint(),
            state,
        }
    }

    pub fn setpoint(&self) -> i32 {
        self.setpoint
    }

    pub fn state(&self) -> &PidState {
        &self.state
    }

    pub fn into_state(self) -> PidState {
        self.state
    }

    pub fn step(&mut self, reading: i32) -> PidTerms {
        self.state.update(self.setpoint, reading)
    }
}

impl ControlLaw for PidController {
    fn label(&self) -> &'static str {
        "PID"
    }

    fn prime_duty(&self) -> DutyCycle {
        prime_for_setpoint(self.setpoint, self.midpoint)
    }

    fn update(&mut self, reading: u32) -> Option<DutyCycle> {
        Some(self.step(reading as i32).output)
    }
}
