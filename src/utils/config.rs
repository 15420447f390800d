//! Runtime configuration: timing, PWM and reporting tunables.
//!
//! Defaults reproduce the bench setup (10 kHz PWM, 3.3 V reference, 1.5 s settle,
//! 250 samples at 1 ms). Any field can be overridden through a `CTLSYS_*`
//! environment variable; the result is validated before use.

use std::{path::PathBuf, str::FromStr};

use crate::component_a::sample_buffer::NUM_FRQ_SAMPLES;
use crate::component_b::pid::{DEFAULT_I_MAX, DEFAULT_I_MIN};
use crate::utils::error::{ControlError, Result};

pub const PWM_FREQUENCY_HZ: u32 = 10_000;
pub const PWM_VIN: f64 = 3.3;
pub const SETTLE_MS: u64 = 1_500;
pub const STEP_SETTLE_MS: u64 = 50;
pub const SAMPLE_PERIOD_MS: u64 = 1;
pub const TRACK_DELAY_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfig {
    pub pwm_freq_hz: u32,
    pub reference_voltage: f64,
    pub settle_ms: u64,
    pub step_settle_ms: u64,
    pub sample_period_ms: u64,
    pub num_samples: usize,
    pub track_delay_ms: u64,
    pub i_min: i32,
    pub i_max: i32,
    pub output_dir: PathBuf,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            pwm_freq_hz: PWM_FREQUENCY_HZ,
            reference_voltage: PWM_VIN,
            settle_ms: SETTLE_MS,
            step_settle_ms: STEP_SETTLE_MS,
            sample_period_ms: SAMPLE_PERIOD_MS,
            num_samples: NUM_FRQ_SAMPLES,
            track_delay_ms: TRACK_DELAY_MS,
            i_min: DEFAULT_I_MIN,
            i_max: DEFAULT_I_MAX,
            output_dir: PathBuf::from("data"),
        }
    }
}

impl ControlConfig {
    /// Defaults overridden by `CTLSYS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ControlConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let config = Self {
            pwm_freq_hz: parse_var(&lookup, "CTLSYS_PWM_FREQ_HZ", d.pwm_freq_hz)?,
            reference_voltage: parse_var(&lookup, "CTLSYS_VREF", d.reference_voltage)?,
            settle_ms: parse_var(&lookup, "CTLSYS_SETTLE_MS", d.settle_ms)?,
            step_settle_ms: parse_var(&lookup, "CTLSYS_STEP_SETTLE_MS", d.step_settle_ms)?,
            sample_period_ms: parse_var(&lookup, "CTLSYS_SAMPLE_PERIOD_MS", d.sample_period_ms)?,
            num_samples: parse_var(&lookup, "CTLSYS_NUM_SAMPLES", d.num_samples)?,
            track_delay_ms: parse_var(&lookup, "CTLSYS_TRACK_DELAY_MS", d.track_delay_ms)?,
            i_min: parse_var(&lookup, "CTLSYS_I_MIN", d.i_min)?,
            i_max: parse_var(&lookup, "CTLSYS_I_MAX", d.i_max)?,
            output_dir: lookup("CTLSYS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.output_dir),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pwm_freq_hz == 0 {
            return Err(ControlError::InvalidConfig("PWM frequency must be non-zero".into()));
        }
        if !self.reference_voltage.is_finite() || self.reference_voltage <= 0.0 {
            return Err(ControlError::InvalidConfig(format!(
                "reference voltage {} must be positive",
                self.reference_voltage
            )));
        }
        if self.sample_period_ms == 0 {
            return Err(ControlError::InvalidConfig("sample period must be at least 1 ms".into()));
        }
        if !(2..=NUM_FRQ_SAMPLES).contains(&self.num_samples) {
            return Err(ControlError::InvalidConfig(format!(
                "sample count {} outside 2..={}",
                self.num_samples, NUM_FRQ_SAMPLES
            )));
        }
        if self.i_min > self.i_max {
            return Err(ControlError::InvalidConfig(format!(
                "integral bounds inverted ({} > {})",
                self.i_min, self.i_max
            )));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ControlError::InvalidConfig(format!("{key}={raw:?} is not a valid value"))),
    }
}
