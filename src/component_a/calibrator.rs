//! calibrator.rs
//! Characterization sweep establishing the sensor's frequency span.
//!
//! Starts dark (1 %), waits for the lamp to settle, then walks the duty cycle
//! 1 → 99 one percent at a time, sampling the sensor after a short settle at
//! each step. Samples are stored by duty index, so `sample[1]` and `sample[99]`
//! become the calibration bounds.

use log::{debug, info, warn};

use crate::component_a::{
    clock::Clock,
    sample_buffer::SampleBuffer,
    sensor::FrequencyCounter,
    signal_model::CalibrationRange,
};
use crate::component_b::actuator::{Actuator, MAX_DUTY, MIN_DUTY};
use crate::utils::config::{ControlConfig, PWM_FREQUENCY_HZ, SETTLE_MS, STEP_SETTLE_MS};
use crate::utils::error::{ControlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibrator {
    pub pwm_freq_hz: u32,
    pub settle_ms: u64,
    pub step_settle_ms: u64,
}

impl Default for Calibrator {
    fn default() -> Self {
        Self {
            pwm_freq_hz: PWM_FREQUENCY_HZ,
            settle_ms: SETTLE_MS,
            step_settle_ms: STEP_SETTLE_MS,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Characterization {
    pub range: CalibrationRange,
    pub start_ms: u64,
    pub end_ms: u64,
    pub interval_ms: u64,
}

impl Calibrator {
    pub fn from_config(config: &ControlConfig) -> Self {
        Self {
            pwm_freq_hz: config.pwm_freq_hz,
            settle_ms: config.settle_ms,
            step_settle_ms: config.step_settle_ms,
        }
    }

    /// Run the sweep. Any rejected duty write aborts immediately; no retry.
    pub fn run_characterization(
        &self,
        actuator: &mut dyn Actuator,
        counter: &mut dyn FrequencyCounter,
        clock: &dyn Clock,
        buffer: &mut SampleBuffer,
    ) -> Result<Characterization> {
        self.apply(actuator, MIN_DUTY)?;
        clock.delay_ms(self.settle_ms);

        buffer.reset();
        let start_ms = clock.now_ms();

        for duty in MIN_DUTY..=MAX_DUTY {
            self.apply(actuator, duty)?;
            clock.delay_ms(self.step_settle_ms);
            let freq = counter.read_frequency();
            buffer.store(duty as usize, freq)?;
            debug!("[Calibrator] duty {:>2}% -> {} Hz", duty, freq);
        }

        let end_ms = clock.now_ms();
        // averaged over the sample slots including the unused slot 0
        let slots = MAX_DUTY as usize + 1;
        let interval_ms = buffer.record_interval(start_ms, end_ms, slots);

        let range = CalibrationRange::new(
            buffer.get(MIN_DUTY as usize).unwrap_or(0) as i32,
            buffer.get(MAX_DUTY as usize).unwrap_or(0) as i32,
        );

        if !range.is_monotonic() {
            warn!(
                "[Calibrator] response is not increasing (min {} Hz > max {} Hz)",
                range.min_freq, range.max_freq
            );
        } else if range.span() == 0 {
            warn!("[Calibrator] response is flat at {} Hz", range.min_freq);
        }
        info!(
            "[Calibrator] range {}..{} Hz, ~{} ms per step",
            range.min_freq, range.max_freq, interval_ms
        );

        Ok(Characterization {
            range,
            start_ms,
            end_ms,
            interval_ms,
        })
    }

    fn apply(&self, actuator: &mut dyn Actuator, duty: u8) -> Result<()> {
        actuator
            .set_duty_cycle(self.pwm_freq_hz, duty)
            .map_err(|source| ControlError::ActuatorSet { duty, source })
    }
}
