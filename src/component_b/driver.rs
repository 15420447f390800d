//! driver.rs
//! Control loop driver: owns the hardware context and executes one test per call.
//!
//! Every run follows the same shape:
//! 1. prime the actuator and wait for the lamp to settle
//! 2. optionally apply a step (open-loop tests)
//! 3. reset the sample buffer, then exactly N iterations of
//!    read → store → compute → apply → wait one sample period
//!
//! Only an actuator write can fail a run. A failed run returns the error and
//! no report.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::component_a::{
    calibrator::Calibrator,
    clock::SharedClock,
    sample_buffer::SampleBuffer,
    sensor::{FrequencyCounter, LampPlant, PhotoSensor, PlantConfig},
    signal_model::{CalibrationRange, voltage_from_frequency},
};
use crate::component_b::actuator::{Actuator, DutyCycle, MAX_DUTY, MIN_DUTY, PwmActuator};
use crate::utils::config::ControlConfig;
use crate::utils::error::{ControlError, Result};
use crate::utils::metrics::{Event, EventRecorder};

/// A control law driven by `ControlLoopDriver::run`.
pub trait ControlLaw {
    fn label(&self) -> &'static str;

    /// Duty cycle applied before the settle period.
    fn prime_duty(&self) -> DutyCycle;

    /// Duty cycle applied once after settling, before sampling starts.
    fn step_duty(&self) -> Option<DutyCycle> {
        None
    }

    /// New command for this tick's reading, or `None` to leave the output alone.
    fn update(&mut self, reading: u32) -> Option<DutyCycle>;
}

/// Everything a run touches, passed in explicitly.
pub struct ControlContext {
    pub actuator: Box<dyn Actuator + Send>,
    pub counter: Box<dyn FrequencyCounter + Send>,
    pub clock: SharedClock,
    pub config: ControlConfig,
}

impl ControlContext {
    pub fn new(
        actuator: Box<dyn Actuator + Send>,
        counter: Box<dyn FrequencyCounter + Send>,
        clock: SharedClock,
        config: ControlConfig,
    ) -> Self {
        Self { actuator, counter, clock, config }
    }

    /// PWM actuator and photosensor sharing one simulated lamp.
    pub fn simulated(config: ControlConfig, plant: PlantConfig, clock: SharedClock) -> Self {
        let plant = LampPlant::shared(plant);
        let actuator = PwmActuator::new(plant.clone(), clock.clone());
        let counter = PhotoSensor::new(plant, clock.clone());
        Self::new(Box::new(actuator), Box::new(counter), clock, config)
    }
}

/// Result of one completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run: u64,
    pub label: &'static str,
    /// Raw frequency readings, by sample index.
    pub samples: Vec<u32>,
    /// Duty cycle in effect after each sample.
    pub duties: Vec<u8>,
    pub start_ms: u64,
    pub end_ms: u64,
    pub sample_interval_ms: u64,
    pub late_ticks: u64,
    /// First index shown in the plot report.
    pub first_index: usize,
}

/// One tracking-test observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackReading {
    pub duty: u8,
    pub duty_volts: f64,
    pub freq: u32,
    pub sensor_volts: f64,
    pub interval_ms: u64,
}

pub struct ControlLoopDriver {
    ctx: ControlContext,
    buffer: SampleBuffer,
    calibration: Option<CalibrationRange>,
    recorder: Arc<EventRecorder>,
    runs: u64,
    last_track_duty: Option<u8>,
}

impl ControlLoopDriver {
    /// Rejects a config whose run would not fit the sample buffer.
    pub fn new(ctx: ControlContext, recorder: Arc<EventRecorder>) -> Result<Self> {
        ctx.config.validate()?;
        Ok(Self {
            ctx,
            buffer: SampleBuffer::new(),
            calibration: None,
            recorder,
            runs: 0,
            last_track_duty: None,
        })
    }

    pub fn config(&self) -> &ControlConfig {
        &self.ctx.config
    }

    pub fn recorder(&self) -> &Arc<EventRecorder> {
        &self.recorder
    }

    /// Counter loopback check and actuator readiness. Fatal on failure.
    pub fn initialize(&mut self) -> Result<()> {
        if !self.ctx.counter.self_test() {
            return Err(ControlError::HardwareInit("frequency counter self-test failed".into()));
        }
        if !self.ctx.actuator.is_ready() {
            return Err(ControlError::HardwareInit("PWM timer not ready".into()));
        }
        info!("[Driver] hardware initialized");
        Ok(())
    }

    pub fn calibration(&self) -> Result<CalibrationRange> {
        self.calibration.ok_or(ControlError::NotCalibrated)
    }

    pub fn set_calibration(&mut self, range: CalibrationRange) {
        self.calibration = Some(range);
    }

    /// Run the characterization sweep and adopt its range.
    pub fn calibrate(&mut self) -> Result<RunReport> {
        let run = self.next_run();
        self.last_track_duty = None;
        self.recorder.record(Event::RunStart {
            run,
            ts_ms: self.ctx.clock.now_ms(),
            label: "Characterization",
        });

        let result = Calibrator::from_config(&self.ctx.config).run_characterization(
            &mut *self.ctx.actuator,
            &mut *self.ctx.counter,
            self.ctx.clock.as_ref(),
            &mut self.buffer,
        )?;
        self.calibration = Some(result.range);

        let samples = self.buffer.as_slice().to_vec();
        for (index, &freq_hz) in samples.iter().enumerate().skip(MIN_DUTY as usize) {
            self.recorder.record(Event::Sample { run, index, ts_ms: result.end_ms, freq_hz });
        }
        self.recorder.record(Event::RunEnd {
            run,
            ts_ms: result.end_ms,
            samples: samples.len().saturating_sub(1),
            late_ticks: 0,
        });

        Ok(RunReport {
            run,
            label: "Characterization",
            duties: (0..samples.len()).map(|i| i.clamp(MIN_DUTY as usize, MAX_DUTY as usize) as u8).collect(),
            samples,
            start_ms: result.start_ms,
            end_ms: result.end_ms,
            sample_interval_ms: result.interval_ms,
            late_ticks: 0,
            first_index: MIN_DUTY as usize,
        })
    }

    /// Execute one closed-loop or step test to completion.
    pub fn run(&mut self, law: &mut dyn ControlLaw) -> Result<RunReport> {
        let run = self.next_run();
        self.last_track_duty = None;
        let period = self.ctx.config.sample_period_ms;
        let count = self.ctx.config.num_samples;
        let clock = self.ctx.clock.clone();

        info!("[Driver] run {} ({}): {} samples @ {} ms", run, law.label(), count, period);
        self.recorder.record(Event::RunStart { run, ts_ms: clock.now_ms(), label: law.label() });

        let mut current = law.prime_duty();
        self.apply(current)?;
        clock.delay_ms(self.ctx.config.settle_ms);

        if let Some(step) = law.step_duty() {
            debug!("[Driver] step {} -> {}", current, step);
            current = step;
            self.apply(current)?;
        }

        self.buffer.reset();
        let mut duties = Vec::with_capacity(count);
        let mut late_ticks = 0u64;
        let start_ms = clock.now_ms();

        for _ in 0..count {
            let tick_start = clock.now_ms();
            let freq_hz = self.ctx.counter.read_frequency();
            let index = self.buffer.push(freq_hz)?;
            self.recorder.record(Event::Sample { run, index, ts_ms: tick_start, freq_hz });

            if let Some(duty) = law.update(freq_hz) {
                self.apply(duty)?;
                current = duty;
                self.recorder.record(Event::Actuation {
                    run,
                    index,
                    ts_ms: clock.now_ms(),
                    duty: duty.percent(),
                });
            }
            duties.push(current.percent());

            clock.delay_ms(period);

            let elapsed_ms = clock.now_ms().saturating_sub(tick_start);
            if elapsed_ms > 2 * period {
                late_ticks += 1;
                self.recorder.record(Event::LateTick { run, index, ts_ms: clock.now_ms(), elapsed_ms });
            }
        }

        let end_ms = clock.now_ms();
        let sample_interval_ms = self.buffer.record_interval(start_ms, end_ms, count);
        if late_ticks > 0 {
            warn!("[Driver] run {}: {} late ticks out of {}", run, late_ticks, count);
        }
        self.recorder.record(Event::RunEnd { run, ts_ms: end_ms, samples: count, late_ticks });
        info!(
            "[Driver] run {} done in {} ms, ~{} ms per sample",
            run,
            end_ms.saturating_sub(start_ms),
            sample_interval_ms
        );

        Ok(RunReport {
            run,
            label: law.label(),
            samples: self.buffer.as_slice().to_vec(),
            duties,
            start_ms,
            end_ms,
            sample_interval_ms,
            late_ticks,
            first_index: 1,
        })
    }

    /// One tracking observation. The duty is only rewritten when it changed.
    pub fn track(&mut self, duty: u8) -> Result<TrackReading> {
        let range = self.calibration()?;
        let duty = DutyCycle::clamped(duty as i64);

        if self.last_track_duty != Some(duty.percent()) {
            self.apply(duty)?;
            self.last_track_duty = Some(duty.percent());
        }

        let clock = self.ctx.clock.clone();
        let start_ms = clock.now_ms();
        clock.delay_ms(self.ctx.config.track_delay_ms);
        let freq = self.ctx.counter.read_frequency();
        let interval_ms = clock.now_ms().saturating_sub(start_ms);

        let vref = self.ctx.config.reference_voltage;
        let reading = TrackReading {
            duty: duty.percent(),
            duty_volts: duty.percent() as f64 * 0.01 * vref,
            freq,
            sensor_volts: voltage_from_frequency(freq as i32, range, vref)?,
            interval_ms,
        };
        debug!("[Driver] track {:?}", reading);
        Ok(reading)
    }

    fn apply(&mut self, duty: DutyCycle) -> Result<()> {
        let percent = duty.percent();
        self.ctx
            .actuator
            .set_duty_cycle(self.ctx.config.pwm_freq_hz, percent)
            .map_err(|source| {
                warn!("[Driver] actuator rejected {}%: {}", percent, source);
                ControlError::ActuatorSet { duty: percent, source }
            })
    }

    fn next_run(&mut self) -> u64 {
        self.runs += 1;
        self.runs
    }
}
