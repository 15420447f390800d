//! signal_model.rs
//! Raw interval counts → frequency → calibrated voltage.
//!
//! The frequency counter reports how many clock cycles the sensor output spent
//! high and low during its last period. Both counts are offset by one before
//! summing, so a zero reading never divides by zero.

use crate::utils::error::{ControlError, Result};

/// Counter clock feeding the high/low interval registers.
pub const CLOCK_FREQ_HZ: u32 = 100_000_000;

/// Interval registers are 22 bits wide.
pub const COUNTER_LIMIT: u32 = 1 << 22;

/// One high/low interval capture from the frequency counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawInterval {
    pub high_count: u32,
    pub low_count: u32,
}

impl RawInterval {
    pub fn new(high_count: u32, low_count: u32) -> Self {
        Self { high_count, low_count }
    }

    #[inline]
    fn period_counts(&self) -> u64 {
        (self.high_count as u64 + 1) + (self.low_count as u64 + 1)
    }
}

/// `CLOCK_FREQ_HZ / ((high + 1) + (low + 1))`, truncating.
#[inline]
pub fn frequency_from_interval(interval: RawInterval) -> u32 {
    (CLOCK_FREQ_HZ as u64 / interval.period_counts()) as u32
}

/// Share of the period spent high, in percent, floored at 1.
///
/// A vanishing high interval truncates to zero; the PWM source never goes
/// below 1 %, so the reading is reported as 1.
#[inline]
pub fn duty_from_interval(interval: RawInterval) -> u32 {
    let duty = 100 * (interval.high_count as u64 + 1) / interval.period_counts();
    duty.clamp(1, 100) as u32
}

/// Frequency span observed between the 1 % and 99 % duty cycle points.
///
/// `min_freq <= max_freq` is expected from a lamp that gets brighter with duty,
/// but nothing enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRange {
    pub min_freq: i32,
    pub max_freq: i32,
}

impl CalibrationRange {
    pub fn new(min_freq: i32, max_freq: i32) -> Self {
        Self { min_freq, max_freq }
    }

    #[inline]
    pub fn span(&self) -> i64 {
        self.max_freq as i64 - self.min_freq as i64
    }

    pub fn midpoint(&self) -> i32 {
        (self.min_freq as i64 + self.span() / 2) as i32
    }

    /// Clamp a raw rotary setpoint into the calibrated band.
    pub fn clamp_setpoint(&self, raw: i32) -> i32 {
        raw.min(self.max_freq).max(self.min_freq)
    }

    pub fn is_monotonic(&self) -> bool {
        self.min_freq <= self.max_freq
    }
}

/// Linear map from frequency to the voltage that would produce it.
///
/// Values outside the calibrated band map outside `[0, reference_voltage]`;
/// the result is deliberately left unclamped.
pub fn voltage_from_frequency(freq: i32, range: CalibrationRange, reference_voltage: f64) -> Result<f64> {
    let span = range.span();
    if span == 0 {
        return Err(ControlError::DegenerateCalibration { freq: range.min_freq });
    }
    let offset = freq as i64 - range.min_freq as i64;
    Ok(reference_voltage * (offset as f64 / span as f64))
}

/// Fixed-format voltage text used by the plot protocol: `(+|-| )x.yy`.
///
/// The sign position is blank when the integer part is zero.
pub fn volts_to_string(v: f64) -> String {
    let cents = (v.abs() * 100.0).round() as u64;
    let ones = cents / 100;
    let sign = if ones == 0 {
        ' '
    } else if v > 0.0 {
        '+'
    } else {
        '-'
    };
    format!("{}{}.{:02}", sign, ones, cents % 100)
}
