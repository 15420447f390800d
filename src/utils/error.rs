//! Error taxonomy for the control loop.
//!
//! - **HardwareInit:** self-test or peripheral setup failed; fatal at startup.
//! - **ActuatorSet:** a duty-cycle write was rejected; aborts the current run, no partial report.
//! - **DegenerateCalibration:** calibration collapsed to `min == max`; voltage conversion refuses to divide.
//!
//! Sensor reads never fail, so there is no sensor variant.

use thiserror::Error;

/// Rejections reported by the PWM actuator capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActuatorError {
    #[error("PWM timer not ready")]
    NotReady,

    #[error("duty cycle {0}% outside the allowed 1..=99 range")]
    DutyOutOfRange(u8),

    #[error("invalid PWM frequency {0} Hz")]
    InvalidFrequency(u32),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("hardware initialization failed: {0}")]
    HardwareInit(String),

    #[error("actuator rejected duty cycle {duty}%: {source}")]
    ActuatorSet {
        duty: u8,
        #[source]
        source: ActuatorError,
    },

    #[error("calibration range collapsed (min == max == {freq} Hz)")]
    DegenerateCalibration { freq: i32 },

    #[error("sample buffer full ({capacity} samples)")]
    BufferFull { capacity: usize },

    #[error("no calibration available, run the characterization test first")]
    NotCalibrated,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("plot rendering failed: {0}")]
    Plot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ControlError>;
