
// Component A: Acquisition
// Frequency counter, signal conversion, the millisecond clock and the
// characterization sweep that calibrates the sensor span.

pub mod signal_model;
pub mod sensor;
pub mod sample_buffer;
pub mod clock;
pub mod calibrator;
