//! sample_buffer.rs
//! Fixed-capacity sample store shared by every test run.
//!
//! Closed-loop and step runs append one frequency reading per tick; the
//! characterization sweep writes by duty-cycle index instead. The buffer is
//! reset at the start of each run, never appended across runs.

use crate::utils::error::{ControlError, Result};

/// Samples captured per run.
pub const NUM_FRQ_SAMPLES: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    samples: Vec<u32>,
    capacity: usize,
    interval_ms: u64,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::with_capacity(NUM_FRQ_SAMPLES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            interval_ms: 0,
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.interval_ms = 0;
    }

    /// Append a reading; returns the index it was stored at.
    pub fn push(&mut self, value: u32) -> Result<usize> {
        if self.samples.len() >= self.capacity {
            return Err(ControlError::BufferFull { capacity: self.capacity });
        }
        self.samples.push(value);
        Ok(self.samples.len() - 1)
    }

    /// Write at an explicit index, zero-filling any gap before it.
    pub fn store(&mut self, index: usize, value: u32) -> Result<()> {
        if index >= self.capacity {
            return Err(ControlError::BufferFull { capacity: self.capacity });
        }
        if index >= self.samples.len() {
            self.samples.resize(index + 1, 0);
        }
        self.samples[index] = value;
        Ok(())
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<u32> {
        self.samples.get(index).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.samples
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Store the average sample interval for this run and return it.
    pub fn record_interval(&mut self, start_ms: u64, end_ms: u64, count: usize) -> u64 {
        self.interval_ms = sample_interval_estimate(start_ms, end_ms, count);
        self.interval_ms
    }
}

/// Average spacing between samples: `(end - start) / count`.
///
/// Reporting statistic only; zero when no samples were taken.
pub fn sample_interval_estimate(start_ms: u64, end_ms: u64, count: usize) -> u64 {
    if count == 0 {
        return 0;
    }
    end_ms.saturating_sub(start_ms) / count as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_until_full() {
        let mut buf = SampleBuffer::with_capacity(3);
        assert_eq!(buf.push(10).unwrap(), 0);
        assert_eq!(buf.push(11).unwrap(), 1);
        assert_eq!(buf.push(12).unwrap(), 2);
        let err = buf.push(13).unwrap_err();
        assert!(matches!(err, ControlError::BufferFull { capacity: 3 }));
        assert_eq!(buf.as_slice(), &[10, 11, 12]);
    }

    #[test]
    fn reset_clears_previous_run() {
        let mut buf = SampleBuffer::new();
        for v in 0..NUM_FRQ_SAMPLES as u32 {
            buf.push(v).unwrap();
        }
        buf.record_interval(0, 500, NUM_FRQ_SAMPLES);
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.interval_ms(), 0);
        assert_eq!(buf.push(7).unwrap(), 0);
    }

    #[test]
    fn indexed_store_zero_fills() {
        let mut buf = SampleBuffer::new();
        buf.store(1, 20).unwrap();
        buf.store(99, 400).unwrap();
        assert_eq!(buf.len(), 100);
        assert_eq!(buf.get(0), Some(0));
        assert_eq!(buf.get(1), Some(20));
        assert_eq!(buf.get(50), Some(0));
        assert_eq!(buf.get(99), Some(400));
        assert!(buf.store(NUM_FRQ_SAMPLES, 1).is_err());
    }

    #[test]
    fn interval_estimate() {
        assert_eq!(sample_interval_estimate(1_000, 1_500, 250), 2);
        assert_eq!(sample_interval_estimate(1_000, 1_249, 250), 0);
        assert_eq!(sample_interval_estimate(1_000, 1_500, 0), 0);
        assert_eq!(sample_interval_estimate(2_000, 1_000, 10), 0);
    }
}
