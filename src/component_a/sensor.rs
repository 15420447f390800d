//! sensor.rs
//! Frequency-counter capability and the simulated lamp/photosensor plant behind it.
//!
//! The photosensor emits a square wave whose frequency rises with incident light.
//! `LampPlant` models the lamp as a first-order lag towards the commanded duty
//! cycle; `PhotoSensor` turns the resulting frequency into the high/low interval
//! counts a hardware counter would latch, saturating at the 22-bit limit.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use rand::random_range;

use crate::component_a::{
    clock::SharedClock,
    signal_model::{CLOCK_FREQ_HZ, COUNTER_LIMIT, RawInterval, frequency_from_interval},
};

/// Source of raw interval captures. Reads never fail.
pub trait FrequencyCounter {
    fn read_interval(&mut self) -> RawInterval;

    /// Register loopback check run once at initialization.
    fn self_test(&mut self) -> bool {
        true
    }

    fn read_frequency(&mut self) -> u32 {
        frequency_from_interval(self.read_interval())
    }
}

/// Split one period of `freq_hz` into high/low counts (50 % duty square wave).
///
/// Counts are not limited to the register width; callers that model the
/// hardware saturate them.
pub fn interval_for_frequency(freq_hz: f64) -> RawInterval {
    let freq = freq_hz.clamp(f64::MIN_POSITIVE, CLOCK_FREQ_HZ as f64 / 2.0);
    let period = ((CLOCK_FREQ_HZ as f64 / freq) as u64).max(2);
    let high = period / 2 - 1;
    let low = period - period / 2 - 1;
    RawInterval::new(
        high.min(u32::MAX as u64) as u32,
        low.min(u32::MAX as u64) as u32,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlantConfig {
    /// Sensor output with the lamp fully dark.
    pub dark_freq_hz: f64,
    /// Sensor output with the lamp at 100 %.
    pub full_scale_freq_hz: f64,
    /// Lamp/sensor response time constant.
    pub time_constant_ms: f64,
    /// Peak uniform noise added to every reading.
    pub noise_hz: f64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            dark_freq_hz: 20.0,
            full_scale_freq_hz: 420.0,
            time_constant_ms: 40.0,
            noise_hz: 1.0,
        }
    }
}

/// Lamp brightness state, advanced lazily from the shared clock.
#[derive(Debug, Clone)]
pub struct LampPlant {
    config: PlantConfig,
    duty: u8,
    light: f64,
    last_update_ms: u64,
}

pub type SharedPlant = Arc<Mutex<LampPlant>>;

impl LampPlant {
    pub fn new(config: PlantConfig) -> Self {
        Self {
            config,
            duty: 0,
            light: 0.0,
            last_update_ms: 0,
        }
    }

    pub fn shared(config: PlantConfig) -> SharedPlant {
        Arc::new(Mutex::new(Self::new(config)))
    }

    pub fn config(&self) -> &PlantConfig {
        &self.config
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    /// Relative brightness in percent.
    pub fn light_level(&self) -> f64 {
        self.light
    }

    /// Integrate the lag up to `now_ms`.
    pub fn advance(&mut self, now_ms: u64) {
        let dt = now_ms.saturating_sub(self.last_update_ms) as f64;
        self.last_update_ms = self.last_update_ms.max(now_ms);
        if dt <= 0.0 {
            return;
        }
        let target = self.duty as f64;
        let alpha = if self.config.time_constant_ms > 0.0 {
            1.0 - (-dt / self.config.time_constant_ms).exp()
        } else {
            1.0
        };
        self.light += (target - self.light) * alpha;
    }

    pub fn set_duty(&mut self, duty: u8, now_ms: u64) {
        self.advance(now_ms);
        self.duty = duty.min(100);
    }

    /// Noise-free sensor output at the current brightness.
    pub fn frequency_hz(&self) -> f64 {
        let span = self.config.full_scale_freq_hz - self.config.dark_freq_hz;
        self.config.dark_freq_hz + span * self.light / 100.0
    }
}

/// Photosensor + interval counter reading the shared plant.
pub struct PhotoSensor {
    plant: SharedPlant,
    clock: SharedClock,
}

impl PhotoSensor {
    pub fn new(plant: SharedPlant, clock: SharedClock) -> Self {
        Self { plant, clock }
    }
}

impl FrequencyCounter for PhotoSensor {
    fn read_interval(&mut self) -> RawInterval {
        let (freq, noise) = {
            let mut plant = self.plant.lock();
            plant.advance(self.clock.now_ms());
            (plant.frequency_hz(), plant.config().noise_hz)
        };

        let reading = if noise > 0.0 {
            freq + random_range(-noise..noise)
        } else {
            freq
        };

        let raw = interval_for_frequency(reading);
        RawInterval::new(
            raw.high_count.min(COUNTER_LIMIT - 1),
            raw.low_count.min(COUNTER_LIMIT - 1),
        )
    }

    /// One capture must decode to a frequency the plant can produce.
    fn self_test(&mut self) -> bool {
        let (lo, hi) = {
            let plant = self.plant.lock();
            let cfg = plant.config();
            let slack = cfg.noise_hz.abs() + 1.0;
            (cfg.dark_freq_hz - slack, cfg.full_scale_freq_hz + slack)
        };
        let freq = self.read_frequency() as f64;
        let ok = (lo..=hi).contains(&freq);
        if ok {
            debug!("[Sensor] self-test {} Hz within {:.1}..{:.1}", freq, lo, hi);
        } else {
            warn!("[Sensor] self-test {} Hz outside {:.1}..{:.1}", freq, lo, hi);
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_a::clock::{Clock, ManualClock};

    fn quiet_plant() -> PlantConfig {
        PlantConfig {
            noise_hz: 0.0,
            ..PlantConfig::default()
        }
    }

    #[test]
    fn interval_encoding_matches_integer_frequencies() {
        for f in [1u32, 3, 7, 20, 420, 2_000, 50_000] {
            let interval = interval_for_frequency(f as f64);
            assert_eq!(frequency_from_interval(interval), f, "freq {f}");
        }
        assert_eq!(interval_for_frequency(2_000.0), RawInterval::new(24_999, 24_999));
    }

    #[test]
    fn lamp_settles_towards_duty() {
        let mut plant = LampPlant::new(quiet_plant());
        plant.set_duty(99, 0);
        plant.advance(40);
        let one_tau = plant.light_level();
        assert!((one_tau - 99.0 * (1.0 - (-1.0f64).exp())).abs() < 1e-9);
        plant.advance(2_000);
        assert!((plant.light_level() - 99.0).abs() < 1e-6);
    }

    #[test]
    fn sensor_saturates_when_dark() {
        let clock = ManualClock::new();
        let plant = LampPlant::shared(PlantConfig {
            dark_freq_hz: 1.0,
            ..quiet_plant()
        });
        let mut sensor = PhotoSensor::new(plant, Arc::new(clock));
        let raw = sensor.read_interval();
        assert_eq!(raw.high_count, COUNTER_LIMIT - 1);
        assert_eq!(raw.low_count, COUNTER_LIMIT - 1);
        assert!(sensor.self_test());
    }

    #[test]
    fn self_test_fails_when_counter_and_plant_disagree() {
        // full scale below what a saturated counter decodes to (~11 Hz)
        let plant = LampPlant::shared(PlantConfig {
            dark_freq_hz: 1.0,
            full_scale_freq_hz: 5.0,
            ..quiet_plant()
        });
        let mut sensor = PhotoSensor::new(plant, Arc::new(ManualClock::new()));
        assert!(!sensor.self_test());

        let plant = LampPlant::shared(quiet_plant());
        let mut sensor = PhotoSensor::new(plant, Arc::new(ManualClock::new()));
        assert!(sensor.self_test());
    }

    #[test]
    fn sensor_tracks_lamp_brightness() {
        let clock = ManualClock::new();
        let plant = LampPlant::shared(quiet_plant());
        let mut sensor = PhotoSensor::new(plant.clone(), Arc::new(clock.clone()));

        let dark = sensor.read_frequency();
        assert_eq!(dark, 20);

        plant.lock().set_duty(99, clock.now_ms());
        clock.delay_ms(1_500);
        let bright = sensor.read_frequency();
        assert!((414..=416).contains(&bright), "bright={bright}");
    }
}
