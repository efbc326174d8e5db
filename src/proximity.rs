//! Signal strength to radar distance.
//!
//! Uses the log-distance path-loss model:
//! `distance = 10 ^ ((reference_power - rssi) / (10 * n))`
//! and maps the estimate onto the radar's 0-100 display scale.

use crate::config::ProximityConfig;
use rand::Rng;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProximityModel {
    config: ProximityConfig,
}

impl From<ProximityConfig> for ProximityModel {
    fn from(config: ProximityConfig) -> Self {
        Self { config }
    }
}

impl ProximityModel {
    pub fn new(config: ProximityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProximityConfig {
        &self.config
    }

    /// Estimated physical distance for a reading, in the reference unit.
    pub fn estimate_distance(&self, rssi: f64) -> f64 {
        let loss = self.config.reference_power - rssi;
        10f64.powf(loss / (10.0 * self.config.path_loss_exponent))
    }

    /// Radar distance for a reading, before any clamping.
    pub fn scaled_distance(&self, rssi: f64) -> f64 {
        self.estimate_distance(rssi) / self.config.max_radius * 100.0
    }

    /// Radar distance for a reading, always inside the display range.
    ///
    /// Readings the model cannot turn into a finite value (NaN, overflow)
    /// produce a plausible random distance instead.
    pub fn display_distance<R: Rng>(&self, rssi: f64, rng: &mut R) -> f64 {
        let scaled = self.scaled_distance(rssi);
        if !scaled.is_finite() {
            return self.fallback_distance(rng);
        }
        scaled
            .max(self.config.min_display)
            .min(self.config.max_display)
    }

    pub fn display_distance_dbm<R: Rng>(&self, rssi: i32, rng: &mut R) -> f64 {
        self.display_distance(f64::from(rssi), rng)
    }

    pub fn fallback_distance<R: Rng>(&self, rng: &mut R) -> f64 {
        random_between(rng, self.config.fallback_min, self.config.fallback_max)
    }
}

/// Uniform value in `[low, high]`, or `low` when the range is empty.
pub(crate) fn random_between<R: Rng>(rng: &mut R, low: f64, high: f64) -> f64 {
    if low < high {
        rng.random_range(low..=high)
    } else {
        low
    }
}
