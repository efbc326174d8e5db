//! Runtime configuration

use crate::{error::ConfigError, intel::Coordinates};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Storage key the profile blob lives under.
pub const DEFAULT_PROFILE_KEY: &str = "kiwia_profile";

/// Constants of the log-distance path-loss model and the radar's display range.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProximityConfig {
    /// Signal strength measured at one unit of distance, in dBm.
    pub reference_power: f64,
    /// Environmental attenuation exponent, 2.0 for open space.
    pub path_loss_exponent: f64,
    /// Distance mapped to the outer edge of the radar.
    pub max_radius: f64,
    pub min_display: f64,
    pub max_display: f64,
    /// Range used when the model yields nothing usable.
    pub fallback_min: f64,
    pub fallback_max: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            reference_power: -59.0,
            path_loss_exponent: 2.0,
            max_radius: 20.0,
            min_display: 15.0,
            max_display: 95.0,
            fallback_min: 40.0,
            fallback_max: 80.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct VideoConfig {
    pub model: String,
    pub resolution: String,
    pub poll_interval_ms: u64,
    /// Give up after this many polls. `None` polls until the job finishes.
    pub max_polls: Option<u32>,
    pub api_key: Option<String>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            model: "veo-3.1-fast-generate-preview".to_string(),
            resolution: "720p".to_string(),
            poll_interval_ms: 5_000,
            max_polls: None,
            api_key: None,
        }
    }
}

impl VideoConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IntelConfig {
    pub model: String,
    /// Where the report is about when the device gives no position.
    pub default_location: Coordinates,
    pub api_key: Option<String>,
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-pro-preview".to_string(),
            default_location: Coordinates::default(),
            api_key: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub proximity: ProximityConfig,
    /// Divisor applied to display distance when placing markers on the radar.
    pub radar_scale: f64,
    pub scan_timeout_ms: u64,
    pub chat_page_size: usize,
    pub video: VideoConfig,
    pub intel: IntelConfig,
    pub profile_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proximity: ProximityConfig::default(),
            radar_scale: 2.0,
            scan_timeout_ms: 2_000,
            chat_page_size: 50,
            video: VideoConfig::default(),
            intel: IntelConfig::default(),
            profile_key: DEFAULT_PROFILE_KEY.to_string(),
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&json)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}
