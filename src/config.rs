// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Application configuration management.
//!
//! Persistent settings are stored as TOML through `confy`. Command-line
//! flags are layered on top for a single run.

use std::path::PathBuf;
use std::time::Duration;

use route_sync::{
    Coordinate, GoogleGeocoderConfig, HttpBackendConfig, SyncConfig, TrackerOptions,
};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "ecoroute";
const CONFIG_NAME: &str = "config";

/// Default base URL of the pollution-analysis backend
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Pollution-analysis backend base URL
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Session cookie (`name=value`) sent with backend requests
    #[serde(default)]
    pub session_cookie: Option<String>,

    /// Backend request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Quiet period before fetching routes after origin/destination changes
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Forecast polls per cycle while the prediction is still computing
    #[serde(default = "default_forecast_attempts")]
    pub forecast_attempts: u32,

    /// Seconds between forecast polls
    #[serde(default = "default_forecast_retry_secs")]
    pub forecast_retry_secs: u64,

    /// Google Maps API key (optional, env var takes precedence)
    #[serde(default)]
    pub google_maps_api_key: Option<String>,

    /// Override origin latitude (for devices without GPS)
    #[serde(default)]
    pub override_origin_latitude: Option<f64>,

    /// Override origin longitude (for devices without GPS)
    #[serde(default)]
    pub override_origin_longitude: Option<f64>,

    /// CSV track (`lat,lng,delay_ms`) replayed as the live location
    #[serde(default)]
    pub track_file: Option<PathBuf>,

    /// Ignore position changes smaller than this many meters
    #[serde(default)]
    pub min_movement_meters: f64,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    800
}

fn default_forecast_attempts() -> u32 {
    3
}

fn default_forecast_retry_secs() -> u64 {
    2
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            backend_url: default_backend_url(),
            session_cookie: None,
            request_timeout_secs: default_request_timeout_secs(),
            debounce_ms: default_debounce_ms(),
            forecast_attempts: default_forecast_attempts(),
            forecast_retry_secs: default_forecast_retry_secs(),
            google_maps_api_key: None,
            override_origin_latitude: None,
            override_origin_longitude: None,
            track_file: None,
            min_movement_meters: 0.0,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Origin override, if both halves are set and in range
    pub fn origin_override(&self) -> Option<Coordinate> {
        let lat = self.override_origin_latitude?;
        let lng = self.override_origin_longitude?;
        Coordinate::validated(lat, lng).ok()
    }

    pub fn set_origin_override(&mut self, origin: Coordinate) {
        self.override_origin_latitude = Some(origin.lat);
        self.override_origin_longitude = Some(origin.lng);
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            forecast_attempts: self.forecast_attempts,
            forecast_retry_delay: Duration::from_secs(self.forecast_retry_secs),
            ..SyncConfig::default()
        }
    }

    pub fn backend_config(&self) -> HttpBackendConfig {
        HttpBackendConfig {
            base_url: self.backend_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            session_cookie: self.session_cookie.clone(),
        }
    }

    /// Geocoder settings, if an API key is available
    pub fn geocoder_config(&self) -> Option<GoogleGeocoderConfig> {
        GoogleGeocoderConfig::resolve_api_key(self.google_maps_api_key.as_deref())
            .map(GoogleGeocoderConfig::new)
    }

    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            min_movement_meters: self.min_movement_meters.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: AppConfig = confy_toml("backend_url = \"https://eco.example.com\"\n");
        assert_eq!(config.backend_url, "https://eco.example.com");
        assert_eq!(config.debounce_ms, 800);
        assert_eq!(config.config_version, 1);
        assert_eq!(config.sync_config().debounce, Duration::from_millis(800));
    }

    #[test]
    fn test_origin_override_requires_both() {
        let mut config = AppConfig {
            override_origin_latitude: Some(12.9),
            ..Default::default()
        };
        assert_eq!(config.origin_override(), None);

        config.set_origin_override(Coordinate::new(12.9, 77.59));
        assert_eq!(config.origin_override(), Some(Coordinate::new(12.9, 77.59)));

        config.override_origin_latitude = Some(123.0);
        assert_eq!(config.origin_override(), None);
    }

    #[test]
    fn test_round_trip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig {
            track_file: Some(PathBuf::from("drive.csv")),
            ..Default::default()
        };
        config.set_origin_override(Coordinate::new(12.9, 77.59));

        confy::store_path(&path, &config).unwrap();
        let loaded: AppConfig = confy::load_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    fn confy_toml(contents: &str) -> AppConfig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        confy::load_path(&path).unwrap()
    }
}
