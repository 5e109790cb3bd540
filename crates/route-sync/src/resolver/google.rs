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

//! Google Places Details / Geocoding API implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Geocoder, ResolutionError};
use crate::geo::Coordinate;

const PLACES_SERVICE: &str = "places";
const GEOCODER_SERVICE: &str = "geocoder";

/// Configuration for [`GoogleGeocoder`].
#[derive(Debug, Clone)]
pub struct GoogleGeocoderConfig {
    pub api_key: String,
    /// Base URL of the Maps web services.
    pub base_url: String,
    pub request_timeout: Duration,
}

impl GoogleGeocoderConfig {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://maps.googleapis.com/maps/api".to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }

    /// Resolve API key from environment variable or config.
    #[must_use]
    pub fn resolve_api_key(config_key: Option<&str>) -> Option<String> {
        if let Ok(key) = std::env::var("GOOGLE_MAPS_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }

        config_key.map(ToString::to_string).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct LatLngLiteral {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<LatLngLiteral>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetailsResponse {
    status: String,
    result: Option<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<PlaceResult>,
}

fn location_of(
    service: &'static str,
    result: Option<&PlaceResult>,
) -> Result<Coordinate, ResolutionError> {
    let location = result
        .and_then(|r| r.geometry.as_ref())
        .and_then(|g| g.location.as_ref())
        .ok_or(ResolutionError::NoGeometry { service })?;
    Coordinate::validated(location.lat, location.lng)
        .map_err(|_invalid| ResolutionError::NoGeometry { service })
}

fn check_ok(service: &'static str, status: &str) -> Result<(), ResolutionError> {
    if status == "OK" {
        Ok(())
    } else {
        Err(ResolutionError::Status {
            service,
            status: status.to_string(),
        })
    }
}

fn parse_place_details(response: &PlaceDetailsResponse) -> Result<Coordinate, ResolutionError> {
    check_ok(PLACES_SERVICE, &response.status)?;
    location_of(PLACES_SERVICE, response.result.as_ref())
}

fn parse_geocode(response: &GeocodeResponse) -> Result<Coordinate, ResolutionError> {
    check_ok(GEOCODER_SERVICE, &response.status)?;
    location_of(GEOCODER_SERVICE, response.results.first())
}

/// [`Geocoder`] backed by the Google Maps web services.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: reqwest::Client,
    config: GoogleGeocoderConfig,
}

impl GoogleGeocoder {
    pub fn new(config: GoogleGeocoderConfig) -> Result<Self, ResolutionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ResolutionError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ResolutionError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ResolutionError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ResolutionError::Transport(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ResolutionError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn place_details(&self, place_id: &str) -> Result<Coordinate, ResolutionError> {
        let response: PlaceDetailsResponse = self
            .get_json(
                "/place/details/json",
                &[("place_id", place_id), ("fields", "geometry")],
            )
            .await?;
        parse_place_details(&response)
    }

    async fn geocode(&self, address: &str) -> Result<Coordinate, ResolutionError> {
        let response: GeocodeResponse = self
            .get_json("/geocode/json", &[("address", address)])
            .await?;
        parse_geocode(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_details_ok() {
        let response: PlaceDetailsResponse = serde_json::from_str(
            r#"{"status":"OK","result":{"geometry":{"location":{"lat":12.95,"lng":77.6}}}}"#,
        )
        .unwrap();
        assert_eq!(
            parse_place_details(&response),
            Ok(Coordinate::new(12.95, 77.6))
        );
    }

    #[test]
    fn test_place_details_bad_status() {
        let response: PlaceDetailsResponse =
            serde_json::from_str(r#"{"status":"INVALID_REQUEST"}"#).unwrap();
        assert_eq!(
            parse_place_details(&response),
            Err(ResolutionError::Status {
                service: "places",
                status: "INVALID_REQUEST".to_string()
            })
        );
    }

    #[test]
    fn test_geocode_missing_geometry() {
        let response: GeocodeResponse =
            serde_json::from_str(r#"{"status":"OK","results":[{"geometry":null}]}"#).unwrap();
        assert_eq!(
            parse_geocode(&response),
            Err(ResolutionError::NoGeometry {
                service: "geocoder"
            })
        );

        let response: GeocodeResponse =
            serde_json::from_str(r#"{"status":"ZERO_RESULTS","results":[]}"#).unwrap();
        assert!(matches!(
            parse_geocode(&response),
            Err(ResolutionError::Status { .. })
        ));
    }
}
