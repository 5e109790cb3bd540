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

//! Destination resolution.
//!
//! Turns a free-text query or an autocomplete place id into one coordinate.
//! Resolution never touches controller state: the caller applies the result
//! only if it still matches the latest search.

mod google;

pub use google::{GoogleGeocoder, GoogleGeocoderConfig};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error};
use thiserror::Error;

use crate::geo::Coordinate;

/// Prefix of Google place ids handed out by Places Autocomplete.
const PLACE_ID_PREFIX: &str = "ChIJ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("empty destination query")]
    EmptyQuery,

    #[error("{service} lookup failed with status {status}")]
    Status { service: &'static str, status: String },

    #[error("{service} lookup returned no geometry")]
    NoGeometry { service: &'static str },

    #[error("lookup request failed: {0}")]
    Transport(String),

    #[error("no geocoding service configured")]
    Unavailable,
}

/// What the user picked in the search box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationQuery {
    PlaceId(String),
    Text(String),
}

impl DestinationQuery {
    /// Classify raw search input. Returns `None` for blank input.
    #[must_use]
    pub fn from_input(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if input.starts_with(PLACE_ID_PREFIX) {
            Some(Self::PlaceId(input.to_string()))
        } else {
            Some(Self::Text(input.to_string()))
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::PlaceId(value) | Self::Text(value) => value,
        }
    }
}

impl fmt::Display for DestinationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlaceId(id) => write!(f, "place {id}"),
            Self::Text(text) => write!(f, "'{text}'"),
        }
    }
}

/// Geocoding / places lookup service.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn place_details(&self, place_id: &str) -> Result<Coordinate, ResolutionError>;

    async fn geocode(&self, address: &str) -> Result<Coordinate, ResolutionError>;
}

/// Geocoder used when no lookup service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGeocoder;

#[async_trait]
impl Geocoder for NoGeocoder {
    async fn place_details(&self, _place_id: &str) -> Result<Coordinate, ResolutionError> {
        Err(ResolutionError::Unavailable)
    }

    async fn geocode(&self, _address: &str) -> Result<Coordinate, ResolutionError> {
        Err(ResolutionError::Unavailable)
    }
}

/// Resolves [`DestinationQuery`] values through a [`Geocoder`].
#[derive(Clone)]
pub struct DestinationResolver {
    geocoder: Arc<dyn Geocoder>,
}

impl fmt::Debug for DestinationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationResolver").finish_non_exhaustive()
    }
}

impl DestinationResolver {
    #[must_use]
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    /// Resolve a query to a coordinate. Failures are logged here and returned;
    /// they never change the current destination.
    pub async fn resolve(&self, query: &DestinationQuery) -> Result<Coordinate, ResolutionError> {
        if query.value().trim().is_empty() {
            return Err(ResolutionError::EmptyQuery);
        }

        let result = match query {
            DestinationQuery::PlaceId(id) => self.geocoder.place_details(id).await,
            DestinationQuery::Text(text) => self.geocoder.geocode(text).await,
        };

        match &result {
            Ok(coordinate) => debug!("Resolved {} to {}", query, coordinate),
            Err(e) => error!("Failed to resolve destination {}: {}", query, e),
        }
        result
    }
}

impl Default for DestinationResolver {
    fn default() -> Self {
        Self::new(Arc::new(NoGeocoder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGeocoder;

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn place_details(&self, place_id: &str) -> Result<Coordinate, ResolutionError> {
            if place_id == "ChIJgood" {
                Ok(Coordinate::new(12.95, 77.60))
            } else {
                Err(ResolutionError::Status {
                    service: "places",
                    status: "NOT_FOUND".to_string(),
                })
            }
        }

        async fn geocode(&self, _address: &str) -> Result<Coordinate, ResolutionError> {
            Err(ResolutionError::NoGeometry { service: "geocoder" })
        }
    }

    #[test]
    fn test_from_input_classifies() {
        assert_eq!(
            DestinationQuery::from_input("  ChIJN1t_tDeuEmsRUsoyG83frY4 "),
            Some(DestinationQuery::PlaceId(
                "ChIJN1t_tDeuEmsRUsoyG83frY4".to_string()
            ))
        );
        assert_eq!(
            DestinationQuery::from_input("MG Road, Bengaluru"),
            Some(DestinationQuery::Text("MG Road, Bengaluru".to_string()))
        );
        assert_eq!(DestinationQuery::from_input("   "), None);
    }

    #[tokio::test]
    async fn test_resolve_dispatches_by_kind() {
        let resolver = DestinationResolver::new(Arc::new(FixedGeocoder));

        let place = DestinationQuery::PlaceId("ChIJgood".to_string());
        assert_eq!(
            resolver.resolve(&place).await,
            Ok(Coordinate::new(12.95, 77.60))
        );

        let text = DestinationQuery::Text("nowhere".to_string());
        assert_eq!(
            resolver.resolve(&text).await,
            Err(ResolutionError::NoGeometry { service: "geocoder" })
        );
    }

    #[tokio::test]
    async fn test_default_resolver_is_unavailable() {
        let resolver = DestinationResolver::default();
        let query = DestinationQuery::Text("anywhere".to_string());
        assert_eq!(
            resolver.resolve(&query).await,
            Err(ResolutionError::Unavailable)
        );
        assert_eq!(
            resolver.resolve(&DestinationQuery::Text(String::new())).await,
            Err(ResolutionError::EmptyQuery)
        );
    }
}
