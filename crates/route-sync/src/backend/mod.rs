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

//! Pollution-analysis backend layer.
//!
//! The [`Backend`] trait is the seam between the controller and the remote
//! service. [`HttpBackend`] talks to the real REST API; tests substitute
//! scripted implementations. Wire envelopes are decoded in [`wire`] and only
//! domain types cross this boundary.

mod http;
mod wire;

pub use http::{HttpBackend, HttpBackendConfig};

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::Coordinate;
use crate::model::{AqiPoint, ForecastSeries, QualityLabel, RouteKey, SensorSummary};

/// The three dependent network stages of a fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchStage {
    Geometry,
    Analysis,
    Forecast,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Geometry => "geometry",
            Self::Analysis => "analysis",
            Self::Forecast => "forecast",
        })
    }
}

/// Errors from a single backend call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("not authenticated")]
    Unauthorized,

    #[error("HTTP error: {status}")]
    Http { status: u16 },

    #[error("backend reported status '{0}'")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err)
        }
    }
}

/// Origin/destination pair a fetch cycle is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub origin: Coordinate,
    pub destination: Coordinate,
}

/// One route from the geometry endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGeometry {
    pub path: Vec<Coordinate>,
    pub duration: String,
    pub distance: String,
    pub distance_meters: Option<u64>,
}

/// Per-route pollution exposure from the analysis endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteExposure {
    pub summary: SensorSummary,
    pub details: Vec<AqiPoint>,
}

/// Decoded analysis envelope. Keys are parsed but not yet checked against the
/// current route list; that happens at merge time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteAnalysis {
    pub recommended: Option<RouteKey>,
    pub qualities: BTreeMap<RouteKey, QualityLabel>,
    pub exposures: BTreeMap<RouteKey, RouteExposure>,
}

/// Result of polling the forecast endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Ready(ForecastSeries),
    /// The backend is still computing the prediction.
    Pending,
}

/// Signed-in user, consumed by presentation only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

/// Remote pollution-analysis service.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /api/routes/raw`
    async fn route_geometry(&self, trip: Trip) -> Result<Vec<RouteGeometry>, BackendError>;

    /// `POST /api/routes/process`
    async fn route_analysis(&self, trip: Trip) -> Result<RouteAnalysis, BackendError>;

    /// `GET /api/routes/predict`
    async fn route_forecast(&self) -> Result<ForecastOutcome, BackendError>;

    /// `GET /api/user/me`
    async fn profile(&self) -> Result<UserProfile, BackendError>;
}
