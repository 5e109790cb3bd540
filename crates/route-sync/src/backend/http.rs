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

//! REST client for the pollution-analysis backend.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Response, StatusCode};
use serde_json::{Map, Value};

use super::wire::{self, PredictEnvelope, ProcessRequest, RawRoutesEnvelope};
use super::{
    Backend, BackendError, ForecastOutcome, RouteAnalysis, RouteGeometry, Trip, UserProfile,
};

/// Configuration for [`HttpBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL without trailing slash, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Session cookie sent with every request (`name=value`).
    pub session_cookie: Option<String>,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            session_cookie: None,
        }
    }
}

/// [`Backend`] implementation over HTTP with credentials included.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = config.session_cookie.as_deref().filter(|c| !c.is_empty()) {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| BackendError::Decode(format!("invalid session cookie: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Map non-success statuses to [`BackendError`].
fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }
    if !status.is_success() {
        warn!("Backend returned {} for {}", status, response.url().path());
        return Err(BackendError::Http {
            status: status.as_u16(),
        });
    }
    Ok(response)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn route_geometry(&self, trip: Trip) -> Result<Vec<RouteGeometry>, BackendError> {
        let response = self
            .client
            .get(self.url("/api/routes/raw"))
            .query(&wire::raw_route_query(trip))
            .send()
            .await?;

        let envelope: RawRoutesEnvelope = check_status(response)?.json().await?;
        let routes = wire::decode_geometry(envelope);
        debug!("Geometry returned {} routes", routes.len());
        Ok(routes)
    }

    async fn route_analysis(&self, trip: Trip) -> Result<RouteAnalysis, BackendError> {
        let response = self
            .client
            .post(self.url("/api/routes/process"))
            .json(&ProcessRequest::from(trip))
            .send()
            .await?;

        let body: Map<String, Value> = check_status(response)?.json().await?;
        Ok(wire::decode_analysis(body))
    }

    async fn route_forecast(&self) -> Result<ForecastOutcome, BackendError> {
        let response = self.client.get(self.url("/api/routes/predict")).send().await?;

        // 202 means the prediction is still being computed
        if response.status() == StatusCode::ACCEPTED {
            return Ok(ForecastOutcome::Pending);
        }

        let envelope: PredictEnvelope = check_status(response)?.json().await?;
        wire::decode_forecast(envelope)
    }

    async fn profile(&self) -> Result<UserProfile, BackendError> {
        let response = self.client.get(self.url("/api/user/me")).send().await?;

        let text = check_status(response)?.text().await?;
        if text.trim().is_empty() {
            return Err(BackendError::Unauthorized);
        }
        let profile: Option<UserProfile> =
            serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))?;
        profile.ok_or(BackendError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_trims_trailing_slash() {
        let backend = HttpBackend::new(HttpBackendConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            backend.url("/api/routes/raw"),
            "http://localhost:8080/api/routes/raw"
        );
    }

    #[test]
    fn test_invalid_cookie_rejected() {
        let result = HttpBackend::new(HttpBackendConfig {
            session_cookie: Some("bad\ncookie".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }
}
