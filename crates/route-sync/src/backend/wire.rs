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

//! JSON envelopes of the backend REST API and their conversion to domain types.
//!
//! Decoding is lenient at the element level: a malformed point, detail or
//! forecast entry is skipped rather than failing the whole stage.

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{BackendError, ForecastOutcome, RouteAnalysis, RouteExposure, RouteGeometry, Trip};
use crate::geo::Coordinate;
use crate::model::{
    AqiPoint, ForecastPoint, ForecastSeries, QualityLabel, RouteForecast, RouteKey, SensorSummary,
};

/// Body of `POST /api/routes/process`.
#[derive(Debug, Serialize)]
pub(super) struct ProcessRequest {
    #[serde(rename = "sLat")]
    s_lat: f64,
    #[serde(rename = "sLon")]
    s_lon: f64,
    #[serde(rename = "dLat")]
    d_lat: f64,
    #[serde(rename = "dLon")]
    d_lon: f64,
}

impl From<Trip> for ProcessRequest {
    fn from(trip: Trip) -> Self {
        Self {
            s_lat: trip.origin.lat,
            s_lon: trip.origin.lng,
            d_lat: trip.destination.lat,
            d_lon: trip.destination.lng,
        }
    }
}

/// Query string of `GET /api/routes/raw`.
pub(super) fn raw_route_query(trip: Trip) -> [(&'static str, String); 4] {
    [
        ("sLat", trip.origin.lat.to_string()),
        ("sLon", trip.origin.lng.to_string()),
        ("dLat", trip.destination.lat.to_string()),
        ("dLon", trip.destination.lng.to_string()),
    ]
}

#[derive(Debug, Deserialize)]
pub(super) struct RawRoutesEnvelope {
    #[serde(default)]
    routes: Option<Vec<WireRoute>>,
}

#[derive(Debug, Deserialize)]
struct WireRoute {
    #[serde(default)]
    coordinates: Vec<Value>,
    #[serde(default, deserialize_with = "text_or_number")]
    duration: String,
    #[serde(default, deserialize_with = "text_or_number")]
    distance: String,
    #[serde(default, rename = "distanceValue")]
    distance_value: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireExposure {
    avg_pm25: Option<f64>,
    avg_pm10: Option<f64>,
    avg_co: Option<f64>,
    #[serde(default)]
    details: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PredictEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    route_forecasts: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct WireRouteForecast {
    #[serde(default)]
    forecast: Vec<Value>,
    avg_route_aqi: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireForecastEntry {
    #[serde(default, deserialize_with = "text_or_number")]
    time: String,
    aqi: Option<f64>,
    #[serde(default)]
    health_info: Option<WireHealthInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct WireHealthInfo {
    #[serde(default)]
    category: String,
    #[serde(default)]
    color: String,
}

/// Accept a string, a number, or null/missing for human-readable fields.
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => text,
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    })
}

/// Decode a point given either as `[lat, lng]` or as `{lat, lng}`.
fn coordinate_from_value(value: &Value) -> Option<Coordinate> {
    let (lat, lng) = match value {
        Value::Array(items) if items.len() >= 2 => (items[0].as_f64()?, items[1].as_f64()?),
        Value::Object(fields) => (fields.get("lat")?.as_f64()?, fields.get("lng")?.as_f64()?),
        _ => return None,
    };
    Coordinate::validated(lat, lng).ok()
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "value is rounded and clamped to the i32 range first"
)]
fn aqi_from_f64(value: f64) -> Option<i32> {
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32)
}

pub(super) fn decode_geometry(envelope: RawRoutesEnvelope) -> Vec<RouteGeometry> {
    envelope
        .routes
        .unwrap_or_default()
        .into_iter()
        .map(|route| RouteGeometry {
            path: route
                .coordinates
                .iter()
                .filter_map(coordinate_from_value)
                .collect(),
            duration: route.duration,
            distance: route.distance,
            distance_meters: route.distance_value,
        })
        .collect()
}

fn decode_exposure(value: Value) -> Option<RouteExposure> {
    let wire: WireExposure = serde_json::from_value(value)
        .map_err(|e| debug!("Skipping malformed route analysis: {}", e))
        .ok()?;

    let details = wire
        .details
        .iter()
        .filter_map(|detail| {
            let location = coordinate_from_value(detail.get("location")?)?;
            let aqi = aqi_from_f64(detail.get("aqi")?.as_f64()?)?;
            Some(AqiPoint { location, aqi })
        })
        .collect();

    Some(RouteExposure {
        summary: SensorSummary {
            avg_pm25: wire.avg_pm25,
            avg_pm10: wire.avg_pm10,
            avg_co: wire.avg_co,
        },
        details,
    })
}

/// Decode the loosely-shaped analysis envelope.
///
/// Classifications come as `Route_<n>: "best"|"moderate"|"poor"`. The inverse
/// form `best: "Route_<n>"` fills in only routes without a direct entry.
pub(super) fn decode_analysis(body: Map<String, Value>) -> RouteAnalysis {
    let mut analysis = RouteAnalysis::default();

    for (name, value) in &body {
        match name.as_str() {
            "recommended" => {
                analysis.recommended = value.as_str().and_then(RouteKey::parse);
            }
            _ => {
                let Some(key) = RouteKey::parse(name) else {
                    continue;
                };
                match value.as_str().and_then(QualityLabel::from_wire) {
                    Some(label) => {
                        analysis.qualities.insert(key, label);
                    }
                    None => debug!("Ignoring classification {} = {}", name, value),
                }
            }
        }
    }

    for label in [QualityLabel::Best, QualityLabel::Moderate, QualityLabel::Poor] {
        if let Some(key) = body
            .get(label.as_str())
            .and_then(Value::as_str)
            .and_then(RouteKey::parse)
        {
            analysis.qualities.entry(key).or_insert(label);
        }
    }

    if let Some(Value::Object(routes)) = body.get("route_analysis") {
        for (name, value) in routes {
            let Some(key) = RouteKey::parse(name) else {
                debug!("Ignoring route analysis for unknown key '{}'", name);
                continue;
            };
            if let Some(exposure) = decode_exposure(value.clone()) {
                analysis.exposures.insert(key, exposure);
            }
        }
    }

    analysis
}

fn decode_route_forecast(value: Value) -> Option<RouteForecast> {
    let wire: WireRouteForecast = serde_json::from_value(value)
        .map_err(|e| debug!("Skipping malformed route forecast: {}", e))
        .ok()?;

    let points = wire
        .forecast
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<WireForecastEntry>(entry).ok())
        .filter_map(|entry| {
            let aqi = aqi_from_f64(entry.aqi?)?;
            let health = entry.health_info.unwrap_or_default();
            Some(ForecastPoint {
                time: entry.time,
                aqi,
                category: health.category,
                color: health.color,
            })
        })
        .collect();

    Some(RouteForecast {
        points,
        avg_route_aqi: wire.avg_route_aqi,
    })
}

pub(super) fn decode_forecast(envelope: PredictEnvelope) -> Result<ForecastOutcome, BackendError> {
    match envelope.status.as_deref() {
        Some("pending") => return Ok(ForecastOutcome::Pending),
        Some("error") => return Err(BackendError::Rejected("error".to_string())),
        _ => {}
    }

    let mut series = ForecastSeries::new();
    for (name, value) in envelope.route_forecasts.unwrap_or_default() {
        let Some(key) = RouteKey::parse(&name) else {
            debug!("Ignoring forecast for unknown key '{}'", name);
            continue;
        };
        if let Some(forecast) = decode_route_forecast(value) {
            series.insert(key, forecast);
        }
    }
    Ok(ForecastOutcome::Ready(series))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analysis_from(value: Value) -> RouteAnalysis {
        match value {
            Value::Object(map) => decode_analysis(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_geometry_accepts_pairs_and_objects() {
        let envelope: RawRoutesEnvelope = serde_json::from_value(json!({
            "routeCount": 2,
            "routes": [
                {
                    "coordinates": [[12.90, 77.59], [12.95, 77.60]],
                    "duration": "25 mins",
                    "distance": "8.1 km",
                    "distanceValue": 8100
                },
                {
                    "coordinates": [{"lat": 12.90, "lng": 77.59}, "bogus", [200.0, 1.0]],
                    "duration": 1500,
                    "distance": null
                }
            ]
        }))
        .unwrap();

        let routes = decode_geometry(envelope);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].path.len(), 2);
        assert_eq!(routes[0].duration, "25 mins");
        assert_eq!(routes[0].distance_meters, Some(8100));
        assert_eq!(routes[1].path, vec![Coordinate::new(12.90, 77.59)]);
        assert_eq!(routes[1].duration, "1500");
        assert_eq!(routes[1].distance, "");
    }

    #[test]
    fn test_geometry_without_routes_is_empty() {
        let envelope: RawRoutesEnvelope = serde_json::from_value(json!({"routes": null})).unwrap();
        assert!(decode_geometry(envelope).is_empty());
    }

    #[test]
    fn test_analysis_classifications_and_exposures() {
        let analysis = analysis_from(json!({
            "recommended": "Route_1",
            "Route_1": "best",
            "Route_2": "moderate",
            "Route_3": "excellent",
            "route_analysis": {
                "Route_1": {
                    "avg_pm25": 31.5,
                    "avg_pm10": 60.0,
                    "avg_co": 0.4,
                    "details": [
                        {"location": [12.91, 77.59], "aqi": 72.4},
                        {"location": "nowhere", "aqi": 10},
                        {"location": [12.92, 77.59], "aqi": "high"}
                    ]
                },
                "summary": {"avg_pm25": 1.0}
            }
        }));

        assert_eq!(analysis.recommended, Some(RouteKey::from_index(0)));
        assert_eq!(
            analysis.qualities.get(&RouteKey::from_index(0)),
            Some(&QualityLabel::Best)
        );
        assert_eq!(
            analysis.qualities.get(&RouteKey::from_index(1)),
            Some(&QualityLabel::Moderate)
        );
        assert!(!analysis.qualities.contains_key(&RouteKey::from_index(2)));

        let exposure = &analysis.exposures[&RouteKey::from_index(0)];
        assert_eq!(exposure.summary.avg_pm25, Some(31.5));
        assert_eq!(exposure.details.len(), 1);
        assert_eq!(exposure.details[0].aqi, 72);
        assert_eq!(analysis.exposures.len(), 1);
    }

    #[test]
    fn test_analysis_inverse_form_does_not_override() {
        let analysis = analysis_from(json!({
            "best": "Route_2",
            "poor": "Route_1",
            "Route_2": "moderate"
        }));

        assert_eq!(
            analysis.qualities.get(&RouteKey::from_index(1)),
            Some(&QualityLabel::Moderate)
        );
        assert_eq!(
            analysis.qualities.get(&RouteKey::from_index(0)),
            Some(&QualityLabel::Poor)
        );
        assert_eq!(analysis.recommended, None);
    }

    #[test]
    fn test_forecast_ready() {
        let envelope: PredictEnvelope = serde_json::from_value(json!({
            "status": "success",
            "route_forecasts": {
                "Route_1": {
                    "avg_route_aqi": 88.0,
                    "forecast": [
                        {
                            "time": "10:00",
                            "aqi": 80.6,
                            "health_info": {"category": "Satisfactory", "color": "#7ed957"}
                        },
                        {"time": "11:00", "aqi": null}
                    ]
                },
                "Station_A": {"forecast": []}
            }
        }))
        .unwrap();

        let ForecastOutcome::Ready(series) = decode_forecast(envelope).unwrap() else {
            panic!("expected ready forecast");
        };
        assert_eq!(series.len(), 1);
        let forecast = &series[&RouteKey::from_index(0)];
        assert_eq!(forecast.avg_route_aqi, Some(88.0));
        assert_eq!(forecast.points.len(), 1);
        assert_eq!(forecast.points[0].aqi, 81);
        assert_eq!(forecast.points[0].category, "Satisfactory");
    }

    #[test]
    fn test_forecast_pending_and_error() {
        let pending: PredictEnvelope =
            serde_json::from_value(json!({"status": "pending"})).unwrap();
        assert_eq!(decode_forecast(pending).unwrap(), ForecastOutcome::Pending);

        let error: PredictEnvelope = serde_json::from_value(json!({"status": "error"})).unwrap();
        assert!(matches!(
            decode_forecast(error),
            Err(BackendError::Rejected(_))
        ));
    }

    #[test]
    fn test_process_request_field_names() {
        let trip = Trip {
            origin: Coordinate::new(12.90, 77.59),
            destination: Coordinate::new(12.95, 77.60),
        };
        let body = serde_json::to_value(ProcessRequest::from(trip)).unwrap();
        assert_eq!(
            body,
            json!({"sLat": 12.90, "sLon": 77.59, "dLat": 12.95, "dLon": 77.60})
        );
        assert_eq!(raw_route_query(trip)[2], ("dLat", "12.95".to_string()));
    }
}
