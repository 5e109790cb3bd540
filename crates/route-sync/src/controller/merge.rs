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

//! Joining stage responses onto the route list by [`RouteKey`].

use log::debug;

use crate::backend::{RouteAnalysis, RouteGeometry};
use crate::model::{ForecastSeries, QualityLabel, RouteCandidate, RouteKey};

/// Build a fresh route list from geometry. Labels start as `Unknown`.
pub(super) fn build_candidates(geometries: Vec<RouteGeometry>) -> Vec<RouteCandidate> {
    geometries
        .into_iter()
        .enumerate()
        .map(|(index, geometry)| RouteCandidate {
            key: RouteKey::from_index(index),
            geometry: geometry.path,
            duration_text: geometry.duration,
            distance_text: geometry.distance,
            distance_meters: geometry.distance_meters,
            quality: QualityLabel::Unknown,
            is_recommended: false,
            sensor_summary: None,
            detail_points: Vec::new(),
        })
        .collect()
}

fn route_mut(routes: &mut [RouteCandidate], key: RouteKey) -> Option<&mut RouteCandidate> {
    let route_count = routes.len();
    let route = routes.get_mut(key.index());
    if route.is_none() {
        debug!("Ignoring {} (only {} routes)", key, route_count);
    }
    route
}

/// Apply an analysis response. Keys naming a route outside the list are ignored.
pub(super) fn merge_analysis(routes: &mut [RouteCandidate], analysis: RouteAnalysis) {
    if let Some(key) = analysis.recommended {
        if let Some(route) = route_mut(routes, key) {
            route.is_recommended = true;
        }
    }

    for (key, quality) in analysis.qualities {
        if let Some(route) = route_mut(routes, key) {
            route.quality = quality;
        }
    }

    for (key, exposure) in analysis.exposures {
        if let Some(route) = route_mut(routes, key) {
            route.sensor_summary = Some(exposure.summary);
            route.detail_points = exposure.details;
        }
    }
}

/// Keep only forecasts for routes in the current list.
pub(super) fn merge_forecast(series: ForecastSeries, route_count: usize) -> ForecastSeries {
    series
        .into_iter()
        .filter(|(key, _)| {
            let known = key.index() < route_count;
            if !known {
                debug!("Ignoring forecast for {} (only {} routes)", key, route_count);
            }
            known
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RouteExposure;
    use crate::geo::Coordinate;
    use crate::model::{AqiPoint, RouteForecast, SensorSummary};

    fn geometry(n: usize) -> Vec<RouteGeometry> {
        (0..n)
            .map(|i| RouteGeometry {
                path: vec![Coordinate::new(12.90, 77.59), Coordinate::new(12.95, 77.60)],
                duration: format!("{} mins", 20 + i),
                distance: "7.1 km".to_string(),
                distance_meters: Some(7100),
            })
            .collect()
    }

    #[test]
    fn test_build_candidates_defaults() {
        let routes = build_candidates(geometry(2));
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[1].key, RouteKey::from_index(1));
        assert_eq!(routes[1].duration_text, "21 mins");
        assert!(routes
            .iter()
            .all(|r| r.quality == QualityLabel::Unknown && !r.is_recommended));
    }

    #[test]
    fn test_merge_ignores_unknown_routes() {
        let mut routes = build_candidates(geometry(2));
        let mut analysis = RouteAnalysis {
            recommended: Some(RouteKey::from_index(4)),
            ..Default::default()
        };
        analysis
            .qualities
            .insert(RouteKey::from_index(1), QualityLabel::Poor);
        analysis
            .qualities
            .insert(RouteKey::from_index(2), QualityLabel::Best);
        analysis.exposures.insert(
            RouteKey::from_index(0),
            RouteExposure {
                summary: SensorSummary {
                    avg_pm25: Some(41.0),
                    avg_pm10: Some(80.5),
                    avg_co: None,
                },
                details: vec![AqiPoint {
                    location: Coordinate::new(12.91, 77.59),
                    aqi: 120,
                }],
            },
        );

        merge_analysis(&mut routes, analysis);

        assert!(routes.iter().all(|r| !r.is_recommended));
        assert_eq!(routes[0].quality, QualityLabel::Unknown);
        assert_eq!(routes[1].quality, QualityLabel::Poor);
        assert_eq!(routes[0].detail_points.len(), 1);
        assert_eq!(routes[1].sensor_summary, None);
    }

    #[test]
    fn test_merge_forecast_filters_keys() {
        let mut series = ForecastSeries::new();
        series.insert(RouteKey::from_index(0), RouteForecast::default());
        series.insert(RouteKey::from_index(3), RouteForecast::default());

        let merged = merge_forecast(series, 2);
        assert_eq!(merged.keys().copied().collect::<Vec<_>>(), vec![RouteKey::from_index(0)]);
    }
}
