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

//! Published controller state and the views derived from it.
//!
//! Markers, forecast, sensor panel, viewport and cards are computed on demand
//! from the snapshot; none of them is stored separately.

use super::{FetchGeneration, SyncState};
use crate::geo::{Bounds, Coordinate};
use crate::model::{
    AqiPoint, ForecastPoint, ForecastSeries, QualityLabel, RouteCandidate, RouteForecast,
    SensorSummary,
};
use crate::status::SyncStatus;

/// Immutable copy of the controller state handed to renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub state: SyncState,
    pub generation: FetchGeneration,
    pub origin: Option<Coordinate>,
    pub destination: Option<Coordinate>,
    pub routes: Vec<RouteCandidate>,
    pub selection: Option<usize>,
    pub forecast: ForecastSeries,
    pub status: SyncStatus,
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        Self {
            state: SyncState::Idle,
            generation: FetchGeneration::default(),
            origin: None,
            destination: None,
            routes: Vec::new(),
            selection: None,
            forecast: ForecastSeries::new(),
            status: SyncStatus::default(),
        }
    }
}

/// Sensor readings panel content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorPanel {
    NoData,
    Summary(SensorSummary),
}

/// Region the map should fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportFit {
    SelectedRoute(Bounds),
    AllRoutes(Bounds),
}

impl ViewportFit {
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        match self {
            Self::SelectedRoute(bounds) | Self::AllRoutes(bounds) => *bounds,
        }
    }
}

/// Route list entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteCard {
    pub index: usize,
    pub name: String,
    pub duration: String,
    pub distance: String,
    pub quality: QualityLabel,
    pub label: &'static str,
    pub is_recommended: bool,
    pub is_selected: bool,
}

impl DashboardSnapshot {
    #[must_use]
    pub fn selected_route(&self) -> Option<&RouteCandidate> {
        self.selection.and_then(|index| self.routes.get(index))
    }

    /// AQI markers of the selected route. Unselected routes never show markers.
    #[must_use]
    pub fn aqi_markers(&self) -> &[AqiPoint] {
        self.selected_route()
            .map_or(&[], |route| route.detail_points.as_slice())
    }

    #[must_use]
    pub fn selected_forecast(&self) -> Option<&RouteForecast> {
        self.selected_route()
            .and_then(|route| self.forecast.get(&route.key))
    }

    /// Chart points for the selected route; empty without selection or data.
    #[must_use]
    pub fn forecast_points(&self) -> &[ForecastPoint] {
        self.selected_forecast()
            .map_or(&[], |forecast| forecast.points.as_slice())
    }

    #[must_use]
    pub fn sensor_panel(&self) -> SensorPanel {
        self.selected_route()
            .and_then(|route| route.sensor_summary)
            .map_or(SensorPanel::NoData, SensorPanel::Summary)
    }

    #[must_use]
    pub fn viewport(&self) -> Option<ViewportFit> {
        if let Some(route) = self.selected_route() {
            return route.bounds().map(ViewportFit::SelectedRoute);
        }

        self.routes
            .iter()
            .filter_map(RouteCandidate::bounds)
            .reduce(|mut all, bounds| {
                all.union(&bounds);
                all
            })
            .map(ViewportFit::AllRoutes)
    }

    #[must_use]
    pub fn route_cards(&self) -> Vec<RouteCard> {
        self.routes
            .iter()
            .map(|route| RouteCard {
                index: route.index(),
                name: route.name(),
                duration: route.duration_text.clone(),
                distance: route.distance_text.clone(),
                quality: route.quality,
                label: route.quality.caption(),
                is_recommended: route.is_recommended,
                is_selected: self.selection == Some(route.index()),
            })
            .collect()
    }

    #[must_use]
    pub fn recommended_route(&self) -> Option<&RouteCandidate> {
        self.routes.iter().find(|route| route.is_recommended)
    }

    /// Whether a fetch cycle is still running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        !matches!(self.state, SyncState::Idle | SyncState::Ready)
            || self.status.forecast.is_loading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RouteKey;

    fn route(index: usize, path: Vec<Coordinate>) -> RouteCandidate {
        RouteCandidate {
            key: RouteKey::from_index(index),
            geometry: path,
            duration_text: "20 mins".to_string(),
            distance_text: "7 km".to_string(),
            distance_meters: None,
            quality: QualityLabel::Unknown,
            is_recommended: false,
            sensor_summary: None,
            detail_points: Vec::new(),
        }
    }

    fn snapshot() -> DashboardSnapshot {
        let mut first = route(
            0,
            vec![Coordinate::new(12.90, 77.59), Coordinate::new(12.95, 77.60)],
        );
        first.detail_points = vec![AqiPoint {
            location: Coordinate::new(12.92, 77.59),
            aqi: 75,
        }];
        first.sensor_summary = Some(SensorSummary {
            avg_pm25: Some(30.0),
            avg_pm10: Some(60.0),
            avg_co: Some(0.4),
        });
        let second = route(
            1,
            vec![Coordinate::new(12.88, 77.57), Coordinate::new(12.95, 77.62)],
        );

        let mut forecast = ForecastSeries::new();
        forecast.insert(
            RouteKey::from_index(0),
            RouteForecast {
                points: vec![ForecastPoint {
                    time: "10:00".to_string(),
                    aqi: 90,
                    category: "Satisfactory".to_string(),
                    color: "#7ed957".to_string(),
                }],
                avg_route_aqi: Some(90.0),
            },
        );

        DashboardSnapshot {
            state: SyncState::Ready,
            routes: vec![first, second],
            forecast,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_selection_hides_details() {
        let snapshot = snapshot();
        assert!(snapshot.aqi_markers().is_empty());
        assert!(snapshot.forecast_points().is_empty());
        assert_eq!(snapshot.sensor_panel(), SensorPanel::NoData);

        let Some(ViewportFit::AllRoutes(bounds)) = snapshot.viewport() else {
            panic!("expected all-routes viewport");
        };
        assert!((bounds.south - 12.88).abs() < 1e-9);
        assert!((bounds.east - 77.62).abs() < 1e-9);
    }

    #[test]
    fn test_selection_drives_views() {
        let mut snapshot = snapshot();
        snapshot.selection = Some(0);

        assert_eq!(snapshot.aqi_markers().len(), 1);
        assert_eq!(snapshot.forecast_points().len(), 1);
        assert!(matches!(snapshot.sensor_panel(), SensorPanel::Summary(_)));
        assert!(matches!(
            snapshot.viewport(),
            Some(ViewportFit::SelectedRoute(_))
        ));

        let cards = snapshot.route_cards();
        assert!(cards[0].is_selected);
        assert!(!cards[1].is_selected);
        assert_eq!(cards[1].label, "UNKNOWN");
    }

    #[test]
    fn test_selected_route_without_forecast() {
        let mut snapshot = snapshot();
        snapshot.selection = Some(1);
        assert!(snapshot.forecast_points().is_empty());
        assert_eq!(snapshot.sensor_panel(), SensorPanel::NoData);
    }

    #[test]
    fn test_empty_snapshot_has_no_viewport() {
        assert_eq!(DashboardSnapshot::default().viewport(), None);
        assert!(!DashboardSnapshot::default().is_loading());
    }
}
