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

//! Presentation seams.
//!
//! Renderers only consume snapshots and report taps back as [`MapEvent`]s.

use crate::controller::{DashboardSnapshot, RouteCard, SensorPanel, ViewportFit};
use crate::geo::Coordinate;
use crate::model::{AqiBand, ForecastPoint, QualityLabel};

/// One polyline on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRoute {
    pub index: usize,
    pub path: Vec<Coordinate>,
    pub quality: QualityLabel,
    pub is_recommended: bool,
    pub highlighted: bool,
}

/// AQI marker of the selected route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapMarker {
    pub location: Coordinate,
    pub aqi: i32,
    pub band: AqiBand,
}

/// Everything the map draws for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFrame {
    pub routes: Vec<MapRoute>,
    pub markers: Vec<MapMarker>,
    pub origin: Option<Coordinate>,
    pub destination: Option<Coordinate>,
    pub viewport: Option<ViewportFit>,
}

impl MapFrame {
    #[must_use]
    pub fn from_snapshot(snapshot: &DashboardSnapshot) -> Self {
        let routes = snapshot
            .routes
            .iter()
            .map(|route| MapRoute {
                index: route.index(),
                path: route.geometry.clone(),
                quality: route.quality,
                is_recommended: route.is_recommended,
                highlighted: snapshot.selection == Some(route.index()),
            })
            .collect();

        let markers = snapshot
            .aqi_markers()
            .iter()
            .map(|point| MapMarker {
                location: point.location,
                aqi: point.aqi,
                band: point.band(),
            })
            .collect();

        Self {
            routes,
            markers,
            origin: snapshot.origin,
            destination: snapshot.destination,
            viewport: snapshot.viewport(),
        }
    }
}

/// User interaction on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEvent {
    RouteTapped { index: usize },
}

/// Draws route polylines and markers.
pub trait MapRenderer {
    fn render(&mut self, frame: &MapFrame);
}

/// Draws the route cards and the selected route's panels.
pub trait RouteListView {
    fn render(&mut self, cards: &[RouteCard], sensor: SensorPanel, forecast: &[ForecastPoint]);
}

/// Push one snapshot to both consumers.
pub fn present(
    snapshot: &DashboardSnapshot,
    map: &mut dyn MapRenderer,
    list: &mut dyn RouteListView,
) {
    map.render(&MapFrame::from_snapshot(snapshot));
    list.render(
        &snapshot.route_cards(),
        snapshot.sensor_panel(),
        snapshot.forecast_points(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AqiPoint, RouteCandidate, RouteKey};

    #[derive(Default)]
    struct RecordingMap(Vec<MapFrame>);

    impl MapRenderer for RecordingMap {
        fn render(&mut self, frame: &MapFrame) {
            self.0.push(frame.clone());
        }
    }

    #[derive(Default)]
    struct RecordingList(Vec<Vec<RouteCard>>);

    impl RouteListView for RecordingList {
        fn render(
            &mut self,
            cards: &[RouteCard],
            _sensor: SensorPanel,
            _forecast: &[ForecastPoint],
        ) {
            self.0.push(cards.to_vec());
        }
    }

    #[test]
    fn test_both_views_see_same_selection() {
        let route = |index: usize| RouteCandidate {
            key: RouteKey::from_index(index),
            geometry: vec![Coordinate::new(12.90, 77.59), Coordinate::new(12.95, 77.60)],
            duration_text: "18 mins".to_string(),
            distance_text: "6.2 km".to_string(),
            distance_meters: Some(6200),
            quality: QualityLabel::Moderate,
            is_recommended: false,
            sensor_summary: None,
            detail_points: vec![AqiPoint {
                location: Coordinate::new(12.93, 77.60),
                aqi: 210,
            }],
        };
        let snapshot = DashboardSnapshot {
            routes: vec![route(0), route(1)],
            selection: Some(1),
            ..Default::default()
        };

        let mut map = RecordingMap::default();
        let mut list = RecordingList::default();
        present(&snapshot, &mut map, &mut list);

        let frame = &map.0[0];
        assert!(!frame.routes[0].highlighted);
        assert!(frame.routes[1].highlighted);
        assert_eq!(frame.markers.len(), 1);
        assert_eq!(frame.markers[0].band, AqiBand::Poor);

        let cards = &list.0[0];
        assert!(cards[1].is_selected && !cards[0].is_selected);
    }
}
