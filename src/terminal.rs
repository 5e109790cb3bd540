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

//! Plain-text map and route list.

use std::fmt::Write;

use route_sync::controller::{RouteCard, SensorPanel, ViewportFit};
use route_sync::model::{ForecastLevel, ForecastPoint};
use route_sync::status::{DiagnosticLevel, StageStatus};
use route_sync::{DashboardSnapshot, MapFrame, MapRenderer, RouteListView};

/// Renders the map frame as text into a buffer.
#[derive(Debug, Default)]
pub struct TextMap {
    buffer: String,
}

impl TextMap {
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

impl MapRenderer for TextMap {
    fn render(&mut self, frame: &MapFrame) {
        let out = &mut self.buffer;

        let origin = frame
            .origin
            .map_or_else(|| "unknown".to_string(), |c| c.to_string());
        let destination = frame
            .destination
            .map_or_else(|| "none".to_string(), |c| c.to_string());
        let _ = writeln!(out, "Map  origin {origin}  destination {destination}");

        for route in &frame.routes {
            let _ = writeln!(
                out,
                "  {} Route_{:<3} {:>4} pts  {}{}",
                if route.highlighted { '>' } else { ' ' },
                route.index + 1,
                route.path.len(),
                route.quality,
                if route.is_recommended { "  recommended" } else { "" },
            );
        }

        for marker in &frame.markers {
            let _ = writeln!(
                out,
                "    AQI {:>3} {:<12} at {}",
                marker.aqi,
                marker.band.display_name(),
                marker.location
            );
        }

        match frame.viewport {
            Some(ViewportFit::SelectedRoute(bounds)) => {
                let _ = writeln!(out, "  view: selected route around {}", bounds.center());
            }
            Some(ViewportFit::AllRoutes(bounds)) => {
                let _ = writeln!(out, "  view: all routes around {}", bounds.center());
            }
            None => {}
        }
    }
}

/// Renders route cards and the selected route's panels as text.
#[derive(Debug, Default)]
pub struct TextRouteList {
    buffer: String,
}

impl TextRouteList {
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

fn level_name(level: ForecastLevel) -> &'static str {
    match level {
        ForecastLevel::Low => "low",
        ForecastLevel::Medium => "medium",
        ForecastLevel::High => "high",
    }
}

fn reading(value: Option<f64>) -> String {
    value.map_or_else(|| "--".to_string(), |v| format!("{v:.1}"))
}

impl RouteListView for TextRouteList {
    fn render(&mut self, cards: &[RouteCard], sensor: SensorPanel, forecast: &[ForecastPoint]) {
        let out = &mut self.buffer;

        if cards.is_empty() {
            let _ = writeln!(out, "No routes");
            return;
        }

        for card in cards {
            let _ = writeln!(
                out,
                "{}[{}] {:<8} {:>10} {:>9}  {:<9}{}",
                if card.is_selected { '*' } else { ' ' },
                card.index + 1,
                card.name,
                card.duration,
                card.distance,
                card.label,
                if card.is_recommended { " (recommended)" } else { "" },
            );
        }

        match sensor {
            SensorPanel::NoData => {
                let _ = writeln!(out, "Sensors: no data");
            }
            SensorPanel::Summary(summary) => {
                let _ = writeln!(
                    out,
                    "Sensors: PM2.5 {}  PM10 {}  CO {}",
                    reading(summary.avg_pm25),
                    reading(summary.avg_pm10),
                    reading(summary.avg_co)
                );
            }
        }

        if !forecast.is_empty() {
            let _ = writeln!(out, "Forecast:");
            for point in forecast {
                let _ = writeln!(
                    out,
                    "  {:<6} AQI {:>3}  {} ({})",
                    point.time,
                    point.aqi,
                    point.category,
                    level_name(point.level())
                );
            }
        }
    }
}

fn stage_text(status: &StageStatus) -> String {
    match status {
        StageStatus::Idle => "idle".to_string(),
        StageStatus::Loading => "loading".to_string(),
        StageStatus::Succeeded => "ok".to_string(),
        StageStatus::Pending => "pending".to_string(),
        StageStatus::Failed(error) => format!("failed ({error})"),
        StageStatus::Unavailable => "unavailable".to_string(),
    }
}

/// Status report for the `status` command.
pub fn status_report(snapshot: &DashboardSnapshot, diagnostics: usize) -> String {
    let status = &snapshot.status;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "State: {} (generation {}, {} cycles, {} stale responses dropped)",
        snapshot.state,
        snapshot.generation.value(),
        status.cycles_started,
        status.stale_responses_dropped
    );
    let _ = writeln!(
        out,
        "Geometry: {}  Analysis: {}  Forecast: {}",
        stage_text(&status.geometry),
        stage_text(&status.analysis),
        stage_text(&status.forecast)
    );
    if let Some(ready) = status.last_ready_at {
        let _ = writeln!(out, "Last ready: {}", ready.format("%H:%M:%S"));
    }
    if let Some(error) = &status.location_error {
        let _ = writeln!(out, "Location: {error}");
    }
    if let Some(error) = &status.resolution_error {
        let _ = writeln!(out, "Search: {error}");
    }

    for message in status.recent_diagnostics(diagnostics) {
        let level = match message.level {
            DiagnosticLevel::Info => "INFO",
            DiagnosticLevel::Warning => "WARN",
            DiagnosticLevel::Error => "ERROR",
        };
        let _ = writeln!(
            out,
            "  {} {:<5} {}",
            message.timestamp.format("%H:%M:%S"),
            level,
            message.message
        );
    }
    out
}
