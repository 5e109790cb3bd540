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

//! Route and air-quality domain types.
//!
//! Three independent backend responses (geometry, analysis, forecast) are joined
//! on the `Route_<n>` name. [`RouteKey`] is that join key in typed form: it is
//! created from the geometry index and parsed from analysis/forecast names.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geo::{Bounds, Coordinate};

const ROUTE_KEY_PREFIX: &str = "Route_";

/// Stable 0-based route index, rendered on the wire as `Route_<index + 1>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteKey(usize);

impl RouteKey {
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Parse a wire name such as `Route_2`. Returns `None` for anything else,
    /// including `Route_0` since wire names are 1-based.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let digits = name.strip_prefix(ROUTE_KEY_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let ordinal: usize = digits.parse().ok()?;
        ordinal.checked_sub(1).map(Self)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ROUTE_KEY_PREFIX}{}", self.0 + 1)
    }
}

impl FromStr for RouteKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("not a route name: {s}"))
    }
}

/// Backend-assigned pollution exposure rating for a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLabel {
    Best,
    Moderate,
    Poor,
    /// No classification received for this route. Never inferred from partial data.
    #[default]
    Unknown,
}

impl QualityLabel {
    /// Decode a classification value. Only the three backend ratings are accepted.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "best" => Some(Self::Best),
            "moderate" => Some(Self::Moderate),
            "poor" => Some(Self::Poor),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Moderate => "moderate",
            Self::Poor => "poor",
            Self::Unknown => "unknown",
        }
    }

    /// Card caption.
    #[must_use]
    pub const fn caption(self) -> &'static str {
        match self {
            Self::Best => "BEST",
            Self::Moderate => "MODERATE",
            Self::Poor => "POOR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Average pollutant readings along a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSummary {
    pub avg_pm25: Option<f64>,
    pub avg_pm10: Option<f64>,
    pub avg_co: Option<f64>,
}

/// AQI sample at a point along a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AqiPoint {
    pub location: Coordinate,
    pub aqi: i32,
}

impl AqiPoint {
    #[must_use]
    pub fn band(&self) -> AqiBand {
        AqiBand::from_aqi(self.aqi)
    }
}

/// AQI category bands used to color markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AqiBand {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    VeryPoor,
    Severe,
}

impl AqiBand {
    #[must_use]
    pub const fn from_aqi(aqi: i32) -> Self {
        match aqi {
            i32::MIN..=50 => Self::Good,
            51..=100 => Self::Satisfactory,
            101..=200 => Self::Moderate,
            201..=300 => Self::Poor,
            301..=400 => Self::VeryPoor,
            _ => Self::Severe,
        }
    }

    /// Hex color for the band.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Good => "#007f2e",
            Self::Satisfactory => "#7ed957",
            Self::Moderate => "#ffe600",
            Self::Poor => "#ff9900",
            Self::VeryPoor => "#ff0000",
            Self::Severe => "#7e0023",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Satisfactory => "Satisfactory",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
            Self::Severe => "Severe",
        }
    }
}

/// Coarse forecast severity for chart bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForecastLevel {
    Low,
    Medium,
    High,
}

/// One hourly forecast sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub time: String,
    pub aqi: i32,
    pub category: String,
    pub color: String,
}

impl ForecastPoint {
    #[must_use]
    pub fn level(&self) -> ForecastLevel {
        match self.category.as_str() {
            "Satisfactory" => ForecastLevel::Low,
            "Moderate" => ForecastLevel::Medium,
            _ => ForecastLevel::High,
        }
    }
}

/// Forecast for a single route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteForecast {
    pub points: Vec<ForecastPoint>,
    pub avg_route_aqi: Option<f64>,
}

/// Forecasts keyed by route.
pub type ForecastSeries = BTreeMap<RouteKey, RouteForecast>;

/// One drivable path with its geometry, timing and air-quality data.
///
/// `sensor_summary` and `detail_points` always come from the same fetch
/// generation as `geometry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidate {
    pub key: RouteKey,
    pub geometry: Vec<Coordinate>,
    pub duration_text: String,
    pub distance_text: String,
    pub distance_meters: Option<u64>,
    pub quality: QualityLabel,
    pub is_recommended: bool,
    pub sensor_summary: Option<SensorSummary>,
    pub detail_points: Vec<AqiPoint>,
}

impl RouteCandidate {
    #[must_use]
    pub fn index(&self) -> usize {
        self.key.index()
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.key.to_string()
    }

    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_key_names() {
        assert_eq!(RouteKey::from_index(0).to_string(), "Route_1");
        assert_eq!(RouteKey::parse("Route_1"), Some(RouteKey::from_index(0)));
        assert_eq!(RouteKey::parse("Route_12"), Some(RouteKey::from_index(11)));
        assert_eq!(RouteKey::parse("Route_0"), None);
        assert_eq!(RouteKey::parse("Route_"), None);
        assert_eq!(RouteKey::parse("Route_1a"), None);
        assert_eq!(RouteKey::parse("route_1"), None);
        assert_eq!(RouteKey::parse("recommended"), None);
    }

    #[test]
    fn test_quality_label_from_wire() {
        assert_eq!(QualityLabel::from_wire("best"), Some(QualityLabel::Best));
        assert_eq!(QualityLabel::from_wire("poor"), Some(QualityLabel::Poor));
        assert_eq!(QualityLabel::from_wire("BEST"), None);
        assert_eq!(QualityLabel::from_wire("unknown"), None);
        assert_eq!(QualityLabel::default(), QualityLabel::Unknown);
    }

    #[test]
    fn test_aqi_band_boundaries() {
        assert_eq!(AqiBand::from_aqi(50), AqiBand::Good);
        assert_eq!(AqiBand::from_aqi(51), AqiBand::Satisfactory);
        assert_eq!(AqiBand::from_aqi(200), AqiBand::Moderate);
        assert_eq!(AqiBand::from_aqi(300), AqiBand::Poor);
        assert_eq!(AqiBand::from_aqi(400), AqiBand::VeryPoor);
        assert_eq!(AqiBand::from_aqi(401), AqiBand::Severe);
        assert_eq!(AqiBand::from_aqi(401).color(), "#7e0023");
    }

    #[test]
    fn test_forecast_level() {
        let mut point = ForecastPoint {
            time: "10:00".to_string(),
            aqi: 80,
            category: "Satisfactory".to_string(),
            color: "#7ed957".to_string(),
        };
        assert_eq!(point.level(), ForecastLevel::Low);
        point.category = "Moderate".to_string();
        assert_eq!(point.level(), ForecastLevel::Medium);
        point.category = "Very Poor".to_string();
        assert_eq!(point.level(), ForecastLevel::High);
    }
}
