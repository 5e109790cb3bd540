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

//! Route sync state machine.
//!
//! [`RouteSyncController`] is synchronous and performs no I/O. Every input
//! (origin fix, destination, debounce expiry, stage completion) returns the
//! [`Effect`]s the runtime must carry out: (re)arming the debounce timer,
//! aborting a superseded cycle, or issuing a tagged backend request. Keeping
//! the timing and networking outside makes ordering fully testable.
//!
//! # Stale responses
//!
//! Each cycle is tagged with a [`FetchGeneration`]. A completion is applied
//! only when its generation is the active cycle *and* the cycle is waiting for
//! that stage. An input change only re-arms the debounce timer; the running
//! cycle keeps applying until the timer fires and the next generation
//! replaces it.

mod merge;
mod snapshot;

pub use snapshot::{DashboardSnapshot, RouteCard, SensorPanel, ViewportFit};

use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::backend::{
    BackendError, FetchStage, ForecastOutcome, RouteAnalysis, RouteGeometry, Trip,
};
use crate::geo::Coordinate;
use crate::model::{ForecastSeries, RouteCandidate};
use crate::resolver::ResolutionError;
use crate::selection::{SelectionError, SelectionState};
use crate::status::{StageStatus, SyncStatus};
use crate::SyncConfig;

/// Controller state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// No destination.
    #[default]
    Idle,
    /// Destination set, waiting for the first origin fix.
    AwaitingOriginAndDestination,
    Debouncing,
    FetchingGeometry,
    FetchingAnalysis,
    /// Routes populated (possibly empty), forecast may still be loading.
    Ready,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::AwaitingOriginAndDestination => "awaiting origin",
            Self::Debouncing => "debouncing",
            Self::FetchingGeometry => "fetching routes",
            Self::FetchingAnalysis => "analysing routes",
            Self::Ready => "ready",
        })
    }
}

/// Monotonic fetch cycle counter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FetchGeneration(u64);

impl FetchGeneration {
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for FetchGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies one destination search. Only the latest ticket may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchTicket(u64);

/// A tagged backend request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchRequest {
    pub generation: FetchGeneration,
    pub stage: FetchStage,
    pub trip: Trip,
    /// 1-based; only forecast polling retries.
    pub attempt: u32,
    /// Wait before issuing the request.
    pub delay: Duration,
}

/// Work the runtime performs on behalf of the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Arm the debounce timer, replacing any pending deadline.
    StartDebounce(Duration),
    CancelDebounce,
    /// Abort requests of the superseded cycle. Their responses would be
    /// dropped anyway; this only saves the round trips.
    CancelFetches,
    Fetch(FetchRequest),
}

/// A finished backend request.
#[derive(Debug)]
pub enum Completion {
    Geometry {
        generation: FetchGeneration,
        result: Result<Vec<RouteGeometry>, BackendError>,
    },
    Analysis {
        generation: FetchGeneration,
        result: Result<RouteAnalysis, BackendError>,
    },
    Forecast {
        generation: FetchGeneration,
        attempt: u32,
        result: Result<ForecastOutcome, BackendError>,
    },
}

impl Completion {
    #[must_use]
    pub fn generation(&self) -> FetchGeneration {
        match self {
            Self::Geometry { generation, .. }
            | Self::Analysis { generation, .. }
            | Self::Forecast { generation, .. } => *generation,
        }
    }

    #[must_use]
    pub fn stage(&self) -> FetchStage {
        match self {
            Self::Geometry { .. } => FetchStage::Geometry,
            Self::Analysis { .. } => FetchStage::Analysis,
            Self::Forecast { .. } => FetchStage::Forecast,
        }
    }
}

/// The cycle whose responses may still apply.
#[derive(Debug, Clone, Copy)]
struct ActiveCycle {
    generation: FetchGeneration,
    /// Trip the cycle was issued for; later stages reuse it.
    trip: Trip,
    expected: FetchStage,
    /// Forecast poll being waited for.
    attempt: u32,
}

/// Owns origin, destination, routes, forecast and selection.
#[derive(Debug)]
pub struct RouteSyncController {
    debounce: Duration,
    forecast_attempts: u32,
    forecast_retry_delay: Duration,

    /// Progress of the latest cycle. Never `Debouncing`; see `debounce_armed`.
    state: SyncState,
    debounce_armed: bool,
    origin: Option<Coordinate>,
    destination: Option<Coordinate>,

    generation: FetchGeneration,
    /// `None` once the cycle has finished or was cleared.
    active: Option<ActiveCycle>,

    routes: Vec<RouteCandidate>,
    forecast: ForecastSeries,
    selection: SelectionState,

    search_seq: u64,
    status: SyncStatus,
}

impl RouteSyncController {
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            debounce: config.debounce,
            forecast_attempts: config.forecast_attempts.max(1),
            forecast_retry_delay: config.forecast_retry_delay,
            state: SyncState::Idle,
            debounce_armed: false,
            origin: None,
            destination: None,
            generation: FetchGeneration::default(),
            active: None,
            routes: Vec::new(),
            forecast: ForecastSeries::new(),
            selection: SelectionState::new(),
            search_seq: 0,
            status: SyncStatus::new(config.max_diagnostics),
        }
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        if self.debounce_armed {
            SyncState::Debouncing
        } else {
            self.state
        }
    }

    #[must_use]
    pub fn generation(&self) -> FetchGeneration {
        self.generation
    }

    #[must_use]
    pub fn origin(&self) -> Option<Coordinate> {
        self.origin
    }

    #[must_use]
    pub fn destination(&self) -> Option<Coordinate> {
        self.destination
    }

    #[must_use]
    pub fn routes(&self) -> &[RouteCandidate] {
        &self.routes
    }

    #[must_use]
    pub fn selection(&self) -> Option<usize> {
        self.selection.index()
    }

    #[must_use]
    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// Record a new origin fix.
    pub fn set_origin(&mut self, origin: Coordinate) -> Vec<Effect> {
        if self.origin == Some(origin) {
            return Vec::new();
        }
        self.origin = Some(origin);
        self.inputs_changed()
    }

    /// Replace the destination. Any pending search is superseded.
    pub fn set_destination(&mut self, destination: Coordinate) -> Vec<Effect> {
        self.search_seq += 1;
        self.apply_destination(destination)
    }

    /// Forget the destination and return to `Idle`.
    pub fn clear_destination(&mut self) -> Vec<Effect> {
        self.search_seq += 1;
        self.destination = None;
        self.routes.clear();
        self.forecast.clear();
        self.selection.reset(0);
        self.status.abandon_loading();

        let mut effects = vec![Effect::CancelDebounce];
        if self.active.take().is_some() {
            effects.push(Effect::CancelFetches);
        }
        self.debounce_armed = false;
        self.state = SyncState::Idle;
        info!("Destination cleared");
        effects
    }

    /// Start a destination search and return its ticket.
    pub fn begin_search(&mut self) -> SearchTicket {
        self.search_seq += 1;
        SearchTicket(self.search_seq)
    }

    /// Apply a resolution result if it belongs to the latest search.
    /// A failure is recorded and the current destination is kept.
    pub fn apply_resolution(
        &mut self,
        ticket: SearchTicket,
        result: Result<Coordinate, ResolutionError>,
    ) -> Vec<Effect> {
        if ticket.0 != self.search_seq {
            debug!("Dropping result of superseded search");
            return Vec::new();
        }

        match result {
            Ok(destination) => self.apply_destination(destination),
            Err(e) => {
                self.status.record_resolution_error(e.to_string());
                Vec::new()
            }
        }
    }

    /// Record that the live location source is gone. Routing continues
    /// with the last known origin, if any.
    pub fn location_failed(&mut self, error: &str) {
        self.status.record_location_error(error.to_string());
    }

    /// Change the highlighted route.
    pub fn select(&mut self, index: Option<usize>) -> Result<Option<usize>, SelectionError> {
        let result = self.selection.select(index);
        match &result {
            Ok(selected) => debug!("Selection is now {:?}", selected),
            Err(e) => warn!("Rejected selection: {}", e),
        }
        result
    }

    /// The debounce window closed without further input changes.
    pub fn debounce_elapsed(&mut self) -> Vec<Effect> {
        if !self.debounce_armed {
            return Vec::new();
        }
        self.debounce_armed = false;
        let Some(trip) = self.trip() else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if let Some(superseded) = self.active.take() {
            debug!(
                "Cycle {} superseded while waiting for {}",
                superseded.generation, superseded.expected
            );
            effects.push(Effect::CancelFetches);
        }

        self.generation = self.generation.next();
        self.active = Some(ActiveCycle {
            generation: self.generation,
            trip,
            expected: FetchStage::Geometry,
            attempt: 1,
        });
        self.routes.clear();
        self.forecast.clear();
        self.selection.reset(0);
        self.status.begin_cycle(self.generation.value());
        self.state = SyncState::FetchingGeometry;

        info!(
            "Fetching routes {} from {} to {}",
            self.generation, trip.origin, trip.destination
        );
        effects.extend(self.request(FetchStage::Geometry, 1, Duration::ZERO));
        effects
    }

    /// Apply a finished backend request, or drop it if it is stale.
    pub fn apply(&mut self, completion: Completion) -> Vec<Effect> {
        if !self.accepts(&completion) {
            debug!(
                "Dropping stale {} response for generation {} (current {})",
                completion.stage(),
                completion.generation(),
                self.generation
            );
            self.status.record_stale();
            return Vec::new();
        }

        match completion {
            Completion::Geometry { result, .. } => self.apply_geometry(result),
            Completion::Analysis { result, .. } => self.apply_analysis(result),
            Completion::Forecast {
                attempt, result, ..
            } => self.apply_forecast(attempt, result),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            state: self.state(),
            generation: self.generation,
            origin: self.origin,
            destination: self.destination,
            routes: self.routes.clone(),
            selection: self.selection.index(),
            forecast: self.forecast.clone(),
            status: self.status.clone(),
        }
    }

    fn trip(&self) -> Option<Trip> {
        Some(Trip {
            origin: self.origin?,
            destination: self.destination?,
        })
    }

    fn apply_destination(&mut self, destination: Coordinate) -> Vec<Effect> {
        self.status.resolution_error = None;
        self.destination = Some(destination);
        info!("Destination set to {}", destination);
        self.inputs_changed()
    }

    /// Re-arm the debounce timer. The running cycle, if any, stays active.
    fn inputs_changed(&mut self) -> Vec<Effect> {
        if self.destination.is_none() {
            self.state = SyncState::Idle;
            return Vec::new();
        }
        if self.origin.is_none() {
            self.state = SyncState::AwaitingOriginAndDestination;
            return Vec::new();
        }
        self.debounce_armed = true;
        vec![Effect::StartDebounce(self.debounce)]
    }

    fn accepts(&self, completion: &Completion) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        if active.generation != completion.generation() || active.expected != completion.stage() {
            return false;
        }
        match completion {
            Completion::Forecast { attempt, .. } => active.attempt == *attempt,
            Completion::Geometry { .. } | Completion::Analysis { .. } => true,
        }
    }

    /// Advance the active cycle to `stage` and build its request.
    fn request(&mut self, stage: FetchStage, attempt: u32, delay: Duration) -> Option<Effect> {
        let active = self.active.as_mut()?;
        active.expected = stage;
        active.attempt = attempt;
        Some(Effect::Fetch(FetchRequest {
            generation: active.generation,
            stage,
            trip: active.trip,
            attempt,
            delay,
        }))
    }

    fn finish_cycle(&mut self) {
        self.active = None;
    }

    fn become_ready(&mut self) {
        self.state = SyncState::Ready;
        self.status.record_ready(self.routes.len());
    }

    fn apply_geometry(&mut self, result: Result<Vec<RouteGeometry>, BackendError>) -> Vec<Effect> {
        match result {
            Ok(geometries) => {
                self.routes = merge::build_candidates(geometries);
                self.selection.reset(self.routes.len());
                self.status
                    .set_stage(FetchStage::Geometry, StageStatus::Succeeded);
                info!("Received {} routes", self.routes.len());

                if self.routes.is_empty() {
                    self.finish_cycle();
                    self.become_ready();
                    return Vec::new();
                }

                self.state = SyncState::FetchingAnalysis;
                self.status
                    .set_stage(FetchStage::Analysis, StageStatus::Loading);
                self.request(FetchStage::Analysis, 1, Duration::ZERO)
                    .into_iter()
                    .collect()
            }
            Err(e) => {
                warn!("Route geometry fetch failed: {}", e);
                self.status.stage_failed(FetchStage::Geometry, e.to_string());
                self.status
                    .set_stage(FetchStage::Analysis, StageStatus::Unavailable);
                self.status
                    .set_stage(FetchStage::Forecast, StageStatus::Unavailable);
                self.finish_cycle();
                self.become_ready();
                Vec::new()
            }
        }
    }

    fn apply_analysis(&mut self, result: Result<RouteAnalysis, BackendError>) -> Vec<Effect> {
        match result {
            Ok(analysis) => {
                merge::merge_analysis(&mut self.routes, analysis);
                self.status
                    .set_stage(FetchStage::Analysis, StageStatus::Succeeded);
                self.become_ready();

                self.status
                    .set_stage(FetchStage::Forecast, StageStatus::Loading);
                self.request(FetchStage::Forecast, 1, Duration::ZERO)
                    .into_iter()
                    .collect()
            }
            Err(e) => {
                warn!("Route analysis fetch failed: {}", e);
                self.status.stage_failed(FetchStage::Analysis, e.to_string());
                self.status
                    .set_stage(FetchStage::Forecast, StageStatus::Unavailable);
                self.finish_cycle();
                self.become_ready();
                Vec::new()
            }
        }
    }

    fn apply_forecast(
        &mut self,
        attempt: u32,
        result: Result<ForecastOutcome, BackendError>,
    ) -> Vec<Effect> {
        match result {
            Ok(ForecastOutcome::Ready(series)) => {
                self.forecast = merge::merge_forecast(series, self.routes.len());
                self.status
                    .set_stage(FetchStage::Forecast, StageStatus::Succeeded);
                debug!("Forecast received for {} routes", self.forecast.len());
                self.finish_cycle();
                Vec::new()
            }
            Ok(ForecastOutcome::Pending) if attempt < self.forecast_attempts => {
                debug!(
                    "Forecast pending, polling again (attempt {}/{})",
                    attempt + 1,
                    self.forecast_attempts
                );
                let delay = self.forecast_retry_delay;
                self.request(FetchStage::Forecast, attempt + 1, delay)
                    .into_iter()
                    .collect()
            }
            Ok(ForecastOutcome::Pending) => {
                info!("Forecast still pending after {} attempts", attempt);
                self.status
                    .set_stage(FetchStage::Forecast, StageStatus::Pending);
                self.finish_cycle();
                Vec::new()
            }
            Err(e) => {
                warn!("Route forecast fetch failed: {}", e);
                self.status.stage_failed(FetchStage::Forecast, e.to_string());
                self.finish_cycle();
                Vec::new()
            }
        }
    }
}
