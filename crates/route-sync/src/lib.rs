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

//! Route acquisition and selection synchronization for an air-quality
//! routing dashboard.
//!
//! The crate keeps a set of candidate driving routes in sync with a moving
//! origin and a user-chosen destination, joins them with pollution analysis
//! and forecast data from a remote backend, and guarantees that slow or
//! out-of-order responses never overwrite newer state. It is split into
//! layers that can be used independently:
//!
//! - **Controller layer**: [`RouteSyncController`], a synchronous state
//!   machine that returns [`Effect`]s instead of doing I/O
//! - **Backend layer**: the [`Backend`] trait and its REST implementation
//! - **Location layer**: [`LocationTracker`] over pluggable position sources
//! - **Resolver layer**: [`DestinationResolver`] for search input
//! - **Runtime layer**: [`RouteSync`], an async task that drives it all
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use route_sync::{
//!     Coordinate, DestinationQuery, DestinationResolver, FixedSource, HttpBackend,
//!     HttpBackendConfig, LocationTracker, RouteSync, SyncConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let backend = HttpBackend::new(HttpBackendConfig::default()).unwrap();
//!     let mut sync = RouteSync::spawn(
//!         SyncConfig::default(),
//!         Arc::new(backend),
//!         DestinationResolver::default(),
//!     );
//!
//!     sync.track_location(
//!         LocationTracker::default(),
//!         FixedSource::new(Coordinate::new(12.90, 77.59)),
//!     );
//!     sync.set_destination(Coordinate::new(12.95, 77.60));
//!
//!     let mut snapshots = sync.subscribe();
//!     while snapshots.changed().await.is_ok() {
//!         let snapshot = snapshots.borrow_and_update().clone();
//!         for card in snapshot.route_cards() {
//!             println!("{} {} {}", card.name, card.duration, card.label);
//!         }
//!     }
//! }
//! ```
//!
//! # Using the Controller Directly
//!
//! ```
//! use route_sync::{Coordinate, Effect, RouteSyncController, SyncConfig, SyncState};
//!
//! let mut controller = RouteSyncController::new(&SyncConfig::default());
//! controller.set_destination(Coordinate::new(12.95, 77.60));
//! let effects = controller.set_origin(Coordinate::new(12.90, 77.59));
//!
//! assert_eq!(controller.state(), SyncState::Debouncing);
//! assert!(matches!(effects[0], Effect::StartDebounce(_)));
//! ```

pub mod backend;
pub mod controller;
pub mod geo;
pub mod location;
pub mod model;
pub mod resolver;
pub mod runtime;
pub mod selection;
pub mod status;
pub mod view;

use std::time::Duration;

pub use backend::{Backend, BackendError, FetchStage, HttpBackend, HttpBackendConfig, Trip};
pub use controller::{
    Completion, DashboardSnapshot, Effect, FetchGeneration, RouteCard, RouteSyncController,
    SensorPanel, SyncState, ViewportFit,
};
pub use geo::{Bounds, Coordinate, GeoError};
pub use location::{
    ChannelSource, FixedSource, LocationError, LocationTracker, PositionFeed, PositionSource,
    Subscription, TrackReplaySource, TrackerOptions, UnavailableSource,
};
pub use model::{QualityLabel, RouteCandidate, RouteKey};
pub use resolver::{DestinationQuery, DestinationResolver, GoogleGeocoder, GoogleGeocoderConfig};
pub use runtime::RouteSync;
pub use selection::{SelectionError, SelectionState};
pub use status::{StageStatus, SyncStatus};
pub use view::{MapEvent, MapFrame, MapRenderer, RouteListView};

/// Configuration for the route sync controller and its runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Quiet period after the last origin/destination change before fetching.
    pub debounce: Duration,
    /// Timeout applied to every backend call.
    pub request_timeout: Duration,
    /// Forecast polls per cycle while the backend reports it as pending.
    pub forecast_attempts: u32,
    /// Delay between forecast polls.
    pub forecast_retry_delay: Duration,
    /// Diagnostic messages kept in [`SyncStatus`].
    pub max_diagnostics: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(800),
            request_timeout: Duration::from_secs(30),
            forecast_attempts: 3,
            forecast_retry_delay: Duration::from_secs(2),
            max_diagnostics: 50,
        }
    }
}
