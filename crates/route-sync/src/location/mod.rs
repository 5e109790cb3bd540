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

//! Live origin tracking.
//!
//! [`LocationTracker`] drives a [`PositionSource`] in a background task and
//! reports each actual position change to a callback. It only reports
//! coordinates; recentering the map is the renderer's concern.

mod sources;

pub use sources::{ChannelSource, FixedSource, PositionFeed, TrackReplaySource, UnavailableSource};

use async_trait::async_trait;
use log::{info, warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::geo::Coordinate;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location source unavailable: {0}")]
    Unavailable(String),

    #[error("location permission denied")]
    PermissionDenied,

    #[error("timed out waiting for a position fix")]
    Timeout,
}

impl LocationError {
    /// Transient errors are logged and tracking continues.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Options passed to a source when tracking starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRequest {
    pub high_accuracy: bool,
}

/// A continuous position stream (GPS, replayed track, test feed).
#[async_trait]
pub trait PositionSource: Send + 'static {
    /// Prepare the source. An error here means the source is unavailable.
    async fn open(&mut self, request: PositionRequest) -> Result<(), LocationError>;

    /// Wait for the next fix. `None` ends the stream.
    async fn next_fix(&mut self) -> Option<Result<Coordinate, LocationError>>;
}

/// Tracker options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerOptions {
    /// Minimum movement before a new fix is reported. Zero reports every change.
    pub min_movement_meters: f64,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            min_movement_meters: 0.0,
        }
    }
}

/// Handle to a running location subscription. Dropping it stops tracking.
#[derive(Debug)]
pub struct Subscription {
    cancel_token: CancellationToken,
}

impl Subscription {
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancel_token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Starts and stops location subscriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationTracker {
    options: TrackerOptions,
}

impl LocationTracker {
    #[must_use]
    pub fn new(options: TrackerOptions) -> Self {
        Self { options }
    }

    /// Start tracking `source` on the current tokio runtime.
    ///
    /// `on_update` receives each position change at most once. `on_error` is
    /// called at most once, when the source is unavailable or fails
    /// permanently; no updates follow it.
    pub fn start<S, U, E>(&self, source: S, on_update: U, on_error: E) -> Subscription
    where
        S: PositionSource,
        U: FnMut(Coordinate) + Send + 'static,
        E: FnOnce(LocationError) + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let task_cancel = cancel_token.clone();
        let options = self.options;

        tokio::spawn(async move {
            tokio::select! {
                () = task_cancel.cancelled() => {}
                () = tracking_loop(source, options, on_update, on_error) => {}
            }
        });

        Subscription { cancel_token }
    }

    /// Stop a subscription and release the underlying position stream.
    pub fn stop(subscription: Subscription) {
        drop(subscription);
    }
}

async fn tracking_loop<S, U, E>(
    mut source: S,
    options: TrackerOptions,
    mut on_update: U,
    on_error: E,
)
where
    S: PositionSource,
    U: FnMut(Coordinate) + Send + 'static,
    E: FnOnce(LocationError) + Send + 'static,
{
    if let Err(e) = source.open(PositionRequest { high_accuracy: true }).await {
        warn!("Location tracking unavailable: {}", e);
        on_error(e);
        return;
    }

    let mut last: Option<Coordinate> = None;

    while let Some(fix) = source.next_fix().await {
        match fix {
            Ok(position) => {
                if !is_movement(last, position, options.min_movement_meters) {
                    continue;
                }
                last = Some(position);
                on_update(position);
            }
            Err(e) if e.is_transient() => {
                warn!("Transient location error: {}", e);
            }
            Err(e) => {
                warn!("Location tracking stopped: {}", e);
                on_error(e);
                return;
            }
        }
    }

    info!("Location source ended");
}

fn is_movement(last: Option<Coordinate>, next: Coordinate, min_movement_meters: f64) -> bool {
    match last {
        None => true,
        Some(last) if last == next => false,
        Some(last) => last.distance_meters(&next) >= min_movement_meters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_is_movement() {
        let a = Coordinate::new(12.90, 77.59);
        let b = Coordinate::new(12.9001, 77.59);
        assert!(is_movement(None, a, 0.0));
        assert!(!is_movement(Some(a), a, 0.0));
        assert!(is_movement(Some(a), b, 0.0));
        // ~11 meters apart
        assert!(!is_movement(Some(a), b, 50.0));
    }

    #[tokio::test]
    async fn test_duplicate_fixes_reported_once() {
        let (feed, source) = ChannelSource::new();
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let errors = Arc::new(Mutex::new(0));
        let error_sink = Arc::clone(&errors);

        let tracker = LocationTracker::default();
        let subscription = tracker.start(
            source,
            move |c| sink.lock().unwrap().push(c),
            move |_e| *error_sink.lock().unwrap() += 1,
        );

        let a = Coordinate::new(12.90, 77.59);
        let b = Coordinate::new(12.91, 77.59);
        feed.push(a);
        feed.push(a);
        feed.fail(LocationError::Timeout);
        feed.push(b);
        drop(feed);

        // Let the tracking task drain the feed
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        assert_eq!(*updates.lock().unwrap(), vec![a, b]);
        assert_eq!(*errors.lock().unwrap(), 0);
        LocationTracker::stop(subscription);
    }

    #[tokio::test]
    async fn test_unavailable_source_reports_once() {
        let updates = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&updates);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let error_sink = Arc::clone(&errors);

        let subscription = LocationTracker::default().start(
            UnavailableSource::new("no GPS"),
            move |_c| *sink.lock().unwrap() += 1,
            move |e| error_sink.lock().unwrap().push(e),
        );

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(*updates.lock().unwrap(), 0);
        assert_eq!(
            *errors.lock().unwrap(),
            vec![LocationError::Unavailable("no GPS".to_string())]
        );
        drop(subscription);
    }

    #[tokio::test]
    async fn test_permanent_error_stops_updates() {
        let (feed, source) = ChannelSource::new();
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let errors = Arc::new(Mutex::new(0));
        let error_sink = Arc::clone(&errors);

        let _subscription = LocationTracker::default().start(
            source,
            move |c| sink.lock().unwrap().push(c),
            move |_e| *error_sink.lock().unwrap() += 1,
        );

        feed.fail(LocationError::PermissionDenied);
        feed.push(Coordinate::new(1.0, 1.0));

        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        assert!(updates.lock().unwrap().is_empty());
        assert_eq!(*errors.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stop_releases_source() {
        let (feed, source) = ChannelSource::new();
        let subscription = LocationTracker::default().start(source, |_c| {}, |_e| {});
        assert!(subscription.is_active());

        LocationTracker::stop(subscription);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(feed.is_closed());
    }
}
