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

//! Async runtime for the route sync controller.
//!
//! A single task owns the [`RouteSyncController`] and processes commands,
//! debounce expiry and backend completions one at a time. Backend calls and
//! destination lookups run in their own tasks and report back over a channel,
//! so the controller is never touched concurrently.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendError, FetchStage};
use crate::controller::{
    Completion, DashboardSnapshot, Effect, FetchRequest, RouteSyncController, SearchTicket,
};
use crate::geo::Coordinate;
use crate::location::{LocationError, LocationTracker, PositionSource, Subscription};
use crate::resolver::{DestinationQuery, DestinationResolver, ResolutionError};
use crate::selection::SelectionError;
use crate::view::MapEvent;
use crate::SyncConfig;

enum Command {
    SetOrigin(Coordinate),
    Search(DestinationQuery),
    SetDestination(Coordinate),
    ClearDestination,
    Select {
        index: Option<usize>,
        reply: oneshot::Sender<Result<Option<usize>, SelectionError>>,
    },
    LocationFailed(LocationError),
}

enum TaskResult {
    Fetched(Completion),
    Resolved {
        ticket: SearchTicket,
        result: Result<Coordinate, ResolutionError>,
    },
}

/// Handle to a running route sync controller.
///
/// Commands are processed in order by a background task. Every state change
/// is published as a [`DashboardSnapshot`] on a watch channel shared by the
/// map and the route list. Dropping the handle stops the task, aborts
/// in-flight requests and releases the location subscription.
pub struct RouteSync {
    command_tx: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<DashboardSnapshot>,
    cancel_token: CancellationToken,
    location: Option<Subscription>,
}

impl std::fmt::Debug for RouteSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSync")
            .field("cancel_token", &self.cancel_token)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl RouteSync {
    /// Spawn the controller task on the current tokio runtime.
    #[must_use]
    pub fn spawn(
        config: SyncConfig,
        backend: Arc<dyn Backend>,
        resolver: DestinationResolver,
    ) -> Self {
        let controller = RouteSyncController::new(&config);
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let actor = SyncActor {
            controller,
            backend,
            resolver,
            request_timeout: config.request_timeout,
            snapshot_tx,
            debounce_deadline: None,
            cycle_token: cancel_token.child_token(),
            cancel_token: cancel_token.clone(),
        };
        tokio::spawn(sync_loop(actor, command_rx));

        Self {
            command_tx,
            snapshot_rx,
            cancel_token,
            location: None,
        }
    }

    /// Follow a live position source. Replaces any previous subscription.
    pub fn track_location<S: PositionSource>(&mut self, tracker: LocationTracker, source: S) {
        let update_tx = self.command_tx.clone();
        let error_tx = self.command_tx.clone();

        let subscription = tracker.start(
            source,
            move |origin| {
                let _ = update_tx.send(Command::SetOrigin(origin));
            },
            move |error| {
                let _ = error_tx.send(Command::LocationFailed(error));
            },
        );

        if let Some(previous) = self.location.replace(subscription) {
            LocationTracker::stop(previous);
        }
    }

    /// Stop following the position source.
    pub fn stop_tracking(&mut self) {
        if let Some(subscription) = self.location.take() {
            LocationTracker::stop(subscription);
        }
    }

    /// Set the origin manually.
    pub fn set_origin(&self, origin: Coordinate) {
        self.send(Command::SetOrigin(origin));
    }

    /// Resolve `query` and use it as destination if it is still the latest search.
    pub fn search(&self, query: DestinationQuery) {
        self.send(Command::Search(query));
    }

    pub fn set_destination(&self, destination: Coordinate) {
        self.send(Command::SetDestination(destination));
    }

    pub fn clear_destination(&self) {
        self.send(Command::ClearDestination);
    }

    /// Change the highlighted route (toggles when `index` is already selected).
    ///
    /// Resolves after the new selection has been published.
    pub async fn select(&self, index: Option<usize>) -> Result<Option<usize>, SelectionError> {
        let (reply, response) = oneshot::channel();
        self.command_tx
            .send(Command::Select { index, reply })
            .map_err(|_closed| SelectionError::Closed)?;
        response.await.map_err(|_closed| SelectionError::Closed)?
    }

    /// Route a map interaction into the selection.
    pub async fn handle_map_event(
        &self,
        event: MapEvent,
    ) -> Result<Option<usize>, SelectionError> {
        match event {
            MapEvent::RouteTapped { index } => self.select(Some(index)).await,
        }
    }

    /// Subscribe to published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancel_token.is_cancelled() && !self.command_tx.is_closed()
    }

    /// Stop the controller task and everything it started.
    pub fn shutdown(&mut self) {
        self.stop_tracking();
        self.cancel_token.cancel();
    }

    fn send(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            debug!("Route sync task has stopped, dropping command");
        }
    }
}

impl Drop for RouteSync {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

struct SyncActor {
    controller: RouteSyncController,
    backend: Arc<dyn Backend>,
    resolver: DestinationResolver,
    request_timeout: Duration,
    snapshot_tx: watch::Sender<DashboardSnapshot>,
    debounce_deadline: Option<Instant>,
    /// Aborts the requests of the current fetch cycle.
    cycle_token: CancellationToken,
    cancel_token: CancellationToken,
}

async fn sync_loop(mut actor: SyncActor, mut command_rx: mpsc::UnboundedReceiver<Command>) {
    let (task_tx, mut task_rx) = mpsc::unbounded_channel();
    let cancel_token = actor.cancel_token.clone();

    loop {
        let debounce_deadline = actor.debounce_deadline;

        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Route sync stopped");
                break;
            }
            command = command_rx.recv() => {
                let Some(command) = command else {
                    info!("Route sync handle dropped");
                    break;
                };
                actor.handle_command(command, &task_tx);
            }
            Some(result) = task_rx.recv() => {
                actor.handle_task_result(result, &task_tx);
            }
            () = tokio::time::sleep_until(debounce_deadline.unwrap_or_else(Instant::now)),
                if debounce_deadline.is_some() =>
            {
                actor.debounce_deadline = None;
                let effects = actor.controller.debounce_elapsed();
                actor.run_effects(effects, &task_tx);
                actor.publish();
            }
        }
    }

    actor.cycle_token.cancel();
}

impl SyncActor {
    fn handle_command(&mut self, command: Command, task_tx: &mpsc::UnboundedSender<TaskResult>) {
        let effects = match command {
            Command::SetOrigin(origin) => self.controller.set_origin(origin),
            Command::SetDestination(destination) => self.controller.set_destination(destination),
            Command::ClearDestination => self.controller.clear_destination(),
            Command::Search(query) => {
                let ticket = self.controller.begin_search();
                self.spawn_resolution(ticket, query, task_tx);
                Vec::new()
            }
            Command::Select { index, reply } => {
                let result = self.controller.select(index);
                self.publish();
                let _ = reply.send(result);
                return;
            }
            Command::LocationFailed(error) => {
                self.controller.location_failed(&error.to_string());
                Vec::new()
            }
        };

        self.run_effects(effects, task_tx);
        self.publish();
    }

    fn handle_task_result(
        &mut self,
        result: TaskResult,
        task_tx: &mpsc::UnboundedSender<TaskResult>,
    ) {
        let effects = match result {
            TaskResult::Fetched(completion) => self.controller.apply(completion),
            TaskResult::Resolved { ticket, result } => {
                self.controller.apply_resolution(ticket, result)
            }
        };
        self.run_effects(effects, task_tx);
        self.publish();
    }

    fn run_effects(&mut self, effects: Vec<Effect>, task_tx: &mpsc::UnboundedSender<TaskResult>) {
        for effect in effects {
            match effect {
                Effect::StartDebounce(delay) => {
                    self.debounce_deadline = Some(Instant::now() + delay);
                }
                Effect::CancelDebounce => self.debounce_deadline = None,
                Effect::CancelFetches => {
                    self.cycle_token.cancel();
                    self.cycle_token = self.cancel_token.child_token();
                }
                Effect::Fetch(request) => self.spawn_fetch(request, task_tx),
            }
        }
    }

    fn spawn_fetch(&self, request: FetchRequest, task_tx: &mpsc::UnboundedSender<TaskResult>) {
        let backend = Arc::clone(&self.backend);
        let timeout = self.request_timeout;
        let token = self.cycle_token.clone();
        let task_tx = task_tx.clone();

        debug!(
            "Requesting {} for generation {} (attempt {})",
            request.stage, request.generation, request.attempt
        );

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    debug!(
                        "Aborted {} request for generation {}",
                        request.stage, request.generation
                    );
                }
                completion = fetch(backend.as_ref(), request, timeout) => {
                    let _ = task_tx.send(TaskResult::Fetched(completion));
                }
            }
        });
    }

    fn spawn_resolution(
        &self,
        ticket: SearchTicket,
        query: DestinationQuery,
        task_tx: &mpsc::UnboundedSender<TaskResult>,
    ) {
        let resolver = self.resolver.clone();
        let token = self.cancel_token.clone();
        let task_tx = task_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                result = resolver.resolve(&query) => {
                    let _ = task_tx.send(TaskResult::Resolved { ticket, result });
                }
            }
        });
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.controller.snapshot());
    }
}

async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(BackendError::Timeout))
}

async fn fetch(backend: &dyn Backend, request: FetchRequest, timeout: Duration) -> Completion {
    if !request.delay.is_zero() {
        tokio::time::sleep(request.delay).await;
    }

    let generation = request.generation;
    let trip = request.trip;

    match request.stage {
        FetchStage::Geometry => Completion::Geometry {
            generation,
            result: with_timeout(timeout, backend.route_geometry(trip)).await,
        },
        FetchStage::Analysis => Completion::Analysis {
            generation,
            result: with_timeout(timeout, backend.route_analysis(trip)).await,
        },
        FetchStage::Forecast => Completion::Forecast {
            generation,
            attempt: request.attempt,
            result: with_timeout(timeout, backend.route_forecast()).await,
        },
    }
}
