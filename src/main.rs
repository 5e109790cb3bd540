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

mod config;
mod console;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use route_sync::backend::Backend;
use route_sync::status::StageStatus;
use route_sync::view::present;
use route_sync::{
    BackendError, Coordinate, DashboardSnapshot, DestinationQuery, DestinationResolver,
    FixedSource, GoogleGeocoder, HttpBackend, LocationTracker, RouteSync, SyncState,
    TrackReplaySource, UnavailableSource,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use config::AppConfig;
use console::{parse_command, parse_coordinate, ConsoleCommand, HELP};
use terminal::{status_report, TextMap, TextRouteList};

const STATUS_DIAGNOSTICS: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "ecoroute")]
#[command(about = "Pick the cleanest-air driving route from the terminal", long_about = None)]
struct Cli {
    /// Pollution-analysis backend base URL
    #[arg(short, long)]
    backend: Option<String>,

    /// Fixed origin as <lat>,<lng> (used when no track is given)
    #[arg(short, long, value_parser = parse_coordinate)]
    origin: Option<Coordinate>,

    /// CSV track replayed as the live location
    #[arg(short, long)]
    track: Option<PathBuf>,

    /// Destination to search for on startup
    #[arg(short, long)]
    destination: Option<String>,

    /// Quiet period before fetching routes, in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.backend {
            config.backend_url.clone_from(url);
        }
        if let Some(origin) = self.origin {
            config.set_origin_override(origin);
        }
        if let Some(track) = &self.track {
            config.track_file = Some(track.clone());
        }
        if let Some(debounce) = self.debounce_ms {
            config.debounce_ms = debounce;
        }
    }
}

/// Parts of a snapshot that change what the dashboard shows.
#[derive(PartialEq)]
struct ViewKey {
    state: SyncState,
    generation: u64,
    selection: Option<usize>,
    loading: bool,
    origin: Option<Coordinate>,
    route_count: usize,
    analysis: StageStatus,
    forecast: StageStatus,
}

impl ViewKey {
    fn of(snapshot: &DashboardSnapshot) -> Self {
        Self {
            state: snapshot.state,
            generation: snapshot.generation.value(),
            selection: snapshot.selection,
            loading: snapshot.is_loading(),
            origin: snapshot.origin,
            route_count: snapshot.routes.len(),
            analysis: snapshot.status.analysis.clone(),
            forecast: snapshot.status.forecast.clone(),
        }
    }
}

fn show_routes(snapshot: &DashboardSnapshot) {
    let mut map = TextMap::default();
    let mut list = TextRouteList::default();
    present(snapshot, &mut map, &mut list);
    print!("{}{}", map.take(), list.take());
    if let Some(route) = snapshot.recommended_route() {
        println!("Recommended: {} ({})", route.name(), route.quality);
    }
}

fn render(snapshot: &DashboardSnapshot) {
    match snapshot.state {
        SyncState::Idle => println!("Waiting for a destination (try 'search <place>')"),
        SyncState::AwaitingOriginAndDestination => println!("Waiting for the current location"),
        SyncState::Ready => {
            show_routes(snapshot);
            if snapshot.status.forecast.is_loading() {
                println!("Forecast loading...");
            }
        }
        // The previous cycle keeps its routes until the next one starts
        SyncState::Debouncing if !snapshot.routes.is_empty() => {
            show_routes(snapshot);
            println!("Location changed, updating routes...");
        }
        SyncState::Debouncing | SyncState::FetchingGeometry | SyncState::FetchingAnalysis => {
            println!("Finding routes... ({})", snapshot.state);
        }
    }
}

async fn greet(backend: &HttpBackend) {
    match backend.profile().await {
        Ok(profile) => {
            let name = profile.name.or(profile.email);
            info!("Signed in as {}", name.as_deref().unwrap_or("unknown user"));
        }
        Err(BackendError::Unauthorized) => info!("Not signed in; continuing anonymously"),
        Err(e) => warn!("Could not reach backend: {e}"),
    }
}

fn resolver(config: &AppConfig) -> DestinationResolver {
    let Some(geocoder_config) = config.geocoder_config() else {
        info!("No Google Maps API key configured; search is limited to coordinates");
        return DestinationResolver::default();
    };
    match GoogleGeocoder::new(geocoder_config) {
        Ok(geocoder) => DestinationResolver::new(Arc::new(geocoder)),
        Err(e) => {
            warn!("Geocoder unavailable: {e}");
            DestinationResolver::default()
        }
    }
}

fn start_location(sync: &mut RouteSync, config: &AppConfig) {
    let tracker = LocationTracker::new(config.tracker_options());
    if let Some(track) = &config.track_file {
        info!("Replaying location track {}", track.display());
        sync.track_location(tracker, TrackReplaySource::from_path(track.clone()));
    } else if let Some(origin) = config.origin_override() {
        info!("Using fixed origin {origin}");
        sync.track_location(tracker, FixedSource::new(origin));
    } else {
        sync.track_location(
            tracker,
            UnavailableSource::new("no location source configured; use 'origin <lat>,<lng>'"),
        );
    }
}

/// Returns `false` when the console should exit.
async fn dispatch(sync: &RouteSync, command: ConsoleCommand) -> bool {
    match command {
        ConsoleCommand::Search(query) => sync.search(query),
        ConsoleCommand::Destination(destination) => sync.set_destination(destination),
        ConsoleCommand::Origin(origin) => sync.set_origin(origin),
        ConsoleCommand::Select(index) => match sync.select(Some(index)).await {
            Ok(Some(selected)) => println!("Highlighted Route_{}", selected + 1),
            Ok(None) => println!("Highlight cleared"),
            Err(e) => println!("{e}"),
        },
        ConsoleCommand::ClearSelection => {
            if let Err(e) = sync.select(None).await {
                println!("{e}");
            }
        }
        ConsoleCommand::Clear => sync.clear_destination(),
        ConsoleCommand::Status => {
            print!("{}", status_report(&sync.snapshot(), STATUS_DIAGNOSTICS));
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return false,
    }
    true
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config: {e}. Using defaults.");
        AppConfig::default()
    });
    cli.apply(&mut config);

    if cli.save_config {
        config.save().context("failed to save config")?;
        if let Ok(path) = AppConfig::get_config_path() {
            info!("Saved config to {}", path.display());
        }
    }

    let backend =
        HttpBackend::new(config.backend_config()).context("failed to build backend client")?;
    greet(&backend).await;

    let mut sync = RouteSync::spawn(config.sync_config(), Arc::new(backend), resolver(&config));
    start_location(&mut sync, &config);

    if let Some(destination) = cli.destination.as_deref().and_then(DestinationQuery::from_input) {
        sync.search(destination);
    }

    println!("{HELP}");

    let mut snapshots = sync.subscribe();
    let mut last_view = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Route controller stopped");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let key = ViewKey::of(&snapshot);
                if last_view.as_ref() != Some(&key) {
                    render(&snapshot);
                    last_view = Some(key);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        if !dispatch(&sync, command).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{e:#}"),
                }
            }
        }
    }

    sync.shutdown();
    Ok(())
}
