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

//! Built-in position sources.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{LocationError, PositionRequest, PositionSource};
use crate::geo::Coordinate;

const DEFAULT_REPLAY_DELAY_MS: u64 = 1000;

/// Sending half of a [`ChannelSource`].
#[derive(Debug, Clone)]
pub struct PositionFeed {
    tx: mpsc::UnboundedSender<Result<Coordinate, LocationError>>,
}

impl PositionFeed {
    /// Push a position fix. Returns `false` once tracking has stopped.
    pub fn push(&self, position: Coordinate) -> bool {
        self.tx.send(Ok(position)).is_ok()
    }

    /// Push a location error.
    pub fn fail(&self, error: LocationError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// Whether the tracker has released the source.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Source fed programmatically through a [`PositionFeed`].
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<Coordinate, LocationError>>,
}

impl ChannelSource {
    #[must_use]
    pub fn new() -> (PositionFeed, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PositionFeed { tx }, Self { rx })
    }
}

#[async_trait]
impl PositionSource for ChannelSource {
    async fn open(&mut self, _request: PositionRequest) -> Result<(), LocationError> {
        Ok(())
    }

    async fn next_fix(&mut self) -> Option<Result<Coordinate, LocationError>> {
        self.rx.recv().await
    }
}

/// Stationary source reporting a single fix (manual override, no GPS).
#[derive(Debug, Clone, Copy)]
pub struct FixedSource {
    position: Coordinate,
    reported: bool,
}

impl FixedSource {
    #[must_use]
    pub fn new(position: Coordinate) -> Self {
        Self {
            position,
            reported: false,
        }
    }
}

#[async_trait]
impl PositionSource for FixedSource {
    async fn open(&mut self, _request: PositionRequest) -> Result<(), LocationError> {
        Ok(())
    }

    async fn next_fix(&mut self) -> Option<Result<Coordinate, LocationError>> {
        if !self.reported {
            self.reported = true;
            return Some(Ok(self.position));
        }
        // A stationary device never reports again
        std::future::pending::<()>().await;
        None
    }
}

/// Source that always fails to open.
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PositionSource for UnavailableSource {
    async fn open(&mut self, _request: PositionRequest) -> Result<(), LocationError> {
        Err(LocationError::Unavailable(self.reason.clone()))
    }

    async fn next_fix(&mut self) -> Option<Result<Coordinate, LocationError>> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct TrackRow {
    lat: f64,
    lng: f64,
    #[serde(default)]
    delay_ms: Option<u64>,
}

/// One step of a replayed track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackFix {
    pub position: Coordinate,
    /// Wait before this fix is reported (ignored for the first fix).
    pub delay: Duration,
}

/// Replays a recorded drive from a CSV file with `lat,lng,delay_ms` columns.
#[derive(Debug)]
pub struct TrackReplaySource {
    path: Option<PathBuf>,
    fixes: Vec<TrackFix>,
    next: usize,
}

impl TrackReplaySource {
    /// Replay a CSV track; the file is read when tracking starts.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            fixes: Vec::new(),
            next: 0,
        }
    }

    #[must_use]
    pub fn from_fixes(fixes: Vec<TrackFix>) -> Self {
        Self {
            path: None,
            fixes,
            next: 0,
        }
    }

    /// Parse track rows, skipping rows that are malformed or out of range.
    pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<TrackFix>, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut fixes = Vec::new();
        for (line, row) in csv_reader.deserialize::<TrackRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping track row {}: {}", line + 1, e);
                    continue;
                }
            };
            match Coordinate::validated(row.lat, row.lng) {
                Ok(position) => fixes.push(TrackFix {
                    position,
                    delay: Duration::from_millis(row.delay_ms.unwrap_or(DEFAULT_REPLAY_DELAY_MS)),
                }),
                Err(e) => warn!("Skipping track row {}: {}", line + 1, e),
            }
        }
        Ok(fixes)
    }
}

#[async_trait]
impl PositionSource for TrackReplaySource {
    async fn open(&mut self, _request: PositionRequest) -> Result<(), LocationError> {
        if let Some(path) = &self.path {
            let file = std::fs::File::open(path)
                .map_err(|e| LocationError::Unavailable(format!("{}: {}", path.display(), e)))?;
            self.fixes = Self::parse_csv(file)
                .map_err(|e| LocationError::Unavailable(format!("{}: {}", path.display(), e)))?;
            info!("Loaded {} track fixes from {}", self.fixes.len(), path.display());
        }

        if self.fixes.is_empty() {
            return Err(LocationError::Unavailable("track is empty".to_string()));
        }
        Ok(())
    }

    async fn next_fix(&mut self) -> Option<Result<Coordinate, LocationError>> {
        let fix = *self.fixes.get(self.next)?;
        if self.next > 0 {
            tokio::time::sleep(fix.delay).await;
        }
        self.next += 1;
        Some(Ok(fix.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_csv_skips_bad_rows() {
        let data = "lat,lng,delay_ms\n\
                    12.90,77.59,0\n\
                    12.91,77.59\n\
                    abc,1,2\n\
                    95.0,77.0,10\n\
                    12.92,77.60,250\n";
        let fixes = TrackReplaySource::parse_csv(data.as_bytes()).unwrap();

        assert_eq!(fixes.len(), 3);
        assert_eq!(fixes[0].position, Coordinate::new(12.90, 77.59));
        assert_eq!(fixes[1].delay, Duration::from_millis(DEFAULT_REPLAY_DELAY_MS));
        assert_eq!(fixes[2].delay, Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lat,lng,delay_ms").unwrap();
        writeln!(file, "12.90,77.59,0").unwrap();
        writeln!(file, "12.91,77.59,500").unwrap();

        let mut source = TrackReplaySource::from_path(file.path());
        source
            .open(PositionRequest { high_accuracy: true })
            .await
            .unwrap();

        assert_eq!(
            source.next_fix().await,
            Some(Ok(Coordinate::new(12.90, 77.59)))
        );
        let before = tokio::time::Instant::now();
        assert_eq!(
            source.next_fix().await,
            Some(Ok(Coordinate::new(12.91, 77.59)))
        );
        assert!(before.elapsed() >= Duration::from_millis(500));
        assert_eq!(source.next_fix().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_from_fixes() {
        let request = PositionRequest { high_accuracy: true };
        let mut empty = TrackReplaySource::from_fixes(Vec::new());
        assert!(matches!(
            empty.open(request).await,
            Err(LocationError::Unavailable(_))
        ));

        let mut source = TrackReplaySource::from_fixes(vec![
            TrackFix {
                position: Coordinate::new(12.90, 77.59),
                delay: Duration::from_secs(60),
            },
            TrackFix {
                position: Coordinate::new(12.93, 77.61),
                delay: Duration::from_secs(2),
            },
        ]);
        source.open(request).await.unwrap();

        // The first fix is reported at once whatever its delay
        let start = tokio::time::Instant::now();
        assert_eq!(
            source.next_fix().await,
            Some(Ok(Coordinate::new(12.90, 77.59)))
        );
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(
            source.next_fix().await,
            Some(Ok(Coordinate::new(12.93, 77.61)))
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let mut source = TrackReplaySource::from_path("/nonexistent/track.csv");
        let result = source.open(PositionRequest { high_accuracy: true }).await;
        assert!(matches!(result, Err(LocationError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_fixed_source_reports_once() {
        let position = Coordinate::new(12.90, 77.59);
        let mut source = FixedSource::new(position);
        assert_eq!(source.next_fix().await, Some(Ok(position)));

        let second = tokio::time::timeout(Duration::from_millis(10), source.next_fix()).await;
        assert!(second.is_err());
    }
}
