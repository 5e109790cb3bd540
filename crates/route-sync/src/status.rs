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

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::backend::FetchStage;

/// Diagnostic message with timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticMessage {
    pub timestamp: DateTime<Utc>,
    pub level: DiagnosticLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// Progress of one fetch stage in the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StageStatus {
    /// Not requested in this cycle.
    #[default]
    Idle,
    Loading,
    Succeeded,
    /// Forecast only: still being computed by the backend after the last poll.
    Pending,
    Failed(String),
    /// Not requested because an earlier stage failed.
    Unavailable,
}

impl StageStatus {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Sync statistics and diagnostics, published with every snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub geometry: StageStatus,
    pub analysis: StageStatus,
    pub forecast: StageStatus,

    /// Last stage failure (any stage)
    pub last_error: Option<String>,

    /// User-visible message for the last failed destination lookup
    pub resolution_error: Option<String>,

    /// Set once the location source reports it is unavailable
    pub location_error: Option<String>,

    pub cycles_started: u64,
    pub stale_responses_dropped: u64,
    pub last_ready_at: Option<DateTime<Utc>>,

    // Diagnostic messages (keep last `max_diagnostics`)
    pub diagnostics: VecDeque<DiagnosticMessage>,
    max_diagnostics: usize,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::new(50)
    }
}

impl SyncStatus {
    #[must_use]
    pub fn new(max_diagnostics: usize) -> Self {
        Self {
            geometry: StageStatus::Idle,
            analysis: StageStatus::Idle,
            forecast: StageStatus::Idle,
            last_error: None,
            resolution_error: None,
            location_error: None,
            cycles_started: 0,
            stale_responses_dropped: 0,
            last_ready_at: None,
            diagnostics: VecDeque::with_capacity(max_diagnostics),
            max_diagnostics,
        }
    }

    #[must_use]
    pub fn stage(&self, stage: FetchStage) -> &StageStatus {
        match stage {
            FetchStage::Geometry => &self.geometry,
            FetchStage::Analysis => &self.analysis,
            FetchStage::Forecast => &self.forecast,
        }
    }

    pub fn set_stage(&mut self, stage: FetchStage, status: StageStatus) {
        match stage {
            FetchStage::Geometry => self.geometry = status,
            FetchStage::Analysis => self.analysis = status,
            FetchStage::Forecast => self.forecast = status,
        }
    }

    /// Reset stage progress at the start of a cycle.
    pub fn begin_cycle(&mut self, generation: u64) {
        self.cycles_started += 1;
        self.geometry = StageStatus::Loading;
        self.analysis = StageStatus::Idle;
        self.forecast = StageStatus::Idle;
        self.add_diagnostic(
            DiagnosticLevel::Info,
            format!("Fetching routes (generation {generation})"),
        );
    }

    /// Drop in-flight stage progress when the destination is cleared.
    pub fn abandon_loading(&mut self) {
        for stage in [&mut self.geometry, &mut self.analysis, &mut self.forecast] {
            if stage.is_loading() {
                *stage = StageStatus::Idle;
            }
        }
    }

    /// Record a failed stage
    pub fn stage_failed(&mut self, stage: FetchStage, error: String) {
        self.add_diagnostic(
            DiagnosticLevel::Error,
            format!("Route {stage} failed: {error}"),
        );
        self.last_error = Some(error.clone());
        self.set_stage(stage, StageStatus::Failed(error));
    }

    pub fn record_stale(&mut self) {
        self.stale_responses_dropped += 1;
    }

    pub fn record_ready(&mut self, route_count: usize) {
        self.last_ready_at = Some(Utc::now());
        self.add_diagnostic(
            DiagnosticLevel::Info,
            format!("{route_count} route(s) ready"),
        );
    }

    pub fn record_resolution_error(&mut self, error: String) {
        self.add_diagnostic(
            DiagnosticLevel::Error,
            format!("Could not find destination: {error}"),
        );
        self.resolution_error = Some(error);
    }

    pub fn record_location_error(&mut self, error: String) {
        self.add_diagnostic(
            DiagnosticLevel::Warning,
            format!("Live location unavailable: {error}"),
        );
        self.location_error = Some(error);
    }

    /// Add a diagnostic message
    pub fn add_diagnostic(&mut self, level: DiagnosticLevel, message: String) {
        if self.max_diagnostics == 0 {
            return;
        }
        while self.diagnostics.len() >= self.max_diagnostics {
            self.diagnostics.pop_front();
        }

        self.diagnostics.push_back(DiagnosticMessage {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    /// Get recent diagnostics (newest first)
    #[must_use]
    pub fn recent_diagnostics(&self, count: usize) -> Vec<&DiagnosticMessage> {
        self.diagnostics.iter().rev().take(count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_capped() {
        let mut status = SyncStatus::new(3);
        for i in 0..5 {
            status.add_diagnostic(DiagnosticLevel::Info, format!("message {i}"));
        }

        assert_eq!(status.diagnostics.len(), 3);
        let recent = status.recent_diagnostics(2);
        assert_eq!(recent[0].message, "message 4");
        assert_eq!(recent[1].message, "message 3");
    }

    #[test]
    fn test_stage_failed_sets_last_error() {
        let mut status = SyncStatus::default();
        status.stage_failed(FetchStage::Analysis, "HTTP error: 500".to_string());

        assert_eq!(
            status.stage(FetchStage::Analysis),
            &StageStatus::Failed("HTTP error: 500".to_string())
        );
        assert_eq!(status.last_error.as_deref(), Some("HTTP error: 500"));
        assert_eq!(
            status.diagnostics.back().map(|d| d.level),
            Some(DiagnosticLevel::Error)
        );
    }

    #[test]
    fn test_abandon_loading_keeps_results() {
        let mut status = SyncStatus::default();
        status.begin_cycle(1);
        status.geometry = StageStatus::Succeeded;
        status.analysis = StageStatus::Loading;

        status.abandon_loading();
        assert_eq!(status.geometry, StageStatus::Succeeded);
        assert_eq!(status.analysis, StageStatus::Idle);
        assert_eq!(status.cycles_started, 1);
    }
}
