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

//! Highlighted-route selection.
//!
//! The map layer and the route list both read the selection from the same
//! published snapshot; neither keeps its own copy.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("route index {index} out of range (route count {route_count})")]
    OutOfRange { index: usize, route_count: usize },

    #[error("route sync controller is not running")]
    Closed,
}

/// Selection bound to the current route list.
///
/// Invariant: `index` is `None` or `< route_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    index: Option<usize>,
    route_count: usize,
}

impl SelectionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently highlighted route, if any.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    #[must_use]
    pub fn route_count(&self) -> usize {
        self.route_count
    }

    #[must_use]
    pub fn is_selected(&self, index: usize) -> bool {
        self.index == Some(index)
    }

    /// Apply a selection request and return the resulting selection.
    ///
    /// Selecting the highlighted index again clears it. An index outside
    /// `0..route_count` is rejected and the previous selection is kept.
    pub fn select(&mut self, index: Option<usize>) -> Result<Option<usize>, SelectionError> {
        match index {
            None => self.index = None,
            Some(index) if index >= self.route_count => {
                return Err(SelectionError::OutOfRange {
                    index,
                    route_count: self.route_count,
                });
            }
            Some(index) if self.index == Some(index) => self.index = None,
            Some(index) => self.index = Some(index),
        }
        Ok(self.index)
    }

    /// Rebind to a replaced route list. Always clears the selection since route
    /// identity is not stable across fetches.
    pub fn reset(&mut self, route_count: usize) {
        self.index = None;
        self.route_count = route_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_toggles() {
        let mut selection = SelectionState::new();
        selection.reset(2);

        assert_eq!(selection.select(Some(1)), Ok(Some(1)));
        assert!(selection.is_selected(1));
        assert_eq!(selection.select(Some(1)), Ok(None));
        assert_eq!(selection.index(), None);
    }

    #[test]
    fn test_select_replaces() {
        let mut selection = SelectionState::new();
        selection.reset(3);

        selection.select(Some(0)).unwrap();
        assert_eq!(selection.select(Some(2)), Ok(Some(2)));
        assert_eq!(selection.select(None), Ok(None));
    }

    #[test]
    fn test_out_of_range_keeps_previous() {
        let mut selection = SelectionState::new();
        selection.reset(2);
        selection.select(Some(0)).unwrap();

        assert_eq!(
            selection.select(Some(2)),
            Err(SelectionError::OutOfRange {
                index: 2,
                route_count: 2
            })
        );
        assert_eq!(selection.index(), Some(0));
    }

    #[test]
    fn test_empty_list_rejects_everything() {
        let mut selection = SelectionState::new();
        assert!(selection.select(Some(0)).is_err());
        assert_eq!(selection.select(None), Ok(None));
    }

    #[test]
    fn test_reset_clears() {
        let mut selection = SelectionState::new();
        selection.reset(2);
        selection.select(Some(0)).unwrap();

        selection.reset(5);
        assert_eq!(selection.index(), None);
        assert_eq!(selection.route_count(), 5);
    }
}
