// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-task phase sequence.
//!
//! ```text
//! SelectOptions → Premap → Slice → Map → SelectSources → Memoize → PostMap → ReportProfiling
//! ```
//!
//! A [`PhaseCursor`] tracks one task through the sequence. Entering a phase
//! skips every phase between the current one and it; entering an earlier
//! phase (or the same one twice) is an error.

use crate::{MapperError, TaskId};
use std::fmt;

/// One step of mapping a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub enum MappingPhase {
    SelectOptions,
    Premap,
    Slice,
    Map,
    SelectSources,
    Memoize,
    PostMap,
    ReportProfiling,
}

impl MappingPhase {
    /// Every phase, in execution order.
    pub const ALL: [MappingPhase; 8] = [
        MappingPhase::SelectOptions,
        MappingPhase::Premap,
        MappingPhase::Slice,
        MappingPhase::Map,
        MappingPhase::SelectSources,
        MappingPhase::Memoize,
        MappingPhase::PostMap,
        MappingPhase::ReportProfiling,
    ];

    /// Returns `false` for phases left entirely to the executor.
    pub fn has_placement_logic(self) -> bool {
        !matches!(self, MappingPhase::Premap | MappingPhase::Memoize)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MappingPhase::SelectOptions => "select_options",
            MappingPhase::Premap => "premap",
            MappingPhase::Slice => "slice",
            MappingPhase::Map => "map",
            MappingPhase::SelectSources => "select_sources",
            MappingPhase::Memoize => "memoize",
            MappingPhase::PostMap => "postmap",
            MappingPhase::ReportProfiling => "report_profiling",
        }
    }
}

impl fmt::Display for MappingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks which phases a task has passed through.
#[derive(Debug, Clone)]
pub struct PhaseCursor {
    task: TaskId,
    visited: Vec<MappingPhase>,
}

impl PhaseCursor {
    pub fn new(task: TaskId) -> Self {
        Self {
            task,
            visited: Vec::new(),
        }
    }

    /// Moves to `phase`, skipping any phases in between.
    pub fn enter(&mut self, phase: MappingPhase) -> Result<(), MapperError> {
        if let Some(&previous) = self.visited.last() {
            if phase <= previous {
                return Err(MapperError::PhaseOrder {
                    task: self.task,
                    previous,
                    next: phase,
                });
            }
        }
        tracing::trace!(task = %self.task, "entering {phase}");
        self.visited.push(phase);
        Ok(())
    }

    pub fn current(&self) -> Option<MappingPhase> {
        self.visited.last().copied()
    }

    /// Phases entered so far, in order.
    pub fn visited(&self) -> &[MappingPhase] {
        &self.visited
    }

    /// Phases passed over without being entered.
    pub fn skipped(&self) -> Vec<MappingPhase> {
        let Some(current) = self.current() else {
            return Vec::new();
        };
        MappingPhase::ALL
            .iter()
            .copied()
            .filter(|p| *p < current && !self.visited.contains(p))
            .collect()
    }

    pub fn into_visited(self) -> Vec<MappingPhase> {
        self.visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order() {
        let mut c = PhaseCursor::new(TaskId(1));
        for phase in MappingPhase::ALL {
            c.enter(phase).unwrap();
        }
        assert_eq!(c.visited(), &MappingPhase::ALL);
        assert!(c.skipped().is_empty());
    }

    #[test]
    fn test_skip_allowed() {
        let mut c = PhaseCursor::new(TaskId(1));
        c.enter(MappingPhase::SelectOptions).unwrap();
        c.enter(MappingPhase::Map).unwrap();
        c.enter(MappingPhase::PostMap).unwrap();
        assert_eq!(c.current(), Some(MappingPhase::PostMap));
        assert_eq!(
            c.skipped(),
            vec![
                MappingPhase::Premap,
                MappingPhase::Slice,
                MappingPhase::SelectSources,
                MappingPhase::Memoize,
            ]
        );
    }

    #[test]
    fn test_reorder_rejected() {
        let mut c = PhaseCursor::new(TaskId(9));
        c.enter(MappingPhase::Map).unwrap();
        let err = c.enter(MappingPhase::Slice).unwrap_err();
        assert!(matches!(
            err,
            MapperError::PhaseOrder {
                previous: MappingPhase::Map,
                next: MappingPhase::Slice,
                ..
            }
        ));
        assert!(c.enter(MappingPhase::Map).is_err());
    }

    #[test]
    fn test_delegated_phases() {
        let delegated: Vec<_> = MappingPhase::ALL
            .iter()
            .filter(|p| !p.has_placement_logic())
            .collect();
        assert_eq!(delegated, vec![&MappingPhase::Premap, &MappingPhase::Memoize]);
    }
}
