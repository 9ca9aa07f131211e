// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Collaborator interfaces on the execution side of the mapper.
//!
//! The mapper only produces placements. Running kernels on them and
//! collecting timings is the job of a [`KernelLauncher`] and a [`Profiler`]
//! supplied by the embedding runtime.

use crate::{Placement, TaskId};
use index_space::ProcessorId;
use std::fmt;
use std::time::Duration;
use strategy_ir::LayerId;

/// Opaque handle of the stream or queue a kernel is enqueued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct StreamToken(pub u64);

impl fmt::Display for StreamToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Timing of one executed task.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProfilingEvent {
    pub task: TaskId,
    pub layer: LayerId,
    pub processor: ProcessorId,
    pub elapsed: Duration,
}

/// Receives per-task timing events.
pub trait Profiler: Send + Sync {
    fn record(&self, event: &ProfilingEvent);
}

/// Runs the kernel of a placed task.
pub trait KernelLauncher: Send + Sync {
    /// Launches the task's kernel on the bound instances. Returns the
    /// elapsed time when the launcher measures it.
    fn launch(&self, placement: &Placement, stream: StreamToken) -> Option<Duration>;
}
