// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for instance allocation and the instance cache.

use index_space::{IndexDomain, InstanceId, LogicalRegion, MemoryId};

/// Errors reported by an [`crate::InstanceAllocator`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The allocation would exceed the memory's capacity.
    #[error("out of memory in {memory}: requested {requested_bytes} bytes, {available_bytes} available (capacity {capacity_bytes})")]
    OutOfMemory {
        memory: MemoryId,
        requested_bytes: usize,
        available_bytes: usize,
        capacity_bytes: usize,
    },

    /// The allocator does not manage the requested memory.
    #[error("unknown memory {0}")]
    UnknownMemory(MemoryId),

    /// A zero-byte instance was requested.
    #[error("cannot allocate a zero-sized instance")]
    ZeroSizedAllocation,

    /// A capacity string could not be parsed.
    #[error("invalid capacity '{input}': {detail}")]
    InvalidBudget { input: String, detail: String },
}

impl AllocError {
    /// Returns `true` for capacity exhaustion, the only error a fallback
    /// memory can fix.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, AllocError::OutOfMemory { .. })
    }
}

/// Errors reported by the [`crate::InstanceCache`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// A region was registered against an instance that does not cover it.
    #[error("{instance} with bounds {instance_bounds} cannot hold {region} with bounds {region_bounds}")]
    BoundsNotContained {
        instance: InstanceId,
        instance_bounds: IndexDomain,
        region: LogicalRegion,
        region_bounds: IndexDomain,
    },

    /// A region was registered against an instance living in another memory
    /// or belonging to another field.
    #[error("{instance} belongs to a different (tree, field, memory) key than requested")]
    KeyMismatch { instance: InstanceId },

    /// An internal index points at nothing. Never expected; see
    /// [`crate::InstanceCache::check_invariants`].
    #[error("instance cache inconsistency: {0}")]
    Inconsistency(String),

    /// Creating a fresh instance failed.
    #[error(transparent)]
    Alloc(#[from] AllocError),
}
