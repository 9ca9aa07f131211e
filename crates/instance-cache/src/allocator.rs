// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The external allocator interface and a capacity-enforcing implementation.
//!
//! The mapper never creates storage itself: on a cache miss it asks an
//! [`InstanceAllocator`] for a fresh [`PhysicalInstance`]. Allocation is an
//! in-memory bookkeeping step, so it may be called while the cache lock is
//! held. Implementations must never block on I/O.
//!
//! [`BudgetAllocator`] enforces one [`MemoryBudget`] per memory:
//!
//! 1. Requests that would exceed a memory's capacity fail with
//!    `Err(OutOfMemory)`; the caller decides whether to fall back.
//! 2. Reservation is a single compare-and-swap on the live-byte counter,
//!    so concurrent callers can never overshoot the capacity together.
//! 3. Freed instances return their bytes immediately.

use crate::{AllocError, AllocationStats, MemoryBudget, PhysicalInstance};
use index_space::{FieldId, IndexDomain, InstanceId, MemoryId, RegionTreeId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// What the mapper asks the allocator for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    /// Target memory.
    pub memory: MemoryId,
    /// Region tree of the operand.
    pub tree: RegionTreeId,
    /// Field of the operand.
    pub field: FieldId,
    /// Bounding box the instance must cover.
    pub bounds: IndexDomain,
    /// Bytes per point of the field.
    pub element_bytes: usize,
}

impl AllocationRequest {
    pub fn new(
        memory: MemoryId,
        tree: RegionTreeId,
        field: FieldId,
        bounds: IndexDomain,
        element_bytes: usize,
    ) -> Self {
        Self {
            memory,
            tree,
            field,
            bounds,
            element_bytes,
        }
    }

    /// Returns the same request aimed at another memory.
    pub fn retarget(&self, memory: MemoryId) -> Self {
        Self {
            memory,
            ..self.clone()
        }
    }

    /// Returns the footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        self.bounds.volume() as usize * self.element_bytes
    }
}

/// Creates and destroys physical instances.
pub trait InstanceAllocator: Send + Sync {
    /// Creates an instance covering `request.bounds` in `request.memory`.
    fn allocate(&self, request: &AllocationRequest) -> Result<PhysicalInstance, AllocError>;

    /// Releases an instance previously returned by [`InstanceAllocator::allocate`].
    fn free(&self, instance: &PhysicalInstance);
}

struct MemoryArena {
    capacity: MemoryBudget,
    live_bytes: AtomicUsize,
}

/// An [`InstanceAllocator`] with a hard capacity per memory.
///
/// # Example
/// ```
/// use index_space::{FieldId, IndexDomain, MemoryId, RegionTreeId};
/// use instance_cache::{AllocationRequest, BudgetAllocator, InstanceAllocator, MemoryBudget};
///
/// let fb = MemoryId(0);
/// let alloc = BudgetAllocator::new([(fb, MemoryBudget::from_bytes(400))]);
/// let req = AllocationRequest::new(fb, RegionTreeId(0), FieldId(0),
///     IndexDomain::from_extents(&[100]).unwrap(), 4);
///
/// let inst = alloc.allocate(&req).unwrap();
/// assert_eq!(alloc.live_bytes(fb), 400);
/// assert!(alloc.allocate(&req).is_err());
/// alloc.free(&inst);
/// assert_eq!(alloc.live_bytes(fb), 0);
/// ```
pub struct BudgetAllocator {
    arenas: HashMap<MemoryId, MemoryArena>,
    next_id: AtomicU64,
    live: Mutex<HashSet<InstanceId>>,
    stats: Mutex<AllocationStats>,
}

impl BudgetAllocator {
    /// Creates an allocator managing the given memories.
    pub fn new(capacities: impl IntoIterator<Item = (MemoryId, MemoryBudget)>) -> Self {
        let arenas = capacities
            .into_iter()
            .map(|(memory, capacity)| {
                (
                    memory,
                    MemoryArena {
                        capacity,
                        live_bytes: AtomicUsize::new(0),
                    },
                )
            })
            .collect();
        Self {
            arenas,
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashSet::new()),
            stats: Mutex::new(AllocationStats::default()),
        }
    }

    /// Returns the live bytes in `memory` (0 for unknown memories).
    pub fn live_bytes(&self, memory: MemoryId) -> usize {
        self.arenas
            .get(&memory)
            .map_or(0, |a| a.live_bytes.load(Ordering::Acquire))
    }

    /// Returns the remaining capacity of `memory`.
    pub fn available_bytes(&self, memory: MemoryId) -> usize {
        self.arenas.get(&memory).map_or(0, |a| {
            a.capacity
                .as_bytes()
                .saturating_sub(a.live_bytes.load(Ordering::Acquire))
        })
    }

    /// Returns the capacity of `memory`, if managed.
    pub fn capacity(&self, memory: MemoryId) -> Option<MemoryBudget> {
        self.arenas.get(&memory).map(|a| a.capacity)
    }

    /// Returns a snapshot of the allocator counters.
    pub fn stats(&self) -> AllocationStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn total_live_bytes(&self) -> usize {
        self.arenas
            .values()
            .map(|a| a.live_bytes.load(Ordering::Acquire))
            .sum()
    }
}

impl InstanceAllocator for BudgetAllocator {
    fn allocate(&self, request: &AllocationRequest) -> Result<PhysicalInstance, AllocError> {
        let arena = self
            .arenas
            .get(&request.memory)
            .ok_or(AllocError::UnknownMemory(request.memory))?;
        let size = request.size_bytes();
        if size == 0 {
            return Err(AllocError::ZeroSizedAllocation);
        }

        let capacity = arena.capacity.as_bytes();
        let reserved = arena
            .live_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                live.checked_add(size).filter(|&next| next <= capacity)
            });

        if let Err(live) = reserved {
            if let Ok(mut stats) = self.stats.lock() {
                stats.record_oom();
            }
            tracing::debug!(
                memory = %request.memory,
                requested = size,
                live,
                capacity,
                "allocation refused"
            );
            return Err(AllocError::OutOfMemory {
                memory: request.memory,
                requested_bytes: size,
                available_bytes: capacity.saturating_sub(live),
                capacity_bytes: capacity,
            });
        }

        let id = InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut live) = self.live.lock() {
            live.insert(id);
        }
        let live_total = self.total_live_bytes();
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_allocation(size, live_total);
        }

        Ok(PhysicalInstance {
            id,
            memory: request.memory,
            tree: request.tree,
            field: request.field,
            bounding_box: request.bounds.clone(),
            size_bytes: size,
        })
    }

    fn free(&self, instance: &PhysicalInstance) {
        let was_live = self
            .live
            .lock()
            .map(|mut live| live.remove(&instance.id))
            .unwrap_or(false);
        if !was_live {
            tracing::warn!(instance = %instance.id, "ignoring free of unknown instance");
            return;
        }
        if let Some(arena) = self.arenas.get(&instance.memory) {
            arena
                .live_bytes
                .fetch_sub(instance.size_bytes, Ordering::AcqRel);
        }
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_free();
        }
    }
}

impl std::fmt::Debug for BudgetAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetAllocator")
            .field("memories", &self.arenas.len())
            .field("live_bytes", &self.total_live_bytes())
            .finish()
    }
}
