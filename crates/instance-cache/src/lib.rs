// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # instance-cache
//!
//! Physical instances and the per-node cache that lets tasks reuse them.
//!
//! # Key Components
//!
//! - [`PhysicalInstance`]: a memory-backed allocation realising one or more
//!   logical regions over a bounding box, resident in exactly one memory.
//! - [`InstanceAllocator`]: the external allocator interface
//!   (`allocate` / `free`), with [`BudgetAllocator`] as a capacity-enforcing
//!   implementation keyed by memory.
//! - [`InstanceCache`]: the keyed store `(tree, field, memory) → instances`
//!   with O(1) region lookup, reuse by containment, and eviction.
//! - [`CacheStats`] / [`AllocationStats`]: counters for tuning and tests.
//!
//! # Concurrency
//!
//! ```text
//!   worker A ──┐                       ┌── find
//!              ├── Mutex<CacheState> ──┼── find_containing
//!   worker B ──┘   (one per node)      ├── insert / evict
//!                                      └── find_or_create (lookup-or-create
//!                                          under a single lock hold)
//! ```
//!
//! Every operation runs under one lock. Two workers racing to create an
//! instance for the same region and memory serialise on that lock, so the
//! second one finds the first one's instance instead of allocating again.
//!
//! # Example
//! ```
//! use index_space::{FieldId, IndexDomain, LogicalRegion, MemoryId, RegionTreeId};
//! use instance_cache::{
//!     AllocationRequest, BudgetAllocator, CacheError, InstanceAllocator, InstanceCache, MemoryBudget,
//! };
//!
//! let memory = MemoryId(1);
//! let allocator = BudgetAllocator::new([(memory, MemoryBudget::from_mb(1))]);
//! let cache = InstanceCache::new();
//!
//! let region = LogicalRegion::new(RegionTreeId(0), 1);
//! let bounds = IndexDomain::from_extents(&[100]).unwrap();
//! let request = AllocationRequest::new(memory, region.tree, FieldId(0), bounds.clone(), 4);
//!
//! let lookup = cache
//!     .find_or_create(
//!         region,
//!         &bounds,
//!         FieldId(0),
//!         memory,
//!         || allocator.allocate(&request).map_err(CacheError::from),
//!         |rejected| allocator.free(rejected),
//!     )
//!     .unwrap();
//! assert_eq!(cache.find(region, FieldId(0), memory), Some(lookup.instance));
//! ```

mod allocator;
mod budget;
mod cache;
mod error;
mod instance;
mod stats;

pub use allocator::{AllocationRequest, BudgetAllocator, InstanceAllocator};
pub use budget::MemoryBudget;
pub use cache::{CacheKey, InstanceCache, InstanceUsage, Lookup, LookupOutcome};
pub use error::{AllocError, CacheError};
pub use instance::PhysicalInstance;
pub use stats::{AllocationStats, CacheStats};
