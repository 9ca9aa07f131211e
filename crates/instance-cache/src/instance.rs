// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The physical instance handle.

use crate::CacheKey;
use index_space::{FieldId, IndexDomain, InstanceId, MemoryId, RegionTreeId};

/// A concrete allocation realising one field of a region tree over a
/// bounding box, resident in exactly one memory.
///
/// Instances are created by an [`crate::InstanceAllocator`] and are plain
/// handles: cloning one does not duplicate storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PhysicalInstance {
    /// Identifier assigned by the allocator.
    pub id: InstanceId,
    /// The memory backing this instance.
    pub memory: MemoryId,
    /// Region tree whose field this instance stores.
    pub tree: RegionTreeId,
    /// The stored field.
    pub field: FieldId,
    /// Superset of every region mapped onto this instance.
    pub bounding_box: IndexDomain,
    /// Footprint in bytes.
    pub size_bytes: usize,
}

impl PhysicalInstance {
    /// Returns the cache key this instance is filed under.
    pub fn key(&self) -> CacheKey {
        CacheKey {
            tree: self.tree,
            field: self.field,
            memory: self.memory,
        }
    }

    /// Returns `true` if `bounds` fits inside this instance.
    pub fn covers(&self, bounds: &IndexDomain) -> bool {
        self.bounding_box.contains(bounds)
    }
}
