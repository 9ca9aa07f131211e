// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Counters for the allocator and the instance cache.

/// Cumulative allocator counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Successful allocations.
    pub allocations: u64,
    /// Requests refused for lack of capacity.
    pub oom_count: u64,
    /// Instances returned through `free`.
    pub frees: u64,
    /// Bytes ever handed out.
    pub cumulative_bytes: u64,
    /// High-water mark of live bytes across all memories.
    pub peak_live_bytes: usize,
}

impl AllocationStats {
    pub(crate) fn record_allocation(&mut self, size: usize, live_total: usize) {
        self.allocations += 1;
        self.cumulative_bytes += size as u64;
        self.peak_live_bytes = self.peak_live_bytes.max(live_total);
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    pub(crate) fn record_free(&mut self) {
        self.frees += 1;
    }

    /// Returns a one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "Allocator: {} allocations, {} frees, {} OOMs, peak {:.2} MB live",
            self.allocations,
            self.frees,
            self.oom_count,
            self.peak_live_bytes as f64 / (1024.0 * 1024.0),
        )
    }
}

/// Cumulative instance-cache counters.
///
/// `exact_hits + containment_hits + misses` equals the number of
/// lookup-or-create calls plus plain `find`/`find_containing` lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Lookups answered by the region index.
    pub exact_hits: u64,
    /// Lookups answered by an instance whose bounding box covers the region.
    pub containment_hits: u64,
    /// Lookups with no usable instance.
    pub misses: u64,
    /// Fresh instances registered.
    pub inserts: u64,
    /// Instances removed.
    pub evictions: u64,
    /// Dangling index entries found (always 0 when the invariants hold).
    pub inconsistencies: u64,
}

impl CacheStats {
    /// Returns the fraction of lookups that avoided an allocation.
    pub fn reuse_ratio(&self) -> f64 {
        let total = self.exact_hits + self.containment_hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        (self.exact_hits + self.containment_hits) as f64 / total as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "Cache: {} exact hits, {} containment hits, {} misses ({:.0}% reuse), \
             {} inserts, {} evictions",
            self.exact_hits,
            self.containment_hits,
            self.misses,
            self.reuse_ratio() * 100.0,
            self.inserts,
            self.evictions,
        )
    }
}
