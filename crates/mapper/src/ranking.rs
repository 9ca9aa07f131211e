// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Copy source ranking.
//!
//! Candidates are ordered by:
//! 1. same memory as the destination first;
//! 2. largest overlap with the destination's bounding box;
//! 3. most recently used;
//! 4. oldest insertion into the cache.
//!
//! Instances the cache does not know sort after known ones at step 3 and 4
//! and keep their input order among themselves.

use instance_cache::{InstanceUsage, PhysicalInstance};
use std::cmp::Reverse;

/// Ranks `sources` for a copy into `target`, best first.
///
/// `usage[i]` describes `sources[i]`; a shorter slice is padded with `None`.
pub fn rank_sources(
    target: &PhysicalInstance,
    sources: &[PhysicalInstance],
    usage: &[Option<InstanceUsage>],
) -> Vec<PhysicalInstance> {
    let mut keyed: Vec<_> = sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let usage = usage.get(i).copied().flatten();
            let key = (
                source.memory != target.memory,
                Reverse(source.bounding_box.overlap_volume(&target.bounding_box)),
                Reverse(usage.map_or(0, |u| u.last_used)),
                usage.map_or(u64::MAX, |u| u.inserted_seq),
            );
            (key, source)
        })
        .collect();
    // Stable: equal keys keep the caller's order.
    keyed.sort_by_key(|(key, _)| *key);
    keyed.into_iter().map(|(_, source)| source.clone()).collect()
}
