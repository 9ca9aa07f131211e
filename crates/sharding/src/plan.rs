// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Slice plans: the output of slicing an index launch.
//!
//! A plan assigns disjoint sub-domains of a launch domain to processors of
//! the launching layer. Under replication each replica builds the plan for
//! its own shard only, so the union over all replicas is the whole launch
//! and no two replicas produce the same slice.

use crate::{ShardId, ShardingError, ShardingFunction};
use index_space::{IndexDomain, ProcessorId};
use strategy_ir::{LayerId, LayerStrategy};

/// One processor's share of a launch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TaskSlice {
    /// Processor that runs the points of `domain`.
    pub processor: ProcessorId,
    /// Points of the launch domain assigned to `processor`.
    pub domain: IndexDomain,
    /// Whether the runtime may slice this piece further.
    pub recurse: bool,
    /// Whether the piece may be stolen by another processor.
    pub stealable: bool,
}

/// The slices of one index launch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SlicePlan {
    pub layer: LayerId,
    pub launch_domain: IndexDomain,
    /// `(shard, total)` when the plan was restricted to one replica.
    pub shard: Option<(ShardId, u32)>,
    pub slices: Vec<TaskSlice>,
}

impl SlicePlan {
    /// Slices `launch` over every processor of `layer`.
    pub fn for_layer(layer: &LayerStrategy, launch: &IndexDomain) -> Self {
        let mut builder = SliceBuilder::new(layer.id(), launch);
        for &p in layer.global_processors() {
            if let Some(block) = layer.find_local_domain(p, launch) {
                builder.add(p, block);
            }
        }
        builder.finish(None)
    }

    /// Slices `launch` over every processor of `layer`, keeping only the
    /// points owned by `shard`.
    pub fn for_shard(
        layer: &LayerStrategy,
        launch: &IndexDomain,
        function: &ShardingFunction,
        shard: ShardId,
        total_shards: u32,
    ) -> Result<Self, ShardingError> {
        let owned = function.find_local_domain(shard, total_shards, launch)?;
        let mut builder = SliceBuilder::new(layer.id(), launch);
        for &p in layer.global_processors() {
            let Some(block) = layer.find_local_domain(p, launch) else {
                continue;
            };
            for rect in &owned {
                if let Some(piece) = block.intersection(rect) {
                    builder.add(p, piece);
                }
            }
        }
        Ok(builder.finish(Some((shard, total_shards))))
    }

    pub fn num_slices(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Returns the number of launch points covered by the plan.
    pub fn covered_volume(&self) -> u64 {
        self.slices.iter().map(|s| s.domain.volume()).sum()
    }

    /// Returns the slices assigned to `processor`.
    pub fn slices_for(&self, processor: ProcessorId) -> impl Iterator<Item = &TaskSlice> {
        self.slices.iter().filter(move |s| s.processor == processor)
    }

    /// Validates the plan.
    ///
    /// Checks:
    /// - Every slice lies inside the launch domain.
    /// - No two slices overlap.
    pub fn validate(&self) -> Result<(), ShardingError> {
        for (i, slice) in self.slices.iter().enumerate() {
            if !self.launch_domain.contains(&slice.domain) {
                return Err(ShardingError::InvalidPlan(format!(
                    "slice {i} ({}) escapes launch domain {}",
                    slice.domain, self.launch_domain
                )));
            }
            for (j, other) in self.slices.iter().enumerate().skip(i + 1) {
                if slice.domain.overlap_volume(&other.domain) > 0 {
                    return Err(ShardingError::InvalidPlan(format!(
                        "slices {i} and {j} overlap"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns a human-readable summary of the plan.
    pub fn summary(&self) -> String {
        let owner = match self.shard {
            Some((shard, total)) => format!("{shard} of {total}"),
            None => "all shards".to_string(),
        };
        format!(
            "Slices for {} over {} ({owner}): {} slices, {}/{} points",
            self.layer,
            self.launch_domain,
            self.slices.len(),
            self.covered_volume(),
            self.launch_domain.volume(),
        )
    }
}

/// Builder helper for constructing a [`SlicePlan`] incrementally.
struct SliceBuilder {
    layer: LayerId,
    launch_domain: IndexDomain,
    slices: Vec<TaskSlice>,
}

impl SliceBuilder {
    fn new(layer: LayerId, launch: &IndexDomain) -> Self {
        Self {
            layer,
            launch_domain: launch.clone(),
            slices: Vec::new(),
        }
    }

    /// Adds a slice. Strategy slices are pinned: never re-sliced, never
    /// stolen.
    fn add(&mut self, processor: ProcessorId, domain: IndexDomain) {
        self.slices.push(TaskSlice {
            processor,
            domain,
            recurse: false,
            stealable: false,
        });
    }

    fn finish(self, shard: Option<(ShardId, u32)>) -> SlicePlan {
        let plan = SlicePlan {
            layer: self.layer,
            launch_domain: self.launch_domain,
            shard,
            slices: self.slices,
        };
        tracing::debug!("{}", plan.summary());
        plan
    }
}
