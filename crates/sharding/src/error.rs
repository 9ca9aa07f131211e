// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for sharding and slicing.

use crate::ShardingId;
use index_space::{DomainPoint, IndexDomain};

/// Errors raised by sharding queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShardingError {
    /// A shard count of zero was requested.
    #[error("total shard count must be non-zero")]
    ZeroShards,

    /// A shard id is not below the shard count.
    #[error("shard {shard} is out of range for {total} shards")]
    ShardOutOfRange { shard: u32, total: u32 },

    /// The point does not lie in the domain it was sharded against.
    #[error("point {point} lies outside {domain}")]
    PointOutsideDomain {
        point: DomainPoint,
        domain: IndexDomain,
    },

    /// The sharding function has no processors to pick from.
    #[error("sharding function {0} has no processors")]
    NoProcessors(ShardingId),

    /// The function's processor grid cannot be laid over the domain.
    #[error("sharding function {function} grid {dims:?} does not fit {domain}")]
    GridMismatch {
        function: ShardingId,
        dims: Vec<usize>,
        domain: IndexDomain,
    },

    /// A slice plan overlaps itself or escapes its launch domain.
    #[error("invalid slice plan: {0}")]
    InvalidPlan(String),
}
