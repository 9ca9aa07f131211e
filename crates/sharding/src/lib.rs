// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # sharding
//!
//! Deterministic ownership of work across replicas, and the slicing of a
//! launch domain over a layer's processors.
//!
//! Every replica of the control program runs the same code over the same
//! strategy. [`ShardingFunction::shard`] is a pure integer function of
//! `(point, domain, total_shards)`, so each replica computes the same owner
//! for every point without talking to the others.
//!
//! # Balanced Range Partition
//!
//! ```text
//!   offset = row-major offset of the point in the domain
//!   shard  = floor(offset * S / V)
//!
//!   V = 10, S = 4:   offsets  0 1 2 | 3 4 | 5 6 7 | 8 9
//!                    shard      0   |  1  |   2   |  3
//! ```
//!
//! Shard `s` owns the contiguous offsets `[ceil(s*V/S), ceil((s+1)*V/S))`.
//!
//! # Example
//! ```
//! use index_space::{DomainPoint, IndexDomain};
//! use sharding::{ShardId, ShardingFunction, ShardingId};
//! use strategy_ir::LayerId;
//!
//! let f = ShardingFunction::from_parts(ShardingId(1), LayerId(0), vec![4], vec![]);
//! let domain = IndexDomain::from_extents(&[4]).unwrap();
//! assert_eq!(f.shard(&DomainPoint::scalar(2), &domain, 2).unwrap(), ShardId(1));
//! ```

mod error;
mod function;
mod plan;
mod registry;

pub use error::ShardingError;
pub use function::{ShardId, ShardingFunction, ShardingId};
pub use plan::{SlicePlan, TaskSlice};
pub use registry::ShardingRegistry;
