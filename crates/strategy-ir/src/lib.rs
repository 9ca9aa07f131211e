// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # strategy-ir
//!
//! The partition-strategy model: how each layer of a model is spread across
//! the processors of a cluster.
//!
//! - [`DomainDecomposition`]: the pure row-major mapping between a grid of
//!   processors and an index space.
//! - [`LayerStrategy`]: one layer's decomposition, processor kind, mapping
//!   tag, and the processors of the local node with their grid points.
//! - [`PartitionStrategy`]: the per-layer strategies of one model, indexed
//!   by [`LayerId`].
//! - [`StrategyManifest`] / [`StrategyLoader`]: the JSON strategy file and
//!   its validating loader.
//!
//! Everything here is immutable once built and is shared read-only between
//! mapping workers and replicas.
//!
//! # Strategy File Format
//! ```json
//! {
//!   "name": "mlp-4gpu",
//!   "layers": [
//!     { "name": "fc1", "processor_kind": "gpu", "dims": [4],
//!       "processors": [4, 5, 6, 7], "mapping_tag": 1 },
//!     { "name": "softmax", "processor_kind": "cpu", "dims": [1],
//!       "processors": [0], "mapping_tag": 2 }
//!   ]
//! }
//! ```
//!
//! # Example
//! ```no_run
//! use index_space::NodeId;
//! use machine::Machine;
//! use std::path::Path;
//! use strategy_ir::StrategyLoader;
//!
//! let machine = Machine::from_file(Path::new("machine.toml")).unwrap();
//! let strategy =
//!     StrategyLoader::load(Path::new("strategy.json"), &machine, NodeId(0), 12).unwrap();
//! println!("{}", strategy.summary());
//! ```

mod decomposition;
mod error;
mod layer;
mod loader;
mod manifest;
mod partition;

pub use decomposition::DomainDecomposition;
pub use error::StrategyError;
pub use layer::{LayerId, LayerStrategy, MappingTag};
pub use loader::StrategyLoader;
pub use manifest::{ManifestLayer, StrategyManifest};
pub use partition::PartitionStrategy;
