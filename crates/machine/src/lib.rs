// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # machine
//!
//! Static description of the processors and memories of a cluster, and the
//! affinities between them.
//!
//! # Contents
//! - **Processors**: id, kind (CPU, GPU, OpenMP, I/O, Python) and node.
//! - **Memories**: id, kind (system, zero-copy, frame buffer, NUMA), node
//!   and capacity.
//! - **Affinities**: which processor can address which memory, with the
//!   bandwidth and latency of the path.
//!
//! The description is discovered once (or read from a TOML file) and never
//! changes afterwards, so a [`Machine`] is shared read-only behind an `Arc`.
//!
//! # Example
//! ```
//! use index_space::{NodeId, ProcessorKind};
//! use machine::Machine;
//!
//! let machine = Machine::uniform(2, 4, 2);
//! let gpus = machine.local_processors(NodeId(1), ProcessorKind::Gpu);
//! assert_eq!(gpus.len(), 2);
//! assert!(machine.frame_buffer(gpus[0].id).is_some());
//! println!("{}", machine.summary());
//! ```

mod description;
mod error;
mod topology;

pub use description::MachineDescription;
pub use error::MachineError;
pub use topology::{Affinity, Machine, Memory, Processor};
