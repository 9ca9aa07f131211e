// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # mapper
//!
//! The placement engine: decides, for every task submitted to the runtime,
//! which processor runs it, which physical instance backs each operand, and
//! under replication which replica owns it.
//!
//! The mapper takes:
//! - A [`ModelContext`] (machine, partition strategy, sharding functions,
//!   task variants) built once per loaded model.
//! - An [`InstanceAllocator`](instance_cache::InstanceAllocator) that creates
//!   physical instances on cache misses.
//!
//! # Phases
//! Each task moves through a fixed sequence of phases; phases may be skipped
//! but never reordered:
//! ```text
//! SelectOptions → Premap → Slice → Map → SelectSources → Memoize → PostMap → ReportProfiling
//! ```
//! Premap and Memoize are delegated to the executor and carry no logic.
//!
//! # Concurrency
//! A [`PlacementMapper`] is `Send + Sync`; worker threads share one per node.
//! Everything except the instance cache and the metrics counters is
//! immutable after construction.
//!
//! # Example
//! ```no_run
//! use mapper::{MapperConfig, ModelContext, PlacementMapper};
//! use instance_cache::BudgetAllocator;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), mapper::MapperError> {
//! let config = MapperConfig::from_file("mapper.toml".as_ref())?;
//! let context = Arc::new(ModelContext::load(&config)?);
//! let allocator = Arc::new(BudgetAllocator::new(context.machine().capacities()));
//! let mapper = PlacementMapper::from_config(context, allocator, &config);
//! println!("{}", mapper.metrics().summary());
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod error;
mod mapper;
mod memory;
mod metrics;
mod phase;
mod profiling;
mod ranking;
mod task;
mod variant;

pub use config::MapperConfig;
pub use context::ModelContext;
pub use error::MapperError;
pub use mapper::{
    BindingSource, CopyRequest, OperandBinding, Ownership, PartitionMapping, Placement,
    PlacementMapper, TaskOptions,
};
pub use memory::MemoryPolicy;
pub use metrics::{MappingMetrics, TaskMetrics};
pub use phase::{MappingPhase, PhaseCursor};
pub use profiling::{KernelLauncher, Profiler, ProfilingEvent, StreamToken};
pub use ranking::rank_sources;
pub use task::{Operand, Privilege, ReplicaInfo, TaskDescriptor, TaskId, TaskKind};
pub use variant::{TaskVariant, VariantId, VariantRegistry};
