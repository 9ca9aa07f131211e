// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the placement engine.

use crate::{MappingPhase, TaskId};
use index_space::{DomainPoint, MemoryId, NodeId, ProcessorId, ProcessorKind};
use sharding::ShardId;
use strategy_ir::LayerId;

/// Errors that can occur while loading a model context or mapping a task.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// The configuration is unreadable or inconsistent.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A task names a layer the strategy does not define.
    #[error("{task} names {layer}, which has no strategy")]
    UnknownLayer { task: TaskId, layer: LayerId },

    /// A point task was submitted to a replica that does not own it.
    #[error("{task} at {point} is owned by {owner}, not {shard}")]
    NotLocallyOwned {
        task: TaskId,
        point: DomainPoint,
        shard: ShardId,
        owner: ShardId,
    },

    /// A processor id is unknown to the machine.
    #[error("unknown processor {0}")]
    UnknownProcessor(ProcessorId),

    /// A task was mapped onto a processor of another node.
    #[error("{processor} lives on {node}, not on this mapper's node")]
    RemoteProcessor { processor: ProcessorId, node: NodeId },

    /// Neither the layer nor the node offers a processor to run on.
    #[error("no {kind} processor on {node} for {layer}")]
    NoLocalProcessor {
        layer: LayerId,
        kind: ProcessorKind,
        node: NodeId,
    },

    /// The layer has no kernel for the processor kind it was sent to.
    #[error("{task}: {layer} has no variant for {kind} processors")]
    NoVariant {
        task: TaskId,
        layer: LayerId,
        kind: ProcessorKind,
    },

    /// No memory is reachable for an operand.
    #[error("no target memory for operand {operand} of {task} on {processor}")]
    NoTargetMemory {
        task: TaskId,
        operand: usize,
        processor: ProcessorId,
    },

    /// Allocation failed in the target memory and in its fallback.
    #[error("placement failed for operand {operand} of {task} in {memory} (fallback: {fallback:?})")]
    PlacementFailure {
        task: TaskId,
        operand: usize,
        memory: MemoryId,
        fallback: Option<MemoryId>,
    },

    /// A phase was entered after a later one.
    #[error("{task}: phase {next} cannot follow {previous}")]
    PhaseOrder {
        task: TaskId,
        previous: MappingPhase,
        next: MappingPhase,
    },

    /// Loading the partition strategy failed.
    #[error("strategy error: {0}")]
    Strategy(#[from] strategy_ir::StrategyError),

    /// Loading the machine description failed.
    #[error("machine error: {0}")]
    Machine(#[from] machine::MachineError),

    /// A sharding query failed.
    #[error("sharding error: {0}")]
    Sharding(#[from] sharding::ShardingError),

    /// The instance cache rejected an operation.
    #[error("cache error: {0}")]
    Cache(#[from] instance_cache::CacheError),

    /// The allocator rejected a request.
    #[error("allocation error: {0}")]
    Alloc(#[from] instance_cache::AllocError),
}

impl MapperError {
    /// Returns `true` for errors that fail only the task being mapped.
    ///
    /// Load-time errors (strategy, machine, configuration) abort model load
    /// instead.
    pub fn is_task_error(&self) -> bool {
        !matches!(
            self,
            MapperError::ConfigError(_) | MapperError::Strategy(_) | MapperError::Machine(_)
        )
    }
}
