// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for machine descriptions.

use index_space::{MemoryId, NodeId, ProcessorId};
use instance_cache::AllocError;

/// Errors that can occur when building or loading a machine description.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    /// Failed to read a description file.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    /// The description is not valid TOML or has the wrong shape.
    #[error("failed to parse machine description: {0}")]
    ParseError(String),

    /// A processor kind string is not recognised.
    #[error("unknown processor kind '{kind}' for {processor}")]
    UnknownKind { processor: ProcessorId, kind: String },

    /// A memory capacity string is not a valid budget.
    #[error("invalid capacity for {memory}: {source}")]
    InvalidCapacity {
        memory: MemoryId,
        source: AllocError,
    },

    /// Two processors share an id.
    #[error("duplicate processor {0}")]
    DuplicateProcessor(ProcessorId),

    /// Two memories share an id.
    #[error("duplicate memory {0}")]
    DuplicateMemory(MemoryId),

    /// An affinity names a processor that does not exist.
    #[error("affinity references unknown processor {0}")]
    UnknownProcessor(ProcessorId),

    /// An affinity names a memory that does not exist.
    #[error("affinity references unknown memory {0}")]
    UnknownMemory(MemoryId),

    /// A node hosts processors but no system memory.
    #[error("{0} has processors but no system memory")]
    NoSystemMemory(NodeId),
}
