// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! TOML machine descriptions.
//!
//! # TOML Format
//! ```toml
//! [[processors]]
//! id = 0
//! kind = "cpu"
//! node = 0
//!
//! [[processors]]
//! id = 1
//! kind = "gpu"
//! node = 0
//!
//! [[memories]]
//! id = 0
//! kind = "system"
//! node = 0
//! capacity = "64G"
//!
//! [[memories]]
//! id = 1
//! kind = "frame_buffer"
//! node = 0
//! capacity = "16G"
//!
//! [[affinities]]
//! processor = 1
//! memory = 1
//! bandwidth = 1000
//! latency = 1
//! ```
//!
//! Processor kinds accept the usual aliases (`loc` for CPU, `toc` for GPU,
//! `omp` for OpenMP, `py` for Python).

use crate::{Affinity, Machine, MachineError, Memory, Processor};
use index_space::{MemoryId, MemoryKind, NodeId, ProcessorId, ProcessorKind};
use instance_cache::MemoryBudget;
use std::path::Path;

/// Serialised form of a [`Machine`].
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MachineDescription {
    #[serde(default)]
    pub processors: Vec<ProcessorEntry>,
    #[serde(default)]
    pub memories: Vec<MemoryEntry>,
    #[serde(default)]
    pub affinities: Vec<Affinity>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcessorEntry {
    pub id: ProcessorId,
    pub kind: String,
    pub node: NodeId,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MemoryEntry {
    pub id: MemoryId,
    pub kind: MemoryKind,
    pub node: NodeId,
    /// Human-readable capacity (`"512M"`, `"16G"`, raw bytes).
    pub capacity: String,
}

impl MachineDescription {
    /// Converts the description into a validated [`Machine`].
    pub fn build(self) -> Result<Machine, MachineError> {
        let processors = self
            .processors
            .into_iter()
            .map(|p| {
                let kind = ProcessorKind::from_str_loose(&p.kind).ok_or_else(|| {
                    MachineError::UnknownKind {
                        processor: p.id,
                        kind: p.kind.clone(),
                    }
                })?;
                Ok(Processor {
                    id: p.id,
                    kind,
                    node: p.node,
                })
            })
            .collect::<Result<Vec<_>, MachineError>>()?;

        let memories = self
            .memories
            .into_iter()
            .map(|m| {
                let capacity = MemoryBudget::parse(&m.capacity).map_err(|source| {
                    MachineError::InvalidCapacity {
                        memory: m.id,
                        source,
                    }
                })?;
                Ok(Memory {
                    id: m.id,
                    kind: m.kind,
                    node: m.node,
                    capacity,
                })
            })
            .collect::<Result<Vec<_>, MachineError>>()?;

        Machine::new(processors, memories, self.affinities)
    }
}

impl From<&Machine> for MachineDescription {
    fn from(machine: &Machine) -> Self {
        Self {
            processors: machine
                .processors()
                .iter()
                .map(|p| ProcessorEntry {
                    id: p.id,
                    kind: p.kind.as_str().to_string(),
                    node: p.node,
                })
                .collect(),
            memories: machine
                .memories()
                .iter()
                .map(|m| MemoryEntry {
                    id: m.id,
                    kind: m.kind,
                    node: m.node,
                    capacity: m.capacity.to_string(),
                })
                .collect(),
            affinities: machine.affinities().to_vec(),
        }
    }
}

impl Machine {
    /// Loads a machine description from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, MachineError> {
        let content = std::fs::read_to_string(path).map_err(|source| MachineError::ReadError {
            path: path.display().to_string(),
            source,
        })?;
        let machine = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), "{}", machine.summary());
        Ok(machine)
    }

    /// Parses a machine description from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, MachineError> {
        let description: MachineDescription =
            toml::from_str(toml_str).map_err(|e| MachineError::ParseError(e.to_string()))?;
        description.build()
    }

    /// Serialises the machine to TOML.
    pub fn to_toml(&self) -> Result<String, MachineError> {
        toml::to_string_pretty(&MachineDescription::from(self))
            .map_err(|e| MachineError::ParseError(format!("TOML serialise error: {e}")))
    }
}
