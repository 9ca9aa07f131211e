// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-layer placement strategies.

use crate::{DomainDecomposition, StrategyError};
use index_space::{DomainPoint, IndexDomain, NodeId, ProcessorId, ProcessorKind};
use machine::Machine;
use std::fmt;

/// Position of a layer in the model graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct LayerId(pub usize);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Opaque correlation id carried by every task of a layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct MappingTag(pub u64);

impl fmt::Display for MappingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag#{}", self.0)
    }
}

/// How one layer is spread across processors.
///
/// Holds the global assignment (every processor of the layer, on every
/// node) and, for the node this strategy was built on, the local
/// processors together with their precomputed grid points.
#[derive(Debug, Clone)]
pub struct LayerStrategy {
    id: LayerId,
    name: String,
    kind: ProcessorKind,
    tag: MappingTag,
    decomposition: DomainDecomposition,
    local_processors: Vec<ProcessorId>,
    local_points: Vec<DomainPoint>,
}

impl LayerStrategy {
    /// Builds a layer strategy for the processors of `machine`, viewed from
    /// `node`.
    ///
    /// Fails if the decomposition is malformed, if a processor is unknown
    /// to the machine, or if any processor is not of `kind`.
    pub fn new(
        id: LayerId,
        kind: ProcessorKind,
        dims: Vec<usize>,
        processors: Vec<ProcessorId>,
        tag: MappingTag,
        machine: &Machine,
        node: NodeId,
    ) -> Result<Self, StrategyError> {
        let decomposition =
            DomainDecomposition::new(dims, processors).map_err(|e| e.in_layer(id))?;

        let mut local_processors = Vec::new();
        let mut local_points = Vec::new();
        for (k, &p) in decomposition.processors().iter().enumerate() {
            let info = machine
                .processor(p)
                .ok_or(StrategyError::UnknownProcessor {
                    layer: id,
                    processor: p,
                })?;
            if info.kind != kind {
                return Err(StrategyError::KindMismatch {
                    layer: id,
                    processor: p,
                    expected: kind,
                    found: info.kind,
                });
            }
            if info.node == node {
                local_processors.push(p);
                if let Some(point) = decomposition.point_of(k) {
                    local_points.push(point);
                }
            }
        }

        Ok(Self {
            id,
            name: id.to_string(),
            kind,
            tag,
            decomposition,
            local_processors,
            local_points,
        })
    }

    /// Sets a human-readable name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ProcessorKind {
        self.kind
    }

    pub fn tag(&self) -> MappingTag {
        self.tag
    }

    pub fn decomposition(&self) -> &DomainDecomposition {
        &self.decomposition
    }

    pub fn dims(&self) -> &[usize] {
        self.decomposition.dims()
    }

    /// Returns every processor of the layer in flat assignment order.
    pub fn global_processors(&self) -> &[ProcessorId] {
        self.decomposition.processors()
    }

    /// Returns the layer's processors on this node, in assignment order.
    pub fn local_processors(&self) -> &[ProcessorId] {
        &self.local_processors
    }

    pub fn launch_domain(&self) -> &IndexDomain {
        self.decomposition.launch_domain()
    }

    /// Returns `true` if `processor` is assigned to this layer on any node.
    pub fn contains(&self, processor: ProcessorId) -> bool {
        self.decomposition.is_local(processor)
    }

    /// Returns `true` if `processor` is assigned to this layer on this node.
    pub fn is_local_processor(&self, processor: ProcessorId) -> bool {
        self.local_processors.contains(&processor)
    }

    /// Returns the flat index of `processor` in the assignment.
    pub fn find_local_offset(&self, processor: ProcessorId) -> Option<usize> {
        self.global_processors().iter().position(|&p| p == processor)
    }

    /// Returns the grid point of `processor`.
    pub fn find_local_point(&self, processor: ProcessorId) -> Option<DomainPoint> {
        match self.local_processors.iter().position(|&p| p == processor) {
            Some(i) => self.local_points.get(i).cloned(),
            None => self.decomposition.local_point(processor),
        }
    }

    /// Returns the block of `global` (an inclusive domain) owned by
    /// `processor`.
    pub fn find_local_domain(&self, processor: ProcessorId, global: &IndexDomain) -> Option<IndexDomain> {
        self.decomposition.local_domain(processor, global)
    }

    /// Returns a one-line description.
    ///
    /// # Example output
    /// ```text
    /// layer#0 'fc1': gpu x [2, 2] (4 procs, 2 local), tag#7
    /// ```
    pub fn summary(&self) -> String {
        format!(
            "{} '{}': {} x {:?} ({} procs, {} local), {}",
            self.id,
            self.name,
            self.kind,
            self.dims(),
            self.decomposition.len(),
            self.local_processors.len(),
            self.tag,
        )
    }
}
