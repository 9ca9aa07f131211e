// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Task descriptors as submitted by the task-graph executor.

use index_space::{DomainPoint, FieldId, IndexDomain, LogicalRegion};
use instance_cache::PhysicalInstance;
use sharding::ShardId;
use std::fmt;
use strategy_ir::LayerId;

/// Identifies one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Access mode of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Privilege {
    ReadOnly,
    ReadWrite,
    /// Overwrites the whole operand; previous contents are not needed.
    WriteDiscard,
    /// Folds values into the operand with a reduction operator.
    Reduce,
}

impl Privilege {
    /// Returns `true` if the task needs the operand's current contents.
    pub fn reads(self) -> bool {
        matches!(self, Privilege::ReadOnly | Privilege::ReadWrite)
    }

    pub fn is_read_only(self) -> bool {
        self == Privilege::ReadOnly
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Privilege::ReadOnly => "read-only",
            Privilege::ReadWrite => "read-write",
            Privilege::WriteDiscard => "write-discard",
            Privilege::Reduce => "reduce",
        };
        f.write_str(s)
    }
}

/// One tensor operand of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    pub region: LogicalRegion,
    pub field: FieldId,
    /// Footprint of the region.
    pub bounds: IndexDomain,
    pub privilege: Privilege,
    /// Whether several processors access the operand concurrently.
    pub shared: bool,
    /// Bytes per point of the field.
    pub element_bytes: usize,
    /// Instances currently holding valid data for the region, as reported by
    /// the runtime. Empty when the region has never been written.
    pub valid: Vec<PhysicalInstance>,
}

impl Operand {
    /// Creates an exclusive operand with 4-byte elements and no valid
    /// instances.
    pub fn new(
        region: LogicalRegion,
        field: FieldId,
        bounds: IndexDomain,
        privilege: Privilege,
    ) -> Self {
        Self {
            region,
            field,
            bounds,
            privilege,
            shared: false,
            element_bytes: 4,
            valid: Vec::new(),
        }
    }

    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    pub fn with_element_bytes(mut self, element_bytes: usize) -> Self {
        self.element_bytes = element_bytes;
        self
    }

    pub fn with_valid(mut self, valid: Vec<PhysicalInstance>) -> Self {
        self.valid = valid;
        self
    }
}

/// The replica a task is being mapped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ReplicaInfo {
    pub shard: ShardId,
    pub total: u32,
}

impl ReplicaInfo {
    pub fn new(shard: u32, total: u32) -> Self {
        Self {
            shard: ShardId(shard),
            total,
        }
    }
}

/// Shape of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TaskKind {
    /// A standalone task with no launch domain.
    Single,
    /// A whole index launch, to be sliced.
    IndexLaunch,
    /// One point of an index launch.
    Point,
}

/// What the executor supplies for each unit of work.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub layer: LayerId,
    /// Launch domain of the index launch the task belongs to.
    pub launch_domain: Option<IndexDomain>,
    /// Point of the task within `launch_domain`; `None` for the launch itself.
    pub point: Option<DomainPoint>,
    pub operands: Vec<Operand>,
    /// Set when the control program runs replicated.
    pub replica: Option<ReplicaInfo>,
}

impl TaskDescriptor {
    /// A standalone task.
    pub fn single(id: TaskId, layer: LayerId) -> Self {
        Self {
            id,
            layer,
            launch_domain: None,
            point: None,
            operands: Vec::new(),
            replica: None,
        }
    }

    /// A whole index launch over `domain`.
    pub fn index_launch(id: TaskId, layer: LayerId, domain: IndexDomain) -> Self {
        Self {
            launch_domain: Some(domain),
            ..Self::single(id, layer)
        }
    }

    /// The task at `point` of an index launch over `domain`.
    pub fn point(id: TaskId, layer: LayerId, point: DomainPoint, domain: IndexDomain) -> Self {
        Self {
            launch_domain: Some(domain),
            point: Some(point),
            ..Self::single(id, layer)
        }
    }

    pub fn with_operand(mut self, operand: Operand) -> Self {
        self.operands.push(operand);
        self
    }

    pub fn with_replica(mut self, replica: ReplicaInfo) -> Self {
        self.replica = Some(replica);
        self
    }

    pub fn kind(&self) -> TaskKind {
        match (&self.launch_domain, &self.point) {
            (None, _) => TaskKind::Single,
            (Some(_), None) => TaskKind::IndexLaunch,
            (Some(_), Some(_)) => TaskKind::Point,
        }
    }
}
