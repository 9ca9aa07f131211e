// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Opaque identifiers for processors, memories, nodes, regions and instances.

use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident($inner:ty), $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

opaque_id!(
    /// Identifies a compute resource. Assigned once at machine discovery.
    ProcessorId(u64),
    "proc#"
);
opaque_id!(
    /// Identifies a named physical memory (frame buffer, NUMA domain, ...).
    MemoryId(u64),
    "mem#"
);
opaque_id!(
    /// Identifies a node (address space) of the cluster.
    NodeId(u32),
    "node#"
);
opaque_id!(
    /// Identifies a region tree: every region carved from one tensor shares it.
    RegionTreeId(u32),
    "tree#"
);
opaque_id!(
    /// Identifies one field (tensor) stored in a region.
    FieldId(u32),
    "field#"
);
opaque_id!(
    /// Identifies a physical instance handed out by the allocator.
    InstanceId(u64),
    "inst#"
);

/// The class of a processor.
///
/// The mapper uses the kind to pick task variants' target processors and
/// to decide which memories are close enough to hold operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    /// Latency-oriented host core.
    Cpu,
    /// Throughput-oriented accelerator with its own frame buffer.
    Gpu,
    /// OpenMP processor group.
    #[serde(rename = "openmp")]
    OpenMp,
    /// I/O-offload processor.
    Io,
    /// Auxiliary-language (Python) processor.
    Python,
}

impl ProcessorKind {
    /// Parses a kind from a loosely formatted string (`"GPU"`, `"toc"`, ...).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cpu" | "loc" | "loc_proc" => Some(Self::Cpu),
            "gpu" | "toc" | "toc_proc" => Some(Self::Gpu),
            "omp" | "openmp" | "omp_proc" => Some(Self::OpenMp),
            "io" | "io_proc" => Some(Self::Io),
            "py" | "python" | "py_proc" => Some(Self::Python),
            _ => None,
        }
    }

    /// Returns a short lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::OpenMp => "openmp",
            Self::Io => "io",
            Self::Python => "python",
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The class of a physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Node-wide host DRAM.
    System,
    /// Pinned host memory visible to every GPU on the node.
    ZeroCopy,
    /// A GPU's device memory.
    FrameBuffer,
    /// Host memory attached to one socket.
    Numa,
}

impl MemoryKind {
    /// Returns a short lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::ZeroCopy => "zero_copy",
            Self::FrameBuffer => "frame_buffer",
            Self::Numa => "numa",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named view over a tensor (or a slice of one).
///
/// Regions do not own storage; physical instances realise them. Two
/// regions of the same tree may overlap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct LogicalRegion {
    /// Tree the region was carved from.
    pub tree: RegionTreeId,
    /// Identifier of the region within its tree.
    pub id: u64,
}

impl LogicalRegion {
    pub fn new(tree: RegionTreeId, id: u64) -> Self {
        Self { tree, id }
    }
}

impl fmt::Display for LogicalRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region({}, {})", self.tree.0, self.id)
    }
}
