// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Processors, memories and the affinity queries the mapper relies on.

use crate::MachineError;
use index_space::{MemoryId, MemoryKind, NodeId, ProcessorId, ProcessorKind};
use instance_cache::MemoryBudget;
use std::collections::{BTreeSet, HashMap};

/// A compute resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Processor {
    pub id: ProcessorId,
    pub kind: ProcessorKind,
    pub node: NodeId,
}

/// A physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Memory {
    pub id: MemoryId,
    pub kind: MemoryKind,
    pub node: NodeId,
    pub capacity: MemoryBudget,
}

/// A processor's access path to a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Affinity {
    pub processor: ProcessorId,
    pub memory: MemoryId,
    /// Relative bandwidth (higher is better).
    pub bandwidth: u32,
    /// Relative latency (lower is better).
    pub latency: u32,
}

/// The static description of a cluster.
#[derive(Debug, Clone)]
pub struct Machine {
    processors: Vec<Processor>,
    memories: Vec<Memory>,
    affinities: Vec<Affinity>,
    proc_index: HashMap<ProcessorId, usize>,
    mem_index: HashMap<MemoryId, usize>,
}

impl Machine {
    /// Builds a machine, checking that ids are unique, that affinities only
    /// reference known resources, and that every node with processors has a
    /// system memory.
    pub fn new(
        processors: Vec<Processor>,
        memories: Vec<Memory>,
        affinities: Vec<Affinity>,
    ) -> Result<Self, MachineError> {
        let mut proc_index = HashMap::with_capacity(processors.len());
        for (i, p) in processors.iter().enumerate() {
            if proc_index.insert(p.id, i).is_some() {
                return Err(MachineError::DuplicateProcessor(p.id));
            }
        }
        let mut mem_index = HashMap::with_capacity(memories.len());
        for (i, m) in memories.iter().enumerate() {
            if mem_index.insert(m.id, i).is_some() {
                return Err(MachineError::DuplicateMemory(m.id));
            }
        }
        for a in &affinities {
            if !proc_index.contains_key(&a.processor) {
                return Err(MachineError::UnknownProcessor(a.processor));
            }
            if !mem_index.contains_key(&a.memory) {
                return Err(MachineError::UnknownMemory(a.memory));
            }
        }

        let machine = Self {
            processors,
            memories,
            affinities,
            proc_index,
            mem_index,
        };
        for node in machine.nodes() {
            if machine.system_memory(node).is_none() {
                return Err(MachineError::NoSystemMemory(node));
            }
        }
        Ok(machine)
    }

    /// Builds a synthetic homogeneous cluster.
    ///
    /// Each node gets `cpus` CPU processors sharing one NUMA domain,
    /// `gpus` GPU processors each with its own 16 GB frame buffer, a 64 GB
    /// system memory and a 4 GB zero-copy memory. Processor and memory ids
    /// are assigned sequentially node by node, CPUs before GPUs.
    pub fn uniform(nodes: u32, cpus: usize, gpus: usize) -> Self {
        let mut processors = Vec::new();
        let mut memories = Vec::new();
        let mut affinities = Vec::new();
        let (mut next_proc, mut next_mem) = (0u64, 0u64);

        let mut memory = |memories: &mut Vec<Memory>, kind, node, capacity| {
            let id = MemoryId(next_mem);
            next_mem += 1;
            memories.push(Memory {
                id,
                kind,
                node,
                capacity,
            });
            id
        };
        let link = |processor, memory, bandwidth, latency| Affinity {
            processor,
            memory,
            bandwidth,
            latency,
        };

        for n in 0..nodes {
            let node = NodeId(n);
            let sysmem = memory(&mut memories, MemoryKind::System, node, MemoryBudget::from_gb(64));
            let zcmem = memory(&mut memories, MemoryKind::ZeroCopy, node, MemoryBudget::from_gb(4));
            let numa = memory(&mut memories, MemoryKind::Numa, node, MemoryBudget::from_gb(32));

            for _ in 0..cpus {
                let id = ProcessorId(next_proc);
                next_proc += 1;
                processors.push(Processor {
                    id,
                    kind: ProcessorKind::Cpu,
                    node,
                });
                affinities.push(link(id, numa, 150, 5));
                affinities.push(link(id, sysmem, 100, 10));
                affinities.push(link(id, zcmem, 50, 20));
            }
            for _ in 0..gpus {
                let id = ProcessorId(next_proc);
                next_proc += 1;
                processors.push(Processor {
                    id,
                    kind: ProcessorKind::Gpu,
                    node,
                });
                let fb = memory(&mut memories, MemoryKind::FrameBuffer, node, MemoryBudget::from_gb(16));
                affinities.push(link(id, fb, 1000, 1));
                affinities.push(link(id, zcmem, 50, 30));
            }
        }

        let proc_index = processors.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
        let mem_index = memories.iter().enumerate().map(|(i, m)| (m.id, i)).collect();
        Self {
            processors,
            memories,
            affinities,
            proc_index,
            mem_index,
        }
    }

    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    pub fn memories(&self) -> &[Memory] {
        &self.memories
    }

    pub fn affinities(&self) -> &[Affinity] {
        &self.affinities
    }

    pub fn processor(&self, id: ProcessorId) -> Option<&Processor> {
        self.proc_index.get(&id).map(|&i| &self.processors[i])
    }

    pub fn memory(&self, id: MemoryId) -> Option<&Memory> {
        self.mem_index.get(&id).map(|&i| &self.memories[i])
    }

    /// Returns every node hosting at least one processor, in ascending order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.processors
            .iter()
            .map(|p| p.node)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Returns the processors of `kind` on `node`, in ascending id order.
    pub fn local_processors(&self, node: NodeId, kind: ProcessorKind) -> Vec<&Processor> {
        let mut procs: Vec<&Processor> = self
            .processors
            .iter()
            .filter(|p| p.node == node && p.kind == kind)
            .collect();
        procs.sort_by_key(|p| p.id);
        procs
    }

    /// Returns the number of processors of `kind` on `node`.
    pub fn count(&self, node: NodeId, kind: ProcessorKind) -> usize {
        self.processors
            .iter()
            .filter(|p| p.node == node && p.kind == kind)
            .count()
    }

    pub fn affinity(&self, processor: ProcessorId, memory: MemoryId) -> Option<&Affinity> {
        self.affinities
            .iter()
            .find(|a| a.processor == processor && a.memory == memory)
    }

    pub fn has_affinity(&self, processor: ProcessorId, memory: MemoryId) -> bool {
        self.affinity(processor, memory).is_some()
    }

    /// Returns the best memory of `kind` addressable from `processor`:
    /// highest bandwidth, then lowest latency, then lowest id.
    pub fn best_memory(&self, processor: ProcessorId, kind: MemoryKind) -> Option<MemoryId> {
        self.affinities
            .iter()
            .filter(|a| a.processor == processor)
            .filter(|a| self.memory(a.memory).is_some_and(|m| m.kind == kind))
            .min_by_key(|a| (std::cmp::Reverse(a.bandwidth), a.latency, a.memory))
            .map(|a| a.memory)
    }

    /// Returns the frame buffer attached to a GPU.
    pub fn frame_buffer(&self, processor: ProcessorId) -> Option<MemoryId> {
        self.best_memory(processor, MemoryKind::FrameBuffer)
    }

    /// Returns the NUMA domain closest to a CPU or OpenMP processor.
    pub fn numa_domain(&self, processor: ProcessorId) -> Option<MemoryId> {
        self.best_memory(processor, MemoryKind::Numa)
    }

    /// Returns the lowest-id memory of `kind` on `node`.
    fn node_memory(&self, node: NodeId, kind: MemoryKind) -> Option<MemoryId> {
        self.memories
            .iter()
            .filter(|m| m.node == node && m.kind == kind)
            .map(|m| m.id)
            .min()
    }

    pub fn system_memory(&self, node: NodeId) -> Option<MemoryId> {
        self.node_memory(node, MemoryKind::System)
    }

    pub fn zero_copy(&self, node: NodeId) -> Option<MemoryId> {
        self.node_memory(node, MemoryKind::ZeroCopy)
    }

    /// Returns `(memory, capacity)` pairs, suitable for seeding an allocator.
    pub fn capacities(&self) -> Vec<(MemoryId, MemoryBudget)> {
        self.memories.iter().map(|m| (m.id, m.capacity)).collect()
    }

    /// Returns a one-line description for logging or CLI display.
    ///
    /// # Example output
    /// ```text
    /// Machine: 2 nodes, 12 processors (8 cpu, 4 gpu), 10 memories (264 GB total)
    /// ```
    pub fn summary(&self) -> String {
        let mut by_kind: Vec<(ProcessorKind, usize)> = Vec::new();
        for p in &self.processors {
            match by_kind.iter_mut().find(|(k, _)| *k == p.kind) {
                Some((_, n)) => *n += 1,
                None => by_kind.push((p.kind, 1)),
            }
        }
        let kinds = by_kind
            .iter()
            .map(|(k, n)| format!("{n} {}", k.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let total: usize = self.memories.iter().map(|m| m.capacity.as_bytes()).sum();
        format!(
            "Machine: {} nodes, {} processors ({kinds}), {} memories ({} GB total)",
            self.nodes().len(),
            self.processors.len(),
            self.memories.len(),
            total / (1024 * 1024 * 1024),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout() {
        let m = Machine::uniform(2, 4, 2);
        assert_eq!(m.processors().len(), 12);
        // Per node: system, zero-copy, NUMA, two frame buffers.
        assert_eq!(m.memories().len(), 10);
        assert_eq!(m.nodes(), vec![NodeId(0), NodeId(1)]);
        assert_eq!(m.count(NodeId(0), ProcessorKind::Cpu), 4);
        assert_eq!(m.count(NodeId(1), ProcessorKind::Gpu), 2);
    }

    #[test]
    fn test_local_processors_sorted() {
        let m = Machine::uniform(2, 2, 2);
        let gpus: Vec<_> = m
            .local_processors(NodeId(1), ProcessorKind::Gpu)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(gpus, vec![ProcessorId(6), ProcessorId(7)]);
    }

    #[test]
    fn test_memory_queries() {
        let m = Machine::uniform(1, 1, 2);
        let gpu0 = ProcessorId(1);
        let gpu1 = ProcessorId(2);
        let fb0 = m.frame_buffer(gpu0).unwrap();
        let fb1 = m.frame_buffer(gpu1).unwrap();
        assert_ne!(fb0, fb1);
        assert_eq!(m.memory(fb0).unwrap().kind, MemoryKind::FrameBuffer);
        assert!(m.frame_buffer(ProcessorId(0)).is_none());

        let numa = m.numa_domain(ProcessorId(0)).unwrap();
        assert_eq!(m.memory(numa).unwrap().kind, MemoryKind::Numa);
        assert!(m.numa_domain(gpu0).is_none());

        let zc = m.zero_copy(NodeId(0)).unwrap();
        assert!(m.has_affinity(gpu0, zc));
        assert!(!m.has_affinity(gpu0, fb1));
        assert!(m.system_memory(NodeId(0)).is_some());
        assert!(m.system_memory(NodeId(5)).is_none());
    }

    #[test]
    fn test_best_memory_prefers_bandwidth() {
        let node = NodeId(0);
        let cpu = ProcessorId(0);
        let mem = |id, kind| Memory {
            id: MemoryId(id),
            kind,
            node,
            capacity: MemoryBudget::from_gb(1),
        };
        let m = Machine::new(
            vec![Processor {
                id: cpu,
                kind: ProcessorKind::Cpu,
                node,
            }],
            vec![mem(0, MemoryKind::System), mem(1, MemoryKind::Numa), mem(2, MemoryKind::Numa)],
            vec![
                Affinity { processor: cpu, memory: MemoryId(1), bandwidth: 10, latency: 1 },
                Affinity { processor: cpu, memory: MemoryId(2), bandwidth: 20, latency: 9 },
            ],
        )
        .unwrap();
        assert_eq!(m.numa_domain(cpu), Some(MemoryId(2)));
    }

    #[test]
    fn test_rejects_duplicates() {
        let node = NodeId(0);
        let p = Processor {
            id: ProcessorId(3),
            kind: ProcessorKind::Cpu,
            node,
        };
        let err = Machine::new(vec![p, p], vec![], vec![]).unwrap_err();
        assert!(matches!(err, MachineError::DuplicateProcessor(ProcessorId(3))));
    }

    #[test]
    fn test_rejects_missing_system_memory() {
        let p = Processor {
            id: ProcessorId(0),
            kind: ProcessorKind::Gpu,
            node: NodeId(2),
        };
        let err = Machine::new(vec![p], vec![], vec![]).unwrap_err();
        assert!(matches!(err, MachineError::NoSystemMemory(NodeId(2))));
    }

    #[test]
    fn test_rejects_dangling_affinity() {
        let err = Machine::new(
            vec![],
            vec![],
            vec![Affinity {
                processor: ProcessorId(9),
                memory: MemoryId(0),
                bandwidth: 1,
                latency: 1,
            }],
        )
        .unwrap_err();
        assert!(matches!(err, MachineError::UnknownProcessor(ProcessorId(9))));
    }

    #[test]
    fn test_summary_format() {
        let s = Machine::uniform(2, 4, 2).summary();
        assert!(s.contains("2 nodes"));
        assert!(s.contains("12 processors"));
        assert!(s.contains("8 cpu"));
        assert!(s.contains("4 gpu"));
        assert!(s.contains("264 GB total"));
    }

    #[test]
    fn test_capacities() {
        let m = Machine::uniform(1, 1, 1);
        let caps = m.capacities();
        assert_eq!(caps.len(), 4);
        let fb = m.frame_buffer(ProcessorId(1)).unwrap();
        assert!(caps.contains(&(fb, MemoryBudget::from_gb(16))));
    }
}
