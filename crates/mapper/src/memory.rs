// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Target and fallback memory selection.
//!
//! | Processor       | Target                                   | Fallback on OOM |
//! |-----------------|------------------------------------------|-----------------|
//! | GPU             | own frame buffer (zero-copy when shared read-only) | zero-copy |
//! | CPU, OpenMP     | closest NUMA domain, else system memory  | system memory   |
//! | I/O, Python     | system memory                            | none            |

use crate::Operand;
use index_space::{MemoryId, MemoryKind, ProcessorKind};
use machine::{Machine, Processor};

/// Which memory an operand lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MemoryPolicy {
    /// Retry an out-of-memory allocation once in the fallback memory.
    pub zero_copy_fallback: bool,
    /// Place read-only operands shared across processors in zero-copy memory.
    pub shared_read_only_zero_copy: bool,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            zero_copy_fallback: true,
            shared_read_only_zero_copy: true,
        }
    }
}

impl MemoryPolicy {
    /// Returns the memory `operand` should live in when `processor` runs the
    /// task.
    pub fn target_memory(
        &self,
        machine: &Machine,
        processor: &Processor,
        operand: &Operand,
    ) -> Option<MemoryId> {
        match processor.kind {
            ProcessorKind::Gpu => {
                if self.shared_read_only_zero_copy
                    && operand.shared
                    && operand.privilege.is_read_only()
                {
                    if let Some(zc) = machine
                        .best_memory(processor.id, MemoryKind::ZeroCopy)
                        .or_else(|| machine.zero_copy(processor.node))
                    {
                        return Some(zc);
                    }
                }
                machine.frame_buffer(processor.id)
            }
            ProcessorKind::Cpu | ProcessorKind::OpenMp => machine
                .numa_domain(processor.id)
                .or_else(|| machine.system_memory(processor.node)),
            ProcessorKind::Io | ProcessorKind::Python => machine.system_memory(processor.node),
        }
    }

    /// Returns the memory to retry in after `failed` ran out of space, if
    /// any.
    pub fn fallback_memory(
        &self,
        machine: &Machine,
        processor: &Processor,
        failed: MemoryId,
    ) -> Option<MemoryId> {
        if !self.zero_copy_fallback {
            return None;
        }
        let fallback = match machine.memory(failed)?.kind {
            MemoryKind::FrameBuffer => machine.zero_copy(processor.node),
            MemoryKind::Numa => machine.system_memory(processor.node),
            MemoryKind::System | MemoryKind::ZeroCopy => None,
        };
        fallback.filter(|&m| m != failed)
    }
}
