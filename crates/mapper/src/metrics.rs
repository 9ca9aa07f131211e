// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Mapping metrics.
//!
//! [`TaskMetrics`] counts what happened while mapping one task;
//! [`MappingMetrics`] aggregates them over the life of a mapper, together
//! with the kernel timings reported back through profiling.

use std::time::Duration;

/// Counters for a single mapped task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TaskMetrics {
    /// Operands whose region was already registered.
    pub cache_hits: u32,
    /// Operands bound into an existing, larger instance.
    pub containment_reuse: u32,
    /// Operands bound to a valid instance the runtime already had.
    pub adopted: u32,
    /// Operands that needed a fresh instance.
    pub allocations: u32,
    /// Operands placed in their fallback memory.
    pub fallbacks: u32,
    /// Copies scheduled to bring valid data into a bound instance.
    pub copies: u32,
}

/// Aggregate metrics for one mapper.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MappingMetrics {
    pub tasks_mapped: u64,
    pub tasks_failed: u64,
    pub launches_sliced: u64,
    pub slices: u64,
    pub cache_hits: u64,
    pub containment_reuse: u64,
    pub adopted: u64,
    pub allocations: u64,
    pub fallbacks: u64,
    pub copies: u64,
    /// Tasks with a profiling report.
    pub tasks_profiled: u64,
    /// Sum of reported kernel times.
    pub kernel_time: Duration,
}

impl MappingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one task's counters in.
    pub fn record_task(&mut self, task: &TaskMetrics) {
        self.tasks_mapped += 1;
        self.cache_hits += u64::from(task.cache_hits);
        self.containment_reuse += u64::from(task.containment_reuse);
        self.adopted += u64::from(task.adopted);
        self.allocations += u64::from(task.allocations);
        self.fallbacks += u64::from(task.fallbacks);
        self.copies += u64::from(task.copies);
    }

    pub fn record_failure(&mut self) {
        self.tasks_failed += 1;
    }

    pub fn record_slices(&mut self, slices: usize) {
        self.launches_sliced += 1;
        self.slices += slices as u64;
    }

    pub fn record_kernel(&mut self, elapsed: Duration) {
        self.tasks_profiled += 1;
        self.kernel_time += elapsed;
    }

    /// Fraction of operand bindings that reused an existing instance.
    pub fn reuse_ratio(&self) -> f64 {
        let reused = self.cache_hits + self.containment_reuse + self.adopted;
        let total = reused + self.allocations;
        if total == 0 {
            return 0.0;
        }
        reused as f64 / total as f64
    }

    /// Mean reported kernel time.
    pub fn mean_kernel_time(&self) -> Duration {
        if self.tasks_profiled == 0 {
            return Duration::ZERO;
        }
        self.kernel_time / self.tasks_profiled as u32
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        format!(
            "Mapping: {} tasks ({} failed), {} launches in {} slices, \
             {} hits, {} contained, {} adopted, {} allocated ({:.0}% reuse), \
             {} fallbacks, {} copies, {:.3}ms mean kernel",
            self.tasks_mapped,
            self.tasks_failed,
            self.launches_sliced,
            self.slices,
            self.cache_hits,
            self.containment_reuse,
            self.adopted,
            self.allocations,
            self.reuse_ratio() * 100.0,
            self.fallbacks,
            self.copies,
            self.mean_kernel_time().as_secs_f64() * 1000.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics() {
        let m = MappingMetrics::new();
        assert_eq!(m.reuse_ratio(), 0.0);
        assert_eq!(m.mean_kernel_time(), Duration::ZERO);
    }

    #[test]
    fn test_record_task() {
        let mut m = MappingMetrics::new();
        m.record_task(&TaskMetrics {
            cache_hits: 2,
            allocations: 1,
            ..Default::default()
        });
        m.record_task(&TaskMetrics {
            containment_reuse: 1,
            fallbacks: 1,
            allocations: 1,
            copies: 1,
            ..Default::default()
        });
        m.record_failure();

        assert_eq!(m.tasks_mapped, 2);
        assert_eq!(m.tasks_failed, 1);
        assert_eq!(m.allocations, 2);
        assert!((m.reuse_ratio() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_kernel_time() {
        let mut m = MappingMetrics::new();
        m.record_kernel(Duration::from_millis(4));
        m.record_kernel(Duration::from_millis(6));
        assert_eq!(m.mean_kernel_time(), Duration::from_millis(5));
    }

    #[test]
    fn test_summary_format() {
        let mut m = MappingMetrics::new();
        m.record_slices(4);
        m.record_task(&TaskMetrics {
            cache_hits: 1,
            ..Default::default()
        });
        let s = m.summary();
        assert!(s.contains("Mapping: 1 tasks"));
        assert!(s.contains("1 launches in 4 slices"));
        assert!(s.contains("100% reuse"));
    }
}
