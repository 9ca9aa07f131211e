// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `placement simulate` command: drive the mapper with a synthetic workload.
//!
//! Every pass walks the layers in model order. Each layer's launch is
//! sliced once per replica, and every owned point is then placed on a
//! blocking worker, so mappers of all replicas hit the shared node cache
//! concurrently:
//! ```text
//! layer k ─▶ slice (per replica) ─▶ place points ─▶ launch ─▶ report profiling
//!                                       ▲
//!                          shared InstanceCache + BudgetAllocator
//! ```
//! Kernel times come from a simulated launcher that charges each bound
//! instance by the bandwidth of its processor-memory affinity.

use super::{banner, load_context, resolve_config, Overrides};
use index_space::{
    DomainPoint, FieldId, IndexDomain, InstanceId, LogicalRegion, ProcessorId, RegionTreeId,
};
use instance_cache::{AllocationStats, BudgetAllocator, CacheStats, InstanceCache};
use machine::Machine;
use mapper::{
    KernelLauncher, MapperConfig, MapperError, MappingMetrics, Operand, Placement,
    PlacementMapper, Privilege, Profiler, ProfilingEvent, ReplicaInfo, StreamToken,
    TaskDescriptor, TaskId,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use strategy_ir::LayerStrategy;
use tokio::task::JoinSet;

/// Shape of the synthetic workload.
#[derive(Debug, Clone)]
pub struct Workload {
    pub iterations: usize,
    pub replicas: u32,
    pub elements: usize,
    pub evict: bool,
}

/// Outcome of one simulation.
#[derive(Debug)]
pub struct Report {
    /// Metrics of each replica's mapper, by shard.
    pub replicas: Vec<MappingMetrics>,
    pub cache: CacheStats,
    pub allocation: AllocationStats,
    /// Kernel time and task count per processor.
    pub per_processor: BTreeMap<ProcessorId, (u64, Duration)>,
    /// Points whose placement failed with a task-level error.
    pub failed: u64,
    pub evicted: u64,
    pub wall_time: Duration,
}

pub async fn execute(
    config: Option<PathBuf>,
    overrides: Overrides,
    workload: Workload,
) -> anyhow::Result<()> {
    banner("Mapping Simulation");

    let config = resolve_config(config, overrides)?;
    println!("  Config:");
    println!("   Machine:    {}", config.machine_path.display());
    println!("   Strategy:   {}", config.strategy_path.display());
    println!("   Layers:     {}", config.num_layers);
    println!("   Iterations: {}", workload.iterations);
    println!("   Replicas:   {}", workload.replicas);
    println!("   Elements:   {}", workload.elements);
    println!("   Evict:      {}", workload.evict);
    println!();

    let report = simulate(&config, &workload).await?;

    // ── Per-Replica Metrics ────────────────────────────────────
    for (shard, metrics) in report.replicas.iter().enumerate() {
        println!("  shard#{shard}: {}", metrics.summary());
    }
    println!("  {}", report.cache.summary());
    println!("  {}", report.allocation.summary());
    println!(
        "  {} failed points, {} evictions, {:.2} ms wall time",
        report.failed,
        report.evicted,
        report.wall_time.as_secs_f64() * 1000.0
    );
    println!();

    // ── Per-Processor Kernel Time ──────────────────────────────
    println!("  {:<10} {:>8} {:>14}", "Processor", "Tasks", "Kernel (us)");
    println!("  {}", "-".repeat(34));
    for (proc, (tasks, elapsed)) in &report.per_processor {
        println!(
            "  {:<10} {tasks:>8} {:>14.1}",
            proc.to_string(),
            elapsed.as_secs_f64() * 1e6
        );
    }
    println!();
    Ok(())
}

/// Runs `workload` against the model described by `config`.
pub async fn simulate(config: &MapperConfig, workload: &Workload) -> anyhow::Result<Report> {
    if workload.replicas == 0 {
        anyhow::bail!("at least one replica is required");
    }
    if workload.elements == 0 {
        anyhow::bail!("operands need at least one element");
    }

    let context = Arc::new(load_context(config)?);
    let allocator = Arc::new(BudgetAllocator::new(context.machine().capacities()));
    let cache = Arc::new(InstanceCache::new());
    let profiler = Arc::new(CollectingProfiler::default());
    let launcher = Arc::new(SimulatedLauncher::new(context.machine().clone()));

    let mappers: Vec<Arc<PlacementMapper>> = (0..workload.replicas)
        .map(|_| {
            let mapper = PlacementMapper::from_config(context.clone(), allocator.clone(), config)
                .with_cache(cache.clone())
                .with_profiler(profiler.clone());
            Arc::new(mapper)
        })
        .collect();

    let start = Instant::now();
    let mut next_id = 0u64;
    let mut failed = 0;
    let mut evicted = 0;
    let mut previous: Vec<InstanceId> = Vec::new();

    for iteration in 0..workload.iterations {
        for layer in context.strategy().iter() {
            tracing::debug!(iteration, layer = %layer.id(), "mapping layer");
            let mut workers = JoinSet::new();

            for (shard, mapper) in mappers.iter().enumerate() {
                let replica = ReplicaInfo::new(shard as u32, workload.replicas);
                next_id += 1;
                let launch = TaskDescriptor::index_launch(
                    TaskId(next_id),
                    layer.id(),
                    layer.launch_domain().clone(),
                )
                .with_replica(replica);
                let sliced = mapper.place(&launch)?;
                let Some(plan) = sliced.slices else {
                    continue;
                };

                for slice in &plan.slices {
                    for point in slice.domain.points() {
                        next_id += 1;
                        let task = point_task(
                            TaskId(next_id),
                            layer,
                            point,
                            replica,
                            workload.elements,
                        )?;
                        let mapper = mapper.clone();
                        let launcher = launcher.clone();
                        workers.spawn_blocking(move || run_point(&mapper, launcher.as_ref(), &task));
                    }
                }
            }

            let mut activations = Vec::new();
            while let Some(joined) = workers.join_next().await {
                match joined? {
                    Ok(placement) => {
                        if let Some(binding) = placement.binding(0) {
                            activations.push(binding.instance.id);
                        }
                    }
                    Err(e) if e.is_task_error() => {
                        tracing::warn!("placement failed: {e}");
                        failed += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            if workload.evict {
                for id in previous.drain(..) {
                    if mappers[0].handle_eviction(id).is_some() {
                        evicted += 1;
                    }
                }
            }
            activations.sort();
            activations.dedup();
            previous = activations;
        }
    }

    cache.check_invariants()?;
    Ok(Report {
        replicas: mappers.iter().map(|m| m.metrics()).collect(),
        cache: cache.stats(),
        allocation: allocator.stats(),
        per_processor: profiler.per_processor(),
        failed,
        evicted,
        wall_time: start.elapsed(),
    })
}

/// Builds the point task of `layer` at `point`: a private activation slice
/// written by the point, and the layer's weights, read by every point.
fn point_task(
    id: TaskId,
    layer: &LayerStrategy,
    point: DomainPoint,
    replica: ReplicaInfo,
    elements: usize,
) -> anyhow::Result<TaskDescriptor> {
    let launch = layer.launch_domain();
    let offset = launch
        .linearize(&point)
        .ok_or_else(|| anyhow::anyhow!("point {point} outside {launch}"))?;
    let width = elements as i64;
    let lo = offset as i64 * width;

    let tree = layer.id().0 as u32 * 2;
    let activation = Operand::new(
        LogicalRegion::new(RegionTreeId(tree), offset),
        FieldId(0),
        IndexDomain::new(vec![lo], vec![lo + width - 1])?,
        Privilege::WriteDiscard,
    );
    let weights = Operand::new(
        LogicalRegion::new(RegionTreeId(tree + 1), 0),
        FieldId(0),
        IndexDomain::from_extents(&[elements])?,
        Privilege::ReadOnly,
    )
    .shared();

    Ok(TaskDescriptor::point(id, layer.id(), point, launch.clone())
        .with_operand(activation)
        .with_operand(weights)
        .with_replica(replica))
}

/// Places one point task, launches its kernel and reports the timing.
fn run_point(
    mapper: &PlacementMapper,
    launcher: &dyn KernelLauncher,
    task: &TaskDescriptor,
) -> Result<Placement, MapperError> {
    let placement = mapper.place(task)?;
    if let Some(processor) = placement.processor {
        if let Some(elapsed) = launcher.launch(&placement, StreamToken(processor.0)) {
            mapper.report_profiling(&ProfilingEvent {
                task: placement.task,
                layer: placement.layer,
                processor,
                elapsed,
            });
        }
    }
    Ok(placement)
}

/// Charges each bound instance `size_bytes * 1000 / bandwidth` nanoseconds.
struct SimulatedLauncher {
    machine: Machine,
}

impl SimulatedLauncher {
    fn new(machine: Machine) -> Self {
        Self { machine }
    }
}

impl KernelLauncher for SimulatedLauncher {
    fn launch(&self, placement: &Placement, stream: StreamToken) -> Option<Duration> {
        let processor = placement.processor?;
        let mut nanos = 0u64;
        for binding in &placement.bindings {
            let bandwidth = self
                .machine
                .affinity(processor, binding.memory)
                .map(|a| u64::from(a.bandwidth.max(1)))?;
            nanos += binding.instance.size_bytes as u64 * 1000 / bandwidth;
        }
        tracing::trace!(task = %placement.task, %stream, nanos, "kernel launched");
        Some(Duration::from_nanos(nanos))
    }
}

/// Keeps every profiling event in memory.
#[derive(Default)]
struct CollectingProfiler {
    events: Mutex<Vec<ProfilingEvent>>,
}

impl CollectingProfiler {
    fn per_processor(&self) -> BTreeMap<ProcessorId, (u64, Duration)> {
        let events = self.events.lock().unwrap_or_else(|p| p.into_inner());
        let mut totals = BTreeMap::new();
        for event in events.iter() {
            let entry = totals.entry(event.processor).or_insert((0, Duration::ZERO));
            entry.0 += 1;
            entry.1 += event.elapsed;
        }
        totals
    }
}

impl Profiler for CollectingProfiler {
    fn record(&self, event: &ProfilingEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event.clone());
    }
}
