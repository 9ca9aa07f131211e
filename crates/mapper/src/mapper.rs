// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The placement engine.
//!
//! ```text
//! TaskDescriptor
//!     │  select_options   which processor, which replica
//!     │  slice            index launches only
//!     ▼
//!     │  map              operand → memory → instance (cache, then allocator)
//!     │  select_sources   rank valid instances for scheduled copies
//!     ▼
//!  Placement ──► executor / kernel launcher ──► report_profiling
//! ```
//!
//! Every phase is a plain method; [`PlacementMapper::place`] drives them in
//! order for one task.

use crate::{
    MapperConfig, MapperError, MappingMetrics, MappingPhase, MemoryPolicy, ModelContext, Operand,
    PhaseCursor, Profiler, ProfilingEvent, TaskDescriptor, TaskId, TaskKind, TaskMetrics,
    VariantId,
};
use crate::ranking::rank_sources;
use index_space::{
    DomainPoint, FieldId, IndexDomain, InstanceId, LogicalRegion, MemoryId, NodeId, ProcessorId,
};
use instance_cache::{
    AllocationRequest, CacheError, CacheStats, InstanceAllocator, InstanceCache, LookupOutcome,
    PhysicalInstance,
};
use machine::{MachineError, Processor};
use sharding::{ShardId, ShardingFunction, ShardingId, SlicePlan};
use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard};
use strategy_ir::{LayerId, LayerStrategy};

/// Who runs a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Ownership {
    /// This replica maps and runs the task.
    Local,
    /// Another replica owns the task's point.
    Remote { owner: ShardId },
    /// The owning processor lives on another node; the task is sent there.
    Forwarded { node: NodeId },
}

/// Output of the `select_options` phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TaskOptions {
    pub initial_processor: ProcessorId,
    /// Kernel the task runs on the initial processor.
    pub variant: VariantId,
    pub ownership: Ownership,
    /// Strategy placements are pinned, so this is always `false`.
    pub stealable: bool,
    pub map_locally: bool,
}

/// Where an operand's instance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum BindingSource {
    /// The region was already registered in the cache.
    Cached,
    /// An existing instance covers the region.
    Contained,
    /// A valid instance reported by the runtime already sat in the target
    /// memory.
    Adopted,
    /// The allocator created a fresh instance.
    Allocated,
}

/// The instance bound to one operand.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OperandBinding {
    /// Position of the operand in the task.
    pub operand: usize,
    pub memory: MemoryId,
    pub instance: PhysicalInstance,
    pub source: BindingSource,
    /// Whether the fallback memory was used.
    pub fallback: bool,
}

/// The mapper's decision for a dependent-partition operation: where the
/// region it reads is bound, and the copy that fills it if needed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PartitionMapping {
    pub binding: OperandBinding,
    pub copy: Option<CopyRequest>,
}

/// A copy the runtime must perform before the task runs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CopyRequest {
    pub task: TaskId,
    pub operand: usize,
    pub region: LogicalRegion,
    pub field: FieldId,
    pub bounds: IndexDomain,
    pub destination: PhysicalInstance,
    /// Candidate sources. Ranked best first once the `select_sources` phase
    /// has run.
    pub sources: Vec<PhysicalInstance>,
}

/// The mapper's decision for one task.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Placement {
    pub task: TaskId,
    pub layer: LayerId,
    /// Processor the task runs on; `None` for a sliced index launch.
    pub processor: Option<ProcessorId>,
    /// Kernel selected for `processor`.
    pub variant: Option<VariantId>,
    pub slices: Option<SlicePlan>,
    pub bindings: Vec<OperandBinding>,
    pub copies: Vec<CopyRequest>,
    /// Phases the task went through.
    pub phases: Vec<MappingPhase>,
}

impl Placement {
    fn empty(task: TaskId, layer: LayerId) -> Self {
        Self {
            task,
            layer,
            processor: None,
            variant: None,
            slices: None,
            bindings: Vec::new(),
            copies: Vec::new(),
            phases: Vec::new(),
        }
    }

    /// Returns the binding of operand `index`.
    pub fn binding(&self, index: usize) -> Option<&OperandBinding> {
        self.bindings.iter().find(|b| b.operand == index)
    }

    /// Counts what happened while mapping this task.
    pub fn metrics(&self) -> TaskMetrics {
        tally(&self.bindings, self.copies.len())
    }
}

fn tally(bindings: &[OperandBinding], copies: usize) -> TaskMetrics {
    let mut m = TaskMetrics::default();
    for binding in bindings {
        match binding.source {
            BindingSource::Cached => m.cache_hits += 1,
            BindingSource::Contained => m.containment_reuse += 1,
            BindingSource::Adopted => m.adopted += 1,
            BindingSource::Allocated => m.allocations += 1,
        }
        if binding.fallback {
            m.fallbacks += 1;
        }
    }
    m.copies = copies as u32;
    m
}

/// Maps tasks of one loaded model on one node.
///
/// Shared by every worker thread of the node. The instance cache is the
/// only mutable placement state and serialises itself; a cache can also be
/// shared between several mappers of the same node with
/// [`PlacementMapper::with_cache`].
pub struct PlacementMapper {
    context: Arc<ModelContext>,
    cache: Arc<InstanceCache>,
    allocator: Arc<dyn InstanceAllocator>,
    policy: MemoryPolicy,
    profiler: Option<Arc<dyn Profiler>>,
    profiling: bool,
    metrics: Mutex<MappingMetrics>,
}

impl PlacementMapper {
    /// Creates a mapper with a private cache and the default memory policy.
    pub fn new(context: Arc<ModelContext>, allocator: Arc<dyn InstanceAllocator>) -> Self {
        tracing::info!(
            node = %context.node(),
            layers = context.strategy().len(),
            "placement mapper created for strategy '{}'",
            context.strategy().name()
        );
        Self {
            context,
            cache: Arc::new(InstanceCache::new()),
            allocator,
            policy: MemoryPolicy::default(),
            profiler: None,
            profiling: true,
            metrics: Mutex::new(MappingMetrics::new()),
        }
    }

    /// Creates a mapper with the policy and profiling switch of `config`.
    pub fn from_config(
        context: Arc<ModelContext>,
        allocator: Arc<dyn InstanceAllocator>,
        config: &MapperConfig,
    ) -> Self {
        let mut mapper = Self::new(context, allocator).with_policy(config.policy());
        mapper.profiling = config.enable_profiling;
        mapper
    }

    pub fn with_policy(mut self, policy: MemoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses `cache` instead of a private one.
    pub fn with_cache(mut self, cache: Arc<InstanceCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_profiler(mut self, profiler: Arc<dyn Profiler>) -> Self {
        self.profiler = Some(profiler);
        self
    }

    pub fn context(&self) -> &ModelContext {
        &self.context
    }

    pub fn cache(&self) -> &InstanceCache {
        &self.cache
    }

    pub fn policy(&self) -> MemoryPolicy {
        self.policy
    }

    /// Returns a snapshot of the mapping metrics.
    pub fn metrics(&self) -> MappingMetrics {
        self.counters().clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ── Phases ─────────────────────────────────────────────────

    /// Decides where a task starts and whether this replica owns it.
    ///
    /// Point tasks start on the processor owning their point; under
    /// replication the point's shard decides ownership first. Standalone
    /// tasks and whole launches start on the layer's first local processor.
    pub fn select_options(&self, task: &TaskDescriptor) -> Result<TaskOptions, MapperError> {
        let layer = self.context.layer(task.id, task.layer)?;
        let function = self.context.sharding(task.id, task.layer)?;

        let (initial_processor, ownership) = match (&task.point, &task.launch_domain) {
            (Some(point), Some(domain)) => {
                let owner_proc = function.find_proc(point, domain)?;
                match task.replica {
                    Some(replica) => {
                        let owner = function.shard(point, domain, replica.total)?;
                        if owner != replica.shard {
                            (owner_proc, Ownership::Remote { owner })
                        } else if self.is_on_node(owner_proc) {
                            (owner_proc, Ownership::Local)
                        } else {
                            (self.first_local(task.id, layer)?, Ownership::Local)
                        }
                    }
                    None => match self.context.machine().processor(owner_proc) {
                        Some(p) if p.node != self.context.node() => {
                            (owner_proc, Ownership::Forwarded { node: p.node })
                        }
                        _ => (owner_proc, Ownership::Local),
                    },
                }
            }
            _ => (self.first_local(task.id, layer)?, Ownership::Local),
        };
        let variant = self.select_variant(task, initial_processor)?;

        tracing::debug!(
            task = %task.id,
            layer = %task.layer,
            "options: start on {initial_processor} with {variant}, {ownership:?}"
        );
        Ok(TaskOptions {
            initial_processor,
            variant,
            ownership,
            stealable: false,
            map_locally: true,
        })
    }

    /// Splits an index launch over the layer's processors.
    ///
    /// Under replication only the points owned by the calling shard are
    /// sliced. A task without a launch domain is sliced over the layer's own
    /// processor grid.
    pub fn slice(&self, task: &TaskDescriptor) -> Result<SlicePlan, MapperError> {
        let layer = self.context.layer(task.id, task.layer)?;
        let launch = task.launch_domain.as_ref().unwrap_or(layer.launch_domain());
        let plan = match task.replica {
            Some(replica) => {
                let function = self.context.sharding(task.id, task.layer)?;
                SlicePlan::for_shard(layer, launch, function, replica.shard, replica.total)?
            }
            None => SlicePlan::for_layer(layer, launch),
        };
        self.counters().record_slices(plan.num_slices());
        Ok(plan)
    }

    /// Binds every operand of `task` to an instance for `processor`.
    ///
    /// Copy requests in the result list their sources unranked; see
    /// [`PlacementMapper::select_sources`].
    pub fn map(&self, task: &TaskDescriptor, processor: ProcessorId) -> Result<Placement, MapperError> {
        self.context.layer(task.id, task.layer)?;
        self.check_owned(task)?;
        let proc = self.local_processor(processor)?;
        let variant = self.context.select_variant(task.id, task.layer, proc.kind)?;

        let mut placement = Placement::empty(task.id, task.layer);
        placement.processor = Some(processor);
        placement.variant = Some(variant);
        for (index, operand) in task.operands.iter().enumerate() {
            let binding = self.bind_operand(task.id, index, operand, &proc)?;
            if let Some(copy) = copy_for(task.id, operand, &binding) {
                placement.copies.push(copy);
            }
            placement.bindings.push(binding);
        }
        placement.phases.push(MappingPhase::Map);

        let metrics = placement.metrics();
        tracing::debug!(task = %task.id, "mapped on {processor}: {metrics:?}");
        self.counters().record_task(&metrics);
        Ok(placement)
    }

    /// Picks the kernel `task` runs on `processor`.
    ///
    /// Memoised per layer and processor kind; fails with `NoVariant` when
    /// the layer has no kernel for the processor's kind.
    pub fn select_variant(
        &self,
        task: &TaskDescriptor,
        processor: ProcessorId,
    ) -> Result<VariantId, MapperError> {
        let kind = self
            .context
            .machine()
            .processor(processor)
            .ok_or(MapperError::UnknownProcessor(processor))?
            .kind;
        self.context.select_variant(task.id, task.layer, kind)
    }

    /// Ranks copy sources for `target`, best first.
    pub fn select_sources(
        &self,
        target: &PhysicalInstance,
        sources: &[PhysicalInstance],
    ) -> Vec<PhysicalInstance> {
        let ids: Vec<InstanceId> = sources.iter().map(|s| s.id).collect();
        let usage = self.cache.usage(&ids);
        rank_sources(target, sources, &usage)
    }

    /// Post-mapping hook. Nothing to decide here; the executor takes over.
    pub fn postmap(&self, placement: &Placement) {
        tracing::trace!(task = %placement.task, "postmap");
    }

    /// Forwards a task timing to the profiler when profiling is enabled.
    pub fn report_profiling(&self, event: &ProfilingEvent) {
        if !self.profiling {
            return;
        }
        self.counters().record_kernel(event.elapsed);
        if let Some(profiler) = &self.profiler {
            profiler.record(event);
        }
    }

    /// Runs every applicable phase for `task`.
    ///
    /// - A point owned by another replica fails with `NotLocallyOwned`.
    /// - A point owned by another node comes back with its processor only.
    /// - An index launch is sliced, not mapped.
    /// - Anything else is mapped on its initial processor, and its copy
    ///   sources are ranked.
    pub fn place(&self, task: &TaskDescriptor) -> Result<Placement, MapperError> {
        let mut cursor = PhaseCursor::new(task.id);

        cursor.enter(MappingPhase::SelectOptions)?;
        let options = self.select_options(task)?;
        match (options.ownership, &task.point) {
            (Ownership::Remote { owner }, Some(point)) => {
                return Err(self.not_owned(task, point, owner));
            }
            (Ownership::Forwarded { node }, _) => {
                tracing::debug!(task = %task.id, "forwarded to {node}");
                let mut placement = Placement::empty(task.id, task.layer);
                placement.processor = Some(options.initial_processor);
                placement.variant = Some(options.variant);
                placement.phases = cursor.into_visited();
                return Ok(placement);
            }
            _ => {}
        }

        let mut placement = if task.kind() == TaskKind::IndexLaunch {
            cursor.enter(MappingPhase::Slice)?;
            let mut placement = Placement::empty(task.id, task.layer);
            placement.slices = Some(self.slice(task)?);
            placement
        } else {
            cursor.enter(MappingPhase::Map)?;
            let mut placement = self.map(task, options.initial_processor)?;
            if !placement.copies.is_empty() {
                cursor.enter(MappingPhase::SelectSources)?;
                for copy in &mut placement.copies {
                    copy.sources = self.select_sources(&copy.destination, &copy.sources);
                }
            }
            placement
        };

        cursor.enter(MappingPhase::PostMap)?;
        self.postmap(&placement);
        placement.phases = cursor.into_visited();
        Ok(placement)
    }

    // ── Other mappables ────────────────────────────────────────

    /// Binds an operand for host access in the local system memory.
    pub fn map_inline(&self, id: TaskId, operand: &Operand) -> Result<OperandBinding, MapperError> {
        let node = self.context.node();
        let target = self
            .context
            .machine()
            .system_memory(node)
            .ok_or(MachineError::NoSystemMemory(node))?;
        let binding = self.bind_with_fallback(id, 0, operand, target, None)?;
        self.counters()
            .record_task(&tally(std::slice::from_ref(&binding), 0));
        Ok(binding)
    }

    /// Binds the destination of a copy for `processor` and ranks the
    /// destination operand's valid instances as sources.
    pub fn map_copy(
        &self,
        id: TaskId,
        processor: ProcessorId,
        destination: &Operand,
    ) -> Result<CopyRequest, MapperError> {
        let proc = self.local_processor(processor)?;
        let binding = self.bind_operand(id, 0, destination, &proc)?;
        let candidates: Vec<PhysicalInstance> = source_candidates(destination)
            .filter(|s| s.id != binding.instance.id)
            .cloned()
            .collect();
        let sources = self.select_sources(&binding.instance, &candidates);
        self.counters().copies += 1;
        Ok(CopyRequest {
            task: id,
            operand: 0,
            region: destination.region,
            field: destination.field,
            bounds: destination.bounds.clone(),
            destination: binding.instance,
            sources,
        })
    }

    /// Binds the region a dependent partition is computed from for
    /// `processor`.
    ///
    /// The region goes through the same memory choice and cache as a task
    /// operand. When its data has to be brought in, the copy's sources are
    /// ranked like task sources.
    pub fn map_partition(
        &self,
        id: TaskId,
        processor: ProcessorId,
        operand: &Operand,
    ) -> Result<PartitionMapping, MapperError> {
        let proc = self.local_processor(processor)?;
        let binding = self.bind_operand(id, 0, operand, &proc)?;
        let copy = copy_for(id, operand, &binding).map(|mut copy| {
            copy.sources = self.select_sources(&copy.destination, &copy.sources);
            copy
        });
        let metrics = tally(std::slice::from_ref(&binding), usize::from(copy.is_some()));
        tracing::debug!(task = %id, "partition mapped on {processor}: {metrics:?}");
        self.counters().record_task(&metrics);
        Ok(PartitionMapping { binding, copy })
    }

    /// Picks one processor per node for a replicated task: the layer's
    /// first processor on that node, else the node's first processor of the
    /// layer's kind.
    pub fn map_replicate(&self, task: &TaskDescriptor) -> Result<Vec<ProcessorId>, MapperError> {
        let layer = self.context.layer(task.id, task.layer)?;
        let machine = self.context.machine();

        let mut targets = Vec::new();
        for node in machine.nodes() {
            let assigned = layer
                .global_processors()
                .iter()
                .copied()
                .find(|&p| machine.processor(p).is_some_and(|info| info.node == node));
            let target =
                assigned.or_else(|| machine.local_processors(node, layer.kind()).first().map(|p| p.id));
            if let Some(p) = target {
                targets.push(p);
            }
        }
        if targets.is_empty() {
            return Err(MapperError::NoLocalProcessor {
                layer: layer.id(),
                kind: layer.kind(),
                node: self.context.node(),
            });
        }
        tracing::debug!(task = %task.id, "replicated onto {} nodes", targets.len());
        Ok(targets)
    }

    /// Returns the sharding function id for the task's layer.
    pub fn select_sharding(&self, task: &TaskDescriptor) -> Result<ShardingId, MapperError> {
        self.context
            .registry()
            .select(task.layer)
            .ok_or(MapperError::UnknownLayer {
                task: task.id,
                layer: task.layer,
            })
    }

    pub fn find_sharding(&self, id: ShardingId) -> Option<&ShardingFunction> {
        self.context.registry().find(id)
    }

    /// Applies an eviction signalled by the memory manager.
    ///
    /// The instance is dropped from the cache and released to the allocator
    /// before the cache lock is released, so no later placement can see it.
    pub fn handle_eviction(&self, id: InstanceId) -> Option<PhysicalInstance> {
        let allocator = &self.allocator;
        let removed = self.cache.evict_then(id, |instance| allocator.free(instance));
        match &removed {
            Some(instance) => tracing::debug!("evicted {id} from {}", instance.memory),
            None => tracing::warn!("eviction of unknown instance {id} ignored"),
        }
        removed
    }

    // ── Private helpers ────────────────────────────────────────

    fn counters(&self) -> MutexGuard<'_, MappingMetrics> {
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_on_node(&self, processor: ProcessorId) -> bool {
        self.context
            .machine()
            .processor(processor)
            .is_some_and(|p| p.node == self.context.node())
    }

    fn first_local(&self, task: TaskId, layer: &LayerStrategy) -> Result<ProcessorId, MapperError> {
        if let Some(&p) = layer.local_processors().first() {
            return Ok(p);
        }
        let node = self.context.node();
        self.context
            .machine()
            .local_processors(node, layer.kind())
            .first()
            .map(|p| p.id)
            .ok_or_else(|| {
                tracing::debug!(task = %task, "no local processor for {}", layer.id());
                MapperError::NoLocalProcessor {
                    layer: layer.id(),
                    kind: layer.kind(),
                    node,
                }
            })
    }

    fn local_processor(&self, id: ProcessorId) -> Result<Processor, MapperError> {
        let proc = *self
            .context
            .machine()
            .processor(id)
            .ok_or(MapperError::UnknownProcessor(id))?;
        if proc.node != self.context.node() {
            return Err(MapperError::RemoteProcessor {
                processor: id,
                node: proc.node,
            });
        }
        Ok(proc)
    }

    /// Rejects a replicated point task this replica does not own.
    fn check_owned(&self, task: &TaskDescriptor) -> Result<(), MapperError> {
        let (Some(point), Some(domain), Some(replica)) =
            (&task.point, &task.launch_domain, task.replica)
        else {
            return Ok(());
        };
        let function = self.context.sharding(task.id, task.layer)?;
        let owner = function.shard(point, domain, replica.total)?;
        if owner != replica.shard {
            return Err(self.not_owned(task, point, owner));
        }
        Ok(())
    }

    fn not_owned(&self, task: &TaskDescriptor, point: &DomainPoint, owner: ShardId) -> MapperError {
        let shard = task.replica.map_or(owner, |r| r.shard);
        tracing::debug!(task = %task.id, "{point} not owned by {shard} (owner {owner})");
        MapperError::NotLocallyOwned {
            task: task.id,
            point: point.clone(),
            shard,
            owner,
        }
    }

    fn bind_operand(
        &self,
        task: TaskId,
        index: usize,
        operand: &Operand,
        processor: &Processor,
    ) -> Result<OperandBinding, MapperError> {
        let machine = self.context.machine();
        let target = self
            .policy
            .target_memory(machine, processor, operand)
            .ok_or(MapperError::NoTargetMemory {
                task,
                operand: index,
                processor: processor.id,
            })?;
        let fallback = self.policy.fallback_memory(machine, processor, target);
        self.bind_with_fallback(task, index, operand, target, fallback)
    }

    /// Binds in `target`, retrying once in `fallback` if `target` is out of
    /// memory.
    fn bind_with_fallback(
        &self,
        task: TaskId,
        index: usize,
        operand: &Operand,
        target: MemoryId,
        fallback: Option<MemoryId>,
    ) -> Result<OperandBinding, MapperError> {
        let cause = match self.bind_in(task, index, operand, target) {
            Err(e) if is_out_of_memory(&e) => e,
            other => return other.map_err(MapperError::from),
        };
        let Some(fallback) = fallback else {
            return Err(self.report_failed_mapping(task, index, operand, target, None, &cause));
        };

        tracing::warn!(task = %task, operand = index, "{target} exhausted, retrying in {fallback}");
        match self.bind_in(task, index, operand, fallback) {
            Ok(mut binding) => {
                binding.fallback = true;
                Ok(binding)
            }
            Err(e) if is_out_of_memory(&e) => {
                Err(self.report_failed_mapping(task, index, operand, target, Some(fallback), &e))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves `operand` in `memory` through the cache, in one lock hold.
    fn bind_in(
        &self,
        task: TaskId,
        index: usize,
        operand: &Operand,
        memory: MemoryId,
    ) -> Result<OperandBinding, CacheError> {
        let adoptable = operand.valid.iter().find(|v| {
            v.memory == memory
                && v.tree == operand.region.tree
                && v.field == operand.field
                && v.covers(&operand.bounds)
        });
        let adopted = Cell::new(false);
        let lookup = self.cache.find_or_create(
            operand.region,
            &operand.bounds,
            operand.field,
            memory,
            || {
                if let Some(valid) = adoptable {
                    adopted.set(true);
                    return Ok(valid.clone());
                }
                let request = AllocationRequest::new(
                    memory,
                    operand.region.tree,
                    operand.field,
                    operand.bounds.clone(),
                    operand.element_bytes,
                );
                self.allocator.allocate(&request).map_err(CacheError::from)
            },
            |rejected| {
                // Adopted instances belong to the runtime, not the allocator.
                if !adopted.get() {
                    self.allocator.free(rejected);
                }
            },
        )?;

        let source = match lookup.outcome {
            LookupOutcome::Hit => BindingSource::Cached,
            LookupOutcome::Contained => BindingSource::Contained,
            LookupOutcome::Created if adopted.get() => BindingSource::Adopted,
            LookupOutcome::Created => BindingSource::Allocated,
        };
        tracing::debug!(
            task = %task,
            operand = index,
            region = %operand.region,
            "{source:?} {} in {memory}",
            lookup.instance.id
        );
        Ok(OperandBinding {
            operand: index,
            memory,
            instance: lookup.instance,
            source,
            fallback: false,
        })
    }

    fn report_failed_mapping(
        &self,
        task: TaskId,
        index: usize,
        operand: &Operand,
        memory: MemoryId,
        fallback: Option<MemoryId>,
        cause: &CacheError,
    ) -> MapperError {
        tracing::error!(
            task = %task,
            operand = index,
            region = %operand.region,
            field = %operand.field,
            privilege = %operand.privilege,
            memory = %memory,
            fallback = ?fallback,
            "failed to map operand: {cause}"
        );
        self.counters().record_failure();
        MapperError::PlacementFailure {
            task,
            operand: index,
            memory,
            fallback,
        }
    }
}

impl std::fmt::Debug for PlacementMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementMapper")
            .field("node", &self.context.node())
            .field("strategy", &self.context.strategy().name())
            .field("policy", &self.policy)
            .field("cached_instances", &self.cache.len())
            .field("profiling", &self.profiling)
            .field("has_profiler", &self.profiler.is_some())
            .finish()
    }
}

fn is_out_of_memory(e: &CacheError) -> bool {
    matches!(e, CacheError::Alloc(a) if a.is_out_of_memory())
}

/// Valid instances of the operand's field that overlap its footprint.
fn source_candidates(operand: &Operand) -> impl Iterator<Item = &PhysicalInstance> {
    operand.valid.iter().filter(move |v| {
        v.tree == operand.region.tree
            && v.field == operand.field
            && v.bounding_box.overlap_volume(&operand.bounds) > 0
    })
}

/// Schedules a copy when the operand's contents are needed but live only in
/// other instances.
fn copy_for(task: TaskId, operand: &Operand, binding: &OperandBinding) -> Option<CopyRequest> {
    if !operand.privilege.reads() || operand.valid.iter().any(|v| v.id == binding.instance.id) {
        return None;
    }
    let sources: Vec<PhysicalInstance> = source_candidates(operand).cloned().collect();
    if sources.is_empty() {
        return None;
    }
    Some(CopyRequest {
        task,
        operand: binding.operand,
        region: operand.region,
        field: operand.field,
        bounds: operand.bounds.clone(),
        destination: binding.instance.clone(),
        sources,
    })
}
