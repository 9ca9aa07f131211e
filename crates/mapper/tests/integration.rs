// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end placement pipeline.
//!
//! These tests exercise the complete flow from machine and strategy files →
//! model context → mapper → placement, including replicated ownership and
//! concurrent mapping against one shared instance cache.

use index_space::{
    DomainPoint, FieldId, IndexDomain, LogicalRegion, MemoryKind, NodeId, ProcessorId,
    RegionTreeId,
};
use instance_cache::{BudgetAllocator, InstanceCache};
use machine::Machine;
use mapper::{
    BindingSource, MapperConfig, MapperError, MappingPhase, ModelContext, Operand, Ownership,
    PlacementMapper, Privilege, ReplicaInfo, TaskDescriptor, TaskId,
};
use sharding::ShardId;
use std::io::Write;
use std::sync::{Arc, Barrier};
use strategy_ir::LayerId;

// ── Helpers ────────────────────────────────────────────────────

// Machine::uniform(1, 1, 4): cpu 0, gpus 1 2 3 4.
const STRATEGY: &str = r#"{
    "name": "mlp-4gpu",
    "layers": [
        { "name": "embed", "processor_kind": "cpu", "dims": [1], "processors": [0], "mapping_tag": 100 },
        { "name": "fc1", "processor_kind": "gpu", "dims": [4], "processors": [1, 2, 3, 4], "mapping_tag": 101 },
        { "name": "fc2", "processor_kind": "gpu", "dims": [2, 2], "processors": [1, 2, 3, 4], "mapping_tag": 102 }
    ]
}"#;

struct Fixture {
    _machine: tempfile::NamedTempFile,
    _strategy: tempfile::NamedTempFile,
    config: MapperConfig,
}

fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn fixture(strategy: &str, num_layers: usize) -> Fixture {
    let machine = write_temp(&Machine::uniform(1, 1, 4).to_toml().unwrap(), ".toml");
    let strategy = write_temp(strategy, ".json");
    let config = MapperConfig {
        machine_path: machine.path().to_path_buf(),
        strategy_path: strategy.path().to_path_buf(),
        num_layers,
        ..Default::default()
    };
    Fixture {
        _machine: machine,
        _strategy: strategy,
        config,
    }
}

fn build_mapper(config: &MapperConfig) -> (Arc<PlacementMapper>, Arc<BudgetAllocator>) {
    let context = Arc::new(ModelContext::load(config).unwrap());
    let allocator = Arc::new(BudgetAllocator::new(context.machine().capacities()));
    let mapper = PlacementMapper::from_config(context, allocator.clone(), config);
    (Arc::new(mapper), allocator)
}

fn operand(region: u64, lo: i64, hi: i64, privilege: Privilege) -> Operand {
    Operand::new(
        LogicalRegion::new(RegionTreeId(1), region),
        FieldId(0),
        IndexDomain::new(vec![lo], vec![hi]).unwrap(),
        privilege,
    )
}

// ── Tests ──────────────────────────────────────────────────────

#[test]
fn test_full_pipeline() {
    let fx = fixture(STRATEGY, 3);
    let (mapper, allocator) = build_mapper(&fx.config);

    let launch = IndexDomain::from_extents(&[4]).unwrap();
    let sliced = mapper
        .place(&TaskDescriptor::index_launch(TaskId(1), LayerId(1), launch.clone()))
        .unwrap();
    let plan = sliced.slices.unwrap();
    assert_eq!(plan.num_slices(), 4);
    assert_eq!(plan.covered_volume(), 4);

    for i in 0..4 {
        let point = DomainPoint::scalar(i as i64);
        let task = TaskDescriptor::point(TaskId(10 + i), LayerId(1), point, launch.clone())
            .with_operand(operand(i, 0, 255, Privilege::ReadWrite))
            .with_operand(operand(100, 0, 1023, Privilege::ReadOnly).shared());
        let placement = mapper.place(&task).unwrap();
        let proc = placement.processor.unwrap();
        assert_eq!(proc, ProcessorId(1 + i));

        let machine = mapper.context().machine();
        let private = placement.binding(0).unwrap();
        assert_eq!(machine.memory(private.memory).unwrap().kind, MemoryKind::FrameBuffer);
        let shared = placement.binding(1).unwrap();
        assert_eq!(machine.memory(shared.memory).unwrap().kind, MemoryKind::ZeroCopy);
        assert_eq!(placement.phases.last(), Some(&MappingPhase::PostMap));
    }

    // The shared weights were allocated once and hit three times.
    let metrics = mapper.metrics();
    assert_eq!(metrics.tasks_mapped, 4);
    assert_eq!(metrics.allocations, 5);
    assert_eq!(metrics.cache_hits, 3);
    assert_eq!(allocator.stats().allocations, 5);
    mapper.cache().check_invariants().unwrap();
}

#[test]
fn test_replica_ownership_scenario() {
    let fx = fixture(STRATEGY, 3);
    let (mapper, _) = build_mapper(&fx.config);
    let launch = IndexDomain::from_extents(&[4]).unwrap();
    let point = |replica| {
        TaskDescriptor::point(TaskId(7), LayerId(1), DomainPoint::scalar(2), launch.clone())
            .with_operand(operand(2, 0, 63, Privilege::ReadWrite))
            .with_replica(ReplicaInfo::new(replica, 2))
    };

    let accepted = mapper.place(&point(1)).unwrap();
    assert_eq!(accepted.processor, Some(ProcessorId(3)));
    assert_eq!(accepted.bindings.len(), 1);
    let json = serde_json::to_value(&accepted).unwrap();
    assert_eq!(json["phases"][0], "SelectOptions");
    assert_eq!(json["processor"], 3);

    let options = mapper.select_options(&point(0)).unwrap();
    assert_eq!(options.ownership, Ownership::Remote { owner: ShardId(1) });
    let err = mapper.place(&point(0)).unwrap_err();
    assert!(matches!(
        err,
        MapperError::NotLocallyOwned { shard: ShardId(0), owner: ShardId(1), .. }
    ));
}

#[test]
fn test_replicas_slice_disjointly() {
    let fx = fixture(STRATEGY, 3);
    let (mapper, _) = build_mapper(&fx.config);
    let launch = IndexDomain::from_extents(&[6, 6]).unwrap();

    let mut covered = 0;
    let mut all = Vec::new();
    for shard in 0..4 {
        let task = TaskDescriptor::index_launch(TaskId(shard as u64), LayerId(2), launch.clone())
            .with_replica(ReplicaInfo::new(shard, 4));
        let plan = mapper.slice(&task).unwrap();
        plan.validate().unwrap();
        covered += plan.covered_volume();
        all.extend(plan.slices);
    }
    assert_eq!(covered, launch.volume());
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            assert_eq!(a.domain.overlap_volume(&b.domain), 0);
        }
    }
}

#[test]
fn test_concurrent_creation_single_winner() {
    let fx = fixture(STRATEGY, 3);
    let (mapper, allocator) = build_mapper(&fx.config);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let mapper = Arc::clone(&mapper);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                let task = TaskDescriptor::single(TaskId(t as u64), LayerId(1))
                    .with_operand(operand(42, 0, 4095, Privilege::ReadWrite));
                barrier.wait();
                mapper.map(&task, ProcessorId(1)).unwrap().bindings.remove(0)
            })
        })
        .collect();
    let bindings: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let created = bindings
        .iter()
        .filter(|b| b.source == BindingSource::Allocated)
        .count();
    assert_eq!(created, 1);
    assert!(bindings.iter().all(|b| b.instance == bindings[0].instance));
    assert_eq!(allocator.stats().allocations, 1);
    assert_eq!(mapper.cache().len(), 1);
}

#[test]
fn test_mappers_share_node_cache() {
    let fx = fixture(STRATEGY, 3);
    let context = Arc::new(ModelContext::load(&fx.config).unwrap());
    let allocator = Arc::new(BudgetAllocator::new(context.machine().capacities()));
    let cache = Arc::new(InstanceCache::new());
    let a = PlacementMapper::new(context.clone(), allocator.clone()).with_cache(cache.clone());
    let b = PlacementMapper::new(context, allocator).with_cache(cache.clone());

    let task = TaskDescriptor::single(TaskId(1), LayerId(1))
        .with_operand(operand(5, 0, 99, Privilege::ReadWrite));
    let first = a.map(&task, ProcessorId(2)).unwrap();
    let second = b.map(&task, ProcessorId(2)).unwrap();
    assert_eq!(first.bindings[0].source, BindingSource::Allocated);
    assert_eq!(second.bindings[0].source, BindingSource::Cached);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_eviction_before_next_placement() {
    let fx = fixture(STRATEGY, 3);
    let (mapper, allocator) = build_mapper(&fx.config);
    let task = TaskDescriptor::single(TaskId(1), LayerId(1))
        .with_operand(operand(8, 0, 99, Privilege::ReadWrite))
        .with_operand(operand(9, 0, 99, Privilege::ReadWrite));

    let placement = mapper.map(&task, ProcessorId(1)).unwrap();
    let evicted = placement.bindings[0].instance.clone();
    mapper.handle_eviction(evicted.id).unwrap();

    let again = mapper.map(&task, ProcessorId(1)).unwrap();
    assert_eq!(again.bindings[0].source, BindingSource::Allocated);
    assert_ne!(again.bindings[0].instance.id, evicted.id);
    assert_eq!(again.bindings[1].source, BindingSource::Cached);
    assert_eq!(allocator.stats().frees, 1);
    mapper.cache().check_invariants().unwrap();
}

#[test]
fn test_invalid_strategies_abort_load() {
    let cases = [
        // dims/processor-count mismatch
        STRATEGY.replace("[1, 2, 3, 4], \"mapping_tag\": 101", "[1, 2, 3], \"mapping_tag\": 101"),
        // unknown processor
        STRATEGY.replace("[0], \"mapping_tag\": 100", "[17], \"mapping_tag\": 100"),
        // kind mismatch
        STRATEGY.replace("\"cpu\", \"dims\": [1]", "\"gpu\", \"dims\": [1]"),
        // truncated record
        STRATEGY[..STRATEGY.len() / 2].to_string(),
        // duplicate mapping tag
        STRATEGY.replace("\"mapping_tag\": 102", "\"mapping_tag\": 101"),
    ];
    for (i, json) in cases.iter().enumerate() {
        let fx = fixture(json, 3);
        match ModelContext::load(&fx.config) {
            Err(MapperError::Strategy(e)) => assert!(e.is_invalid_strategy(), "case {i}: {e}"),
            other => panic!("case {i}: expected strategy error, got {other:?}"),
        }
    }
}

#[test]
fn test_missing_layer_entry_aborts_load() {
    let fx = fixture(STRATEGY, 4);
    let err = ModelContext::load(&fx.config).unwrap_err();
    assert!(matches!(err, MapperError::Strategy(ref e) if e.is_invalid_strategy()));
}

#[test]
fn test_replicate_and_sharding_selection() {
    let fx = fixture(STRATEGY, 3);
    let (mapper, _) = build_mapper(&fx.config);
    let task = TaskDescriptor::single(TaskId(1), LayerId(2));
    assert_eq!(mapper.map_replicate(&task).unwrap(), vec![ProcessorId(1)]);

    let id = mapper.select_sharding(&task).unwrap();
    let function = mapper.find_sharding(id).unwrap();
    let domain = IndexDomain::from_extents(&[2, 2]).unwrap();
    let p = DomainPoint::new(vec![1, 0]);
    assert_eq!(function.find_proc(&p, &domain).unwrap(), ProcessorId(3));
    assert_eq!(mapper.context().node(), NodeId(0));
}

/// Every point of a sliced launch starts on the processor its slice names.
fn assert_points_follow_slices(mapper: &PlacementMapper, layer: LayerId, launch: &IndexDomain) {
    let plan = mapper
        .slice(&TaskDescriptor::index_launch(TaskId(1), layer, launch.clone()))
        .unwrap();
    assert_eq!(plan.covered_volume(), launch.volume());
    for slice in &plan.slices {
        for point in slice.domain.points() {
            let task = TaskDescriptor::point(TaskId(2), layer, point.clone(), launch.clone());
            let options = mapper.select_options(&task).unwrap();
            assert_eq!(
                options.initial_processor, slice.processor,
                "point {point} of {launch}"
            );
            assert_eq!(options.ownership, Ownership::Local);
        }
    }
}

#[test]
fn test_point_processor_matches_slice_on_grid() {
    let fx = fixture(STRATEGY, 3);
    let (mapper, _) = build_mapper(&fx.config);
    assert_points_follow_slices(&mapper, LayerId(2), &IndexDomain::from_extents(&[4, 4]).unwrap());
    assert_points_follow_slices(&mapper, LayerId(2), &IndexDomain::from_extents(&[3, 5]).unwrap());
}

#[test]
fn test_point_processor_matches_slice_on_uneven_line() {
    let fx = fixture(STRATEGY, 3);
    let (mapper, _) = build_mapper(&fx.config);
    let launch = IndexDomain::from_extents(&[5]).unwrap();
    assert_points_follow_slices(&mapper, LayerId(1), &launch);

    let task = TaskDescriptor::point(TaskId(3), LayerId(1), DomainPoint::scalar(4), launch);
    assert_eq!(mapper.select_options(&task).unwrap().initial_processor, ProcessorId(3));
}

const VARIANTS: &str = r#"
[[variant]]
layer = 0
kind = "cpu"
name = "embed_host"

[[variant]]
layer = 1
kind = "gpu"
name = "fc1_cuda"

[[variant]]
layer = 2
kind = "gpu"
name = "fc2_cuda"
"#;

#[test]
fn test_variant_file_drives_selection() {
    let mut fx = fixture(STRATEGY, 3);
    let variants = write_temp(VARIANTS, ".toml");
    fx.config.variants_path = Some(variants.path().to_path_buf());
    let (mapper, _) = build_mapper(&fx.config);

    let launch = IndexDomain::from_extents(&[4]).unwrap();
    let task = TaskDescriptor::point(TaskId(1), LayerId(1), DomainPoint::scalar(0), launch);
    let placement = mapper.place(&task).unwrap();
    let id = placement.variant.unwrap();
    assert_eq!(mapper.context().variants().variant(id).unwrap().name, "fc1_cuda");

    // The host-only embedding layer cannot run on a gpu.
    let embed = TaskDescriptor::single(TaskId(2), LayerId(0));
    assert!(matches!(
        mapper.map(&embed, ProcessorId(1)),
        Err(MapperError::NoVariant { layer: LayerId(0), .. })
    ));
}

#[test]
fn test_variant_file_missing_layer_kind_aborts_load() {
    let mut fx = fixture(STRATEGY, 3);
    let variants = write_temp(&VARIANTS.replace("layer = 2\nkind = \"gpu\"", "layer = 2\nkind = \"cpu\""), ".toml");
    fx.config.variants_path = Some(variants.path().to_path_buf());
    let err = ModelContext::load(&fx.config).unwrap_err();
    assert!(matches!(err, MapperError::Strategy(ref e) if e.is_invalid_strategy()));
}
