// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for sharding queries and slicing.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use index_space::{DomainPoint, IndexDomain, NodeId, ProcessorId, ProcessorKind};
use machine::Machine;
use sharding::{ShardId, ShardingFunction, SlicePlan};
use strategy_ir::{LayerId, LayerStrategy, MappingTag};

fn gpu_layer(machine: &Machine, dims: Vec<usize>) -> LayerStrategy {
    let n: usize = dims.iter().product();
    LayerStrategy::new(
        LayerId(0),
        ProcessorKind::Gpu,
        dims,
        (0..n as u64).map(ProcessorId).collect(),
        MappingTag(1),
        machine,
        NodeId(0),
    )
    .unwrap()
}

fn bench_shard(c: &mut Criterion) {
    let machine = Machine::uniform(1, 0, 8);
    let f = ShardingFunction::new(&gpu_layer(&machine, vec![2, 4]));
    let domain = IndexDomain::from_extents(&[256, 64]).unwrap();
    let points: Vec<DomainPoint> = domain.points().step_by(97).collect();

    c.bench_function("shard_2d", |b| {
        b.iter(|| {
            for p in &points {
                black_box(f.shard(black_box(p), &domain, 7).unwrap());
            }
        })
    });

    c.bench_function("find_proc_2d", |b| {
        b.iter(|| {
            for p in &points {
                black_box(f.find_proc(black_box(p), &domain).unwrap());
            }
        })
    });

    c.bench_function("find_local_domain_2d", |b| {
        b.iter(|| black_box(f.find_local_domain(ShardId(3), 7, &domain).unwrap()))
    });
}

fn bench_slice(c: &mut Criterion) {
    let machine = Machine::uniform(1, 0, 8);
    let layer = gpu_layer(&machine, vec![2, 4]);
    let f = ShardingFunction::new(&layer);
    let launch = IndexDomain::from_extents(&[128, 128]).unwrap();

    c.bench_function("slice_full", |b| {
        b.iter(|| black_box(SlicePlan::for_layer(&layer, &launch)))
    });

    c.bench_function("slice_shard", |b| {
        b.iter(|| black_box(SlicePlan::for_shard(&layer, &launch, &f, ShardId(1), 3).unwrap()))
    });
}

criterion_group!(benches, bench_shard, bench_slice);
criterion_main!(benches);
