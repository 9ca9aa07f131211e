// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `placement shard` command: show how a layer's launch is split between
//! replicated shards and which processor owns each point.

use super::{banner, load_context, parse_list, resolve_config, Overrides};
use index_space::IndexDomain;
use sharding::{ShardId, SlicePlan};
use std::path::PathBuf;
use strategy_ir::LayerId;

pub async fn execute(
    config: Option<PathBuf>,
    overrides: Overrides,
    layer: usize,
    shards: u32,
    extents: Option<String>,
    limit: usize,
) -> anyhow::Result<()> {
    banner("Shard Ownership");

    let config = resolve_config(config, overrides)?;
    let context = load_context(&config)?;
    let layer_id = LayerId(layer);
    let strategy = context
        .strategy()
        .layer(layer_id)
        .ok_or_else(|| anyhow::anyhow!("strategy has no {layer_id}"))?;
    let function = context
        .registry()
        .for_layer(layer_id)
        .ok_or_else(|| anyhow::anyhow!("no sharding function for {layer_id}"))?;

    let domain = match extents {
        Some(extents) => IndexDomain::from_extents(&parse_list::<usize>(&extents)?)?,
        None => strategy.launch_domain().clone(),
    };

    println!("  Layer:    {}", strategy.summary());
    println!("  Function: {}", function.id());
    println!("  Domain:   {domain} ({} points)", domain.volume());
    println!("  Shards:   {shards}");
    println!();

    // ── Owned Ranges ───────────────────────────────────────────
    println!("  {:<8} {:>8} {}", "Shard", "Points", "Rectangles");
    println!("  {}", "-".repeat(60));
    let mut covered = 0;
    for s in 0..shards {
        let shard = ShardId(s);
        let rects = function.find_local_domain(shard, shards, &domain)?;
        let points: u64 = rects.iter().map(IndexDomain::volume).sum();
        covered += points;
        let listed = rects
            .iter()
            .map(IndexDomain::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        println!("  {:<8} {points:>8} {listed}", shard.to_string());

        let plan = SlicePlan::for_shard(strategy, &domain, function, shard, shards)?;
        plan.validate()?;
        println!("           {}", plan.summary());
    }
    if covered != domain.volume() {
        anyhow::bail!(
            "shards cover {covered} of {} points; ownership is not a partition",
            domain.volume()
        );
    }
    println!();

    // ── Per-Point Owners ───────────────────────────────────────
    println!("  {:<16} {:<8} {}", "Point", "Shard", "Processor");
    println!("  {}", "-".repeat(36));
    for point in domain.points().take(limit) {
        let shard = function.shard(&point, &domain, shards)?;
        let proc = function.find_proc(&point, &domain)?;
        println!(
            "  {:<16} {:<8} {}",
            point.to_string(),
            shard.to_string(),
            proc
        );
    }
    if domain.volume() > limit as u64 {
        println!("  ... {} more", domain.volume() - limit as u64);
    }
    println!();
    Ok(())
}
