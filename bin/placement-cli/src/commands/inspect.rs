// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `placement inspect` command: validate a strategy and print its layers.
//!
//! Loading goes through the same path as a mapper, so an invalid strategy
//! is reported here exactly as it would abort a model load.

use super::{banner, load_context, resolve_config, Overrides};
use index_space::ProcessorId;
use std::path::PathBuf;

pub async fn execute(config: Option<PathBuf>, overrides: Overrides) -> anyhow::Result<()> {
    banner("Strategy Inspector");

    let config = resolve_config(config, overrides)?;
    let context = load_context(&config)?;
    let strategy = context.strategy();

    // ── Summary ────────────────────────────────────────────────
    println!("  Strategy: {}", strategy.name());
    println!("  Machine:  {}", context.machine().summary());
    println!("  Node:     {}", context.node());
    println!("  Layers:   {}", strategy.len());
    println!();

    // ── Per-Layer Detail ───────────────────────────────────────
    println!(
        "  {:<4} {:<16} {:<5} {:>6} {:<10} {:>6} {:<20}",
        "Idx", "Name", "Kind", "Tag", "Grid", "Procs", "Local"
    );
    println!("  {}", "-".repeat(74));

    for layer in strategy.iter() {
        let grid = layer
            .dims()
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("x");
        println!(
            "  {:<4} {:<16} {:<5} {:>6} {:<10} {:>6} {:<20}",
            layer.id().0,
            truncate(layer.name(), 16),
            layer.kind().as_str(),
            layer.tag().0,
            grid,
            layer.global_processors().len(),
            join_ids(layer.local_processors()),
        );
    }
    println!();

    // ── Local Blocks ───────────────────────────────────────────
    println!("  Local blocks of each layer's launch domain:");
    for layer in strategy.iter() {
        let launch = layer.launch_domain();
        println!("   {} over {launch}", layer.id());
        if layer.local_processors().is_empty() {
            println!("     (no local processors)");
        }
        for &p in layer.local_processors() {
            let point = layer
                .find_local_point(p)
                .map(|pt| pt.to_string())
                .unwrap_or_else(|| "-".to_string());
            let block = layer
                .find_local_domain(p, launch)
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("     {:<8} at {point:<12} owns {block}", p.to_string());
        }
    }
    println!();

    // ── Sharding Functions ─────────────────────────────────────
    println!("  Sharding functions: {}", context.registry().len());
    for function in context.registry().iter() {
        println!(
            "   {} -> {} ({} processors)",
            function.id(),
            function.layer(),
            function.processors().len()
        );
    }
    println!();

    // ── Task Variants ──────────────────────────────────────────
    println!("  Task variants: {}", context.variants().len());
    for (id, variant) in context.variants().iter() {
        println!(
            "   {id} -> {} on {} '{}'",
            variant.layer, variant.kind, variant.name
        );
    }
    println!();
    Ok(())
}

fn join_ids(ids: &[ProcessorId]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter()
        .map(|p| p.0.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Truncates a string to `max_len` with ellipsis if needed.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_ids() {
        assert_eq!(join_ids(&[]), "-");
        assert_eq!(join_ids(&[ProcessorId(1), ProcessorId(3)]), "1,3");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("fc1", 16), "fc1");
        assert_eq!(truncate("attention_output_projection", 10), "attenti...");
    }
}
