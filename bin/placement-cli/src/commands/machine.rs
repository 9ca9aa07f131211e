// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `placement machine` command: describe a machine or emit a synthetic one.

use super::{banner, parse_list};
use machine::Machine;
use std::path::PathBuf;

pub async fn execute(
    config: Option<PathBuf>,
    machine: Option<PathBuf>,
    uniform: Option<String>,
) -> anyhow::Result<()> {
    if let Some(triple) = uniform {
        print!("{}", uniform_toml(&triple)?);
        return Ok(());
    }

    let path = match machine {
        Some(path) => path,
        None => super::resolve_config(config, Default::default())?.machine_path,
    };
    let machine = Machine::from_file(&path)
        .map_err(|e| anyhow::anyhow!("failed to load machine '{}': {e}", path.display()))?;

    banner("Machine");
    println!("  {}", machine.summary());
    println!();

    // ── Processors ─────────────────────────────────────────────
    println!("  {:<10} {:<8} {:<8} {}", "Processor", "Kind", "Node", "Memories");
    println!("  {}", "-".repeat(60));
    for p in machine.processors() {
        let reachable = machine
            .affinities()
            .iter()
            .filter(|a| a.processor == p.id)
            .map(|a| a.memory.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "  {:<10} {:<8} {:<8} {}",
            p.id.to_string(),
            p.kind.as_str(),
            p.node.to_string(),
            reachable
        );
    }
    println!();

    // ── Memories ───────────────────────────────────────────────
    println!("  {:<10} {:<12} {:<8} {:>12}", "Memory", "Kind", "Node", "Capacity");
    println!("  {}", "-".repeat(46));
    for m in machine.memories() {
        println!(
            "  {:<10} {:<12} {:<8} {:>12}",
            m.id.to_string(),
            m.kind.as_str(),
            m.node.to_string(),
            m.capacity.to_string()
        );
    }
    println!();
    Ok(())
}

/// Renders `Machine::uniform` for a `"nodes,cpus,gpus"` triple.
fn uniform_toml(triple: &str) -> anyhow::Result<String> {
    let counts = parse_list::<usize>(triple)?;
    let [nodes, cpus, gpus] = counts[..] else {
        anyhow::bail!("expected 'nodes,cpus,gpus', got '{triple}'");
    };
    if nodes == 0 {
        anyhow::bail!("a uniform machine needs at least one node");
    }
    let nodes = u32::try_from(nodes)?;
    Ok(Machine::uniform(nodes, cpus, gpus).to_toml()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_toml_round_trips() {
        let toml = uniform_toml("2,1,2").unwrap();
        let machine = Machine::from_toml(&toml).unwrap();
        assert_eq!(machine.nodes().len(), 2);
        assert_eq!(machine.processors().len(), 6);
    }

    #[test]
    fn test_uniform_toml_rejects_bad_triples() {
        assert!(uniform_toml("2,1").is_err());
        assert!(uniform_toml("0,1,1").is_err());
        assert!(uniform_toml("a,b,c").is_err());
    }
}
