// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and the helpers they share.

pub mod inspect;
pub mod machine;
pub mod shard;
pub mod simulate;

use index_space::NodeId;
use mapper::{MapperConfig, ModelContext};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level follows `-v` count:
/// warn, info, debug, trace.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line values that take precedence over the configuration file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub machine: Option<PathBuf>,
    pub strategy: Option<PathBuf>,
    pub layers: Option<usize>,
    pub node: Option<u32>,
}

/// Reads the configuration file when one is given and applies `overrides`.
pub fn resolve_config(
    config: Option<PathBuf>,
    overrides: Overrides,
) -> anyhow::Result<MapperConfig> {
    let mut resolved = match config {
        Some(path) => MapperConfig::from_file(&path)?,
        None => MapperConfig::default(),
    };
    if let Some(machine) = overrides.machine {
        resolved.machine_path = machine;
    }
    if let Some(strategy) = overrides.strategy {
        resolved.strategy_path = strategy;
    }
    if let Some(layers) = overrides.layers {
        resolved.num_layers = layers;
    }
    if let Some(node) = overrides.node {
        resolved.local_node = NodeId(node);
    }
    Ok(resolved)
}

/// Loads the model context described by `config`.
pub fn load_context(config: &MapperConfig) -> anyhow::Result<ModelContext> {
    ModelContext::load(config).map_err(|e| {
        anyhow::anyhow!(
            "failed to load strategy '{}' on machine '{}': {e}",
            config.strategy_path.display(),
            config.machine_path.display()
        )
    })
}

/// Prints the boxed command banner.
pub fn banner(title: &str) {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║{:^54}║", format!("placement · {title}"));
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
}

/// Parses a comma-separated list of extents such as `"8,8"`.
pub fn parse_list<T: std::str::FromStr>(s: &str) -> anyhow::Result<Vec<T>> {
    s.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<T>()
                .map_err(|_| anyhow::anyhow!("invalid list element '{part}' in '{s}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list::<usize>("8, 8").unwrap(), vec![8, 8]);
        assert_eq!(parse_list::<u32>("2,1,4").unwrap(), vec![2, 1, 4]);
        assert!(parse_list::<usize>("8,x").is_err());
        assert!(parse_list::<usize>("").is_err());
    }

    #[test]
    fn test_resolve_config_defaults() {
        let config = resolve_config(None, Overrides::default()).unwrap();
        assert_eq!(config.num_layers, 1);
        assert_eq!(config.local_node, NodeId(0));
    }

    #[test]
    fn test_resolve_config_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            "machine_path = \"a.toml\"\nstrategy_path = \"a.json\"\nnum_layers = 4\n"
        )
        .unwrap();

        let overrides = Overrides {
            strategy: Some(PathBuf::from("b.json")),
            node: Some(1),
            ..Default::default()
        };
        let config = resolve_config(Some(file.path().to_path_buf()), overrides).unwrap();
        assert_eq!(config.machine_path, PathBuf::from("a.toml"));
        assert_eq!(config.strategy_path, PathBuf::from("b.json"));
        assert_eq!(config.num_layers, 4);
        assert_eq!(config.local_node, NodeId(1));
    }
}
