// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # placement
//!
//! Command-line interface for the tensor placement engine.
//!
//! ## Usage
//! ```bash
//! # Describe a machine, or emit a synthetic one
//! placement machine --machine ./machine.toml
//! placement machine --uniform 2,1,4 > machine.toml
//!
//! # Validate and inspect a partition strategy
//! placement inspect --machine ./machine.toml --strategy ./strategy.json --layers 3
//!
//! # Show which shard and processor own each point of a layer
//! placement shard --strategy ./strategy.json --layers 3 --layer 1 --shards 2
//!
//! # Map a synthetic workload through the full pipeline
//! placement --config ./mapper.toml simulate --iterations 4
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "placement",
    about = "Distributed tensor placement engine",
    version,
    author
)]
struct Cli {
    /// Path to a mapper TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Paths shared by the commands that load a model context.
#[derive(clap::Args)]
struct ModelArgs {
    /// Machine description (overrides the configuration file).
    #[arg(short, long)]
    machine: Option<PathBuf>,

    /// Strategy file (overrides the configuration file).
    #[arg(short, long)]
    strategy: Option<PathBuf>,

    /// Number of layers in the model (overrides the configuration file).
    #[arg(short, long)]
    layers: Option<usize>,

    /// Node the strategy is viewed from (overrides the configuration file).
    #[arg(short, long)]
    node: Option<u32>,
}

impl From<ModelArgs> for commands::Overrides {
    fn from(args: ModelArgs) -> Self {
        Self {
            machine: args.machine,
            strategy: args.strategy,
            layers: args.layers,
            node: args.node,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Describe a machine: processors, memories and affinities.
    Machine {
        /// Machine description to read.
        #[arg(short, long, conflicts_with = "uniform")]
        machine: Option<PathBuf>,

        /// Emit a uniform machine as TOML instead ("nodes,cpus,gpus").
        #[arg(long)]
        uniform: Option<String>,
    },

    /// Load and validate a strategy, then print every layer's placement.
    Inspect {
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Print shard and processor ownership of a layer's launch domain.
    Shard {
        #[command(flatten)]
        model: ModelArgs,

        /// Layer index.
        #[arg(long)]
        layer: usize,

        /// Number of replicated shards.
        #[arg(long, default_value_t = 2)]
        shards: u32,

        /// Domain extents (e.g. "8,8"); defaults to the layer's processor grid.
        #[arg(long)]
        extents: Option<String>,

        /// Maximum number of points to list.
        #[arg(long, default_value_t = 64)]
        limit: usize,
    },

    /// Map a synthetic workload concurrently and report mapping metrics.
    Simulate {
        #[command(flatten)]
        model: ModelArgs,

        /// Passes over every layer.
        #[arg(short, long, default_value_t = 2)]
        iterations: usize,

        /// Replicated shards the launches are split across.
        #[arg(long, default_value_t = 1)]
        replicas: u32,

        /// Elements per activation operand.
        #[arg(long, default_value_t = 1024)]
        elements: usize,

        /// Evict a layer's activations once the next layer is mapped.
        #[arg(long)]
        evict: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Machine { machine, uniform } => {
            commands::machine::execute(cli.config, machine, uniform).await
        }
        Commands::Inspect { model } => commands::inspect::execute(cli.config, model.into()).await,
        Commands::Shard {
            model,
            layer,
            shards,
            extents,
            limit,
        } => commands::shard::execute(cli.config, model.into(), layer, shards, extents, limit).await,
        Commands::Simulate {
            model,
            iterations,
            replicas,
            elements,
            evict,
        } => {
            let workload = commands::simulate::Workload {
                iterations,
                replicas,
                elements,
                evict,
            };
            commands::simulate::execute(cli.config, model.into(), workload).await
        }
    }
}
