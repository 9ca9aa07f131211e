// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Mapper configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! machine_path = "./machine.toml"
//! strategy_path = "./strategy.json"
//! variants_path = "./variants.toml"
//! num_layers = 12
//! local_node = 0
//! enable_profiling = true
//! zero_copy_fallback = true
//! shared_read_only_zero_copy = true
//! ```

use crate::{MapperError, MemoryPolicy};
use index_space::NodeId;
use std::path::{Path, PathBuf};

/// Configuration for one loaded model on one node.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MapperConfig {
    /// Path to the TOML machine description.
    pub machine_path: PathBuf,
    /// Path to the JSON partition strategy.
    pub strategy_path: PathBuf,
    /// Optional TOML list of task variants. Without it every layer gets one
    /// variant for the processor kind its strategy names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants_path: Option<PathBuf>,
    /// Number of layers in the model graph; the strategy must match it.
    pub num_layers: usize,
    /// Node this mapper instance runs on.
    #[serde(default = "default_node")]
    pub local_node: NodeId,
    /// Whether task timings are forwarded to the profiler.
    #[serde(default = "default_true")]
    pub enable_profiling: bool,
    /// Whether an out-of-memory allocation is retried in the fallback memory.
    #[serde(default = "default_true")]
    pub zero_copy_fallback: bool,
    /// Whether read-only operands shared across processors go to zero-copy
    /// memory instead of a frame buffer.
    #[serde(default = "default_true")]
    pub shared_read_only_zero_copy: bool,
}

fn default_true() -> bool {
    true
}

fn default_node() -> NodeId {
    NodeId(0)
}

impl MapperConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, MapperError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MapperError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, MapperError> {
        toml::from_str(toml_str)
            .map_err(|e| MapperError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, MapperError> {
        toml::to_string_pretty(self)
            .map_err(|e| MapperError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Returns the memory placement policy selected by this config.
    pub fn policy(&self) -> MemoryPolicy {
        MemoryPolicy {
            zero_copy_fallback: self.zero_copy_fallback,
            shared_read_only_zero_copy: self.shared_read_only_zero_copy,
        }
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            machine_path: PathBuf::from("./machine.toml"),
            strategy_path: PathBuf::from("./strategy.json"),
            variants_path: None,
            num_layers: 1,
            local_node: NodeId(0),
            enable_profiling: true,
            zero_copy_fallback: true,
            shared_read_only_zero_copy: true,
        }
    }
}
