// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON strategy file parsing.
//!
//! # Format
//! ```json
//! {
//!   "name": "mlp-4gpu",
//!   "layers": [
//!     {
//!       "name": "fc1",
//!       "processor_kind": "gpu",
//!       "dims": [2, 2],
//!       "processors": [4, 5, 6, 7],
//!       "mapping_tag": 1
//!     },
//!     ...
//!   ]
//! }
//! ```
//!
//! Layers are listed in model order; the record at position `i` is the
//! strategy of layer `i`.

use crate::{LayerId, MappingTag, StrategyError};
use index_space::{ProcessorId, ProcessorKind};
use std::path::Path;

/// Top-level strategy file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StrategyManifest {
    /// Human-readable strategy name.
    #[serde(default = "default_name")]
    pub name: String,
    /// One record per layer, in model order.
    pub layers: Vec<ManifestLayer>,
}

fn default_name() -> String {
    "unnamed".to_string()
}

/// A single layer record.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestLayer {
    /// Optional layer name, used only for display.
    #[serde(default)]
    pub name: Option<String>,
    /// Processor kind string (`"gpu"`, `"cpu"`, `"omp"`, ...).
    pub processor_kind: String,
    /// Extents of the processor grid.
    pub dims: Vec<usize>,
    /// Processors in row-major grid order.
    pub processors: Vec<ProcessorId>,
    /// Correlation id carried by the layer's tasks.
    pub mapping_tag: MappingTag,
}

impl ManifestLayer {
    /// Parses the processor kind.
    pub fn kind(&self, layer: LayerId) -> Result<ProcessorKind, StrategyError> {
        ProcessorKind::from_str_loose(&self.processor_kind).ok_or_else(|| {
            StrategyError::InvalidStrategy {
                layer,
                detail: format!("unrecognised processor kind '{}'", self.processor_kind),
            }
        })
    }
}

impl StrategyManifest {
    /// Loads a manifest from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, StrategyError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, StrategyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialises the manifest to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, StrategyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the records without consulting a machine.
    ///
    /// Checks:
    /// - At least one layer is defined.
    /// - Every processor kind string is recognised.
    /// - `dims` is non-empty, has no zero extent, and multiplies out to the
    ///   processor count.
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.layers.is_empty() {
            return Err(StrategyError::LayerCountMismatch {
                expected: 1,
                found: 0,
            });
        }
        for (i, record) in self.layers.iter().enumerate() {
            let layer = LayerId(i);
            record.kind(layer)?;
            let invalid = |detail: String| StrategyError::InvalidStrategy { layer, detail };
            if record.dims.is_empty() {
                return Err(invalid("empty dims".into()));
            }
            if record.dims.contains(&0) {
                return Err(invalid(format!("dims {:?} contain a zero extent", record.dims)));
            }
            let volume = record
                .dims
                .iter()
                .try_fold(1usize, |acc, &d| acc.checked_mul(d));
            if volume != Some(record.processors.len()) {
                return Err(invalid(format!(
                    "dims {:?} do not match {} processors",
                    record.dims,
                    record.processors.len()
                )));
            }
        }
        Ok(())
    }
}
