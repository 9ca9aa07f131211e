// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Strategy loading.
//!
//! Turns a [`StrategyManifest`] into a [`PartitionStrategy`] for one node of
//! a [`Machine`]. Every check runs here, at model load, so the mapper never
//! meets an inconsistent strategy while mapping tasks.

use crate::{LayerId, LayerStrategy, PartitionStrategy, StrategyError, StrategyManifest};
use index_space::NodeId;
use machine::Machine;
use std::path::Path;

/// Loads and validates partition strategies.
pub struct StrategyLoader;

impl StrategyLoader {
    /// Loads the strategy file at `path` for a model with `num_layers`
    /// layers.
    ///
    /// Steps:
    /// 1. Parse the JSON manifest and check its records.
    /// 2. Check that there is exactly one record per model layer.
    /// 3. Build each [`LayerStrategy`] against `machine`, viewed from `node`.
    /// 4. Assemble the [`PartitionStrategy`] (unique mapping tags).
    pub fn load(
        path: &Path,
        machine: &Machine,
        node: NodeId,
        num_layers: usize,
    ) -> Result<PartitionStrategy, StrategyError> {
        let manifest = StrategyManifest::from_file(path)?;
        let strategy = Self::from_manifest(&manifest, machine, node, num_layers)?;
        tracing::info!(path = %path.display(), "{}", strategy.summary());
        Ok(strategy)
    }

    /// Builds a strategy from an already parsed manifest.
    pub fn from_manifest(
        manifest: &StrategyManifest,
        machine: &Machine,
        node: NodeId,
        num_layers: usize,
    ) -> Result<PartitionStrategy, StrategyError> {
        manifest.validate()?;
        if manifest.layers.len() != num_layers {
            return Err(StrategyError::LayerCountMismatch {
                expected: num_layers,
                found: manifest.layers.len(),
            });
        }

        let mut layers = Vec::with_capacity(manifest.layers.len());
        for (i, record) in manifest.layers.iter().enumerate() {
            let id = LayerId(i);
            let mut layer = LayerStrategy::new(
                id,
                record.kind(id)?,
                record.dims.clone(),
                record.processors.clone(),
                record.mapping_tag,
                machine,
                node,
            )?;
            if let Some(name) = &record.name {
                layer = layer.with_name(name.clone());
            }
            tracing::debug!("{}", layer.summary());
            layers.push(layer);
        }

        PartitionStrategy::new(manifest.name.clone(), layers)
    }
}
