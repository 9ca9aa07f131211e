// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Task variants: the kernel implementations a layer offers per processor
//! kind.
//!
//! A layer can only run on processors of a kind it has a variant for. The
//! first variant registered for `(layer, kind)` is the one selected, and
//! each selection is memoised so every later task of the layer resolves to
//! the same kernel without another search.
//!
//! # TOML Format
//! ```toml
//! [[variant]]
//! layer = 0
//! kind = "cpu"
//! name = "embed_host"
//!
//! [[variant]]
//! layer = 1
//! kind = "gpu"
//! name = "fc1_cuda"
//! ```

use crate::{MapperError, TaskId};
use index_space::ProcessorKind;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use strategy_ir::{LayerId, PartitionStrategy, StrategyError};

/// Identifier of a registered variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct VariantId(pub u32);

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "variant#{}", self.0)
    }
}

/// One kernel implementation of a layer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TaskVariant {
    pub layer: LayerId,
    pub kind: ProcessorKind,
    #[serde(default)]
    pub name: String,
}

#[derive(serde::Deserialize)]
struct VariantFile {
    #[serde(default)]
    variant: Vec<TaskVariant>,
}

/// Every variant known to one loaded model.
#[derive(Debug, Default)]
pub struct VariantRegistry {
    variants: Vec<TaskVariant>,
    by_layer: HashMap<LayerId, Vec<VariantId>>,
    used: Mutex<HashMap<(LayerId, ProcessorKind), VariantId>>,
}

impl VariantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one variant per layer, for the kind the strategy assigns
    /// it.
    pub fn for_strategy(strategy: &PartitionStrategy) -> Self {
        let mut registry = Self::new();
        for layer in strategy.layers() {
            registry.register(TaskVariant {
                layer: layer.id(),
                kind: layer.kind(),
                name: format!("{}_{}", layer.name(), layer.kind()),
            });
        }
        registry
    }

    /// Loads variants from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, MapperError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MapperError::ConfigError(format!("cannot read variants '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses variants from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, MapperError> {
        let file: VariantFile = toml::from_str(toml_str)
            .map_err(|e| MapperError::ConfigError(format!("variant parse error: {e}")))?;
        let mut registry = Self::new();
        for variant in file.variant {
            registry.register(variant);
        }
        Ok(registry)
    }

    /// Adds a variant and returns its id.
    pub fn register(&mut self, variant: TaskVariant) -> VariantId {
        let id = VariantId(self.variants.len() as u32);
        self.by_layer.entry(variant.layer).or_default().push(id);
        self.variants.push(variant);
        id
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Iterates variants in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (VariantId, &TaskVariant)> {
        self.variants
            .iter()
            .enumerate()
            .map(|(i, v)| (VariantId(i as u32), v))
    }

    pub fn variant(&self, id: VariantId) -> Option<&TaskVariant> {
        self.variants.get(id.0 as usize)
    }

    /// Returns the first variant of `layer` for `kind`.
    pub fn find_variant(&self, layer: LayerId, kind: ProcessorKind) -> Option<VariantId> {
        self.by_layer
            .get(&layer)?
            .iter()
            .copied()
            .find(|&id| self.variants[id.0 as usize].kind == kind)
    }

    pub fn has_variant(&self, layer: LayerId, kind: ProcessorKind) -> bool {
        self.find_variant(layer, kind).is_some()
    }

    /// Checks that every layer can run on the kind its strategy assigns.
    pub fn validate(&self, strategy: &PartitionStrategy) -> Result<(), StrategyError> {
        for layer in strategy.layers() {
            if !self.has_variant(layer.id(), layer.kind()) {
                return Err(StrategyError::InvalidStrategy {
                    layer: layer.id(),
                    detail: format!("no task variant for {} processors", layer.kind()),
                });
            }
        }
        Ok(())
    }

    /// Picks the variant `task` of `layer` runs on a `kind` processor.
    ///
    /// The answer is memoised per `(layer, kind)`.
    pub fn select(
        &self,
        task: TaskId,
        layer: LayerId,
        kind: ProcessorKind,
    ) -> Result<VariantId, MapperError> {
        let mut used = self.used();
        if let Some(&id) = used.get(&(layer, kind)) {
            return Ok(id);
        }
        let id = self
            .find_variant(layer, kind)
            .ok_or(MapperError::NoVariant { task, layer, kind })?;
        tracing::debug!(task = %task, "{layer} on {kind} uses {id}");
        used.insert((layer, kind), id);
        Ok(id)
    }

    /// Returns the number of memoised selections.
    pub fn selections(&self) -> usize {
        self.used().len()
    }

    fn used(&self) -> MutexGuard<'_, HashMap<(LayerId, ProcessorKind), VariantId>> {
        self.used.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
layer = 1
kind = "gpu"
name = "fc1_cuda_slow"

[[variant]]
layer = 1
kind = "cpu"
"#;

    #[test]
    fn test_from_toml() {
        let registry = VariantRegistry::from_toml(VARIANTS).unwrap();
        assert_eq!(registry.len(), 4);
        assert!(registry.has_variant(LayerId(1), ProcessorKind::Cpu));
        assert!(!registry.has_variant(LayerId(0), ProcessorKind::Gpu));
        assert!(!registry.has_variant(LayerId(2), ProcessorKind::Gpu));

        let id = registry.find_variant(LayerId(1), ProcessorKind::Gpu).unwrap();
        assert_eq!(registry.variant(id).unwrap().name, "fc1_cuda");
        let cpu = registry.find_variant(LayerId(1), ProcessorKind::Cpu).unwrap();
        assert_eq!(registry.variant(cpu).unwrap().name, "");
        let layers: Vec<_> = registry.iter().map(|(_, v)| v.layer.0).collect();
        assert_eq!(layers, vec![0, 1, 1, 1]);
    }

    #[test]
    fn test_select_is_memoised() {
        let registry = VariantRegistry::from_toml(VARIANTS).unwrap();
        let first = registry.select(TaskId(1), LayerId(1), ProcessorKind::Gpu).unwrap();
        let again = registry.select(TaskId(2), LayerId(1), ProcessorKind::Gpu).unwrap();
        assert_eq!(first, again);
        assert_eq!(first, VariantId(1));
        assert_eq!(registry.selections(), 1);

        registry.select(TaskId(3), LayerId(1), ProcessorKind::Cpu).unwrap();
        assert_eq!(registry.selections(), 2);
    }

    #[test]
    fn test_select_without_variant() {
        let registry = VariantRegistry::from_toml(VARIANTS).unwrap();
        let err = registry.select(TaskId(4), LayerId(0), ProcessorKind::Gpu).unwrap_err();
        assert!(matches!(
            err,
            MapperError::NoVariant { task: TaskId(4), layer: LayerId(0), kind: ProcessorKind::Gpu }
        ));
        assert!(err.is_task_error());
        assert_eq!(registry.selections(), 0);
    }

    #[test]
    fn test_bad_toml() {
        let err = VariantRegistry::from_toml("[[variant]]\nlayer = 0\nkind = \"fpga\"\n").unwrap_err();
        assert!(matches!(err, MapperError::ConfigError(_)));
        assert!(VariantRegistry::from_toml("").unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = VariantRegistry::from_file(Path::new("/nonexistent/variants.toml")).unwrap_err();
        assert!(err.to_string().contains("cannot read variants"));
    }
}
