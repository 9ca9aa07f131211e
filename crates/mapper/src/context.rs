// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-model context shared by every mapper of a node.
//!
//! One context exists per loaded model. It owns the machine description,
//! the partition strategy, the sharding functions derived from it and the
//! task variants. Only the variant memo changes after load, behind its own
//! lock, so the context is shared through an `Arc`. Dropping the last
//! reference unloads the model.

use crate::{MapperConfig, MapperError, TaskId, VariantId, VariantRegistry};
use index_space::{NodeId, ProcessorKind};
use machine::Machine;
use sharding::{ShardingFunction, ShardingRegistry};
use std::sync::Arc;
use strategy_ir::{LayerId, LayerStrategy, PartitionStrategy, StrategyLoader};

#[derive(Debug)]
pub struct ModelContext {
    machine: Arc<Machine>,
    strategy: Arc<PartitionStrategy>,
    registry: ShardingRegistry,
    variants: VariantRegistry,
    node: NodeId,
}

impl ModelContext {
    /// Builds a context from an already loaded machine and strategy.
    ///
    /// `strategy` must have been built for `node`. Every layer gets one
    /// variant for the processor kind its strategy names.
    pub fn new(machine: Arc<Machine>, strategy: Arc<PartitionStrategy>, node: NodeId) -> Self {
        let registry = ShardingRegistry::from_strategy(&strategy);
        let variants = VariantRegistry::for_strategy(&strategy);
        Self {
            machine,
            strategy,
            registry,
            variants,
            node,
        }
    }

    /// Replaces the task variants, failing if a layer has none for the
    /// processor kind its strategy names.
    pub fn with_variants(mut self, variants: VariantRegistry) -> Result<Self, MapperError> {
        variants.validate(&self.strategy)?;
        self.variants = variants;
        Ok(self)
    }

    /// Loads the machine and strategy named by `config`.
    ///
    /// Steps:
    /// 1. Parse the machine description.
    /// 2. Check that the local node hosts processors.
    /// 3. Load and validate the strategy for that node.
    /// 4. Register one sharding function per layer.
    /// 5. Load the task variants, if a variant file is configured, and
    ///    check that every layer can run on its processor kind.
    ///
    /// Any failure aborts the load; no partial context is returned.
    pub fn load(config: &MapperConfig) -> Result<Self, MapperError> {
        let machine = Machine::from_file(&config.machine_path)?;
        let node = config.local_node;
        if !machine.nodes().contains(&node) {
            return Err(MapperError::ConfigError(format!(
                "{node} hosts no processors in '{}'",
                config.machine_path.display()
            )));
        }

        let strategy =
            StrategyLoader::load(&config.strategy_path, &machine, node, config.num_layers)?;
        let mut context = Self::new(Arc::new(machine), Arc::new(strategy), node);
        if let Some(path) = &config.variants_path {
            context = context.with_variants(VariantRegistry::from_file(path)?)?;
        }
        tracing::info!(
            node = %node,
            functions = context.registry.len(),
            variants = context.variants.len(),
            "model context loaded: {}",
            context.strategy.summary()
        );
        Ok(context)
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn strategy(&self) -> &PartitionStrategy {
        &self.strategy
    }

    pub fn registry(&self) -> &ShardingRegistry {
        &self.registry
    }

    pub fn variants(&self) -> &VariantRegistry {
        &self.variants
    }

    /// Picks the variant of `layer` for a `kind` processor, memoised.
    pub fn select_variant(
        &self,
        task: TaskId,
        layer: LayerId,
        kind: ProcessorKind,
    ) -> Result<VariantId, MapperError> {
        self.variants.select(task, layer, kind)
    }

    /// Node the strategy was built for.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the strategy of the layer `task` belongs to.
    pub fn layer(&self, task: TaskId, layer: LayerId) -> Result<&LayerStrategy, MapperError> {
        self.strategy
            .layer(layer)
            .ok_or(MapperError::UnknownLayer { task, layer })
    }

    /// Returns the sharding function of the layer `task` belongs to.
    pub fn sharding(&self, task: TaskId, layer: LayerId) -> Result<&ShardingFunction, MapperError> {
        self.registry
            .for_layer(layer)
            .ok_or(MapperError::UnknownLayer { task, layer })
    }
}
