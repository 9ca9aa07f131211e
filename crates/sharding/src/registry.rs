// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Registry of the sharding functions of a loaded model.

use crate::{ShardingFunction, ShardingId};
use std::collections::{BTreeMap, HashMap};
use strategy_ir::{LayerId, PartitionStrategy};

/// One [`ShardingFunction`] per layer, addressable by [`ShardingId`] or by
/// layer.
#[derive(Debug, Clone, Default)]
pub struct ShardingRegistry {
    functions: BTreeMap<ShardingId, ShardingFunction>,
    by_layer: HashMap<LayerId, ShardingId>,
}

impl ShardingRegistry {
    /// Registers the sharding function of every layer of `strategy`.
    ///
    /// Mapping tags are unique within a strategy, so the derived ids are
    /// too.
    pub fn from_strategy(strategy: &PartitionStrategy) -> Self {
        let mut registry = Self::default();
        for layer in strategy.iter() {
            registry.register(ShardingFunction::new(layer));
        }
        tracing::debug!(functions = registry.len(), "sharding functions registered");
        registry
    }

    /// Adds a function, replacing any previous one with the same id.
    pub fn register(&mut self, function: ShardingFunction) {
        self.by_layer.insert(function.layer(), function.id());
        self.functions.insert(function.id(), function);
    }

    /// Returns the sharding id to use for tasks of `layer`.
    pub fn select(&self, layer: LayerId) -> Option<ShardingId> {
        self.by_layer.get(&layer).copied()
    }

    /// Recovers a function from its id.
    pub fn find(&self, id: ShardingId) -> Option<&ShardingFunction> {
        self.functions.get(&id)
    }

    /// Returns the function of `layer`.
    pub fn for_layer(&self, layer: LayerId) -> Option<&ShardingFunction> {
        self.select(layer).and_then(|id| self.find(id))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Iterates the functions in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &ShardingFunction> {
        self.functions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use index_space::{DomainPoint, IndexDomain, NodeId, ProcessorId, ProcessorKind};
    use machine::Machine;
    use strategy_ir::{LayerStrategy, MappingTag};

    fn strategy(machine: &Machine) -> PartitionStrategy {
        let layer = |id: usize, tag: u64| {
            LayerStrategy::new(
                LayerId(id),
                ProcessorKind::Gpu,
                vec![4],
                (0..4).map(ProcessorId).collect(),
                MappingTag(tag),
                machine,
                NodeId(0),
            )
            .unwrap()
        };
        PartitionStrategy::new("test", vec![layer(0, 40), layer(1, 41)]).unwrap()
    }

    #[test]
    fn test_select_and_find() {
        let machine = Machine::uniform(1, 0, 4);
        let registry = ShardingRegistry::from_strategy(&strategy(&machine));

        assert_eq!(registry.len(), 2);
        let id = registry.select(LayerId(1)).unwrap();
        assert_eq!(id, ShardingId(41));
        assert_eq!(registry.find(id).unwrap().layer(), LayerId(1));
        assert!(registry.select(LayerId(2)).is_none());
        assert!(registry.find(ShardingId(99)).is_none());
    }

    #[test]
    fn test_independent_registries_agree() {
        let machine = Machine::uniform(1, 0, 4);
        let a = ShardingRegistry::from_strategy(&strategy(&machine));
        let b = ShardingRegistry::from_strategy(&strategy(&machine));
        let domain = IndexDomain::from_extents(&[16]).unwrap();
        for i in 0..16 {
            let p = DomainPoint::scalar(i);
            let fa = a.for_layer(LayerId(0)).unwrap();
            let fb = b.for_layer(LayerId(0)).unwrap();
            assert_eq!(fa.shard(&p, &domain, 3), fb.shard(&p, &domain, 3));
            assert_eq!(fa.find_proc(&p, &domain), fb.find_proc(&p, &domain));
        }
    }
}
