// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-model collection of layer strategies.

use crate::{LayerId, LayerStrategy, MappingTag, StrategyError};
use std::collections::HashMap;

/// One [`LayerStrategy`] per layer of a model, indexed by [`LayerId`].
///
/// Built once at model load and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PartitionStrategy {
    name: String,
    layers: Vec<LayerStrategy>,
    by_tag: HashMap<MappingTag, LayerId>,
}

impl PartitionStrategy {
    /// Builds a partition strategy.
    ///
    /// Layer `i` must carry [`LayerId`]`(i)`, and mapping tags must be
    /// unique.
    pub fn new(name: impl Into<String>, layers: Vec<LayerStrategy>) -> Result<Self, StrategyError> {
        let mut by_tag = HashMap::with_capacity(layers.len());
        for (i, layer) in layers.iter().enumerate() {
            if layer.id() != LayerId(i) {
                return Err(StrategyError::InvalidStrategy {
                    layer: layer.id(),
                    detail: format!("found at position {i}"),
                });
            }
            if let Some(first) = by_tag.insert(layer.tag(), layer.id()) {
                return Err(StrategyError::DuplicateTag {
                    tag: layer.tag(),
                    first,
                    second: layer.id(),
                });
            }
        }
        Ok(Self {
            name: name.into(),
            layers,
            by_tag,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the strategy of `layer`.
    pub fn layer(&self, layer: LayerId) -> Option<&LayerStrategy> {
        self.layers.get(layer.0)
    }

    /// Returns the layer carrying `tag`.
    pub fn by_tag(&self, tag: MappingTag) -> Option<&LayerStrategy> {
        self.by_tag.get(&tag).and_then(|&id| self.layer(id))
    }

    pub fn layers(&self) -> &[LayerStrategy] {
        &self.layers
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerStrategy> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns a one-line description.
    pub fn summary(&self) -> String {
        let procs: usize = self.layers.iter().map(|l| l.decomposition().len()).sum();
        let local: usize = self.layers.iter().map(|l| l.local_processors().len()).sum();
        format!(
            "Strategy '{}': {} layers, {procs} processor slots ({local} on this node)",
            self.name,
            self.layers.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use index_space::{NodeId, ProcessorId, ProcessorKind};
    use machine::Machine;

    fn layer(machine: &Machine, id: usize, tag: u64) -> LayerStrategy {
        LayerStrategy::new(
            LayerId(id),
            ProcessorKind::Gpu,
            vec![2],
            vec![ProcessorId(1), ProcessorId(2)],
            MappingTag(tag),
            machine,
            NodeId(0),
        )
        .unwrap()
    }

    #[test]
    fn test_lookup() {
        let machine = Machine::uniform(1, 1, 2);
        let s = PartitionStrategy::new("m", vec![layer(&machine, 0, 10), layer(&machine, 1, 11)]).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.layer(LayerId(1)).unwrap().tag(), MappingTag(11));
        assert!(s.layer(LayerId(2)).is_none());
        assert_eq!(s.by_tag(MappingTag(10)).unwrap().id(), LayerId(0));
        assert!(s.summary().contains("2 layers, 4 processor slots"));
    }

    #[test]
    fn test_duplicate_tag() {
        let machine = Machine::uniform(1, 1, 2);
        let err = PartitionStrategy::new("m", vec![layer(&machine, 0, 10), layer(&machine, 1, 10)]).unwrap_err();
        assert!(matches!(
            err,
            StrategyError::DuplicateTag {
                first: LayerId(0),
                second: LayerId(1),
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_order() {
        let machine = Machine::uniform(1, 1, 2);
        let err = PartitionStrategy::new("m", vec![layer(&machine, 1, 10)]).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidStrategy { layer: LayerId(1), .. }));
    }
}
