// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for strategy construction and loading.

use crate::{LayerId, MappingTag};
use index_space::{DomainError, ProcessorId, ProcessorKind};

/// Errors raised while building or loading a partition strategy.
///
/// Every variant describes an invalid strategy; all of them abort model
/// load.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    /// The strategy file could not be read.
    #[error("failed to read strategy file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The strategy file is malformed or truncated.
    #[error("failed to parse strategy file: {0}")]
    ParseError(#[from] serde_json::Error),

    /// A decomposition is malformed (zero extent, count mismatch, ...).
    #[error("invalid decomposition: {0}")]
    InvalidDecomposition(String),

    /// A layer record is inconsistent.
    #[error("invalid strategy for {layer}: {detail}")]
    InvalidStrategy { layer: LayerId, detail: String },

    /// A layer names a processor the machine does not have.
    #[error("{layer} references unknown processor {processor}")]
    UnknownProcessor {
        layer: LayerId,
        processor: ProcessorId,
    },

    /// A layer names a processor of the wrong kind.
    #[error("{layer} expects {expected} processors but {processor} is {found}")]
    KindMismatch {
        layer: LayerId,
        processor: ProcessorId,
        expected: ProcessorKind,
        found: ProcessorKind,
    },

    /// The strategy does not cover every layer of the model.
    #[error("strategy has {found} layers but the model has {expected}")]
    LayerCountMismatch { expected: usize, found: usize },

    /// Two layers share a mapping tag.
    #[error("{tag} is used by both {first} and {second}")]
    DuplicateTag {
        tag: MappingTag,
        first: LayerId,
        second: LayerId,
    },

    /// An index-space value is invalid.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl StrategyError {
    /// Returns `true` for every error that means the strategy itself is
    /// unusable (as opposed to the file being unreadable).
    pub fn is_invalid_strategy(&self) -> bool {
        !matches!(self, StrategyError::ReadError(_))
    }

    /// Attaches a layer to a decomposition error.
    pub(crate) fn in_layer(self, layer: LayerId) -> Self {
        match self {
            StrategyError::InvalidDecomposition(detail) => {
                StrategyError::InvalidStrategy { layer, detail }
            }
            StrategyError::Domain(e) => StrategyError::InvalidStrategy {
                layer,
                detail: e.to_string(),
            },
            other => other,
        }
    }
}
