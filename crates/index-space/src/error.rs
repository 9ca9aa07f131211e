// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for index-domain construction.

/// Errors raised when an [`crate::IndexDomain`] or point is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// The domain has no axes, or more than [`crate::MAX_DIM`].
    #[error("unsupported rank {rank}: expected 1..={max}")]
    UnsupportedRank { rank: usize, max: usize },

    /// Lower and upper bound vectors disagree in length.
    #[error("bound rank mismatch: lo has {lo} axes, hi has {hi}")]
    RankMismatch { lo: usize, hi: usize },

    /// An axis has `lo > hi`, i.e. the domain would be empty.
    #[error("empty axis {axis}: lo {lo} > hi {hi}")]
    EmptyAxis { axis: usize, lo: i64, hi: i64 },

    /// An extent of zero was supplied where a non-empty axis is required.
    #[error("zero extent on axis {axis}")]
    ZeroExtent { axis: usize },

    /// The domain holds more points than a `u64` can count.
    #[error("domain volume overflows u64")]
    VolumeOverflow,
}
