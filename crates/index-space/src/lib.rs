// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # index-space
//!
//! Value types shared by every layer of the placement engine.
//!
//! This crate provides:
//! - [`IndexDomain`]: an axis-aligned, inclusive integer rectangle of
//!   1 to [`MAX_DIM`] dimensions, with row-major linearisation helpers.
//! - [`DomainPoint`]: a coordinate inside an [`IndexDomain`].
//! - Resource identifiers: [`ProcessorId`], [`MemoryId`], [`NodeId`],
//!   [`InstanceId`], and their kinds.
//! - Region identifiers: [`LogicalRegion`], [`RegionTreeId`], [`FieldId`].
//!
//! Everything here is immutable once constructed and cheap to share
//! across threads.
//!
//! # Example
//! ```
//! use index_space::{DomainPoint, IndexDomain};
//!
//! let d = IndexDomain::from_extents(&[2, 3]).unwrap();
//! assert_eq!(d.volume(), 6);
//! assert_eq!(d.linearize(&DomainPoint::new(vec![1, 2])), Some(5));
//! ```

mod domain;
mod error;
mod ids;

pub use domain::{DomainPoint, IndexDomain, MAX_DIM};
pub use error::DomainError;
pub use ids::{
    FieldId, InstanceId, LogicalRegion, MemoryId, MemoryKind, NodeId, ProcessorId,
    ProcessorKind, RegionTreeId,
};
