// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Row-major decomposition of an index space over a processor grid.
//!
//! A decomposition with `dims = [d0, d1, ...]` arranges its processors on a
//! grid of that shape. The processor at flat offset `k` of the assignment
//! list sits at grid point
//!
//! ```text
//!   coord[i] = (k / stride[i]) mod dims[i]
//!   stride[last] = 1,  stride[i] = stride[i + 1] * dims[i + 1]
//! ```
//!
//! and owns block `coord` of any global domain cut `dims[i]` ways along
//! axis `i`.

use crate::StrategyError;
use index_space::{DomainPoint, IndexDomain, ProcessorId, MAX_DIM};
use std::collections::HashMap;

/// Maps an N-dimensional processor grid onto index spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDecomposition {
    dims: Vec<usize>,
    strides: Vec<usize>,
    processors: Vec<ProcessorId>,
    offsets: HashMap<ProcessorId, usize>,
    launch: IndexDomain,
}

impl DomainDecomposition {
    /// Builds a decomposition of `processors` laid out row-major over
    /// `dims`.
    ///
    /// Fails when `dims` is empty or longer than [`MAX_DIM`], has a zero
    /// extent, does not multiply out to `processors.len()`, or when a
    /// processor appears twice.
    pub fn new(dims: Vec<usize>, processors: Vec<ProcessorId>) -> Result<Self, StrategyError> {
        if dims.is_empty() || dims.len() > MAX_DIM {
            return Err(StrategyError::InvalidDecomposition(format!(
                "rank {} is outside 1..={MAX_DIM}",
                dims.len()
            )));
        }
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(StrategyError::InvalidDecomposition(format!(
                "axis {axis} has zero extent"
            )));
        }
        let volume = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| StrategyError::InvalidDecomposition("dims overflow".into()))?;
        if volume != processors.len() {
            return Err(StrategyError::InvalidDecomposition(format!(
                "dims {dims:?} describe {volume} processors but {} were assigned",
                processors.len()
            )));
        }

        let mut offsets = HashMap::with_capacity(processors.len());
        for (k, &p) in processors.iter().enumerate() {
            if offsets.insert(p, k).is_some() {
                return Err(StrategyError::InvalidDecomposition(format!(
                    "{p} is assigned more than once"
                )));
            }
        }

        let mut strides = vec![1usize; dims.len()];
        for i in (0..dims.len() - 1).rev() {
            strides[i] = strides[i + 1] * dims[i + 1];
        }
        let launch = IndexDomain::from_extents(&dims)?;

        Ok(Self {
            dims,
            strides,
            processors,
            offsets,
            launch,
        })
    }

    /// Returns the grid shape.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the row-major strides of the grid.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Returns the assignment list in flat order.
    pub fn processors(&self) -> &[ProcessorId] {
        &self.processors
    }

    /// Returns the number of processors in the grid.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// The iteration space of a launch over this grid: `0..dims[i]` on
    /// every axis.
    pub fn launch_domain(&self) -> &IndexDomain {
        &self.launch
    }

    /// Returns `true` if `processor` is part of the assignment.
    pub fn is_local(&self, processor: ProcessorId) -> bool {
        self.offsets.contains_key(&processor)
    }

    /// Returns the flat offset of `processor` in the assignment.
    pub fn find_offset(&self, processor: ProcessorId) -> Option<usize> {
        self.offsets.get(&processor).copied()
    }

    /// Returns the grid point of flat offset `k`.
    pub fn point_of(&self, k: usize) -> Option<DomainPoint> {
        if k >= self.processors.len() {
            return None;
        }
        let coords = self
            .dims
            .iter()
            .zip(&self.strides)
            .map(|(&d, &s)| ((k / s) % d) as i64)
            .collect();
        Some(DomainPoint::new(coords))
    }

    /// Returns the grid point of `processor`.
    pub fn local_point(&self, processor: ProcessorId) -> Option<DomainPoint> {
        self.find_offset(processor).and_then(|k| self.point_of(k))
    }

    /// Returns the processor sitting at grid point `point`.
    pub fn processor_at(&self, point: &DomainPoint) -> Option<ProcessorId> {
        self.launch
            .linearize(point)
            .map(|k| self.processors[k as usize])
    }

    /// Returns the block of `global` owned by `processor`.
    ///
    /// `None` when the processor is not in the grid, when `global` has a
    /// different rank, or when the block is empty because `global` is
    /// narrower than the grid on some axis.
    pub fn local_domain(&self, processor: ProcessorId, global: &IndexDomain) -> Option<IndexDomain> {
        let point = self.local_point(processor)?;
        global.block(&self.dims, point.coords())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn procs(ids: impl IntoIterator<Item = u64>) -> Vec<ProcessorId> {
        ids.into_iter().map(ProcessorId).collect()
    }

    #[test]
    fn test_launch_domain() {
        let d = DomainDecomposition::new(vec![2, 3], procs(0..6)).unwrap();
        assert_eq!(d.launch_domain(), &IndexDomain::from_extents(&[2, 3]).unwrap());
        assert_eq!(d.strides(), &[3, 1]);
    }

    #[test]
    fn test_local_point_row_major() {
        let d = DomainDecomposition::new(vec![2, 3], procs(10..16)).unwrap();
        assert_eq!(d.local_point(ProcessorId(10)), Some(DomainPoint::new(vec![0, 0])));
        assert_eq!(d.local_point(ProcessorId(12)), Some(DomainPoint::new(vec![0, 2])));
        assert_eq!(d.local_point(ProcessorId(13)), Some(DomainPoint::new(vec![1, 0])));
        assert_eq!(d.local_point(ProcessorId(15)), Some(DomainPoint::new(vec![1, 2])));
        assert_eq!(d.processor_at(&DomainPoint::new(vec![1, 1])), Some(ProcessorId(14)));
    }

    #[test]
    fn test_not_local() {
        let d = DomainDecomposition::new(vec![4], procs(0..4)).unwrap();
        assert!(d.is_local(ProcessorId(3)));
        assert!(!d.is_local(ProcessorId(4)));
        assert_eq!(d.local_point(ProcessorId(4)), None);
        let global = IndexDomain::from_extents(&[100]).unwrap();
        assert_eq!(d.local_domain(ProcessorId(4), &global), None);
    }

    #[test]
    fn test_local_domain_blocks() {
        let d = DomainDecomposition::new(vec![4], procs(0..4)).unwrap();
        let global = IndexDomain::from_extents(&[10]).unwrap();
        // ceil(10 / 4) = 3 points per block, last block trimmed.
        let blocks: Vec<_> = (0..4)
            .map(|p| d.local_domain(ProcessorId(p), &global).unwrap())
            .collect();
        assert_eq!(blocks[0], IndexDomain::new(vec![0], vec![2]).unwrap());
        assert_eq!(blocks[2], IndexDomain::new(vec![6], vec![8]).unwrap());
        assert_eq!(blocks[3], IndexDomain::new(vec![9], vec![9]).unwrap());
    }

    #[test]
    fn test_local_domain_2d() {
        let d = DomainDecomposition::new(vec![2, 2], procs(0..4)).unwrap();
        let global = IndexDomain::new(vec![0, 0], vec![7, 3]).unwrap();
        let block = d.local_domain(ProcessorId(3), &global).unwrap();
        assert_eq!(block, IndexDomain::new(vec![4, 2], vec![7, 3]).unwrap());
        // Rank mismatch yields no block.
        let flat = IndexDomain::from_extents(&[8]).unwrap();
        assert_eq!(d.local_domain(ProcessorId(0), &flat), None);
    }

    #[test]
    fn test_rejects_zero_extent() {
        let err = DomainDecomposition::new(vec![2, 0], vec![]).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidDecomposition(_)));
    }

    #[test]
    fn test_rejects_count_mismatch() {
        let err = DomainDecomposition::new(vec![2, 2], procs(0..3)).unwrap_err();
        assert!(err.to_string().contains("4 processors but 3"));
    }

    #[test]
    fn test_rejects_duplicate_processor() {
        let err = DomainDecomposition::new(vec![2], procs([1, 1])).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidDecomposition(_)));
    }

    #[test]
    fn test_rejects_bad_rank() {
        assert!(DomainDecomposition::new(vec![], vec![]).is_err());
        assert!(DomainDecomposition::new(vec![1; MAX_DIM + 1], procs(0..1)).is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn local_point_recovers_offset(dims in prop::collection::vec(1usize..5, 1..=MAX_DIM)) {
                let n: usize = dims.iter().product();
                let d = DomainDecomposition::new(dims, procs(0..n as u64)).unwrap();
                for k in 0..n {
                    let p = ProcessorId(k as u64);
                    let point = d.local_point(p).unwrap();
                    prop_assert_eq!(d.launch_domain().linearize(&point), Some(k as u64));
                    prop_assert_eq!(d.processor_at(&point), Some(p));
                }
            }

            #[test]
            fn blocks_partition_the_domain(
                dims in prop::collection::vec(1usize..4, 1..=3),
                extra in prop::collection::vec(0usize..6, 3),
            ) {
                let n: usize = dims.iter().product();
                let d = DomainDecomposition::new(dims.clone(), procs(0..n as u64)).unwrap();
                let extents: Vec<usize> = dims.iter().zip(&extra).map(|(a, b)| a + b).collect();
                let global = IndexDomain::from_extents(&extents).unwrap();
                let blocks: Vec<IndexDomain> = (0..n as u64)
                    .filter_map(|p| d.local_domain(ProcessorId(p), &global))
                    .collect();
                let covered: u64 = blocks.iter().map(|b| b.volume()).sum();
                prop_assert_eq!(covered, global.volume());
                for (i, a) in blocks.iter().enumerate() {
                    for b in &blocks[i + 1..] {
                        prop_assert_eq!(a.overlap_volume(b), 0);
                    }
                }
            }
        }
    }
}
