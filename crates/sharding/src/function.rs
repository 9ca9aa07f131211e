// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The sharding function.

use crate::ShardingError;
use index_space::{DomainPoint, IndexDomain, ProcessorId};
use std::fmt;
use strategy_ir::{LayerId, LayerStrategy, MappingTag};

/// Identifier of a replica (shard) of the control program.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ShardId(pub u32);

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard#{}", self.0)
    }
}

/// Identifier of a registered sharding function.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ShardingId(pub u64);

impl ShardingId {
    /// The sharding id of the layer carrying `tag`.
    pub fn from_tag(tag: MappingTag) -> Self {
        ShardingId(tag.0)
    }
}

impl fmt::Display for ShardingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sharding#{}", self.0)
    }
}

/// Assigns points of an index space to shards and processors.
///
/// Stateless apart from the layer's processor list: two functions built from
/// the same layer always answer identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardingFunction {
    id: ShardingId,
    layer: LayerId,
    dims: Vec<usize>,
    processors: Vec<ProcessorId>,
}

impl ShardingFunction {
    /// Builds the sharding function of a layer. Its id derives from the
    /// layer's mapping tag.
    pub fn new(layer: &LayerStrategy) -> Self {
        Self::from_parts(
            ShardingId::from_tag(layer.tag()),
            layer.id(),
            layer.dims().to_vec(),
            layer.global_processors().to_vec(),
        )
    }

    /// Builds a sharding function from raw parts.
    pub fn from_parts(
        id: ShardingId,
        layer: LayerId,
        dims: Vec<usize>,
        processors: Vec<ProcessorId>,
    ) -> Self {
        Self {
            id,
            layer,
            dims,
            processors,
        }
    }

    pub fn id(&self) -> ShardingId {
        self.id
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the global processor list, in flat assignment order.
    pub fn processors(&self) -> &[ProcessorId] {
        &self.processors
    }

    /// Row-major offset and volume of `point` within `domain`.
    fn locate(point: &DomainPoint, domain: &IndexDomain) -> Result<(u64, u64), ShardingError> {
        let offset = domain
            .linearize(point)
            .ok_or_else(|| ShardingError::PointOutsideDomain {
                point: point.clone(),
                domain: domain.clone(),
            })?;
        Ok((offset, domain.volume()))
    }

    /// Returns the shard owning `point`: `floor(offset * total / volume)`.
    pub fn shard(
        &self,
        point: &DomainPoint,
        full_domain: &IndexDomain,
        total_shards: u32,
    ) -> Result<ShardId, ShardingError> {
        if total_shards == 0 {
            return Err(ShardingError::ZeroShards);
        }
        let (offset, volume) = Self::locate(point, full_domain)?;
        let shard = offset as u128 * total_shards as u128 / volume as u128;
        Ok(ShardId(shard as u32))
    }

    /// Returns the global processor owning `point`.
    ///
    /// `domain` is cut into the layer grid with [`IndexDomain::block`], the
    /// same decomposition slicing uses, and the point goes to the processor
    /// at the row-major position of its block.
    pub fn find_proc(&self, point: &DomainPoint, domain: &IndexDomain) -> Result<ProcessorId, ShardingError> {
        if self.processors.is_empty() {
            return Err(ShardingError::NoProcessors(self.id));
        }
        if !domain.contains_point(point) {
            return Err(ShardingError::PointOutsideDomain {
                point: point.clone(),
                domain: domain.clone(),
            });
        }
        let mismatch = || ShardingError::GridMismatch {
            function: self.id,
            dims: self.dims.clone(),
            domain: domain.clone(),
        };
        let coord = domain.block_of(&self.dims, point).ok_or_else(mismatch)?;
        let index = coord
            .iter()
            .zip(&self.dims)
            .fold(0usize, |acc, (&c, &d)| acc * d + c as usize);
        self.processors.get(index).copied().ok_or_else(mismatch)
    }

    /// Returns the half-open offset range `[ceil(s*V/S), ceil((s+1)*V/S))`
    /// owned by `shard` in a domain of `volume` points.
    pub fn owned_offsets(shard: ShardId, total_shards: u32, volume: u64) -> Result<(u64, u64), ShardingError> {
        if total_shards == 0 {
            return Err(ShardingError::ZeroShards);
        }
        if shard.0 >= total_shards {
            return Err(ShardingError::ShardOutOfRange {
                shard: shard.0,
                total: total_shards,
            });
        }
        let bound = |s: u128| (s * volume as u128).div_ceil(total_shards as u128) as u64;
        Ok((bound(shard.0 as u128), bound(shard.0 as u128 + 1)))
    }

    /// Restricts `full_domain` to the points owned by `shard`.
    ///
    /// The owned points are exactly those for which [`ShardingFunction::shard`]
    /// returns `shard`. They form a contiguous row-major range, which is
    /// returned as the minimal ordered list of rectangles covering it
    /// (empty when the shard owns nothing).
    pub fn find_local_domain(
        &self,
        shard: ShardId,
        total_shards: u32,
        full_domain: &IndexDomain,
    ) -> Result<Vec<IndexDomain>, ShardingError> {
        let (start, end) = Self::owned_offsets(shard, total_shards, full_domain.volume())?;
        Ok(full_domain.linear_range(start, end))
    }

    /// Returns `true` if `shard` owns `point`.
    pub fn owns(
        &self,
        shard: ShardId,
        point: &DomainPoint,
        full_domain: &IndexDomain,
        total_shards: u32,
    ) -> Result<bool, ShardingError> {
        Ok(self.shard(point, full_domain, total_shards)? == shard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(n: u64) -> ShardingFunction {
        ShardingFunction::from_parts(
            ShardingId(1),
            LayerId(0),
            vec![n as usize],
            (0..n).map(ProcessorId).collect(),
        )
    }

    fn line(n: usize) -> IndexDomain {
        IndexDomain::from_extents(&[n]).unwrap()
    }

    #[test]
    fn test_two_replicas_over_four_points() {
        let f = function(4);
        let d = line(4);
        let owners: Vec<u32> = (0..4)
            .map(|i| f.shard(&DomainPoint::scalar(i), &d, 2).unwrap().0)
            .collect();
        assert_eq!(owners, vec![0, 0, 1, 1]);
        assert!(f.owns(ShardId(1), &DomainPoint::scalar(2), &d, 2).unwrap());
        assert!(!f.owns(ShardId(0), &DomainPoint::scalar(2), &d, 2).unwrap());
    }

    #[test]
    fn test_uneven_split() {
        let f = function(1);
        let d = line(10);
        let owners: Vec<u32> = (0..10)
            .map(|i| f.shard(&DomainPoint::scalar(i), &d, 4).unwrap().0)
            .collect();
        assert_eq!(owners, vec![0, 0, 0, 1, 1, 2, 2, 2, 3, 3]);
        assert_eq!(ShardingFunction::owned_offsets(ShardId(1), 4, 10).unwrap(), (3, 5));
        assert_eq!(ShardingFunction::owned_offsets(ShardId(3), 4, 10).unwrap(), (8, 10));
    }

    #[test]
    fn test_more_shards_than_points() {
        let f = function(1);
        let d = line(2);
        // Offsets 0 and 1 land on shards 0 and 2.
        assert_eq!(
            f.find_local_domain(ShardId(0), 4, &d).unwrap(),
            vec![IndexDomain::new(vec![0], vec![0]).unwrap()]
        );
        assert!(f.find_local_domain(ShardId(1), 4, &d).unwrap().is_empty());
        assert_eq!(
            f.find_local_domain(ShardId(2), 4, &d).unwrap(),
            vec![IndexDomain::new(vec![1], vec![1]).unwrap()]
        );
        assert!(f.find_local_domain(ShardId(3), 4, &d).unwrap().is_empty());
    }

    #[test]
    fn test_offset_domain() {
        let f = function(1);
        let d = IndexDomain::new(vec![10], vec![13]).unwrap();
        assert_eq!(f.shard(&DomainPoint::scalar(12), &d, 2).unwrap(), ShardId(1));
        assert!(matches!(
            f.shard(&DomainPoint::scalar(0), &d, 2),
            Err(ShardingError::PointOutsideDomain { .. })
        ));
    }

    #[test]
    fn test_find_proc() {
        let f = function(4);
        let d = line(8);
        let procs: Vec<u64> = (0..8)
            .map(|i| f.find_proc(&DomainPoint::scalar(i), &d).unwrap().0)
            .collect();
        assert_eq!(procs, vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_find_proc_uneven_line_follows_blocks() {
        // Blocks of ceil(5 / 4) = 2 points: [0, 1] [2, 3] [4] and an empty one.
        let f = function(4);
        let d = line(5);
        let procs: Vec<u64> = (0..5)
            .map(|i| f.find_proc(&DomainPoint::scalar(i), &d).unwrap().0)
            .collect();
        assert_eq!(procs, vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_find_proc_grid_blocks() {
        let f = ShardingFunction::from_parts(
            ShardingId(2),
            LayerId(0),
            vec![2, 2],
            (10..14).map(ProcessorId).collect(),
        );
        let d = IndexDomain::from_extents(&[4, 4]).unwrap();
        let at = |r, c| f.find_proc(&DomainPoint::new(vec![r, c]), &d).unwrap().0;
        assert_eq!(at(0, 0), 10);
        assert_eq!(at(1, 1), 10);
        assert_eq!(at(0, 2), 11);
        assert_eq!(at(1, 0), 10);
        assert_eq!(at(2, 1), 12);
        assert_eq!(at(3, 3), 13);
        assert!(matches!(
            f.find_proc(&DomainPoint::scalar(0), &line(4)),
            Err(ShardingError::GridMismatch { .. })
        ));
    }

    #[test]
    fn test_find_proc_without_processors() {
        let f = ShardingFunction::from_parts(ShardingId(9), LayerId(0), vec![1], vec![]);
        assert_eq!(
            f.find_proc(&DomainPoint::scalar(0), &line(1)),
            Err(ShardingError::NoProcessors(ShardingId(9)))
        );
    }

    #[test]
    fn test_find_local_domain_2d_is_rect_list() {
        let f = function(1);
        let d = IndexDomain::from_extents(&[3, 4]).unwrap();
        // V = 12, S = 5: shard 1 owns offsets [3, 5) = (0,3), (1,0).
        let rects = f.find_local_domain(ShardId(1), 5, &d).unwrap();
        assert_eq!(
            rects,
            vec![
                IndexDomain::new(vec![0, 3], vec![0, 3]).unwrap(),
                IndexDomain::new(vec![1, 0], vec![1, 0]).unwrap(),
            ]
        );
    }

    #[test]
    fn test_errors() {
        let f = function(2);
        let d = line(4);
        assert_eq!(f.shard(&DomainPoint::scalar(0), &d, 0), Err(ShardingError::ZeroShards));
        assert_eq!(
            f.find_local_domain(ShardId(2), 2, &d),
            Err(ShardingError::ShardOutOfRange { shard: 2, total: 2 })
        );
    }

    #[test]
    fn test_large_domain_no_overflow() {
        let f = function(1);
        let d = IndexDomain::from_extents(&[1 << 20, 1 << 20]).unwrap();
        let last = DomainPoint::new(vec![(1 << 20) - 1, (1 << 20) - 1]);
        assert_eq!(f.shard(&last, &d, u32::MAX).unwrap(), ShardId(u32::MAX - 1));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn shards_cover_without_overlap(
                extents in prop::collection::vec(1usize..6, 1..=3),
                total in 1u32..9,
            ) {
                let f = function(1);
                let d = IndexDomain::from_extents(&extents).unwrap();
                let mut owned = vec![0u64; total as usize];
                for p in d.points() {
                    let s = f.shard(&p, &d, total).unwrap();
                    prop_assert!(s.0 < total);
                    owned[s.0 as usize] += 1;
                    let rects = f.find_local_domain(s, total, &d).unwrap();
                    prop_assert!(rects.iter().any(|r| r.contains_point(&p)));
                }
                prop_assert_eq!(owned.iter().sum::<u64>(), d.volume());
                let (lo, hi) = (owned.iter().min().unwrap(), owned.iter().max().unwrap());
                prop_assert!(hi - lo <= 1);
                if d.volume() % total as u64 == 0 {
                    prop_assert!(owned.iter().all(|&n| n == d.volume() / total as u64));
                }
                for s in 0..total {
                    let rects = f.find_local_domain(ShardId(s), total, &d).unwrap();
                    let vol: u64 = rects.iter().map(|r| r.volume()).sum();
                    prop_assert_eq!(vol, owned[s as usize]);
                }
            }

            #[test]
            fn find_proc_agrees_with_blocks(
                dims in prop::collection::vec(1usize..4, 1..=3),
                extra in prop::collection::vec(0usize..5, 3),
            ) {
                let count: usize = dims.iter().product();
                let f = ShardingFunction::from_parts(
                    ShardingId(1),
                    LayerId(0),
                    dims.clone(),
                    (0..count as u64).map(ProcessorId).collect(),
                );
                let extents: Vec<usize> = dims.iter().zip(&extra).map(|(&g, &e)| g + e).collect();
                let d = IndexDomain::from_extents(&extents).unwrap();
                for k in 0..count {
                    let mut rest = k;
                    let mut coord = vec![0i64; dims.len()];
                    for a in (0..dims.len()).rev() {
                        coord[a] = (rest % dims[a]) as i64;
                        rest /= dims[a];
                    }
                    if let Some(block) = d.block(&dims, &coord) {
                        for p in block.points() {
                            prop_assert_eq!(f.find_proc(&p, &d).unwrap(), ProcessorId(k as u64));
                        }
                    }
                }
            }

            #[test]
            fn shard_is_deterministic(
                extents in prop::collection::vec(1usize..8, 1..=4),
                total in 1u32..16,
                seed in any::<u64>(),
            ) {
                let d = IndexDomain::from_extents(&extents).unwrap();
                let p = d.delinearize(seed % d.volume()).unwrap();
                let a = function(3);
                let b = function(3);
                let first = a.shard(&p, &d, total).unwrap();
                prop_assert_eq!(a.shard(&p, &d, total).unwrap(), first);
                prop_assert_eq!(b.shard(&p, &d, total).unwrap(), first);
            }
        }
    }
}
