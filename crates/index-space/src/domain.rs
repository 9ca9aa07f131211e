// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Index domains, points, and row-major linearisation.
//!
//! An [`IndexDomain`] is an inclusive rectangle `lo..=hi` on every axis.
//! Flat offsets always follow row-major (C) order: the last axis varies
//! fastest. Every function here is pure integer arithmetic, so two
//! processes computing the same offset always agree.

use crate::DomainError;
use std::fmt;

/// Largest supported rank.
pub const MAX_DIM: usize = 4;

/// A coordinate vector inside an [`IndexDomain`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DomainPoint {
    coords: Vec<i64>,
}

impl DomainPoint {
    /// Creates a point from its coordinates.
    pub fn new(coords: Vec<i64>) -> Self {
        Self { coords }
    }

    /// Creates a 1-D point.
    pub fn scalar(x: i64) -> Self {
        Self { coords: vec![x] }
    }

    /// Returns the number of coordinates.
    pub fn dim(&self) -> usize {
        self.coords.len()
    }

    /// Returns the coordinates as a slice.
    pub fn coords(&self) -> &[i64] {
        &self.coords
    }
}

impl std::ops::Index<usize> for DomainPoint {
    type Output = i64;

    fn index(&self, axis: usize) -> &i64 {
        &self.coords[axis]
    }
}

impl From<Vec<i64>> for DomainPoint {
    fn from(coords: Vec<i64>) -> Self {
        Self::new(coords)
    }
}

impl fmt::Display for DomainPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

/// An axis-aligned, non-empty, inclusive integer rectangle.
///
/// Invariant: `1 <= rank <= MAX_DIM` and `lo[i] <= hi[i]` on every axis.
/// The invariant is checked by every constructor, including
/// deserialisation.
///
/// # Examples
/// ```
/// use index_space::IndexDomain;
///
/// let d = IndexDomain::new(vec![0, 10], vec![3, 19]).unwrap();
/// assert_eq!(d.rank(), 2);
/// assert_eq!(d.extents(), vec![4, 10]);
/// assert_eq!(d.volume(), 40);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawDomain", into = "RawDomain")]
pub struct IndexDomain {
    lo: Vec<i64>,
    hi: Vec<i64>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct RawDomain {
    lo: Vec<i64>,
    hi: Vec<i64>,
}

impl TryFrom<RawDomain> for IndexDomain {
    type Error = DomainError;

    fn try_from(raw: RawDomain) -> Result<Self, DomainError> {
        IndexDomain::new(raw.lo, raw.hi)
    }
}

impl From<IndexDomain> for RawDomain {
    fn from(d: IndexDomain) -> Self {
        RawDomain { lo: d.lo, hi: d.hi }
    }
}

impl IndexDomain {
    /// Creates a domain from inclusive lower and upper bounds.
    pub fn new(lo: Vec<i64>, hi: Vec<i64>) -> Result<Self, DomainError> {
        if lo.len() != hi.len() {
            return Err(DomainError::RankMismatch {
                lo: lo.len(),
                hi: hi.len(),
            });
        }
        check_rank(lo.len())?;
        for axis in 0..lo.len() {
            if lo[axis] > hi[axis] {
                return Err(DomainError::EmptyAxis {
                    axis,
                    lo: lo[axis],
                    hi: hi[axis],
                });
            }
        }
        check_volume(&lo, &hi)?;
        Ok(Self { lo, hi })
    }

    /// Creates the domain `0..extent` on every axis.
    ///
    /// A zero extent is rejected rather than producing an empty domain.
    pub fn from_extents(extents: &[usize]) -> Result<Self, DomainError> {
        check_rank(extents.len())?;
        if let Some(axis) = extents.iter().position(|&e| e == 0) {
            return Err(DomainError::ZeroExtent { axis });
        }
        let hi = extents
            .iter()
            .map(|&e| i64::try_from(e).map(|e| e - 1))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DomainError::VolumeOverflow)?;
        Self::new(vec![0; extents.len()], hi)
    }

    /// Creates the single-point domain `{point}`.
    pub fn from_point(point: &DomainPoint) -> Result<Self, DomainError> {
        Self::new(point.coords.clone(), point.coords.clone())
    }

    /// Returns the number of axes.
    pub fn rank(&self) -> usize {
        self.lo.len()
    }

    /// Returns the inclusive lower bounds.
    pub fn lo(&self) -> &[i64] {
        &self.lo
    }

    /// Returns the inclusive upper bounds.
    pub fn hi(&self) -> &[i64] {
        &self.hi
    }

    /// Returns the number of points along `axis`.
    pub fn extent(&self, axis: usize) -> u64 {
        self.hi[axis].wrapping_sub(self.lo[axis]) as u64 + 1
    }

    /// Returns the extent of every axis.
    pub fn extents(&self) -> Vec<u64> {
        (0..self.rank()).map(|a| self.extent(a)).collect()
    }

    /// Returns the total number of points.
    pub fn volume(&self) -> u64 {
        (0..self.rank()).map(|a| self.extent(a)).product()
    }

    /// Computes row-major strides: `stride[last] = 1`,
    /// `stride[i] = stride[i + 1] * extent[i + 1]`.
    pub fn strides(&self) -> Vec<u64> {
        let rank = self.rank();
        let mut strides = vec![1u64; rank];
        for i in (0..rank - 1).rev() {
            strides[i] = strides[i + 1] * self.extent(i + 1);
        }
        strides
    }

    /// Returns `true` if `point` lies inside this domain.
    pub fn contains_point(&self, point: &DomainPoint) -> bool {
        point.dim() == self.rank()
            && (0..self.rank()).all(|a| self.lo[a] <= point[a] && point[a] <= self.hi[a])
    }

    /// Returns `true` if `other` lies entirely inside this domain.
    pub fn contains(&self, other: &IndexDomain) -> bool {
        other.rank() == self.rank()
            && (0..self.rank()).all(|a| self.lo[a] <= other.lo[a] && other.hi[a] <= self.hi[a])
    }

    /// Returns the overlap of two domains, or `None` if they are disjoint
    /// or of different rank.
    pub fn intersection(&self, other: &IndexDomain) -> Option<IndexDomain> {
        if other.rank() != self.rank() {
            return None;
        }
        let mut lo = Vec::with_capacity(self.rank());
        let mut hi = Vec::with_capacity(self.rank());
        for a in 0..self.rank() {
            let l = self.lo[a].max(other.lo[a]);
            let h = self.hi[a].min(other.hi[a]);
            if l > h {
                return None;
            }
            lo.push(l);
            hi.push(h);
        }
        Some(IndexDomain { lo, hi })
    }

    /// Returns the number of points shared with `other` (0 when disjoint).
    pub fn overlap_volume(&self, other: &IndexDomain) -> u64 {
        self.intersection(other).map_or(0, |d| d.volume())
    }

    /// Returns the row-major flat offset of `point`, or `None` if the
    /// point is outside the domain.
    pub fn linearize(&self, point: &DomainPoint) -> Option<u64> {
        if !self.contains_point(point) {
            return None;
        }
        let strides = self.strides();
        Some(
            (0..self.rank())
                .map(|a| point[a].wrapping_sub(self.lo[a]) as u64 * strides[a])
                .sum(),
        )
    }

    /// Inverts [`IndexDomain::linearize`]:
    /// `coord[i] = lo[i] + (offset / stride[i]) mod extent[i]`.
    pub fn delinearize(&self, offset: u64) -> Option<DomainPoint> {
        if offset >= self.volume() {
            return None;
        }
        let strides = self.strides();
        let coords = (0..self.rank())
            .map(|a| self.lo[a] + ((offset / strides[a]) % self.extent(a)) as i64)
            .collect();
        Some(DomainPoint::new(coords))
    }

    /// Iterates every point in row-major order.
    pub fn points(&self) -> impl Iterator<Item = DomainPoint> + '_ {
        (0..self.volume()).filter_map(move |off| self.delinearize(off))
    }

    /// Returns block `coord` of this domain cut into `parts[i]` pieces
    /// along each axis.
    ///
    /// Every block except the last one on an axis spans
    /// `ceil(extent / parts)` points. Returns `None` when ranks disagree,
    /// when `coord` is outside `parts`, or when the block is empty (the
    /// domain is narrower than the number of parts).
    pub fn block(&self, parts: &[usize], coord: &[i64]) -> Option<IndexDomain> {
        if parts.len() != self.rank() || coord.len() != self.rank() {
            return None;
        }
        let mut lo = Vec::with_capacity(self.rank());
        let mut hi = Vec::with_capacity(self.rank());
        for a in 0..self.rank() {
            let n = parts[a] as u64;
            if n == 0 || coord[a] < 0 || coord[a] as u64 >= n {
                return None;
            }
            let chunk = self.extent(a).div_ceil(n) as i64;
            let l = self.lo[a] + coord[a] * chunk;
            if l > self.hi[a] {
                return None;
            }
            lo.push(l);
            hi.push((l + chunk - 1).min(self.hi[a]));
        }
        Some(IndexDomain { lo, hi })
    }

    /// Returns the coordinate of the [`IndexDomain::block`] holding
    /// `point` when this domain is cut into `parts[i]` pieces per axis.
    ///
    /// Returns `None` when ranks disagree, when a part count is zero, or
    /// when `point` lies outside the domain.
    pub fn block_of(&self, parts: &[usize], point: &DomainPoint) -> Option<Vec<i64>> {
        if parts.len() != self.rank() || !self.contains_point(point) {
            return None;
        }
        let mut coord = Vec::with_capacity(self.rank());
        for a in 0..self.rank() {
            let n = parts[a] as u64;
            if n == 0 {
                return None;
            }
            let chunk = self.extent(a).div_ceil(n);
            coord.push((point[a].wrapping_sub(self.lo[a]) as u64 / chunk) as i64);
        }
        Some(coord)
    }

    /// Decomposes the flat offset range `start..end` into the smallest
    /// row-major ordered list of rectangles that covers exactly those
    /// points (at most `2 * rank - 1` of them).
    ///
    /// `end` is clamped to the volume; an empty range yields no rectangles.
    pub fn linear_range(&self, start: u64, end: u64) -> Vec<IndexDomain> {
        let end = end.min(self.volume());
        let mut out = Vec::new();
        if start < end {
            self.push_range(0, &mut Vec::new(), start, end, &mut out);
        }
        out
    }

    fn push_range(
        &self,
        axis: usize,
        prefix: &mut Vec<i64>,
        start: u64,
        end: u64,
        out: &mut Vec<IndexDomain>,
    ) {
        let lo0 = self.lo[axis];
        if axis + 1 == self.rank() {
            out.push(self.rect(prefix, lo0 + start as i64, lo0 + end as i64 - 1, axis));
            return;
        }

        let stride: u64 = (axis + 1..self.rank()).map(|a| self.extent(a)).product();
        let first_row = start / stride;
        let last_row = (end - 1) / stride;

        if first_row == last_row {
            prefix.push(lo0 + first_row as i64);
            let base = first_row * stride;
            self.push_range(axis + 1, prefix, start - base, end - base, out);
            prefix.pop();
            return;
        }

        let mut full_begin = first_row;
        if start % stride != 0 {
            prefix.push(lo0 + first_row as i64);
            self.push_range(axis + 1, prefix, start % stride, stride, out);
            prefix.pop();
            full_begin += 1;
        }

        let full_end = if end % stride != 0 { last_row } else { last_row + 1 };
        if full_begin < full_end {
            out.push(self.rect(
                prefix,
                lo0 + full_begin as i64,
                lo0 + full_end as i64 - 1,
                axis,
            ));
        }

        if end % stride != 0 {
            prefix.push(lo0 + last_row as i64);
            self.push_range(axis + 1, prefix, 0, end % stride, out);
            prefix.pop();
        }
    }

    /// Builds `prefix × [l, h] × (full extent of the remaining axes)`.
    fn rect(&self, prefix: &[i64], l: i64, h: i64, axis: usize) -> IndexDomain {
        let mut lo = prefix.to_vec();
        let mut hi = prefix.to_vec();
        lo.push(l);
        hi.push(h);
        lo.extend_from_slice(&self.lo[axis + 1..]);
        hi.extend_from_slice(&self.hi[axis + 1..]);
        IndexDomain { lo, hi }
    }
}

fn check_rank(rank: usize) -> Result<(), DomainError> {
    if rank == 0 || rank > MAX_DIM {
        return Err(DomainError::UnsupportedRank {
            rank,
            max: MAX_DIM,
        });
    }
    Ok(())
}

/// Every axis extent and the point count must fit in a `u64`.
fn check_volume(lo: &[i64], hi: &[i64]) -> Result<(), DomainError> {
    lo.iter()
        .zip(hi)
        .try_fold(1u64, |volume, (&l, &h)| {
            let extent = u64::try_from(i128::from(h) - i128::from(l) + 1).ok()?;
            volume.checked_mul(extent)
        })
        .map(|_| ())
        .ok_or(DomainError::VolumeOverflow)
}

impl fmt::Display for IndexDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for a in 0..self.rank() {
            if a > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}..={}", self.lo[a], self.hi[a])?;
        }
        write!(f, "]")
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn domain_strategy() -> impl Strategy<Value = IndexDomain> {
        prop::collection::vec((-20i64..20, 1i64..6), 1..=MAX_DIM).prop_map(|axes| {
            let lo = axes.iter().map(|(l, _)| *l).collect();
            let hi = axes.iter().map(|(l, e)| l + e - 1).collect();
            IndexDomain::new(lo, hi).unwrap()
        })
    }

    proptest! {
        /// Delinearising any in-range offset and linearising again is the identity.
        #[test]
        fn linearize_round_trip(d in domain_strategy(), seed in 0u64..10_000) {
            let off = seed % d.volume();
            let p = d.delinearize(off).unwrap();
            prop_assert!(d.contains_point(&p));
            prop_assert_eq!(d.linearize(&p), Some(off));
        }

        /// `linear_range` covers exactly the requested offsets, in order.
        #[test]
        fn linear_range_exact_cover(d in domain_strategy(), a in 0u64..2_000, b in 0u64..2_000) {
            let v = d.volume();
            let (start, end) = (a.min(b) % (v + 1), a.max(b) % (v + 1));
            let (start, end) = (start.min(end), start.max(end));
            let rects = d.linear_range(start, end);
            prop_assert!(rects.len() <= 2 * d.rank());
            let mut offsets: Vec<u64> = rects
                .iter()
                .flat_map(|r| r.points().collect::<Vec<_>>())
                .map(|p| d.linearize(&p).unwrap())
                .collect();
            let expected: Vec<u64> = (start..end).collect();
            prop_assert_eq!(&offsets, &expected);
            offsets.dedup();
            prop_assert_eq!(offsets.len() as u64, end - start);
        }
    }
}
