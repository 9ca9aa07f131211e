// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory capacities and their human-readable parsing.
//!
//! A [`MemoryBudget`] is the capacity of one physical memory (a frame
//! buffer, a NUMA domain, zero-copy host memory). Machine descriptions
//! spell capacities as strings such as `"16G"`, so parsing is lenient
//! about suffixes and case.

use crate::AllocError;
use std::fmt;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// The byte capacity of one memory.
///
/// # Parsing
/// - `"512M"` / `"512MB"` → 512 × 1024² bytes
/// - `"16G"` / `"16GB"` → 16 × 1024³ bytes
/// - `"64K"` / `"64KB"` → 64 × 1024 bytes
/// - `"4096"` / `"4096B"` → raw bytes
///
/// # Examples
/// ```
/// use instance_cache::MemoryBudget;
///
/// let b = MemoryBudget::parse("16G").unwrap();
/// assert_eq!(b.as_mb(), 16 * 1024);
/// assert_eq!(b.to_string(), "16 GB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MIB }
    }

    pub fn from_gb(gb: usize) -> Self {
        Self { bytes: gb * GIB }
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Returns the capacity in whole megabytes (truncated).
    pub fn as_mb(&self) -> usize {
        self.bytes / MIB
    }

    /// Parses a capacity string. Zero capacities are rejected.
    pub fn parse(s: &str) -> Result<Self, AllocError> {
        let input = s.trim();
        let invalid = |detail: &str| AllocError::InvalidBudget {
            input: s.to_string(),
            detail: detail.to_string(),
        };
        if input.is_empty() {
            return Err(invalid("empty string"));
        }

        let upper = input.to_uppercase();
        let (digits, multiplier) = [("GB", GIB), ("G", GIB), ("MB", MIB), ("M", MIB), ("KB", KIB), ("K", KIB), ("B", 1)]
            .iter()
            .find(|(suffix, _)| upper.ends_with(suffix))
            .map(|(suffix, m)| (&input[..input.len() - suffix.len()], *m))
            .unwrap_or((input, 1));

        let value: usize = digits
            .trim()
            .parse()
            .map_err(|_| invalid("expected a number followed by an optional K, M or G suffix"))?;
        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("capacity overflows usize"))?;
        if bytes == 0 {
            return Err(invalid("capacity must be non-zero"));
        }
        Ok(Self { bytes })
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes >= GIB && self.bytes % GIB == 0 {
            write!(f, "{} GB", self.bytes / GIB)
        } else if self.bytes >= MIB && self.bytes % MIB == 0 {
            write!(f, "{} MB", self.bytes / MIB)
        } else if self.bytes >= KIB && self.bytes % KIB == 0 {
            write!(f, "{} KB", self.bytes / KIB)
        } else {
            write!(f, "{} B", self.bytes)
        }
    }
}
