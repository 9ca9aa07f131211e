// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-node instance cache.
//!
//! Instances are filed under a [`CacheKey`] `(tree, field, memory)`. Each
//! key owns a slot arena:
//!
//! ```text
//!   slots:          [ Some(I0) | None | Some(I2) ]     free: [1]
//!   region_mapping: { r0 → 0, r1 → 0, r5 → 2 }
//! ```
//!
//! Slot indices are stable: evicting an instance empties its slot and
//! pushes the index on the free list, so no other mapping is renumbered.
//! Insertion order is kept separately as a sequence number, which is what
//! source ranking uses for its final tie-break.

use crate::{CacheError, CacheStats, PhysicalInstance};
use index_space::{FieldId, IndexDomain, InstanceId, LogicalRegion, MemoryId, RegionTreeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Key under which instances are filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct CacheKey {
    pub tree: RegionTreeId,
    pub field: FieldId,
    pub memory: MemoryId,
}

impl CacheKey {
    pub fn new(tree: RegionTreeId, field: FieldId, memory: MemoryId) -> Self {
        Self { tree, field, memory }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.tree, self.field, self.memory)
    }
}

/// How a lookup-or-create call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum LookupOutcome {
    /// The region was already registered.
    Hit,
    /// An existing instance's bounding box covers the region.
    Contained,
    /// A fresh instance was created and registered.
    Created,
}

/// Result of [`InstanceCache::find_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub instance: PhysicalInstance,
    pub outcome: LookupOutcome,
}

/// Recency and age of a cached instance, used to rank copy sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct InstanceUsage {
    /// Position in global insertion order (smaller is older).
    pub inserted_seq: u64,
    /// Logical time of the last lookup that returned this instance.
    pub last_used: u64,
}

struct InstanceInfo {
    instance: PhysicalInstance,
    regions: Vec<(LogicalRegion, IndexDomain)>,
    usage: InstanceUsage,
}

#[derive(Default)]
struct InstanceSlots {
    slots: Vec<Option<InstanceInfo>>,
    free: Vec<usize>,
    region_mapping: HashMap<LogicalRegion, usize>,
    live: usize,
}

impl InstanceSlots {
    fn slot_of(&self, id: InstanceId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|info| info.instance.id == id))
    }

    fn info(&self, slot: usize) -> Option<&InstanceInfo> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    fn info_mut(&mut self, slot: usize) -> Option<&mut InstanceInfo> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    fn place(&mut self, info: InstanceInfo) -> usize {
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(info);
                slot
            }
            None => {
                self.slots.push(Some(info));
                self.slots.len() - 1
            }
        }
    }

    fn unmap_region(&mut self, region: &LogicalRegion) {
        if let Some(old) = self.region_mapping.remove(region) {
            if let Some(info) = self.info_mut(old) {
                info.regions.retain(|(r, _)| r != region);
            }
        }
    }

    fn remove(&mut self, slot: usize) -> Option<InstanceInfo> {
        let info = self.slots.get_mut(slot)?.take()?;
        for (region, _) in &info.regions {
            if self.region_mapping.get(region) == Some(&slot) {
                self.region_mapping.remove(region);
            }
        }
        self.free.push(slot);
        self.live -= 1;
        Some(info)
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, InstanceSlots>,
    owners: HashMap<InstanceId, CacheKey>,
    clock: u64,
    next_seq: u64,
    stats: CacheStats,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Resolves `region` through the index. A dangling index is reported
    /// and treated as a miss.
    fn lookup_exact(&mut self, key: &CacheKey, region: &LogicalRegion) -> Option<usize> {
        let slots = self.entries.get(key)?;
        let slot = *slots.region_mapping.get(region)?;
        let live = slots.info(slot).is_some();
        debug_assert!(live, "dangling region index for {region} under {key}");
        if live {
            return Some(slot);
        }
        self.stats.inconsistencies += 1;
        tracing::error!(%key, %region, slot, "region index points at an empty slot");
        None
    }

    /// Oldest instance under `key` whose bounding box covers `bounds`.
    fn lookup_containing(&self, key: &CacheKey, bounds: &IndexDomain) -> Option<usize> {
        let slots = self.entries.get(key)?;
        slots
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|info| (i, info)))
            .filter(|(_, info)| info.instance.covers(bounds))
            .min_by_key(|(_, info)| info.usage.inserted_seq)
            .map(|(i, _)| i)
    }

    fn touch(&mut self, key: &CacheKey, slot: usize) -> Option<PhysicalInstance> {
        let now = self.tick();
        let info = self.entries.get_mut(key)?.info_mut(slot)?;
        info.usage.last_used = now;
        Some(info.instance.clone())
    }

    fn register(
        &mut self,
        region: LogicalRegion,
        bounds: &IndexDomain,
        instance: &PhysicalInstance,
    ) -> Result<(), CacheError> {
        if region.tree != instance.tree {
            return Err(CacheError::KeyMismatch {
                instance: instance.id,
            });
        }
        if !instance.covers(bounds) {
            return Err(CacheError::BoundsNotContained {
                instance: instance.id,
                instance_bounds: instance.bounding_box.clone(),
                region,
                region_bounds: bounds.clone(),
            });
        }
        let key = instance.key();
        if let Some(owner) = self.owners.get(&instance.id) {
            if *owner != key {
                return Err(CacheError::KeyMismatch {
                    instance: instance.id,
                });
            }
        }

        let now = self.tick();
        let fresh = !self.owners.contains_key(&instance.id);
        let seq = self.next_seq;
        let slots = self.entries.entry(key).or_default();
        slots.unmap_region(&region);

        let slot = match slots.slot_of(instance.id) {
            Some(slot) => slot,
            None => slots.place(InstanceInfo {
                instance: instance.clone(),
                regions: Vec::new(),
                usage: InstanceUsage {
                    inserted_seq: seq,
                    last_used: now,
                },
            }),
        };
        if let Some(info) = slots.info_mut(slot) {
            info.regions.push((region, bounds.clone()));
            info.usage.last_used = now;
        }
        slots.region_mapping.insert(region, slot);

        if fresh {
            self.next_seq += 1;
            self.owners.insert(instance.id, key);
            self.stats.inserts += 1;
        }
        Ok(())
    }

    fn evict(&mut self, id: InstanceId) -> Option<PhysicalInstance> {
        let key = self.owners.remove(&id)?;
        let slots = self.entries.get_mut(&key)?;
        let removed = slots.slot_of(id).and_then(|slot| slots.remove(slot));
        if slots.live == 0 {
            self.entries.remove(&key);
        }
        let info = removed?;
        self.stats.evictions += 1;
        Some(info.instance)
    }
}

/// Keyed store of physical instances, shared by every mapping worker of
/// one node.
///
/// All operations take the same lock and never wait on anything outside
/// the cache while holding it (the allocator closure passed to
/// [`InstanceCache::find_or_create`] must honour the same rule).
#[derive(Default)]
pub struct InstanceCache {
    state: Mutex<CacheState>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        // The state is only mutated after every fallible check has passed,
        // so a panic in another worker cannot leave it half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the instance `region` is registered against, if any.
    pub fn find(
        &self,
        region: LogicalRegion,
        field: FieldId,
        memory: MemoryId,
    ) -> Option<PhysicalInstance> {
        let key = CacheKey::new(region.tree, field, memory);
        let mut state = self.state();
        let found = state
            .lookup_exact(&key, &region)
            .and_then(|slot| state.touch(&key, slot));
        match found {
            Some(_) => state.stats.exact_hits += 1,
            None => state.stats.misses += 1,
        }
        found
    }

    /// Returns the oldest instance under `(tree, field, memory)` whose
    /// bounding box covers `bounds`.
    pub fn find_containing(
        &self,
        tree: RegionTreeId,
        bounds: &IndexDomain,
        field: FieldId,
        memory: MemoryId,
    ) -> Option<PhysicalInstance> {
        let key = CacheKey::new(tree, field, memory);
        let mut state = self.state();
        let found = state
            .lookup_containing(&key, bounds)
            .and_then(|slot| state.touch(&key, slot));
        match found {
            Some(_) => state.stats.containment_hits += 1,
            None => state.stats.misses += 1,
        }
        found
    }

    /// Registers `region` (with footprint `bounds`) against `instance`.
    ///
    /// A new instance is appended to its key; a known one just gains the
    /// region. A region previously registered elsewhere under the same key
    /// is moved.
    pub fn insert(
        &self,
        region: LogicalRegion,
        bounds: &IndexDomain,
        instance: &PhysicalInstance,
    ) -> Result<(), CacheError> {
        self.state().register(region, bounds, instance)
    }

    /// Looks `region` up, then an instance covering `bounds`, and only then
    /// calls `create`, all under a single lock hold.
    ///
    /// Concurrent callers asking for the same region and memory therefore
    /// observe exactly one `Created` outcome; everyone else gets `Hit`.
    ///
    /// A created instance that cannot be registered (wrong key, or bounds
    /// that do not cover `bounds`) is handed to `release` before the lock
    /// is dropped, and the error is returned.
    pub fn find_or_create<F, R, E>(
        &self,
        region: LogicalRegion,
        bounds: &IndexDomain,
        field: FieldId,
        memory: MemoryId,
        create: F,
        release: R,
    ) -> Result<Lookup, E>
    where
        F: FnOnce() -> Result<PhysicalInstance, E>,
        R: FnOnce(&PhysicalInstance),
        E: From<CacheError>,
    {
        let key = CacheKey::new(region.tree, field, memory);
        let mut state = self.state();

        if let Some(slot) = state.lookup_exact(&key, &region) {
            if let Some(instance) = state.touch(&key, slot) {
                state.stats.exact_hits += 1;
                return Ok(Lookup {
                    instance,
                    outcome: LookupOutcome::Hit,
                });
            }
        }

        if let Some(slot) = state.lookup_containing(&key, bounds) {
            if let Some(instance) = state.touch(&key, slot) {
                state.register(region, bounds, &instance)?;
                state.stats.containment_hits += 1;
                return Ok(Lookup {
                    instance,
                    outcome: LookupOutcome::Contained,
                });
            }
        }

        state.stats.misses += 1;
        let instance = create()?;
        let registered = if instance.memory != memory || instance.field != field {
            Err(CacheError::KeyMismatch {
                instance: instance.id,
            })
        } else {
            state.register(region, bounds, &instance)
        };
        if let Err(e) = registered {
            tracing::warn!("created {} rejected: {e}", instance.id);
            release(&instance);
            return Err(e.into());
        }
        Ok(Lookup {
            instance,
            outcome: LookupOutcome::Created,
        })
    }

    /// Removes an instance and every region registered against it.
    ///
    /// Returns the removed instance, or `None` if it was not cached.
    pub fn evict(&self, id: InstanceId) -> Option<PhysicalInstance> {
        self.state().evict(id)
    }

    /// Evicts an instance and runs `notify` before releasing the lock, so
    /// no lookup can observe the instance between removal and notification.
    pub fn evict_then<F>(&self, id: InstanceId, notify: F) -> Option<PhysicalInstance>
    where
        F: FnOnce(&PhysicalInstance),
    {
        let mut state = self.state();
        let removed = state.evict(id)?;
        notify(&removed);
        Some(removed)
    }

    /// Returns usage records for `ids`, in the same order (`None` for
    /// instances the cache does not know).
    pub fn usage(&self, ids: &[InstanceId]) -> Vec<Option<InstanceUsage>> {
        let state = self.state();
        ids.iter()
            .map(|id| {
                let key = state.owners.get(id)?;
                let slots = state.entries.get(key)?;
                slots.slot_of(*id).and_then(|s| slots.info(s)).map(|i| i.usage)
            })
            .collect()
    }

    /// Returns the regions registered against an instance.
    pub fn regions_of(&self, id: InstanceId) -> Vec<LogicalRegion> {
        let state = self.state();
        state
            .owners
            .get(&id)
            .and_then(|key| state.entries.get(key))
            .and_then(|slots| slots.slot_of(id).and_then(|s| slots.info(s)))
            .map(|info| info.regions.iter().map(|(r, _)| *r).collect())
            .unwrap_or_default()
    }

    /// Returns the instances filed under `key`, oldest first.
    pub fn instances(&self, key: &CacheKey) -> Vec<PhysicalInstance> {
        let state = self.state();
        let Some(slots) = state.entries.get(key) else {
            return Vec::new();
        };
        let mut infos: Vec<&InstanceInfo> = slots.slots.iter().flatten().collect();
        infos.sort_by_key(|info| info.usage.inserted_seq);
        infos.into_iter().map(|info| info.instance.clone()).collect()
    }

    /// Returns the number of live instances.
    pub fn len(&self) -> usize {
        self.state().owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.state().stats.clone()
    }

    /// Verifies every structural invariant:
    ///
    /// - each region index entry points at a live slot that lists the region;
    /// - each listed region maps back to its slot and fits the bounding box;
    /// - every instance lives under its own key and is owned exactly once;
    /// - free-list entries point at empty slots.
    pub fn check_invariants(&self) -> Result<(), CacheError> {
        let state = self.state();
        let mut seen = 0usize;
        for (key, slots) in &state.entries {
            for (region, &slot) in &slots.region_mapping {
                let info = slots.info(slot).ok_or_else(|| {
                    CacheError::Inconsistency(format!("{region} under {key} maps to empty slot {slot}"))
                })?;
                if !info.regions.iter().any(|(r, _)| r == region) {
                    return Err(CacheError::Inconsistency(format!(
                        "{region} under {key} maps to {} which does not list it",
                        info.instance.id
                    )));
                }
            }
            for (slot, info) in slots.slots.iter().enumerate() {
                let Some(info) = info else { continue };
                seen += 1;
                if info.instance.key() != *key || state.owners.get(&info.instance.id) != Some(key) {
                    return Err(CacheError::Inconsistency(format!(
                        "{} filed under the wrong key {key}",
                        info.instance.id
                    )));
                }
                for (region, bounds) in &info.regions {
                    if slots.region_mapping.get(region) != Some(&slot) {
                        return Err(CacheError::Inconsistency(format!(
                            "{region} listed by {} is not indexed to it",
                            info.instance.id
                        )));
                    }
                    if !info.instance.covers(bounds) {
                        return Err(CacheError::Inconsistency(format!(
                            "{region} exceeds the bounding box of {}",
                            info.instance.id
                        )));
                    }
                }
            }
            if slots.free.iter().any(|&s| slots.info(s).is_some()) {
                return Err(CacheError::Inconsistency(format!(
                    "free list under {key} references a live slot"
                )));
            }
        }
        if seen != state.owners.len() {
            return Err(CacheError::Inconsistency(format!(
                "{seen} live slots but {} owned instances",
                state.owners.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("InstanceCache")
            .field("keys", &state.entries.len())
            .field("instances", &state.owners.len())
            .finish()
    }
}
