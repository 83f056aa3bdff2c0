// src/light_grid.rs
//! Per-tile `(offset, count)` grids and the global light index lists they point into.

use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};

use crate::tiles::TileGrid;

/// One texel of a light grid (`Rg32Uint`): a range in the index list.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct LightGridEntry {
    pub offset: u32,
    pub count: u32,
}

impl LightGridEntry {
    pub const EMPTY: Self = Self { offset: 0, count: 0 };

    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..(self.offset + self.count) as usize
    }
}

/// Which of the two lists a value belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// Depth range tightened to the nearest tile surface.
    Opaque,
    /// Depth range starting at the near clip plane.
    Transparent,
}

impl ListKind {
    pub const ALL: [ListKind; 2] = [ListKind::Opaque, ListKind::Transparent];
}

/// A light grid plus its index list and bump counter. Valid for one frame.
#[derive(Debug)]
pub struct LightList {
    entries: Vec<LightGridEntry>,
    indices: Box<[AtomicU32]>,
    counter: AtomicU32,
}

impl LightList {
    /// Storage for `grid`, with `MaxLightsPerTile` index slots per tile.
    pub fn new(grid: &TileGrid) -> Self {
        Self::with_index_capacity(grid.tile_count(), grid.light_index_capacity())
    }

    pub fn with_index_capacity(tiles: usize, capacity: usize) -> Self {
        Self {
            entries: vec![LightGridEntry::EMPTY; tiles],
            indices: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            counter: AtomicU32::new(0),
        }
    }

    /// Per-frame reset: counter to zero, every grid entry to empty.
    pub fn clear(&mut self) {
        *self.counter.get_mut() = 0;
        self.entries.fill(LightGridEntry::EMPTY);
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.entries.len()
    }

    /// Slots handed out so far this frame (may exceed capacity; excess is dropped).
    #[inline]
    pub fn counter(&self) -> u32 {
        self.counter.load(Ordering::Acquire)
    }

    #[inline]
    pub fn entries(&self) -> &[LightGridEntry] {
        &self.entries
    }

    #[inline]
    pub fn entry(&self, tile_index: usize) -> LightGridEntry {
        self.entries[tile_index]
    }

    /// Light indices recorded for one tile.
    pub fn tile_lights(&self, tile_index: usize) -> TileLights<'_> {
        let range = self.entries[tile_index].range();
        let end = range.end.min(self.indices.len());
        let start = range.start.min(end);
        TileLights {
            slots: self.indices[start..end].iter(),
        }
    }

    /// Copy of one tile's indices, convenient for tests and read-back comparisons.
    pub fn tile_lights_vec(&self, tile_index: usize) -> Vec<u32> {
        self.tile_lights(tile_index).collect()
    }

    /// Split into the per-tile grid entries and the shared append sink, so
    /// tiles can write their own entry while reserving from one counter.
    #[inline]
    pub(crate) fn split_mut(&mut self) -> (&mut [LightGridEntry], IndexSink<'_>) {
        (
            &mut self.entries,
            IndexSink {
                indices: &self.indices,
                counter: &self.counter,
            },
        )
    }

    /// Overwrite this list from GPU read-back data.
    pub fn load_readback(&mut self, entries: &[LightGridEntry], indices: &[u32], counter: u32) {
        self.entries.clear();
        self.entries.extend_from_slice(entries);
        for (cell, &value) in self.indices.iter_mut().zip(indices) {
            *cell.get_mut() = value;
        }
        *self.counter.get_mut() = counter;
    }

    /// Sum of all recorded counts.
    pub fn total_count(&self) -> u64 {
        self.entries.iter().map(|e| e.count as u64).sum()
    }
}

/// Shared write access to an index list: the bump counter and the slots.
#[derive(Copy, Clone)]
pub(crate) struct IndexSink<'a> {
    indices: &'a [AtomicU32],
    counter: &'a AtomicU32,
}

impl IndexSink<'_> {
    /// Reserve `count` contiguous slots; returns the first one.
    #[inline]
    pub(crate) fn reserve(&self, count: u32) -> u32 {
        self.counter.fetch_add(count, Ordering::AcqRel)
    }

    /// Store one index. Slots past the end of the list are dropped.
    #[inline]
    pub(crate) fn store(&self, slot: u32, light: u32) -> bool {
        match self.indices.get(slot as usize) {
            Some(cell) => {
                cell.store(light, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

/// Iterator over one tile's light indices.
pub struct TileLights<'a> {
    slots: std::slice::Iter<'a, AtomicU32>,
}

impl TileLights<'_> {
    /// No lights, e.g. for pixels outside the screen.
    pub fn empty() -> Self {
        TileLights {
            slots: Default::default(),
        }
    }
}

impl Iterator for TileLights<'_> {
    type Item = u32;

    #[inline]
    fn next(&mut self) -> Option<u32> {
        self.slots.next().map(|slot| slot.load(Ordering::Relaxed))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl ExactSizeIterator for TileLights<'_> {}

/// The opaque and transparent lists of one frame.
#[derive(Debug)]
pub struct LightLists {
    pub opaque: LightList,
    pub transparent: LightList,
}

impl LightLists {
    pub fn new(grid: &TileGrid) -> Self {
        Self {
            opaque: LightList::new(grid),
            transparent: LightList::new(grid),
        }
    }

    pub fn clear(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
    }

    #[inline]
    pub fn get(&self, kind: ListKind) -> &LightList {
        match kind {
            ListKind::Opaque => &self.opaque,
            ListKind::Transparent => &self.transparent,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, kind: ListKind) -> &mut LightList {
        match kind {
            ListKind::Opaque => &mut self.opaque,
            ListKind::Transparent => &mut self.transparent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_store() {
        let mut list = LightList::with_index_capacity(2, 4);
        let (_, sink) = list.split_mut();
        assert_eq!(sink.reserve(3), 0);
        assert_eq!(sink.reserve(3), 3);
        assert!(sink.store(3, 9));
        assert!(!sink.store(4, 9));
        assert_eq!(list.counter(), 6);
    }

    #[test]
    fn test_clear_resets_counter_and_entries() {
        let mut list = LightList::new(&TileGrid::new(16, 8));
        let (entries, sink) = list.split_mut();
        let offset = sink.reserve(2);
        entries[1] = LightGridEntry { offset, count: 2 };
        sink.store(0, 4);
        sink.store(1, 5);
        assert_eq!(list.tile_lights_vec(1), vec![4, 5]);
        assert_eq!(list.total_count(), 2);
        list.clear();
        assert_eq!(list.counter(), 0);
        assert!(list.entries().iter().all(|e| *e == LightGridEntry::EMPTY));
        assert_eq!(list.tile_lights(1).len(), 0);
    }
}
