// src/arena.rs
//! Generation-keyed linear arena for resolution-dependent render targets.
//!
//! Everything sized by the screen (frustum grid, light grids, index lists,
//! GBuffer channels) is allocated from one budget. A resize calls
//! [`LinearArena::reset`], which frees the whole budget at once and bumps the
//! generation; every [`Tagged`] value created before that is stale.

use crate::error::{Error, Result};

/// Allocation alignment, matching the strictest storage-buffer offset rule.
pub const ARENA_ALIGNMENT: u64 = 256;

/// Default budget: 1 GiB of render-target memory.
pub const DEFAULT_ARENA_BUDGET: u64 = 1024 * 1024 * 1024;

/// Byte range handed out by the arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub offset: u64,
    pub size: u64,
}

/// A value owned by one arena generation.
#[derive(Debug)]
pub struct Tagged<T> {
    label: &'static str,
    generation: u64,
    allocation: Allocation,
    value: T,
}

impl<T> Tagged<T> {
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn allocation(&self) -> Allocation {
        self.allocation
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Checks that this value still belongs to the arena's live generation.
    ///
    /// A stale access is a caller bug: it panics in debug builds and is
    /// reported as [`Error::StaleGeneration`] in release builds.
    pub fn check(&self, arena: &LinearArena) -> Result<()> {
        if self.generation == arena.generation {
            return Ok(());
        }
        debug_assert!(
            false,
            "stale `{}`: generation {} used after resize to generation {}",
            self.label, self.generation, arena.generation
        );
        tracing::error!(
            label = self.label,
            found = self.generation,
            current = arena.generation,
            "stale render resource accessed"
        );
        Err(Error::StaleGeneration {
            label: self.label.to_string(),
            found: self.generation,
            current: arena.generation,
        })
    }

    pub fn get(&self, arena: &LinearArena) -> Result<&T> {
        self.check(arena)?;
        Ok(&self.value)
    }

    pub fn get_mut(&mut self, arena: &LinearArena) -> Result<&mut T> {
        self.check(arena)?;
        Ok(&mut self.value)
    }
}

/// Snapshot of arena usage.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct ArenaStats {
    pub generation: u64,
    pub capacity: u64,
    pub used: u64,
    pub allocations: usize,
    pub resets: u64,
}

/// Bump allocator over a fixed byte budget.
#[derive(Debug)]
pub struct LinearArena {
    capacity: u64,
    used: u64,
    generation: u64,
    allocations: usize,
    resets: u64,
}

impl LinearArena {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            used: 0,
            generation: 0,
            allocations: 0,
            resets: 0,
        }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn used(&self) -> u64 {
        self.used
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Free everything and start a new generation.
    pub fn reset(&mut self) {
        self.used = 0;
        self.allocations = 0;
        self.generation += 1;
        self.resets += 1;
    }

    /// Reserve `size` bytes and tag `value` with the current generation.
    pub fn alloc<T>(&mut self, label: &'static str, size: u64, value: T) -> Result<Tagged<T>> {
        let offset = self.used.next_multiple_of(ARENA_ALIGNMENT);
        let end = offset.checked_add(size).filter(|&end| end <= self.capacity);
        let Some(end) = end else {
            return Err(Error::ArenaExhausted {
                label: label.to_string(),
                requested: size,
                available: self.capacity.saturating_sub(offset),
            });
        };
        self.used = end;
        self.allocations += 1;
        tracing::trace!(label, offset, size, generation = self.generation, "arena alloc");
        Ok(Tagged {
            label,
            generation: self.generation,
            allocation: Allocation { offset, size },
            value,
        })
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            generation: self.generation,
            capacity: self.capacity,
            used: self.used,
            allocations: self.allocations,
            resets: self.resets,
        }
    }
}

impl Default for LinearArena {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_BUDGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_aligned_and_bounded() {
        let mut arena = LinearArena::new(1024);
        let a = arena.alloc("a", 10, ()).unwrap();
        let b = arena.alloc("b", 10, ()).unwrap();
        assert_eq!(a.allocation(), Allocation { offset: 0, size: 10 });
        assert_eq!(b.allocation().offset, 256);
        assert!(matches!(
            arena.alloc("c", 1024, ()),
            Err(Error::ArenaExhausted { requested: 1024, .. })
        ));
        assert_eq!(arena.stats().allocations, 2);
    }

    #[test]
    fn test_reset_bumps_generation() {
        let mut arena = LinearArena::new(4096);
        let t = arena.alloc("grid", 64, 5u32).unwrap();
        assert_eq!(*t.get(&arena).unwrap(), 5);
        arena.reset();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.generation(), 1);
        let fresh = arena.alloc("grid", 64, 6u32).unwrap();
        assert_eq!(fresh.generation(), 1);
        assert_eq!(fresh.allocation().offset, 0);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "stale `grid`"))]
    fn test_stale_access_is_fatal_in_debug() {
        let mut arena = LinearArena::new(4096);
        let t = arena.alloc("grid", 64, 5u32).unwrap();
        arena.reset();
        // Release builds report the violation instead.
        assert!(t.get(&arena).is_err());
    }
}
