// src/tiles.rs
//! Screen tiling: constants, grid dimensions and tile/pixel indexing.

use glam::UVec2;

use crate::math::div_ceil2;

/// Edge length of a screen tile in pixels. Also the cull work-group edge.
pub const TILE_SIZE: u32 = 8;
/// Threads cooperating on one tile.
pub const THREADS_PER_TILE: u32 = TILE_SIZE * TILE_SIZE;
/// Capacity of each per-tile light list; further lights are dropped.
pub const MAX_LIGHTS_PER_TILE: u32 = 1024;
/// Default capacity of the per-frame point-light buffer.
pub const MAX_POINT_LIGHTS: u32 = 1000;
/// Tiles handled by one work-group of the frustum build pass, per axis.
pub const FRUSTUM_TILES_PER_GROUP: u32 = 8;

/// Resolution plus the tile grid derived from it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileGrid {
    pub screen_size: UVec2,
    pub grid_size: UVec2,
}

impl TileGrid {
    pub fn new(width: u32, height: u32) -> Self {
        let screen_size = UVec2::new(width, height);
        Self {
            screen_size,
            grid_size: div_ceil2(screen_size, TILE_SIZE),
        }
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        (self.grid_size.x * self.grid_size.y) as usize
    }

    /// Flat index of tile `(x, y)`: `y * GridSizeX + x`.
    #[inline]
    pub fn tile_index(&self, tile: UVec2) -> usize {
        (tile.y * self.grid_size.x + tile.x) as usize
    }

    #[inline]
    pub fn tile_coords(&self, index: usize) -> UVec2 {
        let index = index as u32;
        UVec2::new(index % self.grid_size.x, index / self.grid_size.x)
    }

    #[inline]
    pub fn contains_tile(&self, tile: UVec2) -> bool {
        tile.x < self.grid_size.x && tile.y < self.grid_size.y
    }

    /// Tile covering `pixel` (no bounds check).
    #[inline]
    pub fn tile_of_pixel(pixel: UVec2) -> UVec2 {
        pixel / TILE_SIZE
    }

    /// On-screen pixel extent of a tile; smaller than 8×8 on the right and
    /// bottom edges, zero for tiles outside the grid.
    pub fn active_extent(&self, tile: UVec2) -> UVec2 {
        let origin = tile * TILE_SIZE;
        UVec2::new(
            self.screen_size.x.saturating_sub(origin.x).min(TILE_SIZE),
            self.screen_size.y.saturating_sub(origin.y).min(TILE_SIZE),
        )
    }

    /// Capacity of one global light index list.
    #[inline]
    pub fn light_index_capacity(&self) -> usize {
        self.tile_count() * MAX_LIGHTS_PER_TILE as usize
    }

    /// Work-groups for the depth-bounds / cull pass (one per tile).
    #[inline]
    pub fn cull_dispatch(&self) -> UVec2 {
        self.grid_size
    }

    /// Work-groups for the frustum build pass (8×8 tiles per group).
    #[inline]
    pub fn frustum_dispatch(&self) -> UVec2 {
        div_ceil2(self.screen_size, TILE_SIZE * FRUSTUM_TILES_PER_GROUP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_grid() {
        let grid = TileGrid::new(17, 9);
        assert_eq!(grid.grid_size, UVec2::new(3, 2));
        assert_eq!(grid.tile_count(), 6);
        assert_eq!(grid.frustum_dispatch(), UVec2::new(1, 1));

        let full = TileGrid::new(256, 256);
        assert_eq!(full.grid_size, UVec2::new(32, 32));
        assert_eq!(full.frustum_dispatch(), UVec2::new(4, 4));
        assert_eq!(full.light_index_capacity(), 1024 * 1024);
    }

    #[test]
    fn test_active_extent_on_edges() {
        let grid = TileGrid::new(17, 9);
        assert_eq!(grid.active_extent(UVec2::new(0, 0)), UVec2::new(8, 8));
        assert_eq!(grid.active_extent(UVec2::new(2, 0)), UVec2::new(1, 8));
        assert_eq!(grid.active_extent(UVec2::new(2, 1)), UVec2::new(1, 1));
        assert_eq!(grid.active_extent(UVec2::new(3, 0)), UVec2::new(0, 8));
    }

    #[test]
    fn test_index_round_trip() {
        let grid = TileGrid::new(100, 60);
        for i in 0..grid.tile_count() {
            assert_eq!(grid.tile_index(grid.tile_coords(i)), i);
        }
        assert_eq!(TileGrid::tile_of_pixel(UVec2::new(15, 16)), UVec2::new(1, 2));
    }
}
