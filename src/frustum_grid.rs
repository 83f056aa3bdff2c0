// src/frustum_grid.rs
//! Per-tile view-space frusta, rebuilt whenever the resolution or projection changes.

use glam::{Mat4, UVec2, Vec2, Vec3};
use rayon::prelude::*;

use crate::math::{screen_to_view, Frustum, Plane};
use crate::tiles::{TileGrid, FRUSTUM_TILES_PER_GROUP, TILE_SIZE};

/// Frustum of one tile from its pixel corners `tile * 8` and `(tile + 1) * 8`.
///
/// Corners are unprojected onto the far plane (NDC depth 1) and joined to the
/// view-space origin. Plane order is left, right, top, bottom.
pub fn tile_frustum(tile: UVec2, screen_size: Vec2, inverse_projection: &Mat4) -> Frustum {
    let lo = (tile * TILE_SIZE).as_vec2();
    let hi = ((tile + UVec2::ONE) * TILE_SIZE).as_vec2();
    let corner = |p: Vec2| screen_to_view(p, 1.0, screen_size, inverse_projection).truncate();

    let bottom_left = corner(lo);
    let bottom_right = corner(Vec2::new(hi.x, lo.y));
    let top_left = corner(Vec2::new(lo.x, hi.y));
    let top_right = corner(hi);

    let origin = Vec3::ZERO;
    Frustum {
        planes: [
            Plane::from_points(origin, bottom_left, top_left),
            Plane::from_points(origin, top_right, bottom_right),
            Plane::from_points(origin, top_left, top_right),
            Plane::from_points(origin, bottom_right, bottom_left),
        ],
    }
}

/// Builds every tile frustum the way the compute pass does: work-groups of
/// 8×8 tiles, threads past the grid edge write nothing.
#[tracing::instrument(skip(inverse_projection), fields(grid = ?grid.grid_size))]
pub fn build_frustums(grid: &TileGrid, inverse_projection: &Mat4) -> Vec<Frustum> {
    let mut frustums = vec![Frustum::default(); grid.tile_count()];
    if frustums.is_empty() {
        return frustums;
    }
    let screen_size = grid.screen_size.as_vec2();
    let dispatch = grid.frustum_dispatch();
    let groups = (dispatch.x * dispatch.y) as usize;

    // Each group owns a disjoint block of tiles; gather (index, frustum) per group.
    let written: Vec<Vec<(usize, Frustum)>> = (0..groups)
        .into_par_iter()
        .map(|group| {
            let group = UVec2::new(group as u32 % dispatch.x, group as u32 / dispatch.x);
            let mut out = Vec::with_capacity((FRUSTUM_TILES_PER_GROUP * FRUSTUM_TILES_PER_GROUP) as usize);
            for ly in 0..FRUSTUM_TILES_PER_GROUP {
                for lx in 0..FRUSTUM_TILES_PER_GROUP {
                    let tile = group * FRUSTUM_TILES_PER_GROUP + UVec2::new(lx, ly);
                    if !grid.contains_tile(tile) {
                        continue;
                    }
                    out.push((grid.tile_index(tile), tile_frustum(tile, screen_size, inverse_projection)));
                }
            }
            out
        })
        .collect();

    for (index, frustum) in written.into_iter().flatten() {
        frustums[index] = frustum;
    }
    tracing::debug!(tiles = frustums.len(), "frustum grid built");
    frustums
}

/// The frustum grid for one resolution + projection pair.
#[derive(Clone, Debug)]
pub struct FrustumGrid {
    grid: TileGrid,
    inverse_projection: Mat4,
    frustums: Vec<Frustum>,
}

impl FrustumGrid {
    pub fn build(grid: TileGrid, inverse_projection: Mat4) -> Self {
        let frustums = build_frustums(&grid, &inverse_projection);
        Self {
            grid,
            inverse_projection,
            frustums,
        }
    }

    #[inline]
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    #[inline]
    pub fn inverse_projection(&self) -> &Mat4 {
        &self.inverse_projection
    }

    #[inline]
    pub fn frustums(&self) -> &[Frustum] {
        &self.frustums
    }

    #[inline]
    pub fn frustum(&self, tile: UVec2) -> &Frustum {
        &self.frustums[self.grid.tile_index(tile)]
    }

    /// True if this grid was built for exactly these inputs.
    pub fn matches(&self, grid: &TileGrid, inverse_projection: &Mat4) -> bool {
        self.grid == *grid && self.inverse_projection == *inverse_projection
    }
}
