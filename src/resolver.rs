// src/resolver.rs
//! Per-pixel light lookup: `pixel / 8 → grid[tile] → list[offset..offset+count]`.
//!
//! Shading is left to the caller; this only hands each pixel its surface and
//! the indices of the lights that may reach it.

use glam::UVec2;
use rayon::prelude::*;

use crate::gbuffer::{GBuffer, Surface};
use crate::light::PointLight;
use crate::light_grid::{LightList, LightLists, ListKind, TileLights};
use crate::tiles::{TileGrid, TILE_SIZE};

/// WGSL helpers for fragment/compute shaders consuming the light grid.
/// Bind the grid as `texture_2d<u32>` and the list as `array<u32>`.
pub const LIGHT_GRID_LOOKUP_WGSL: &str = r#"
const TILE_SIZE: u32 = 8u;

fn light_tile(pixel: vec2<u32>) -> vec2<u32> {
    return pixel / TILE_SIZE;
}

// (offset, count) into the light index list for this pixel.
fn light_range(grid: texture_2d<u32>, pixel: vec2<u32>) -> vec2<u32> {
    return textureLoad(grid, vec2<i32>(light_tile(pixel)), 0).xy;
}
"#;

/// Read side of one frame's culling output.
pub struct LightingResolver<'a> {
    grid: TileGrid,
    lists: &'a LightLists,
}

impl<'a> LightingResolver<'a> {
    pub fn new(grid: TileGrid, lists: &'a LightLists) -> Self {
        Self { grid, lists }
    }

    #[inline]
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Tile covering `pixel`, `None` outside the screen.
    #[inline]
    pub fn tile_of(&self, pixel: UVec2) -> Option<UVec2> {
        let inside = pixel.x < self.grid.screen_size.x && pixel.y < self.grid.screen_size.y;
        inside.then(|| pixel / TILE_SIZE)
    }

    fn list(&self, kind: ListKind) -> &'a LightList {
        self.lists.get(kind)
    }

    /// Light indices for `pixel` from one list; empty outside the screen.
    pub fn lights(&self, kind: ListKind, pixel: UVec2) -> TileLights<'a> {
        let list = self.list(kind);
        match self.tile_of(pixel) {
            Some(tile) => list.tile_lights(self.grid.tile_index(tile)),
            None => TileLights::empty(),
        }
    }

    #[inline]
    pub fn opaque_lights(&self, pixel: UVec2) -> TileLights<'a> {
        self.lights(ListKind::Opaque, pixel)
    }

    #[inline]
    pub fn transparent_lights(&self, pixel: UVec2) -> TileLights<'a> {
        self.lights(ListKind::Transparent, pixel)
    }

    /// Visit every pixel that has a surface with its opaque light list and
    /// write the shader's result into `output` (row-major, screen sized).
    pub fn resolve<T, F>(&self, gbuffer: &GBuffer, lights: &[PointLight], output: &mut [T], shade: F)
    where
        T: Send,
        F: Fn(UVec2, &Surface, &mut dyn Iterator<Item = &PointLight>) -> T + Sync,
    {
        let width = self.grid.screen_size.x as usize;
        debug_assert_eq!(output.len(), gbuffer.depth.len());
        output
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let pixel = UVec2::new(x as u32, y as u32);
                    let Some(surface) = gbuffer.surface(pixel) else {
                        continue;
                    };
                    let mut tile_lights = self
                        .opaque_lights(pixel)
                        .filter_map(|index| lights.get(index as usize));
                    *out = shade(pixel, &surface, &mut tile_lights);
                }
            });
    }
}
