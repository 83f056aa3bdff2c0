// src/resize.rs
//! Resolution changes: reallocate every screen-sized culling resource and
//! rebuild the frustum grid before any frame work may run.

use glam::Mat4;

use crate::arena::{ArenaStats, LinearArena, Tagged};
use crate::backend::{RenderBackend, RenderContext, Stage};
use crate::camera::DepthConvention;
use crate::error::{Error, Result};
use crate::frustum_grid::FrustumGrid;
use crate::gbuffer::{GBuffer, GBufferLayout};
use crate::light_grid::{LightGridEntry, LightLists};
use crate::math::Frustum;
use crate::tiles::TileGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeState {
    /// Buffers match the current resolution.
    Stable,
    /// Between a resize request and the frustum rebuild completing.
    Resizing,
}

/// Everything owned by one resize generation.
#[derive(Debug)]
pub struct TiledResources {
    pub grid: TileGrid,
    pub color_format: wgpu::TextureFormat,
    frustums: Tagged<FrustumGrid>,
    lists: Tagged<LightLists>,
    gbuffer: Tagged<GBuffer>,
}

/// Borrowed view of the live generation for one frame.
pub struct FrameResources<'a> {
    pub generation: u64,
    pub grid: TileGrid,
    pub frustums: &'a FrustumGrid,
    pub lists: &'a mut LightLists,
    pub gbuffer: &'a mut GBuffer,
}

pub struct ResizeCoordinator {
    arena: LinearArena,
    state: ResizeState,
    resources: Option<TiledResources>,
    layout: GBufferLayout,
    depth: DepthConvention,
}

fn texel_bytes(format: wgpu::TextureFormat) -> u64 {
    format.block_copy_size(None).unwrap_or(4) as u64
}

impl ResizeCoordinator {
    pub fn new(arena_budget: u64, layout: GBufferLayout, depth: DepthConvention) -> Self {
        Self {
            arena: LinearArena::new(arena_budget),
            state: ResizeState::Stable,
            resources: None,
            layout,
            depth,
        }
    }

    #[inline]
    pub fn state(&self) -> ResizeState {
        self.state
    }

    /// Current resize generation; bumps on every resize.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.arena.generation()
    }

    pub fn grid(&self) -> Option<&TileGrid> {
        self.resources.as_ref().map(|r| &r.grid)
    }

    pub fn resources(&self) -> Option<&TiledResources> {
        self.resources.as_ref()
    }

    pub fn arena_stats(&self) -> ArenaStats {
        self.arena.stats()
    }

    pub fn layout(&self) -> &GBufferLayout {
        &self.layout
    }

    /// Reallocate for `width`×`height` and rebuild the frustum grid.
    ///
    /// On return the coordinator is [`ResizeState::Stable`] and a full barrier
    /// has been recorded, so the next frame sees the new grid. If allocation
    /// fails the coordinator stays in [`ResizeState::Resizing`] and every
    /// frame is refused until a resize succeeds.
    #[tracing::instrument(skip(self, ctx, inverse_projection))]
    pub fn resize<B: RenderBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        width: u32,
        height: u32,
        color_format: wgpu::TextureFormat,
        inverse_projection: Mat4,
    ) -> Result<&TiledResources> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResolution { width, height });
        }
        self.state = ResizeState::Resizing;

        let recreate = self.arena.used() != 0;
        if recreate {
            // Old generation goes away wholesale; nothing may reference it now.
            self.resources = None;
        }
        self.arena.reset();

        let grid = TileGrid::new(width, height);
        let tiles = grid.tile_count() as u64;
        let pixels = width as u64 * height as u64;
        let index_bytes = grid.light_index_capacity() as u64 * 4;
        let entry_bytes = tiles * std::mem::size_of::<LightGridEntry>() as u64;

        let gbuffer_bytes = pixels
            * (texel_bytes(self.layout.position)
                + texel_bytes(self.layout.normal)
                + texel_bytes(self.layout.material)
                + 4);
        let gbuffer = self
            .arena
            .alloc("gbuffer", gbuffer_bytes, GBuffer::new(width, height, self.depth)?)?;
        // Lighting output target; owned by the backend, only budgeted here.
        self.arena.alloc("color_target", pixels * texel_bytes(color_format), ())?;
        let lists = self
            .arena
            .alloc("light_lists", 2 * (entry_bytes + index_bytes), LightLists::new(&grid))?;

        let built = ctx.pass(Stage::FrustumBuild, || FrustumGrid::build(grid, inverse_projection));
        let frustum_bytes = tiles * std::mem::size_of::<Frustum>() as u64;
        let frustums = self.arena.alloc("frustums", frustum_bytes, built)?;
        ctx.backend.full_barrier();

        self.resources = Some(TiledResources {
            grid,
            color_format,
            frustums,
            lists,
            gbuffer,
        });
        self.state = ResizeState::Stable;

        tracing::info!(
            width,
            height,
            grid_x = grid.grid_size.x,
            grid_y = grid.grid_size.y,
            generation = self.arena.generation(),
            recreate,
            used = self.arena.used(),
            "tiled resources resized"
        );
        self.resources.as_ref().ok_or(Error::NotReady("resize produced no resources"))
    }

    /// Rebuild only the frustum grid (projection changed, resolution did not).
    pub fn rebuild_frustums<B: RenderBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        inverse_projection: Mat4,
    ) -> Result<()> {
        let arena = &self.arena;
        let resources = self
            .resources
            .as_mut()
            .ok_or(Error::NotReady("frustum rebuild before first resize"))?;
        let grid = resources.grid;
        let slot = resources.frustums.get_mut(arena)?;
        if slot.matches(&grid, &inverse_projection) {
            return Ok(());
        }
        let built = ctx.pass(Stage::FrustumBuild, || FrustumGrid::build(grid, inverse_projection));
        *slot = built;
        ctx.backend.full_barrier();
        tracing::debug!("frustum grid rebuilt for new projection");
        Ok(())
    }

    /// Validate a generation stamp held by a dependent pass.
    ///
    /// Using resources from before the latest resize is a caller bug: fatal in
    /// debug builds, an error in release builds.
    pub fn check_generation(&self, label: &str, generation: u64) -> Result<()> {
        let current = self.arena.generation();
        if generation == current && self.state == ResizeState::Stable {
            return Ok(());
        }
        debug_assert!(
            false,
            "`{label}` used generation {generation} while coordinator is {:?} at generation {current}",
            self.state
        );
        tracing::error!(label, generation, current, "pass ran against stale tiled resources");
        Err(Error::StaleGeneration {
            label: label.to_string(),
            found: generation,
            current,
        })
    }

    /// Resources for this frame. Refused while not [`ResizeState::Stable`].
    pub fn frame_resources(&mut self) -> Result<FrameResources<'_>> {
        if self.state != ResizeState::Stable {
            debug_assert!(false, "frame requested while resize is in progress");
            return Err(Error::NotReady("resize in progress"));
        }
        let arena = &self.arena;
        let resources = self
            .resources
            .as_mut()
            .ok_or(Error::NotReady("no resize has happened yet"))?;
        Ok(FrameResources {
            generation: arena.generation(),
            grid: resources.grid,
            frustums: resources.frustums.get(arena)?,
            lists: resources.lists.get_mut(arena)?,
            gbuffer: resources.gbuffer.get_mut(arena)?,
        })
    }

    /// Read-only resources for this frame. Refused while not [`ResizeState::Stable`].
    pub fn frame_view(&self) -> Result<FrameView<'_>> {
        if self.state != ResizeState::Stable {
            debug_assert!(false, "frame requested while resize is in progress");
            return Err(Error::NotReady("resize in progress"));
        }
        self.resources
            .as_ref()
            .ok_or(Error::NotReady("no resize has happened yet"))?
            .view(&self.arena)
    }
}

/// Read-only view of the live generation, for the lighting stage.
pub struct FrameView<'a> {
    pub generation: u64,
    pub grid: TileGrid,
    pub frustums: &'a FrustumGrid,
    pub lists: &'a LightLists,
    pub gbuffer: &'a GBuffer,
}

impl TiledResources {
    /// Shared borrow of every resource, checked against `arena`.
    fn view<'a>(&'a self, arena: &LinearArena) -> Result<FrameView<'a>> {
        Ok(FrameView {
            generation: arena.generation(),
            grid: self.grid,
            frustums: self.frustums.get(arena)?,
            lists: self.lists.get(arena)?,
            gbuffer: self.gbuffer.get(arena)?,
        })
    }

    /// Generation this set was allocated in.
    pub fn generation(&self) -> u64 {
        self.frustums.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::DEFAULT_ARENA_BUDGET;
    use crate::backend::{BackendEvent, RecordingBackend};
    use crate::camera::Camera;
    use glam::UVec2;

    fn coordinator() -> (ResizeCoordinator, RenderContext<RecordingBackend>) {
        (
            ResizeCoordinator::new(DEFAULT_ARENA_BUDGET, GBufferLayout::default(), DepthConvention::Reversed),
            RenderContext::new(RecordingBackend::default()),
        )
    }

    fn inv() -> Mat4 {
        Camera::default().culling_projection(false).inverse()
    }

    #[test]
    fn test_first_resize_allocates_and_builds() {
        let (mut coord, mut ctx) = coordinator();
        assert!(coord.frame_resources().is_err());
        let res = coord
            .resize(&mut ctx, 17, 9, wgpu::TextureFormat::Rgba8Unorm, inv())
            .unwrap();
        assert_eq!(res.grid.grid_size, UVec2::new(3, 2));
        assert_eq!(res.generation(), 1);
        assert_eq!(coord.state(), ResizeState::Stable);

        let frame = coord.frame_resources().unwrap();
        assert_eq!(frame.frustums.frustums().len(), 6);
        assert_eq!(frame.lists.opaque.capacity(), 6 * 1024);
        assert_eq!(frame.gbuffer.size(), UVec2::new(17, 9));

        let events = ctx.backend.events();
        let end = ctx.backend.position(&BackendEvent::EndPass(Stage::FrustumBuild)).unwrap();
        assert_eq!(events[end + 1], BackendEvent::FullBarrier);
    }

    #[test]
    fn test_resize_round_trip_reproduces_grid() {
        let (mut coord, mut ctx) = coordinator();
        let first = coord
            .resize(&mut ctx, 256, 256, wgpu::TextureFormat::Bgra8Unorm, inv())
            .unwrap()
            .grid;
        let first_frustums = coord.frame_resources().unwrap().frustums.frustums().to_vec();
        coord
            .resize(&mut ctx, 512, 512, wgpu::TextureFormat::Bgra8Unorm, inv())
            .unwrap();
        assert_eq!(coord.grid().unwrap().grid_size, UVec2::new(64, 64));
        let used_large = coord.arena_stats().used;
        let again = coord
            .resize(&mut ctx, 256, 256, wgpu::TextureFormat::Bgra8Unorm, inv())
            .unwrap()
            .grid;
        assert_eq!(first, again);
        assert!(coord.arena_stats().used < used_large);
        assert_eq!(coord.arena_stats().resets, 3);
        assert_eq!(coord.frame_resources().unwrap().frustums.frustums(), &first_frustums[..]);
    }

    #[test]
    fn test_arena_exhaustion_leaves_resizing() {
        let mut coord = ResizeCoordinator::new(1024, GBufferLayout::default(), DepthConvention::Standard);
        let mut ctx = RenderContext::new(RecordingBackend::default());
        let err = coord
            .resize(&mut ctx, 64, 64, wgpu::TextureFormat::Rgba8Unorm, inv())
            .unwrap_err();
        assert!(matches!(err, Error::ArenaExhausted { .. }));
        assert_eq!(coord.state(), ResizeState::Resizing);
        assert!(coord.resize(&mut ctx, 0, 64, wgpu::TextureFormat::Rgba8Unorm, inv()).is_err());
    }

    #[test]
    fn test_rebuild_frustums_only_when_projection_changes() {
        let (mut coord, mut ctx) = coordinator();
        coord.resize(&mut ctx, 64, 64, wgpu::TextureFormat::Rgba8Unorm, inv()).unwrap();
        ctx.backend.take_events();
        coord.rebuild_frustums(&mut ctx, inv()).unwrap();
        assert!(ctx.backend.events().is_empty());

        let mut camera = Camera::default();
        camera.fovy = 60f32.to_radians();
        coord
            .rebuild_frustums(&mut ctx, camera.culling_projection(false).inverse())
            .unwrap();
        assert_eq!(ctx.backend.events().len(), 3);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "used generation 1"))]
    fn test_stale_generation_is_fatal_in_debug() {
        let (mut coord, mut ctx) = coordinator();
        coord.resize(&mut ctx, 64, 64, wgpu::TextureFormat::Rgba8Unorm, inv()).unwrap();
        let held = coord.generation();
        assert!(coord.check_generation("lighting", held).is_ok());
        coord.resize(&mut ctx, 128, 64, wgpu::TextureFormat::Rgba8Unorm, inv()).unwrap();
        assert!(coord.check_generation("lighting", held).is_err());
    }
}
