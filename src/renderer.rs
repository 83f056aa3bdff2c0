// src/renderer.rs
//! Frame orchestration for the tiled deferred path:
//! clear → GBuffer → (depth barrier) → light cull → (list barrier) → lighting.

use glam::Mat4;
use parking_lot::Mutex;

use crate::backend::{RenderBackend, RenderContext, Stage};
use crate::camera::Camera;
use crate::config::CullingConfig;
use crate::culler::{CullStats, LightCuller};
use crate::error::Result;
use crate::gbuffer::{GBufferLayout, GBufferProducer, Surface};
use crate::light::{LightSet, PointLight};
use crate::resize::{ResizeCoordinator, TiledResources};
use crate::resolver::LightingResolver;

/// What happened in one frame.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct FrameStats {
    pub frame_index: u64,
    pub generation: u64,
    pub cull: CullStats,
}

pub struct TiledRenderer {
    camera: Camera,
    coordinator: ResizeCoordinator,
    culler: LightCuller,
    lights: LightSet,
    last_frame: Mutex<FrameStats>,
}

impl TiledRenderer {
    pub fn new(config: &CullingConfig) -> Self {
        let camera = config.camera();
        Self {
            coordinator: ResizeCoordinator::new(config.arena_budget, GBufferLayout::default(), camera.depth),
            culler: LightCuller::new(config.thread_order),
            lights: LightSet::with_capacity(config.max_lights),
            camera,
            last_frame: Mutex::new(FrameStats::default()),
        }
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Camera changes take effect at the next frame (frusta are rebuilt if the
    /// projection changed).
    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    #[inline]
    pub fn coordinator(&self) -> &ResizeCoordinator {
        &self.coordinator
    }

    #[inline]
    pub fn lights(&self) -> &[PointLight] {
        self.lights.as_slice()
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last_frame.lock().clone()
    }

    fn inverse_projection(&self) -> Mat4 {
        self.camera.culling_projection(false).inverse()
    }

    /// Resolution change: aspect follows the new size, every screen-sized
    /// resource is reallocated and the frustum grid rebuilt.
    pub fn resize<B: RenderBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        width: u32,
        height: u32,
        color_format: wgpu::TextureFormat,
    ) -> Result<&TiledResources> {
        self.camera.set_aspect(width as f32 / height.max(1) as f32);
        let inverse_projection = self.inverse_projection();
        self.coordinator
            .resize(ctx, width, height, color_format, inverse_projection)
    }

    /// Upload this frame's lights, already in view space.
    pub fn set_view_lights(&mut self, lights: &[PointLight]) -> Result<()> {
        self.lights.replace(lights)
    }

    /// Upload this frame's lights from world space via the camera's view matrix.
    pub fn set_world_lights(&mut self, lights: &[PointLight]) -> Result<()> {
        let view = self.camera.view_matrix();
        self.lights.replace_from_world(lights, &view)
    }

    /// Clear, rasterize and cull one frame. Lighting is a separate call so the
    /// caller can shade however it likes.
    #[tracing::instrument(skip_all, fields(frame = ctx.frame_index()))]
    pub fn cull_frame<B, P>(&mut self, ctx: &mut RenderContext<B>, producer: &mut P) -> Result<FrameStats>
    where
        B: RenderBackend,
        P: GBufferProducer + ?Sized,
    {
        let inverse_projection = self.inverse_projection();
        self.coordinator.rebuild_frustums(ctx, inverse_projection)?;

        let frame = self.coordinator.frame_resources()?;
        let culler = &self.culler;
        let lights = self.lights.as_slice();

        ctx.pass(Stage::Clear, || frame.lists.clear());
        ctx.pass(Stage::GBuffer, || {
            frame.gbuffer.clear();
            producer.produce(&mut *frame.gbuffer)
        })?;
        ctx.barrier_between(&Stage::Clear.decl(), &Stage::LightCull.decl());
        ctx.barrier_between(&Stage::GBuffer.decl(), &Stage::LightCull.decl());

        let cull = ctx.pass(Stage::LightCull, || {
            culler.cull(frame.frustums, &frame.gbuffer.depth, lights, frame.lists)
        })?;
        ctx.barrier_between(&Stage::LightCull.decl(), &Stage::Lighting.decl());

        let stats = FrameStats {
            frame_index: ctx.frame_index(),
            generation: frame.generation,
            cull,
        };
        tracing::debug!(
            opaque = stats.cull.opaque_records,
            transparent = stats.cull.transparent_records,
            "frame culled"
        );
        *self.last_frame.lock() = stats.clone();
        Ok(stats)
    }

    /// Lighting stage: run `shade` for every covered pixel with its tile's
    /// opaque lights, then submit the frame.
    pub fn light_frame<B, T, F>(&self, ctx: &mut RenderContext<B>, output: &mut [T], shade: F) -> Result<()>
    where
        B: RenderBackend,
        T: Send,
        F: Fn(glam::UVec2, &Surface, &mut dyn Iterator<Item = &PointLight>) -> T + Sync,
    {
        let frame = self.coordinator.frame_view()?;
        self.coordinator.check_generation("lighting", self.last_frame.lock().generation)?;
        let lights = self.lights.as_slice();
        ctx.pass(Stage::Lighting, || {
            LightingResolver::new(frame.grid, frame.lists).resolve(frame.gbuffer, lights, output, shade)
        });
        ctx.submit()
    }

    /// Resolver over the lists of the last culled frame.
    pub fn resolver(&self) -> Result<LightingResolver<'_>> {
        let frame = self.coordinator.frame_view()?;
        Ok(LightingResolver::new(frame.grid, frame.lists))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendEvent, RecordingBackend, Resource};
    use crate::gbuffer::GBuffer;
    use crate::light_grid::ListKind;
    use glam::{UVec2, Vec3, Vec4};

    fn config(width: u32, height: u32) -> CullingConfig {
        CullingConfig {
            width,
            height,
            ..CullingConfig::default()
        }
    }

    /// Flat wall at `distance` covering the whole screen.
    fn wall(camera: Camera, distance: f32) -> impl FnMut(&mut GBuffer) -> Result<()> {
        move |gbuffer: &mut GBuffer| {
            let clip = camera.proj_matrix() * Vec4::new(0.0, 0.0, -distance, 1.0);
            let depth = clip.z / clip.w;
            let size = gbuffer.size();
            for y in 0..size.y {
                for x in 0..size.x {
                    gbuffer.write(
                        UVec2::new(x, y),
                        Surface {
                            position: Vec4::new(0.0, 0.0, -distance, 1.0),
                            normal: Vec4::Z,
                            material: [0, 0],
                            depth,
                        },
                    );
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_frame_orders_passes_and_barriers() {
        let mut renderer = TiledRenderer::new(&config(64, 64));
        let mut ctx = RenderContext::new(RecordingBackend::default());
        renderer.resize(&mut ctx, 64, 64, wgpu::TextureFormat::Rgba8Unorm).unwrap();
        ctx.backend.take_events();

        renderer
            .set_view_lights(&[PointLight::new(Vec3::new(0.0, 0.0, -5.0), 10.0, Vec3::ONE)])
            .unwrap();
        let mut producer = wall(renderer.camera().clone(), 5.0);
        renderer.cull_frame(&mut ctx, &mut producer).unwrap();
        let mut out = vec![0u32; 64 * 64];
        renderer
            .light_frame(&mut ctx, &mut out, |_, _, lights| lights.count() as u32)
            .unwrap();

        let b = &ctx.backend;
        let end_clear = b.position(&BackendEvent::EndPass(Stage::Clear)).unwrap();
        let end_gbuffer = b.position(&BackendEvent::EndPass(Stage::GBuffer)).unwrap();
        let depth_barrier = b
            .barrier_position(Stage::GBuffer, Stage::LightCull, Resource::GBufferDepth)
            .unwrap();
        let clear_barrier = b
            .barrier_position(Stage::Clear, Stage::LightCull, Resource::LightIndexCounter(ListKind::Opaque))
            .unwrap();
        let begin_cull = b.position(&BackendEvent::BeginPass(Stage::LightCull)).unwrap();
        let end_cull = b.position(&BackendEvent::EndPass(Stage::LightCull)).unwrap();
        let list_barrier = b
            .barrier_position(Stage::LightCull, Stage::Lighting, Resource::LightGrid(ListKind::Opaque))
            .unwrap();
        let begin_lighting = b.position(&BackendEvent::BeginPass(Stage::Lighting)).unwrap();
        let submit = b.position(&BackendEvent::Submit(0)).unwrap();

        assert!(end_clear < clear_barrier && end_gbuffer < depth_barrier);
        assert!(depth_barrier < begin_cull && clear_barrier < begin_cull);
        assert!(end_cull < list_barrier && list_barrier < begin_lighting);
        assert!(begin_lighting < submit);
        assert!(out.iter().all(|&n| n == 1));
        assert_eq!(renderer.last_frame().cull.opaque_records, 64);
    }

    #[test]
    fn test_resize_round_trip_reproduces_counts() {
        let mut renderer = TiledRenderer::new(&config(256, 256));
        let mut ctx = RenderContext::new(RecordingBackend::default());
        let lights: Vec<_> = (0..40)
            .map(|i| {
                let t = i as f32 * 0.37;
                PointLight::new(Vec3::new(t.sin() * 6.0, t.cos() * 4.0, -3.0 - i as f32), 1.5, Vec3::ONE)
            })
            .collect();

        let counts = |renderer: &mut TiledRenderer, ctx: &mut RenderContext<RecordingBackend>| {
            renderer.set_view_lights(&lights).unwrap();
            let mut producer = wall(renderer.camera().clone(), 30.0);
            renderer.cull_frame(ctx, &mut producer).unwrap();
            let resolver = renderer.resolver().unwrap();
            let grid = *resolver.grid();
            (0..grid.tile_count())
                .map(|t| {
                    let pixel = grid.tile_coords(t) * 8;
                    (resolver.opaque_lights(pixel).len(), resolver.transparent_lights(pixel).len())
                })
                .collect::<Vec<_>>()
        };

        renderer.resize(&mut ctx, 256, 256, wgpu::TextureFormat::Rgba8Unorm).unwrap();
        let before = counts(&mut renderer, &mut ctx);
        renderer.resize(&mut ctx, 512, 512, wgpu::TextureFormat::Rgba8Unorm).unwrap();
        counts(&mut renderer, &mut ctx);
        renderer.resize(&mut ctx, 256, 256, wgpu::TextureFormat::Rgba8Unorm).unwrap();
        let after = counts(&mut renderer, &mut ctx);

        assert_eq!(before.len(), 32 * 32);
        assert_eq!(before, after);
        assert!(before.iter().any(|&(o, _)| o > 0));
    }

    #[test]
    fn test_cull_before_resize_is_refused() {
        let mut renderer = TiledRenderer::new(&config(64, 64));
        let mut ctx = RenderContext::new(RecordingBackend::default());
        let mut producer = |_: &mut GBuffer| -> Result<()> { Ok(()) };
        assert!(renderer.cull_frame(&mut ctx, &mut producer).is_err());
        assert!(renderer.resolver().is_err());
    }

    #[test]
    fn test_small_arena_budget_rejects_resize() {
        let mut renderer = TiledRenderer::new(&CullingConfig {
            arena_budget: 64 * 1024,
            ..config(256, 256)
        });
        let mut ctx = RenderContext::new(RecordingBackend::default());
        let err = renderer
            .resize(&mut ctx, 256, 256, wgpu::TextureFormat::Rgba8Unorm)
            .err()
            .unwrap();
        assert!(matches!(err, crate::error::Error::ArenaExhausted { .. }));
        assert_eq!(renderer.coordinator().state(), crate::resize::ResizeState::Resizing);
    }

    #[test]
    fn test_world_lights_follow_camera() {
        let mut renderer = TiledRenderer::new(&config(64, 64));
        renderer.camera_mut().set_position(Vec3::new(0.0, 0.0, 10.0));
        renderer
            .set_world_lights(&[PointLight::new(Vec3::ZERO, 1.0, Vec3::ONE)])
            .unwrap();
        assert!((renderer.lights()[0].position - Vec3::new(0.0, 0.0, -10.0)).length() < 1e-5);
    }
}
