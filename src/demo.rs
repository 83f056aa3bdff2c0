// src/demo.rs
//! Headless driver: a synthetic scene, a resize round trip and per-frame stats.
//!
//! The scene is a ground plane and a back wall lit by randomly scattered
//! point lights. Each run resizes `w×h → 2w×2h → w×h` and checks that the
//! light lists after the round trip match the ones before it.

use glam::{Mat4, UVec2, Vec2, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::backend::{RecordingBackend, RenderBackend, RenderContext};
use crate::camera::Camera;
use crate::config::CullingConfig;
use crate::error::Result;
use crate::gbuffer::{GBuffer, Surface};
use crate::light::PointLight;
use crate::math::screen_to_view;
use crate::renderer::{FrameStats, TiledRenderer};
use crate::resolver::LightingResolver;

const GROUND_HEIGHT: f32 = -2.0;
const WALL_DISTANCE: f32 = 40.0;
const WALL_HALF_HEIGHT: f32 = 15.0;

/// `count` lights scattered in front of the camera, world space.
pub fn scatter_lights(count: usize, seed: u64) -> Vec<PointLight> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let position = Vec3::new(
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-2.0..8.0),
                rng.gen_range(-WALL_DISTANCE..-2.0),
            );
            let color = Vec3::new(rng.gen(), rng.gen(), rng.gen());
            PointLight::new(position, rng.gen_range(1.0..6.0), color)
        })
        .collect()
}

/// Ray-traces the ground plane and back wall into the GBuffer.
pub struct SceneProducer {
    projection: Mat4,
    inverse_projection: Mat4,
}

impl SceneProducer {
    pub fn new(camera: &Camera) -> Self {
        let projection = camera.proj_matrix();
        Self {
            projection,
            inverse_projection: projection.inverse(),
        }
    }

    fn hit(&self, dir: Vec3) -> Option<(Vec3, Vec3, u32)> {
        let wall = (dir.z < 0.0).then(|| WALL_DISTANCE / -dir.z);
        let ground = (dir.y < 0.0).then(|| GROUND_HEIGHT / dir.y);
        match (ground, wall) {
            (Some(g), Some(w)) if g < w => Some((dir * g, Vec3::Y, 1)),
            (_, Some(w)) if (dir * w).y.abs() < WALL_HALF_HEIGHT => Some((dir * w, Vec3::Z, 2)),
            _ => None,
        }
    }

    pub fn produce(&mut self, gbuffer: &mut GBuffer) -> Result<()> {
        let size = gbuffer.size();
        let screen = size.as_vec2();
        for y in 0..size.y {
            for x in 0..size.x {
                let pixel = UVec2::new(x, y);
                let center = pixel.as_vec2() + Vec2::splat(0.5);
                let dir = screen_to_view(center, 1.0, screen, &self.inverse_projection)
                    .truncate()
                    .normalize();
                let Some((position, normal, material)) = self.hit(dir) else {
                    continue;
                };
                let clip = self.projection * position.extend(1.0);
                gbuffer.write(
                    pixel,
                    Surface {
                        position: position.extend(1.0),
                        normal: normal.extend(0.0),
                        material: [material, 0],
                        depth: clip.z / clip.w,
                    },
                );
            }
        }
        Ok(())
    }
}

/// Lambert with a quadratic falloff to zero at the light radius.
pub fn shade(surface: &Surface, lights: &mut dyn Iterator<Item = &PointLight>) -> Vec3 {
    let position = surface.position.truncate();
    let normal = surface.normal.truncate();
    lights.fold(Vec3::ZERO, |acc, light| {
        let to_light = light.position - position;
        let distance = to_light.length();
        if distance >= light.radius || distance <= f32::EPSILON {
            return acc;
        }
        let falloff = (1.0 - distance / light.radius).powi(2);
        acc + light.color * normal.dot(to_light / distance).max(0.0) * falloff
    })
}

/// Per-tile `(opaque, transparent)` counts.
pub fn tile_counts(resolver: &LightingResolver<'_>) -> Vec<(usize, usize)> {
    let grid = *resolver.grid();
    (0..grid.tile_count())
        .map(|tile| {
            let pixel = grid.tile_coords(tile) * crate::tiles::TILE_SIZE;
            (resolver.opaque_lights(pixel).len(), resolver.transparent_lights(pixel).len())
        })
        .collect()
}

/// Extra work run alongside the CPU pipeline, e.g. a GPU cross-check.
pub trait FrameHook<B: RenderBackend> {
    fn resized(&mut self, _ctx: &mut RenderContext<B>, _renderer: &TiledRenderer) -> Result<()> {
        Ok(())
    }

    /// After culling, before the lighting pass submits the frame.
    fn culled(&mut self, _ctx: &mut RenderContext<B>, _renderer: &TiledRenderer) -> Result<()> {
        Ok(())
    }

    fn submitted(&mut self, _renderer: &TiledRenderer) -> Result<()> {
        Ok(())
    }
}

impl<B: RenderBackend> FrameHook<B> for () {}

#[derive(Debug, Default)]
pub struct DemoReport {
    pub frames: Vec<FrameStats>,
    /// Light lists after `w×h → 2w×2h → w×h` equal the ones before.
    pub round_trip_matches: bool,
    /// Mean shaded luminance of the last frame.
    pub mean_luminance: f32,
}

/// Run the demo on the CPU backend.
pub fn run(config: &CullingConfig) -> Result<DemoReport> {
    let mut ctx = RenderContext::new(RecordingBackend::default());
    run_with(config, &mut ctx, &mut ())
}

/// Run the demo on `ctx`, calling `hook` around each frame.
pub fn run_with<B, H>(config: &CullingConfig, ctx: &mut RenderContext<B>, hook: &mut H) -> Result<DemoReport>
where
    B: RenderBackend,
    H: FrameHook<B> + ?Sized,
{
    config.validate()?;
    let lights = scatter_lights(config.demo.lights, config.demo.seed);
    let mut renderer = TiledRenderer::new(config);
    let mut report = DemoReport::default();

    let (w, h) = (config.width, config.height);
    let phases = [(w, h), (w * 2, h * 2), (w, h)];
    let mut first_counts = None;
    let mut last_counts = None;

    for (phase, &(width, height)) in phases.iter().enumerate() {
        renderer.resize(ctx, width, height, wgpu::TextureFormat::Rgba8Unorm)?;
        hook.resized(ctx, &renderer)?;

        for _ in 0..config.demo.frames.max(1) {
            renderer.set_world_lights(&lights)?;
            let mut producer = SceneProducer::new(renderer.camera());
            let mut produce = |gbuffer: &mut GBuffer| producer.produce(gbuffer);
            let stats = renderer.cull_frame(ctx, &mut produce)?;
            hook.culled(ctx, &renderer)?;

            let mut color = vec![Vec3::ZERO; (width * height) as usize];
            renderer.light_frame(ctx, &mut color, |_, surface, lights| shade(surface, lights))?;
            hook.submitted(&renderer)?;

            report.mean_luminance =
                color.iter().map(|c| c.dot(Vec3::new(0.2126, 0.7152, 0.0722))).sum::<f32>() / color.len() as f32;
            log_frame(&stats, width, height);
            report.frames.push(stats);
        }

        let counts = tile_counts(&renderer.resolver()?);
        match phase {
            0 => first_counts = Some(counts),
            2 => last_counts = Some(counts),
            _ => {}
        }
    }

    report.round_trip_matches = first_counts.is_some() && first_counts == last_counts;
    if !report.round_trip_matches {
        tracing::warn!("light lists differ after the resize round trip");
    }
    Ok(report)
}

fn log_frame(stats: &FrameStats, width: u32, height: u32) {
    let cull = &stats.cull;
    tracing::info!(
        frame = stats.frame_index,
        generation = stats.generation,
        width,
        height,
        tiles = cull.tiles,
        lights = cull.lights,
        opaque = cull.opaque_records,
        transparent = cull.transparent_records,
        max_tile_lights = cull.max_tile_lights,
        elapsed_us = cull.elapsed.as_micros() as u64,
        "frame"
    );
}

// ---------------------------------------------------------------------------
// GPU cross-check
// ---------------------------------------------------------------------------

#[cfg(not(target_arch = "wasm32"))]
pub use gpu_check::{run_gpu, GpuCrossCheck};

#[cfg(not(target_arch = "wasm32"))]
mod gpu_check {
    use super::*;
    use crate::error::Error;
    use crate::gpu::{GpuBackend, GpuContext, GpuTiledCuller};
    use crate::light_grid::LightLists;

    /// Runs the compute passes next to the CPU culler and compares per-tile
    /// counts after every frame.
    pub struct GpuCrossCheck {
        culler: GpuTiledCuller,
        pub mismatched_tiles: usize,
    }

    impl GpuCrossCheck {
        pub fn new(gpu: &GpuContext, max_lights: usize) -> Self {
            Self {
                culler: GpuTiledCuller::new(gpu, max_lights),
                mismatched_tiles: 0,
            }
        }
    }

    impl FrameHook<GpuBackend> for GpuCrossCheck {
        fn resized(&mut self, ctx: &mut RenderContext<GpuBackend>, renderer: &TiledRenderer) -> Result<()> {
            let coordinator = renderer.coordinator();
            let grid = *coordinator.grid().ok_or(Error::NotReady("no grid after resize"))?;
            // Depth is uploaded from the CPU GBuffer, whose row 0 is NDC y = -1.
            let inverse_projection = renderer.camera().culling_projection(false).inverse();
            self.culler
                .resize(ctx, grid, inverse_projection, coordinator.generation())
        }

        fn culled(&mut self, ctx: &mut RenderContext<GpuBackend>, renderer: &TiledRenderer) -> Result<()> {
            let coordinator = renderer.coordinator();
            let frame = coordinator.frame_view()?;
            self.culler
                .cull_frame(ctx, coordinator, &frame.gbuffer.depth, renderer.lights())
        }

        fn submitted(&mut self, renderer: &TiledRenderer) -> Result<()> {
            let resolver = renderer.resolver()?;
            let mut gpu_lists = LightLists::new(resolver.grid());
            self.culler.read_back(&mut gpu_lists)?;
            let gpu = tile_counts(&LightingResolver::new(*resolver.grid(), &gpu_lists));
            let cpu = tile_counts(&resolver);
            let mismatched = cpu.iter().zip(&gpu).filter(|(c, g)| c != g).count();
            if mismatched > 0 {
                tracing::warn!(mismatched, tiles = cpu.len(), "gpu and cpu light counts differ");
            }
            self.mismatched_tiles += mismatched;
            Ok(())
        }
    }

    /// Run the demo on a headless wgpu device, cross-checking every frame.
    pub fn run_gpu(config: &CullingConfig) -> Result<(DemoReport, usize)> {
        let gpu = pollster::block_on(GpuContext::headless())?;
        let mut ctx = RenderContext::new(GpuBackend::new(&gpu));
        let mut check = GpuCrossCheck::new(&gpu, config.max_lights);
        let report = run_with(config, &mut ctx, &mut check)?;
        Ok((report, check.mismatched_tiles))
    }
}
