// src/gpu/culling.rs
//! Compute pipelines for the frustum grid and the fused depth-bounds/light cull.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use futures::{channel::oneshot, executor::block_on};
use glam::Mat4;
use wgpu::util::DeviceExt;

use super::shaders::{module_source, CULL_WGSL, FRUSTUM_WGSL};
use super::{GpuBackend, GpuContext};
use crate::backend::{RenderBackend, RenderContext, Stage};
use crate::error::{Error, Result};
use crate::light::PointLight;
use crate::light_grid::{LightGridEntry, LightLists, ListKind};
use crate::math::Frustum;
use crate::resize::ResizeCoordinator;
use crate::tiles::TileGrid;

// ============================================================================
// 1. UNIFORMS
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GpuTiledGlobals {
    pub inverse_projection: [[f32; 4]; 4],
    pub screen_size: [f32; 2],
    pub grid_size: [u32; 2],
}

impl GpuTiledGlobals {
    pub fn new(grid: &TileGrid, inverse_projection: &Mat4) -> Self {
        Self {
            inverse_projection: inverse_projection.to_cols_array_2d(),
            screen_size: grid.screen_size.as_vec2().to_array(),
            grid_size: grid.grid_size.to_array(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct GpuSceneUniform {
    pub light_count: u32,
    pub _pad: [u32; 3],
}

const _: () = assert!(std::mem::size_of::<GpuTiledGlobals>() == 80);
const _: () = assert!(std::mem::size_of::<GpuSceneUniform>() == 16);
const _: () = assert!(std::mem::size_of::<PointLight>() == 32);

/// Reinterpret read-back bytes without relying on the allocation's alignment.
fn pod_vec<T: Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// Bytes per row of a grid read-back, padded to wgpu's copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * std::mem::size_of::<LightGridEntry>() as u32;
    unpadded.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}

// ============================================================================
// 2. PER-RESIZE TARGETS
// ============================================================================

struct GpuLightList {
    grid: wgpu::Texture,
    grid_view: wgpu::TextureView,
    indices: wgpu::Buffer,
    counter: wgpu::Buffer,
}

struct GpuCullTargets {
    generation: u64,
    grid: TileGrid,
    globals: wgpu::Buffer,
    frustums: wgpu::Buffer,
    depth: wgpu::Texture,
    opaque: GpuLightList,
    transparent: GpuLightList,
    frustum_bind_group: wgpu::BindGroup,
    cull_bind_group: wgpu::BindGroup,
}

impl GpuCullTargets {
    fn list(&self, kind: ListKind) -> &GpuLightList {
        match kind {
            ListKind::Opaque => &self.opaque,
            ListKind::Transparent => &self.transparent,
        }
    }
}

fn extent(size: glam::UVec2) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.x,
        height: size.y,
        depth_or_array_layers: 1,
    }
}

fn layout_entry(binding: u32, ty: wgpu::BindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty,
        count: None,
    }
}

fn uniform() -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Uniform,
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

fn storage(read_only: bool) -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Storage { read_only },
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

fn grid_storage() -> wgpu::BindingType {
    wgpu::BindingType::StorageTexture {
        access: wgpu::StorageTextureAccess::WriteOnly,
        format: wgpu::TextureFormat::Rg32Uint,
        view_dimension: wgpu::TextureViewDimension::D2,
    }
}

// ============================================================================
// 3. CULLER
// ============================================================================

pub struct GpuTiledCuller {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    frustum_layout: wgpu::BindGroupLayout,
    cull_layout: wgpu::BindGroupLayout,
    frustum_pipeline: wgpu::ComputePipeline,
    cull_pipeline: wgpu::ComputePipeline,
    lights: wgpu::Buffer,
    scene: wgpu::Buffer,
    max_lights: usize,
    targets: Option<GpuCullTargets>,
}

impl GpuTiledCuller {
    pub fn new(gpu: &GpuContext, max_lights: usize) -> Self {
        let device = &gpu.device;

        let frustum_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frustum_bind_group_layout"),
            entries: &[layout_entry(0, uniform()), layout_entry(1, storage(false))],
        });

        let cull_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("light_cull_bind_group_layout"),
            entries: &[
                // 0: tiled globals
                layout_entry(0, uniform()),
                // 1: frustum grid
                layout_entry(1, storage(true)),
                // 2: depth
                layout_entry(
                    2,
                    wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                ),
                // 3: point lights, 4: light count
                layout_entry(3, storage(true)),
                layout_entry(4, uniform()),
                // 5..7: opaque grid, list, counter
                layout_entry(5, grid_storage()),
                layout_entry(6, storage(false)),
                layout_entry(7, storage(false)),
                // 8..10: transparent grid, list, counter
                layout_entry(8, grid_storage()),
                layout_entry(9, storage(false)),
                layout_entry(10, storage(false)),
            ],
        });

        let pipeline = |label: &str, layout: &wgpu::BindGroupLayout, body: &str, entry_point: &str| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(module_source(body).into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point,
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let frustum_pipeline = pipeline("frustum_grid", &frustum_layout, FRUSTUM_WGSL, "build_frustums");
        let cull_pipeline = pipeline("light_cull", &cull_layout, CULL_WGSL, "cull_lights");

        let lights = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("point_lights"),
            size: (std::mem::size_of::<PointLight>() * max_lights.max(1)) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let scene = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("light_scene"),
            contents: bytemuck::bytes_of(&GpuSceneUniform::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            device: gpu.device.clone(),
            queue: gpu.queue.clone(),
            frustum_layout,
            cull_layout,
            frustum_pipeline,
            cull_pipeline,
            lights,
            scene,
            max_lights,
            targets: None,
        }
    }

    /// Generation of the current targets, if any.
    pub fn generation(&self) -> Option<u64> {
        self.targets.as_ref().map(|t| t.generation)
    }

    fn create_list(&self, grid: &TileGrid, label: &str) -> GpuLightList {
        let grid_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(grid.grid_size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rg32Uint,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let grid_view = grid_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let indices = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (grid.light_index_capacity() * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let counter = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        GpuLightList {
            grid: grid_texture,
            grid_view,
            indices,
            counter,
        }
    }

    /// Recreate every screen-sized buffer for `grid` and build its frusta.
    ///
    /// `generation` is the coordinator generation these targets belong to.
    pub fn resize(
        &mut self,
        ctx: &mut RenderContext<GpuBackend>,
        grid: TileGrid,
        inverse_projection: Mat4,
        generation: u64,
    ) -> Result<()> {
        let index_bytes = grid.light_index_capacity() as u64 * 4;
        let limits = self.device.limits();
        let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        if index_bytes > limit {
            return Err(Error::ArenaExhausted {
                label: "gpu light index list".to_string(),
                requested: index_bytes,
                available: limit,
            });
        }
        // Old targets are released before the new ones exist.
        self.targets = None;

        let globals = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tiled_globals"),
            contents: bytemuck::bytes_of(&GpuTiledGlobals::new(&grid, &inverse_projection)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let frustums = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frustum_grid"),
            size: (grid.tile_count() * std::mem::size_of::<Frustum>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let depth = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("cull_depth"),
            size: extent(grid.screen_size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        let opaque = self.create_list(&grid, "opaque_light_list");
        let transparent = self.create_list(&grid, "transparent_light_list");

        let frustum_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frustum_bind_group"),
            layout: &self.frustum_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: globals.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: frustums.as_entire_binding() },
            ],
        });
        let cull_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("light_cull_bind_group"),
            layout: &self.cull_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: globals.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: frustums.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&depth_view) },
                wgpu::BindGroupEntry { binding: 3, resource: self.lights.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: self.scene.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: wgpu::BindingResource::TextureView(&opaque.grid_view) },
                wgpu::BindGroupEntry { binding: 6, resource: opaque.indices.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 7, resource: opaque.counter.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 8, resource: wgpu::BindingResource::TextureView(&transparent.grid_view) },
                wgpu::BindGroupEntry { binding: 9, resource: transparent.indices.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 10, resource: transparent.counter.as_entire_binding() },
            ],
        });

        self.dispatch_frustums(ctx, &grid, &frustum_bind_group);

        self.targets = Some(GpuCullTargets {
            generation,
            grid,
            globals,
            frustums,
            depth,
            opaque,
            transparent,
            frustum_bind_group,
            cull_bind_group,
        });
        tracing::info!(
            tiles = grid.tile_count(),
            generation,
            index_bytes,
            "gpu culling targets created"
        );
        Ok(())
    }

    fn dispatch_frustums(
        &self,
        ctx: &mut RenderContext<GpuBackend>,
        grid: &TileGrid,
        bind_group: &wgpu::BindGroup,
    ) {
        let dispatch = grid.frustum_dispatch();
        let pipeline = &self.frustum_pipeline;
        ctx.pass_with(Stage::FrustumBuild, |backend| {
            let mut pass = backend.encoder().begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("frustum_grid"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(dispatch.x, dispatch.y, 1);
        });
        ctx.backend.full_barrier();
    }

    /// Rebuild the frusta for a new projection at the same resolution.
    pub fn rebuild_frustums(&self, ctx: &mut RenderContext<GpuBackend>, inverse_projection: Mat4) -> Result<()> {
        let targets = self
            .targets
            .as_ref()
            .ok_or(Error::NotReady("gpu frustum rebuild before resize"))?;
        let globals = GpuTiledGlobals::new(&targets.grid, &inverse_projection);
        self.queue.write_buffer(&targets.globals, 0, bytemuck::bytes_of(&globals));
        self.dispatch_frustums(ctx, &targets.grid, &targets.frustum_bind_group);
        Ok(())
    }

    fn zero_grid(&self, list: &GpuLightList, grid: &TileGrid) {
        let row = grid.grid_size.x * std::mem::size_of::<LightGridEntry>() as u32;
        let zeros = vec![0u8; (row * grid.grid_size.y) as usize];
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &list.grid,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &zeros,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(row),
                rows_per_image: Some(grid.grid_size.y),
            },
            extent(grid.grid_size),
        );
    }

    /// Record clear, depth upload and the cull dispatch for one frame.
    ///
    /// The targets must belong to the coordinator's current generation.
    #[tracing::instrument(skip_all, fields(frame = ctx.frame_index(), lights = lights.len()))]
    pub fn cull_frame(
        &self,
        ctx: &mut RenderContext<GpuBackend>,
        coordinator: &ResizeCoordinator,
        depth: &[f32],
        lights: &[PointLight],
    ) -> Result<()> {
        let targets = self
            .targets
            .as_ref()
            .ok_or(Error::NotReady("gpu culler used before resize"))?;
        coordinator.check_generation("gpu light cull", targets.generation)?;
        if lights.len() > self.max_lights {
            return Err(Error::LightCapacity {
                requested: lights.len(),
                max: self.max_lights,
            });
        }
        let grid = targets.grid;
        let pixels = (grid.screen_size.x * grid.screen_size.y) as usize;
        crate::ensure!(
            depth.len() == pixels,
            "depth channel has {} texels, expected {}",
            depth.len(),
            pixels
        );

        let scene = GpuSceneUniform {
            light_count: lights.len() as u32,
            ..Default::default()
        };
        self.queue.write_buffer(&self.scene, 0, bytemuck::bytes_of(&scene));
        if !lights.is_empty() {
            self.queue.write_buffer(&self.lights, 0, bytemuck::cast_slice(lights));
        }

        ctx.pass_with(Stage::Clear, |backend| {
            for kind in ListKind::ALL {
                let list = targets.list(kind);
                backend.encoder().clear_buffer(&list.counter, 0, None);
                // Storage textures have no encoder clear in core wgpu.
                self.zero_grid(list, &grid);
            }
        });
        ctx.pass(Stage::GBuffer, || {
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &targets.depth,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(depth),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(grid.screen_size.x * 4),
                    rows_per_image: Some(grid.screen_size.y),
                },
                extent(grid.screen_size),
            );
        });
        ctx.barrier_between(&Stage::Clear.decl(), &Stage::LightCull.decl());
        ctx.barrier_between(&Stage::GBuffer.decl(), &Stage::LightCull.decl());

        let dispatch = grid.cull_dispatch();
        let pipeline = &self.cull_pipeline;
        ctx.pass_with(Stage::LightCull, |backend| {
            let mut pass = backend.encoder().begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("light_cull"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &targets.cull_bind_group, &[]);
            pass.dispatch_workgroups(dispatch.x, dispatch.y, 1);
        });
        ctx.barrier_between(&Stage::LightCull.decl(), &Stage::Lighting.decl());
        Ok(())
    }

    /// Copy both light lists back into `out`. Blocks until the GPU is idle;
    /// call after the frame was submitted.
    pub fn read_back(&self, out: &mut LightLists) -> Result<()> {
        let targets = self
            .targets
            .as_ref()
            .ok_or(Error::NotReady("gpu read-back before resize"))?;
        let grid = targets.grid;
        for kind in ListKind::ALL {
            let list = targets.list(kind);
            let entries = self.read_grid(&list.grid, &grid)?;
            let indices = self.read_buffer(&list.indices)?;
            let counter = self.read_buffer(&list.counter)?;
            let indices: Vec<u32> = pod_vec(&indices);
            let counter = bytemuck::pod_read_unaligned::<u32>(&counter[..4]);
            out.get_mut(kind).load_readback(&entries, &indices, counter);
        }
        Ok(())
    }

    /// The frustum grid as computed on the GPU.
    pub fn read_frustums(&self) -> Result<Vec<Frustum>> {
        let targets = self
            .targets
            .as_ref()
            .ok_or(Error::NotReady("gpu read-back before resize"))?;
        let bytes = self.read_buffer(&targets.frustums)?;
        Ok(pod_vec(&bytes))
    }

    fn staging(&self, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cull_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn read_buffer(&self, source: &wgpu::Buffer) -> Result<Vec<u8>> {
        let staging = self.staging(source.size());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("cull_readback") });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, source.size());
        self.queue.submit(Some(encoder.finish()));
        self.map_read(&staging)
    }

    fn read_grid(&self, texture: &wgpu::Texture, grid: &TileGrid) -> Result<Vec<LightGridEntry>> {
        let padded = padded_bytes_per_row(grid.grid_size.x);
        let staging = self.staging(padded as u64 * grid.grid_size.y as u64);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("cull_readback") });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(grid.grid_size.y),
                },
            },
            extent(grid.grid_size),
        );
        self.queue.submit(Some(encoder.finish()));
        let bytes = self.map_read(&staging)?;

        let row = grid.grid_size.x as usize * std::mem::size_of::<LightGridEntry>();
        Ok(bytes
            .chunks_exact(padded as usize)
            .flat_map(|chunk| pod_vec::<LightGridEntry>(&chunk[..row]))
            .collect())
    }

    fn map_read(&self, staging: &wgpu::Buffer) -> Result<Vec<u8>> {
        let slice = staging.slice(..);
        let (sender, receiver) = oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            sender.send(res).ok();
        });
        self.device.poll(wgpu::Maintain::Wait);
        block_on(receiver)
            .map_err(|_| Error::Gpu("read-back callback dropped".to_string()))?
            .map_err(|e| Error::Gpu(e.to_string()))?;
        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::math::div_ceil;

    #[test]
    fn test_globals_layout() {
        let grid = TileGrid::new(1280, 720);
        let inv = Camera::default().culling_projection(false).inverse();
        let globals = GpuTiledGlobals::new(&grid, &inv);
        let bytes = bytemuck::bytes_of(&globals);
        assert_eq!(bytes.len(), 80);
        assert_eq!(globals.grid_size, [160, 90]);
        assert_eq!(globals.screen_size, [1280.0, 720.0]);
        assert_eq!(&bytes[..4], &inv.x_axis.x.to_ne_bytes());
    }

    #[test]
    fn test_readback_rows_are_aligned() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(32), 256);
        assert_eq!(padded_bytes_per_row(33), 512);
        let grid = TileGrid::new(1920, 1080);
        assert_eq!(padded_bytes_per_row(grid.grid_size.x), div_ceil(240 * 8, 256) * 256);
    }

    #[test]
    fn test_shader_sources_carry_entry_points() {
        let frustum = module_source(FRUSTUM_WGSL);
        let cull = module_source(CULL_WGSL);
        assert!(frustum.contains("fn build_frustums") && frustum.contains("struct Frustum"));
        assert!(cull.contains("fn cull_lights") && cull.contains("@workgroup_size(8, 8, 1)"));
        assert!(cull.contains("const MAX_LIGHTS_PER_TILE: u32 = 1024u;"));
        assert!(cull.contains("let pixel = local_id.xy;"));
    }

    #[test]
    fn test_gpu_backend_drives_render_context() {
        fn assert_backend<B: RenderBackend>() {}
        assert_backend::<GpuBackend>();
    }
}
