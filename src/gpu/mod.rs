// src/gpu/mod.rs
//! wgpu implementation of the culling passes.
//!
//! [`GpuBackend`] is the [`RenderBackend`] that records into a wgpu command
//! encoder; [`GpuTiledCuller`] owns the compute pipelines and the per-resize
//! buffers.

pub mod culling;
pub mod shaders;

pub use culling::{GpuSceneUniform, GpuTiledCuller, GpuTiledGlobals};

use std::sync::Arc;

use crate::backend::{PassDecl, RenderBackend, Resource, Stage};
use crate::error::{Error, Result};

/// Headless device and queue.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Open the best available adapter without a surface.
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| Error::Gpu("no compatible adapter".to_string()))?;
        let adapter_info = adapter.get_info();
        // Index lists grow with resolution; take whatever the adapter allows.
        let required_limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("tiled_cull_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| Error::Gpu(e.to_string()))?;

        tracing::info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "gpu device ready"
        );
        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
        })
    }
}

/// Records passes into one command encoder per frame.
///
/// wgpu tracks buffer and texture usage itself and inserts the transitions
/// between passes, so declared barriers are only traced. A full barrier
/// submits what has been recorded so far.
pub struct GpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    encoder: Option<wgpu::CommandEncoder>,
    submissions: u64,
}

impl GpuBackend {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            device: gpu.device.clone(),
            queue: gpu.queue.clone(),
            encoder: None,
            submissions: 0,
        }
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Encoder for the frame being recorded; opened on first use.
    pub fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tiled_cull_frame"),
            })
        })
    }

    /// Command buffers handed to the queue so far.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
            self.submissions += 1;
        }
    }
}

impl RenderBackend for GpuBackend {
    fn begin_pass(&mut self, decl: &PassDecl) {
        let label = format!("{:?}", decl.stage);
        self.encoder().push_debug_group(&label);
    }

    fn end_pass(&mut self, _stage: Stage) {
        self.encoder().pop_debug_group();
    }

    fn barrier(&mut self, src: Stage, dst: Stage, resources: &[Resource]) {
        tracing::trace!(?src, ?dst, ?resources, "pass dependency");
    }

    fn full_barrier(&mut self) {
        self.flush();
    }

    fn submit(&mut self, frame_index: u64) -> Result<()> {
        self.flush();
        tracing::trace!(frame_index, "frame submitted");
        Ok(())
    }
}
