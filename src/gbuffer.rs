// src/gbuffer.rs
//! GBuffer output contract: the channels a rasterizer writes before culling.
//!
//! The culler only reads `depth`; the lighting resolver reads the rest keyed by
//! the same pixel coordinates. All channels are row-major, `y * width + x`.

use glam::{UVec2, Vec4};

use crate::camera::DepthConvention;
use crate::error::{Error, Result};

/// Material id meaning "no surface was written here".
pub const EMPTY_MATERIAL: u32 = u32::MAX;

/// Texture formats of the GBuffer channels on the GPU.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GBufferLayout {
    pub position: wgpu::TextureFormat,
    pub normal: wgpu::TextureFormat,
    pub material: wgpu::TextureFormat,
    pub depth: wgpu::TextureFormat,
}

impl Default for GBufferLayout {
    fn default() -> Self {
        Self {
            position: wgpu::TextureFormat::Rgba32Float,
            normal: wgpu::TextureFormat::Rgba32Float,
            material: wgpu::TextureFormat::Rg32Uint,
            depth: wgpu::TextureFormat::Depth32Float,
        }
    }
}

impl GBufferLayout {
    /// Colour attachments in binding order (position, normal, material).
    pub fn color_formats(&self) -> [wgpu::TextureFormat; 3] {
        [self.position, self.normal, self.material]
    }
}

/// Attributes of one written pixel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Surface {
    /// View-space position.
    pub position: Vec4,
    /// View-space normal.
    pub normal: Vec4,
    pub material: [u32; 2],
    pub depth: f32,
}

/// CPU-side GBuffer surfaces for one resolution.
#[derive(Clone, Debug)]
pub struct GBuffer {
    size: UVec2,
    convention: DepthConvention,
    pub position: Vec<Vec4>,
    pub normal: Vec<Vec4>,
    pub material: Vec<[u32; 2]>,
    pub depth: Vec<f32>,
}

impl GBuffer {
    pub fn new(width: u32, height: u32, convention: DepthConvention) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResolution { width, height });
        }
        let len = (width * height) as usize;
        Ok(Self {
            size: UVec2::new(width, height),
            convention,
            position: vec![Vec4::ZERO; len],
            normal: vec![Vec4::ZERO; len],
            material: vec![[EMPTY_MATERIAL; 2]; len],
            depth: vec![convention.clear_depth(); len],
        })
    }

    #[inline]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    #[inline]
    pub fn convention(&self) -> DepthConvention {
        self.convention
    }

    #[inline]
    pub fn index(&self, pixel: UVec2) -> usize {
        (pixel.y * self.size.x + pixel.x) as usize
    }

    /// Reset every channel to its clear value.
    pub fn clear(&mut self) {
        self.position.fill(Vec4::ZERO);
        self.normal.fill(Vec4::ZERO);
        self.material.fill([EMPTY_MATERIAL; 2]);
        self.depth.fill(self.convention.clear_depth());
    }

    /// Depth-tested write of one pixel; returns whether it was kept.
    pub fn write(&mut self, pixel: UVec2, surface: Surface) -> bool {
        let i = self.index(pixel);
        let occupied = self.material[i][0] != EMPTY_MATERIAL;
        if occupied && !self.convention.is_nearer(surface.depth, self.depth[i]) {
            return false;
        }
        self.position[i] = surface.position;
        self.normal[i] = surface.normal;
        self.material[i] = surface.material;
        self.depth[i] = surface.depth;
        true
    }

    /// Surface at `pixel`, or `None` where nothing was drawn.
    pub fn surface(&self, pixel: UVec2) -> Option<Surface> {
        let i = self.index(pixel);
        if self.material[i][0] == EMPTY_MATERIAL {
            return None;
        }
        Some(Surface {
            position: self.position[i],
            normal: self.normal[i],
            material: self.material[i],
            depth: self.depth[i],
        })
    }

    #[inline]
    pub fn depth_at(&self, pixel: UVec2) -> f32 {
        self.depth[self.index(pixel)]
    }
}

/// The rasterizer seam. Called once per frame after the GBuffer is cleared.
pub trait GBufferProducer {
    fn produce(&mut self, gbuffer: &mut GBuffer) -> Result<()>;
}

impl<F> GBufferProducer for F
where
    F: FnMut(&mut GBuffer) -> Result<()>,
{
    fn produce(&mut self, gbuffer: &mut GBuffer) -> Result<()> {
        self(gbuffer)
    }
}
