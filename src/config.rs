// src/config.rs
//! Runtime configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::arena::DEFAULT_ARENA_BUDGET;
use crate::camera::{Camera, DepthConvention};
use crate::context::Context;
use crate::culler::ThreadOrder;
use crate::error::{Error, Result};
use crate::tiles::MAX_POINT_LIGHTS;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub depth: DepthConvention,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 90.0,
            near: 0.01,
            far: 1000.0,
            depth: DepthConvention::Reversed,
        }
    }
}

/// Knobs of the headless demo driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub lights: usize,
    pub frames: u32,
    pub seed: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            lights: 256,
            frames: 3,
            seed: 0x5eed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CullingConfig {
    pub width: u32,
    pub height: u32,
    /// Capacity of the per-frame point-light buffer.
    pub max_lights: usize,
    /// Byte budget of the render-target arena. Resize fails with
    /// `Error::ArenaExhausted` when a resolution's targets and index lists do
    /// not fit.
    pub arena_budget: u64,
    pub camera: CameraConfig,
    pub thread_order: ThreadOrder,
    pub demo: DemoConfig,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            max_lights: MAX_POINT_LIGHTS as usize,
            arena_budget: DEFAULT_ARENA_BUDGET,
            camera: CameraConfig::default(),
            thread_order: ThreadOrder::Forward,
            demo: DemoConfig::default(),
        }
    }
}

impl CullingConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("parsing culling config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }
        crate::ensure!(self.max_lights > 0, "max_lights must be at least 1");
        crate::ensure!(
            self.demo.lights <= self.max_lights,
            "demo wants {} lights but max_lights is {}",
            self.demo.lights,
            self.max_lights
        );
        let cam = &self.camera;
        crate::ensure!(
            cam.near > 0.0 && cam.far > cam.near,
            "camera planes must satisfy 0 < near < far (got {} / {})",
            cam.near,
            cam.far
        );
        crate::ensure!(
            cam.fov_degrees > 0.0 && cam.fov_degrees < 180.0,
            "fov must be within (0, 180) degrees"
        );
        Ok(())
    }

    /// Camera at the origin looking down `-Z` with these settings.
    pub fn camera(&self) -> Camera {
        let cam = &self.camera;
        Camera::new(
            glam::Vec3::ZERO,
            0.0,
            0.0,
            cam.fov_degrees.to_radians(),
            self.width as f32 / self.height as f32,
            cam.near,
            cam.far,
            cam.depth,
        )
    }
}
