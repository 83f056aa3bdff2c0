// src/camera.rs
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Which end of the `[0, 1]` NDC depth range is the near plane.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthConvention {
    /// `0` at the near plane, `1` at the far plane, `LESS` depth test.
    Standard,
    /// `1` at the near plane, `0` at the far plane, `GREATER` depth test.
    #[default]
    Reversed,
}

impl DepthConvention {
    /// Depth value the depth buffer is cleared to ("nothing drawn").
    #[inline]
    pub fn clear_depth(self) -> f32 {
        match self {
            DepthConvention::Standard => 1.0,
            DepthConvention::Reversed => 0.0,
        }
    }

    /// True if `candidate` is nearer to the camera than `current`.
    #[inline]
    pub fn is_nearer(self, candidate: f32, current: f32) -> bool {
        match self {
            DepthConvention::Standard => candidate < current,
            DepthConvention::Reversed => candidate > current,
        }
    }

    pub fn compare_function(self) -> wgpu::CompareFunction {
        match self {
            DepthConvention::Standard => wgpu::CompareFunction::Less,
            DepthConvention::Reversed => wgpu::CompareFunction::Greater,
        }
    }
}

/// Perspective camera with position and Euler rotation (yaw, pitch).
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    /// yaw: rotation around Y axis (radians). pitch: rotation around X axis (radians).
    pub yaw: f32,
    pub pitch: f32,

    pub fovy: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
    pub depth: DepthConvention,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Vec3::ZERO,
            0.0,
            0.0,
            90f32.to_radians(),
            1.0,
            0.01,
            1000.0,
            DepthConvention::Reversed,
        )
    }
}

impl Camera {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        position: Vec3,
        yaw: f32,
        pitch: f32,
        fovy_radians: f32,
        aspect: f32,
        znear: f32,
        zfar: f32,
        depth: DepthConvention,
    ) -> Self {
        Self {
            position,
            yaw,
            pitch,
            fovy: fovy_radians,
            aspect,
            znear,
            zfar,
            depth,
        }
    }

    /// Unit forward vector in world space from yaw/pitch.
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(cos_pitch * sin_yaw, sin_pitch, -cos_pitch * cos_yaw).normalize_or_zero()
    }

    /// World → view (right-handed, Y up, camera looks down `-Z`).
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    /// View → clip for the configured depth convention.
    pub fn proj_matrix(&self) -> Mat4 {
        match self.depth {
            DepthConvention::Standard => Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar),
            DepthConvention::Reversed => Mat4::perspective_rh(self.fovy, self.aspect, self.zfar, self.znear),
        }
    }

    pub fn view_proj_matrix(&self) -> Mat4 {
        self.proj_matrix() * self.view_matrix()
    }

    /// Projection used to build tile frusta and unproject depth.
    ///
    /// With `flip_y` the Y axis is mirrored so that pixel row 0 lands on the
    /// top of the image, matching framebuffers whose first row is the top.
    pub fn culling_projection(&self, flip_y: bool) -> Mat4 {
        if flip_y {
            Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0)) * self.proj_matrix()
        } else {
            self.proj_matrix()
        }
    }

    /// Update aspect ratio (call on resize).
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn set_position(&mut self, pos: Vec3) {
        self.position = pos;
    }

    pub fn set_rotation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_reversed_depth_maps_near_to_one() {
        let cam = Camera::default();
        let near = cam.proj_matrix() * Vec4::new(0.0, 0.0, -cam.znear, 1.0);
        let far = cam.proj_matrix() * Vec4::new(0.0, 0.0, -cam.zfar, 1.0);
        assert!((near.z / near.w - 1.0).abs() < 1e-4);
        assert!((far.z / far.w).abs() < 1e-4);
        assert!(cam.depth.is_nearer(0.9, 0.1));
    }

    #[test]
    fn test_default_view_looks_down_negative_z() {
        let cam = Camera::default();
        let ahead = cam.view_matrix().transform_point3(Vec3::new(0.0, 0.0, -5.0));
        assert!((ahead - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-5);
    }

    #[test]
    fn test_flipped_projection_mirrors_y() {
        let cam = Camera::default();
        let p = Vec4::new(0.0, 1.0, -2.0, 1.0);
        let a = cam.culling_projection(false) * p;
        let b = cam.culling_projection(true) * p;
        assert_eq!(a.y, -b.y);
        assert_eq!(a.z, b.z);
    }
}
