// src/math.rs
//! View-space geometry shared by the frustum builder, the culler and the GPU
//! shaders: planes, 4-plane tile frusta and the screen → clip → view transforms.
//!
//! View space is right-handed with the camera at the origin looking down `-Z`
//! ([`VIEW_FORWARD`]). Screen pixels map to NDC as `2 * (p / size) - 1` without
//! a Y flip, so pixel row 0 is NDC `y = -1`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};

/// Camera viewing direction in view space.
pub const VIEW_FORWARD: Vec3 = Vec3::NEG_Z;

/// Distance of a view-space point in front of the camera.
#[inline]
pub fn forward_distance(p: Vec3) -> f32 {
    p.dot(VIEW_FORWARD)
}

/// Plane as unit normal plus signed distance from the origin (`dot(n, p) = d`).
/// Layout matches WGSL `struct Plane { normal: vec3<f32>, distance: f32 }`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    #[inline]
    pub const fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Plane through three points; the normal follows the winding
    /// `cross(b - origin, c - origin)`.
    #[inline]
    pub fn from_points(origin: Vec3, a: Vec3, b: Vec3) -> Self {
        let normal = (a - origin).cross(b - origin).normalize();
        Self {
            normal,
            distance: normal.dot(origin),
        }
    }

    /// Signed distance of `p` from the plane; negative is the outside.
    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.distance
    }

    /// True when the sphere lies entirely on the negative side of the plane.
    #[inline]
    pub fn sphere_outside(&self, center: Vec3, radius: f32) -> bool {
        self.signed_distance(center) < -radius
    }
}

/// Index of each side inside [`Frustum::planes`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum FrustumSide {
    Left = 0,
    Right = 1,
    Top = 2,
    Bottom = 3,
}

/// Four side planes of a tile, open towards the far plane. 64 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Frustum {
    pub planes: [Plane; 4],
}

const _: () = assert!(std::mem::size_of::<Plane>() == 16);
const _: () = assert!(std::mem::size_of::<Frustum>() == 64);

impl Frustum {
    #[inline]
    pub fn plane(&self, side: FrustumSide) -> &Plane {
        &self.planes[side as usize]
    }

    /// Sphere versus the four side planes and a `[near, far]` forward-distance
    /// range. Returns `false` as soon as the sphere is fully outside any bound.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32, near: f32, far: f32) -> bool {
        let depth = forward_distance(center);
        if depth + radius < near || depth - radius > far {
            return false;
        }
        !self
            .planes
            .iter()
            .any(|plane| plane.sphere_outside(center, radius))
    }
}

/// Clip-space position to view space through the inverse projection.
#[inline]
pub fn clip_to_view(clip: Vec4, inverse_projection: &Mat4) -> Vec4 {
    let view = *inverse_projection * clip;
    view / view.w
}

/// Screen position (pixels, with NDC depth in `z`) to view space.
#[inline]
pub fn screen_to_view(screen: Vec2, depth: f32, screen_size: Vec2, inverse_projection: &Mat4) -> Vec4 {
    let ndc = 2.0 * (screen / screen_size) - Vec2::ONE;
    clip_to_view(Vec4::new(ndc.x, ndc.y, depth, 1.0), inverse_projection)
}

/// Forward distance of an NDC depth value sampled at the screen center line.
/// Depth-to-distance is independent of the pixel for perspective projections.
#[inline]
pub fn depth_to_forward(depth: f32, inverse_projection: &Mat4) -> f32 {
    forward_distance(clip_to_view(Vec4::new(0.0, 0.0, depth, 1.0), inverse_projection).truncate())
}

/// Ceiling division used for every grid / dispatch size.
#[inline]
pub const fn div_ceil(value: u32, divisor: u32) -> u32 {
    (value + divisor - 1) / divisor
}

#[inline]
pub fn div_ceil2(value: UVec2, divisor: u32) -> UVec2 {
    UVec2::new(div_ceil(value.x, divisor), div_ceil(value.y, divisor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_from_points_winding() {
        let p = Plane::from_points(Vec3::ZERO, Vec3::X, Vec3::Y);
        assert!((p.normal - Vec3::Z).length() < 1e-6);
        assert_eq!(p.distance, 0.0);

        let offset = Plane::from_points(Vec3::new(0.0, 0.0, 2.0), Vec3::new(1.0, 0.0, 2.0), Vec3::new(0.0, 1.0, 2.0));
        assert!((offset.distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_sphere_outside_plane() {
        let p = Plane::new(Vec3::X, 0.0);
        assert!(p.sphere_outside(Vec3::new(-2.0, 0.0, 0.0), 1.0));
        assert!(!p.sphere_outside(Vec3::new(-0.5, 0.0, 0.0), 1.0));
        assert!(!p.sphere_outside(Vec3::ZERO, 0.0));
    }

    #[test]
    fn test_screen_to_view_center_is_on_axis() {
        let proj = Mat4::perspective_rh(1.2, 1.0, 0.1, 100.0);
        let inv = proj.inverse();
        let v = screen_to_view(Vec2::splat(64.0), 1.0, Vec2::splat(128.0), &inv);
        assert!(v.x.abs() < 1e-3 && v.y.abs() < 1e-3);
        assert!((forward_distance(v.truncate()) - 100.0).abs() < 0.1);
        assert!((depth_to_forward(0.0, &inv) - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_div_ceil() {
        assert_eq!(div_ceil(17, 8), 3);
        assert_eq!(div_ceil(16, 8), 2);
        assert_eq!(div_ceil2(UVec2::new(17, 9), 8), UVec2::new(3, 2));
    }
}
