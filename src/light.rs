// src/light.rs
//! Point lights as uploaded to the culler each frame.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::error::{Error, Result};
use crate::tiles::MAX_POINT_LIGHTS;

/// GPU point light. Layout matches WGSL
/// `struct PointLight { color: vec3<f32>, position: vec3<f32>, radius: f32 }`
/// (the WGSL vec3 alignment inserts the padding word).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointLight {
    pub color: Vec3,
    pub _pad: u32,
    pub position: Vec3,
    /// Maximum influence distance, used as the bounding sphere radius.
    pub radius: f32,
}

const _: () = assert!(std::mem::size_of::<PointLight>() == 32);

impl PointLight {
    pub fn new(position: Vec3, radius: f32, color: Vec3) -> Self {
        Self {
            color,
            _pad: 0,
            position,
            radius,
        }
    }

    /// Same light with its position moved into view space.
    pub fn to_view_space(&self, view: &Mat4) -> Self {
        Self {
            position: view.transform_point3(self.position),
            ..*self
        }
    }
}

/// Capacity-bounded per-frame light list.
#[derive(Clone, Debug)]
pub struct LightSet {
    lights: Vec<PointLight>,
    max_lights: usize,
}

impl Default for LightSet {
    fn default() -> Self {
        Self::with_capacity(MAX_POINT_LIGHTS as usize)
    }
}

impl LightSet {
    pub fn with_capacity(max_lights: usize) -> Self {
        Self {
            lights: Vec::with_capacity(max_lights),
            max_lights,
        }
    }

    #[inline]
    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn clear(&mut self) {
        self.lights.clear();
    }

    /// Append one light; fails once the configured maximum is reached.
    pub fn push(&mut self, light: PointLight) -> Result<()> {
        if self.lights.len() >= self.max_lights {
            return Err(Error::LightCapacity {
                requested: self.lights.len() + 1,
                max: self.max_lights,
            });
        }
        self.lights.push(light);
        Ok(())
    }

    /// Replace the whole set. Nothing is kept if `lights` is too long.
    pub fn replace(&mut self, lights: &[PointLight]) -> Result<()> {
        if lights.len() > self.max_lights {
            return Err(Error::LightCapacity {
                requested: lights.len(),
                max: self.max_lights,
            });
        }
        self.lights.clear();
        self.lights.extend_from_slice(lights);
        Ok(())
    }

    /// Replace the set with world-space lights transformed by `view`.
    pub fn replace_from_world(&mut self, world: &[PointLight], view: &Mat4) -> Result<()> {
        if world.len() > self.max_lights {
            return Err(Error::LightCapacity {
                requested: world.len(),
                max: self.max_lights,
            });
        }
        self.lights.clear();
        self.lights.extend(world.iter().map(|l| l.to_view_space(view)));
        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[PointLight] {
        &self.lights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_past_capacity_fails() {
        let mut set = LightSet::with_capacity(2);
        let light = PointLight::new(Vec3::ZERO, 1.0, Vec3::ONE);
        set.push(light).unwrap();
        set.push(light).unwrap();
        let err = set.push(light).unwrap_err();
        assert!(matches!(err, Error::LightCapacity { requested: 3, max: 2 }));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_replace_keeps_previous_on_error() {
        let mut set = LightSet::with_capacity(1);
        let light = PointLight::new(Vec3::X, 1.0, Vec3::ONE);
        set.replace(&[light]).unwrap();
        assert!(set.replace(&[light, light]).is_err());
        assert_eq!(set.as_slice(), &[light]);
    }

    #[test]
    fn test_world_to_view() {
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
        let mut set = LightSet::default();
        set.replace_from_world(&[PointLight::new(Vec3::ONE, 2.0, Vec3::X)], &view)
            .unwrap();
        let l = set.as_slice()[0];
        assert_eq!(l.position, Vec3::new(1.0, 1.0, -2.0));
        assert_eq!(l.radius, 2.0);
        assert_eq!(set.max_lights(), 1000);
    }
}
