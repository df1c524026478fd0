use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Half-size of the box used when culling is disabled.
pub const UNBOUNDED_EXTENT: f32 = 50_000_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn unbounded() -> Self {
        Self {
            min: Vec3::splat(-UNBOUNDED_EXTENT),
            max: Vec3::splat(UNBOUNDED_EXTENT),
        }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Axis-aligned box enclosing this box after `model` is applied.
    pub fn transform(&self, model: &Mat4) -> Aabb {
        let world_center = model.transform_point3(self.center());
        let abs_m = Mat3::from_mat4(*model).abs();
        let world_extents = abs_m * self.extents();

        Aabb {
            min: world_center - world_extents,
            max: world_center + world_extents,
        }
    }
}
