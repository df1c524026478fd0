use glam::{Mat4, Vec3, Vec4};

use crate::math::Aabb;

#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub n: Vec3, // inward, normalized
    pub d: f32,  // plane eq: n·x + d = 0
}

#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6], // left, right, bottom, top, near, far
}

fn normalize_plane(p: Vec4) -> Plane {
    let n = Vec3::new(p.x, p.y, p.z);
    let inv_len = 1.0 / n.length();
    Plane {
        n: n * inv_len,
        d: p.w * inv_len,
    }
}

impl Frustum {
    /// Extracts the planes of a wgpu-style (0..1 depth) view-projection matrix.
    pub fn from_view_proj(m: &Mat4) -> Self {
        let planes = [
            normalize_plane(m.row(3) + m.row(0)), // left
            normalize_plane(m.row(3) - m.row(0)), // right
            normalize_plane(m.row(3) + m.row(1)), // bottom
            normalize_plane(m.row(3) - m.row(1)), // top
            normalize_plane(m.row(2)),            // near
            normalize_plane(m.row(3) - m.row(2)), // far
        ];

        Frustum { planes }
    }

    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let p = Vec3::new(
                if plane.n.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.n.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.n.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );

            if plane.n.dot(p) + plane.d < 0.0 {
                return false;
            }
        }

        true
    }
}

/// Decides whether the skinned renderable is visible this frame.
pub trait VisibilityTest {
    fn is_visible(&self, world_bounds: &Aabb) -> bool;
}

impl VisibilityTest for Frustum {
    fn is_visible(&self, world_bounds: &Aabb) -> bool {
        self.intersects_aabb(world_bounds)
    }
}

impl<F> VisibilityTest for F
where
    F: Fn(&Aabb) -> bool,
{
    fn is_visible(&self, world_bounds: &Aabb) -> bool {
        self(world_bounds)
    }
}

pub struct AlwaysVisible;

impl VisibilityTest for AlwaysVisible {
    fn is_visible(&self, _world_bounds: &Aabb) -> bool {
        true
    }
}
