use glam::{Mat4, Vec3, Vec4};

use crate::math::Aabb;

/// Up to four bone influences of one vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoneWeight {
    pub indices: [u32; 4],
    pub weights: [f32; 4],
}

impl BoneWeight {
    pub fn single(bone: u32) -> Self {
        Self {
            indices: [bone, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn pair(a: u32, weight_a: f32, b: u32, weight_b: f32) -> Self {
        Self {
            indices: [a, b, 0, 0],
            weights: [weight_a, weight_b, 0.0, 0.0],
        }
    }
}

/// One authored frame of a blend shape, fully applied at weight 100. Delta
/// arrays are per vertex; an empty normal or tangent array means "no delta"
/// for that attribute.
#[derive(Clone, Debug, Default)]
pub struct BlendShapeFrame {
    pub delta_positions: Vec<Vec3>,
    pub delta_normals: Vec<Vec3>,
    pub delta_tangents: Vec<Vec3>,
}

#[derive(Clone, Debug, Default)]
pub struct BlendShape {
    pub name: String,
    pub frames: Vec<BlendShapeFrame>,
}

impl BlendShape {
    pub fn with_positions(name: impl Into<String>, delta_positions: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            frames: vec![BlendShapeFrame {
                delta_positions,
                ..Default::default()
            }],
        }
    }
}

/// Source mesh as handed over by the host. `bind_poses[b]` maps mesh space
/// into the space of bone `b` at bind time, and is ordered like the bone
/// transforms supplied every frame.
#[derive(Clone, Debug, Default)]
pub struct SkinnedMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec4>,
    pub bone_weights: Vec<BoneWeight>,
    pub bind_poses: Vec<Mat4>,
    pub blend_shapes: Vec<BlendShape>,
    /// Mesh-space bounds used for culling.
    pub bounds: Aabb,
}

impl SkinnedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn bone_count(&self) -> usize {
        self.bind_poses.len()
    }

    pub fn blend_shape_count(&self) -> usize {
        self.blend_shapes.len()
    }

    pub fn blend_shape_name(&self, index: usize) -> Option<&str> {
        self.blend_shapes.get(index).map(|s| s.name.as_str())
    }

    pub fn blend_shape_index(&self, name: &str) -> Option<usize> {
        self.blend_shapes.iter().position(|s| s.name == name)
    }

    pub fn recalculate_bounds(&mut self) {
        self.bounds = Aabb::from_points(&self.positions);
    }
}
