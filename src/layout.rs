use glam::{Mat4, Quat, Vec3, Vec4};

use crate::error::{Result, SkinningError};
use crate::mesh::SkinnedMesh;

/// Must match `NUM_THREADS` in dq.wgsl.
pub const THREAD_GROUP_SIZE: u32 = 128;
/// Width of the skinned data surfaces. Kernels read it from a uniform.
pub const SURFACE_WIDTH: u32 = 1024;

/// Number of workgroups needed to cover `data_count` invocations.
pub fn group_count(data_count: u32) -> u32 {
    data_count.div_ceil(THREAD_GROUP_SIZE)
}

/// `data_count` rounded up to a whole number of workgroups.
pub fn aligned_count(data_count: u32) -> u32 {
    group_count(data_count) * THREAD_GROUP_SIZE
}

/// Largest element count whose aligned size still fits a `u32`.
pub const MAX_DEVICE_COUNT: u32 = u32::MAX - (THREAD_GROUP_SIZE - 1);

/// `count` as a device index, rejecting counts whose aligned size would
/// overflow.
pub fn device_count(what: &'static str, count: usize) -> Result<u32> {
    u32::try_from(count)
        .ok()
        .filter(|&n| n <= MAX_DEVICE_COUNT)
        .ok_or(SkinningError::CountOverflow { what, count })
}

/// Surface rows needed to hold `vertex_count` texels.
pub fn surface_height(vertex_count: u32) -> u32 {
    vertex_count.div_ceil(SURFACE_WIDTH).max(1)
}

/// Texel holding the skinned data of `vertex_index`.
pub fn surface_coord(vertex_index: u32) -> (u32, u32) {
    (vertex_index % SURFACE_WIDTH, vertex_index / SURFACE_WIDTH)
}

// vec4 fields everywhere: structured buffers not aligned to 16 bytes are slow
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VertexInfo {
    pub position: [f32; 4],
    pub normal: [f32; 4],
    pub tangent: [f32; 4],
    pub bone_indices: [u32; 4],
    pub bone_weights: [f32; 4],
    pub compensation_coef: f32,
    pub _pad: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MorphDelta {
    pub position: [f32; 4],
    pub normal: [f32; 4],
    pub tangent: [f32; 4],
}

/// Rigid transform as a unit rotation plus a position. The kernels build the
/// dual part from the position when they blend.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DualQuaternion {
    pub rotation: [f32; 4],
    pub position: [f32; 4],
}

impl Default for DualQuaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl DualQuaternion {
    pub const IDENTITY: Self = Self {
        rotation: [0.0, 0.0, 0.0, 1.0],
        position: [0.0, 0.0, 0.0, 1.0],
    };

    pub fn new(rotation: Quat, position: Vec3) -> Self {
        Self {
            rotation: rotation.to_array(),
            position: position.extend(1.0).to_array(),
        }
    }

    /// Rotation and translation of `m`; scale is discarded.
    pub fn from_mat4(m: &Mat4) -> Self {
        let (_, rotation, translation) = m.to_scale_rotation_translation();
        Self::new(rotation.normalize(), translation)
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_array(self.rotation)
    }

    pub fn translation(&self) -> Vec3 {
        Vec4::from_array(self.position).truncate()
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation() * p + self.translation()
    }
}

/// Scalar weight of the per-bone sign reference `(bone_direction, bias)`.
///
/// Twists about the bone direction stay in one hemisphere from a few degrees
/// below zero up to almost a full turn. Bends perpendicular to the bone have
/// a vector part orthogonal to the direction, so the bias alone decides them,
/// keeping the bind-pose hemisphere up to a half turn.
pub const SIGN_REFERENCE_BIAS: f32 = 0.05;

/// Axis bone `bind_pose` points along at bind time, in mesh space.
pub fn bind_bone_direction(bind_pose: &Mat4, orientation: Vec3) -> Vec3 {
    DualQuaternion::from_mat4(bind_pose).rotation().conjugate() * orientation
}

/// `rotation` or its negation, whichever lies in the hemisphere of the
/// reference built from `bone_direction`. Host mirror of the bone kernel.
pub fn align_sign(rotation: Quat, bone_direction: Vec3) -> Quat {
    let reference = bone_direction.extend(SIGN_REFERENCE_BIAS);
    if Vec4::from(rotation).dot(reference) < 0.0 {
        -rotation
    } else {
        rotation
    }
}

/// Perpendicular distance from `position` to the primary bone's axis at bind
/// time. Vertices far from the axis bulge more under rotation.
pub fn compensation_coefficient(position: Vec3, bind_pose: &Mat4, orientation: Vec3) -> f32 {
    let (_, bone_rotation, bone_position) = bind_pose.inverse().to_scale_rotation_translation();
    let bone_direction = bone_rotation * orientation;
    let to_bone = bone_position - position;

    to_bone.cross(bone_direction).length()
}

/// Recomputes `compensation_coef` of the first `vertex_count` entries.
pub fn update_compensation_coefficients(
    vertex_infos: &mut [VertexInfo],
    vertex_count: usize,
    bind_poses: &[Mat4],
    orientation: Vec3,
) {
    for info in vertex_infos.iter_mut().take(vertex_count) {
        let bind_pose = &bind_poses[info.bone_indices[0] as usize];
        let position = Vec4::from_array(info.position).truncate();
        info.compensation_coef = compensation_coefficient(position, bind_pose, orientation);
    }
}

/// Host-side image of everything uploaded when a mesh is assigned.
#[derive(Clone, Debug)]
pub struct MeshLayout {
    pub vertex_count: u32,
    pub bone_count: u32,
    pub vertex_infos: Vec<VertexInfo>,
    pub morph_deltas: Vec<Vec<MorphDelta>>,
    pub bind_dual_quaternions: Vec<DualQuaternion>,
    pub surface_width: u32,
    pub surface_height: u32,
}

impl MeshLayout {
    pub fn aligned_vertex_count(&self) -> u32 {
        aligned_count(self.vertex_count)
    }

    pub fn aligned_bone_count(&self) -> u32 {
        aligned_count(self.bone_count)
    }
}

type DeltaField = fn(&mut MorphDelta) -> &mut [f32; 4];

/// Copies one delta attribute. An empty source is "no delta"; a source of the
/// wrong length is skipped and reported as `false`.
fn fill_deltas(deltas: &mut [MorphDelta], src: &[Vec3], vertex_count: usize, field: DeltaField) -> bool {
    if src.is_empty() {
        return true;
    }
    if src.len() != vertex_count {
        return false;
    }
    for (d, v) in deltas.iter_mut().zip(src) {
        *field(d) = v.extend(0.0).to_array();
    }
    true
}

fn check_len(attribute: &'static str, actual: usize, expected: usize, optional: bool) -> Result<()> {
    if actual == expected || (optional && actual == 0) {
        Ok(())
    } else {
        Err(SkinningError::AttributeCountMismatch {
            attribute,
            expected,
            actual,
        })
    }
}

pub fn build_layout(mesh: &SkinnedMesh, orientation: Vec3) -> Result<MeshLayout> {
    let vertex_count = mesh.vertex_count();
    let bone_count = mesh.bone_count();
    if vertex_count == 0 {
        return Err(SkinningError::EmptyMesh);
    }
    if bone_count == 0 {
        return Err(SkinningError::NoBones);
    }
    let device_vertices = device_count("vertex", vertex_count)?;
    let device_bones = device_count("bone", bone_count)?;
    check_len("normals", mesh.normals.len(), vertex_count, true)?;
    check_len("tangents", mesh.tangents.len(), vertex_count, true)?;
    check_len("bone_weights", mesh.bone_weights.len(), vertex_count, false)?;

    for (vertex, bw) in mesh.bone_weights.iter().enumerate() {
        if let Some(&bone) = bw.indices.iter().find(|&&i| i as usize >= bone_count) {
            return Err(SkinningError::BoneIndexOutOfRange {
                vertex,
                bone,
                bone_count,
            });
        }
    }

    let aligned_vertices = aligned_count(device_vertices) as usize;
    let aligned_bones = aligned_count(device_bones) as usize;

    let mut vertex_infos = vec![VertexInfo::default(); aligned_vertices];
    for (i, info) in vertex_infos.iter_mut().take(vertex_count).enumerate() {
        let bw = &mesh.bone_weights[i];
        info.position = mesh.positions[i].extend(1.0).to_array();
        info.bone_indices = bw.indices;
        info.bone_weights = bw.weights;
        if let Some(n) = mesh.normals.get(i) {
            info.normal = n.extend(0.0).to_array();
        }
        if let Some(t) = mesh.tangents.get(i) {
            info.tangent = t.to_array();
        }
    }
    update_compensation_coefficients(&mut vertex_infos, vertex_count, &mesh.bind_poses, orientation);

    let morph_deltas = mesh
        .blend_shapes
        .iter()
        .map(|shape| {
            let mut deltas = vec![MorphDelta::default(); aligned_vertices];
            // only the first frame of a blend shape is used
            let Some(frame) = shape.frames.first() else {
                log::warn!("blend shape '{}' has no frames, deltas left at zero", shape.name);
                return deltas;
            };
            let attributes: [(&str, &[Vec3], DeltaField); 3] = [
                ("position", &frame.delta_positions, |d| &mut d.position),
                ("normal", &frame.delta_normals, |d| &mut d.normal),
                ("tangent", &frame.delta_tangents, |d| &mut d.tangent),
            ];
            for (attribute, src, field) in attributes {
                if !fill_deltas(&mut deltas, src, vertex_count, field) {
                    log::warn!(
                        "blend shape '{}' has {} {} deltas for {} vertices, deltas left at zero",
                        shape.name,
                        src.len(),
                        attribute,
                        vertex_count
                    );
                }
            }
            deltas
        })
        .collect();

    let mut bind_dual_quaternions = vec![DualQuaternion::IDENTITY; aligned_bones];
    for (dq, bind_pose) in bind_dual_quaternions.iter_mut().zip(&mesh.bind_poses) {
        *dq = DualQuaternion::from_mat4(bind_pose);
    }

    Ok(MeshLayout {
        vertex_count: device_vertices,
        bone_count: device_bones,
        vertex_infos,
        morph_deltas,
        bind_dual_quaternions,
        surface_width: SURFACE_WIDTH,
        surface_height: surface_height(device_vertices),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{BlendShape, BoneWeight};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    fn strip_mesh(vertex_count: usize) -> SkinnedMesh {
        let positions: Vec<Vec3> = (0..vertex_count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let mut mesh = SkinnedMesh {
            normals: vec![Vec3::Y; vertex_count],
            tangents: vec![Vec4::new(1.0, 0.0, 0.0, 1.0); vertex_count],
            bone_weights: vec![BoneWeight::single(0); vertex_count],
            bind_poses: vec![Mat4::IDENTITY, Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0))],
            positions,
            ..Default::default()
        };
        mesh.recalculate_bounds();
        mesh
    }

    #[test_case(0, 0)]
    #[test_case(1, 128)]
    #[test_case(128, 128)]
    #[test_case(129, 256)]
    #[test_case(130, 256)]
    #[test_case(300, 384)]
    #[test_case(1025, 1152)]
    fn aligned_count_rounds_up(n: u32, expected: u32) {
        assert_eq!(aligned_count(n), expected);
    }

    #[test]
    fn group_count_is_monotonic() {
        assert!(group_count(300) > group_count(130));
        assert_eq!(group_count(300), 3);
    }

    proptest! {
        #[test]
        fn aligned_count_is_smallest_multiple(n in 0u32..1_000_000) {
            let a = aligned_count(n);
            prop_assert_eq!(a % THREAD_GROUP_SIZE, 0);
            prop_assert!(a >= n);
            prop_assert!(a < n + THREAD_GROUP_SIZE);
        }
    }

    #[test]
    fn device_counts_must_leave_room_for_alignment() {
        assert_eq!(device_count("vertex", 1025).unwrap(), 1025);
        assert_eq!(device_count("vertex", MAX_DEVICE_COUNT as usize).unwrap(), MAX_DEVICE_COUNT);
        assert_eq!(aligned_count(MAX_DEVICE_COUNT) % THREAD_GROUP_SIZE, 0);
        for count in [MAX_DEVICE_COUNT as usize + 1, u32::MAX as usize, u32::MAX as usize + 1] {
            match device_count("bone", count) {
                Err(SkinningError::CountOverflow { what, count: c }) => assert_eq!((what, c), ("bone", count)),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn surface_for_1025_vertices() {
        assert_eq!(surface_height(1025), 2);
        assert_eq!(surface_height(1024), 1);
        assert_eq!(surface_coord(1024), (0, 1));
        assert_eq!(surface_coord(1023), (1023, 0));
    }

    #[test]
    fn padding_entries_are_inert() {
        let layout = build_layout(&strip_mesh(5), Vec3::Y).unwrap();
        assert_eq!(layout.vertex_infos.len(), 128);
        assert_eq!(layout.bind_dual_quaternions.len(), 128);
        for info in &layout.vertex_infos[5..] {
            assert_eq!(*info, VertexInfo::default());
        }
        assert_eq!(layout.vertex_infos[3].position, [3.0, 0.0, 0.0, 1.0]);
        assert_eq!(layout.vertex_infos[3].normal, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(layout.vertex_infos[3].tangent, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn bind_dual_quaternions_follow_bind_poses() {
        let layout = build_layout(&strip_mesh(2), Vec3::Y).unwrap();
        assert_eq!(layout.bind_dual_quaternions[0], DualQuaternion::IDENTITY);
        assert_eq!(layout.bind_dual_quaternions[1].translation(), Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(layout.bind_dual_quaternions[2], DualQuaternion::IDENTITY);
    }

    #[test]
    fn twist_about_the_bone_is_continuous_through_a_full_turn() {
        let direction = Vec3::Y;
        let mut previous = align_sign(Quat::IDENTITY, direction);
        for step in 1..36 {
            let twist = Quat::from_rotation_y(((step * 10) as f32).to_radians());
            let aligned = align_sign(twist, direction);
            assert!(
                Vec4::from(aligned).dot(Vec4::from(previous)) > 0.0,
                "jump at {} degrees",
                step * 10
            );
            previous = aligned;
        }
    }

    #[test]
    fn bends_keep_the_bind_hemisphere() {
        for degrees in [10.0f32, 90.0, 170.0, 200.0, 300.0] {
            let aligned = align_sign(Quat::from_rotation_z(degrees.to_radians()), Vec3::Y);
            assert!(aligned.w > 0.0, "{degrees} degrees: {aligned:?}");
        }
    }

    #[test]
    fn bone_direction_follows_the_bind_rotation() {
        let bind_pose = Mat4::from_rotation_translation(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(0.0, -2.0, 0.0),
        );
        let direction = bind_bone_direction(&bind_pose, Vec3::Y);
        assert!(direction.abs_diff_eq(Vec3::X, 1e-6), "{direction:?}");
    }

    #[test]
    fn compensation_coefficient_is_distance_to_bone_axis() {
        // bone at the origin pointing along +Y; vertex 2 units off the axis
        let coef = compensation_coefficient(Vec3::new(2.0, 5.0, 0.0), &Mat4::IDENTITY, Vec3::Y);
        assert!((coef - 2.0).abs() < 1e-6);

        // bone placed at x = 3 via its bind pose
        let bind_pose = Mat4::from_translation(Vec3::new(-3.0, 0.0, 0.0));
        let coef = compensation_coefficient(Vec3::new(3.0, 1.0, 0.0), &bind_pose, Vec3::Y);
        assert!(coef.abs() < 1e-6);
    }

    #[test]
    fn changing_orientation_changes_coefficients() {
        let mesh = strip_mesh(4);
        let mut layout = build_layout(&mesh, Vec3::Y).unwrap();
        // vertices lie on the X axis: distance to a Y axis bone is |x|
        assert!((layout.vertex_infos[3].compensation_coef - 3.0).abs() < 1e-6);
        update_compensation_coefficients(&mut layout.vertex_infos, 4, &mesh.bind_poses, Vec3::X);
        assert!(layout.vertex_infos[3].compensation_coef.abs() < 1e-6);
    }

    #[test]
    fn mismatched_blend_shape_leaves_zero_deltas() {
        let mut mesh = strip_mesh(3);
        mesh.blend_shapes.push(BlendShape::with_positions("short", vec![Vec3::ONE; 2]));
        mesh.blend_shapes.push(BlendShape::with_positions("ok", vec![Vec3::X; 3]));
        mesh.blend_shapes.push(BlendShape {
            name: "empty".into(),
            frames: vec![],
        });

        let layout = build_layout(&mesh, Vec3::Y).unwrap();
        assert_eq!(layout.morph_deltas.len(), 3);
        assert!(layout.morph_deltas[0].iter().all(|d| *d == MorphDelta::default()));
        assert_eq!(layout.morph_deltas[1][2].position, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(layout.morph_deltas[1][3], MorphDelta::default());
        assert_eq!(layout.morph_deltas[1].len(), 128);
        assert!(layout.morph_deltas[2].iter().all(|d| *d == MorphDelta::default()));
    }

    #[test]
    fn rejects_bone_index_out_of_range() {
        let mut mesh = strip_mesh(3);
        mesh.bone_weights[1] = BoneWeight::pair(0, 0.5, 7, 0.5);
        match build_layout(&mesh, Vec3::Y) {
            Err(SkinningError::BoneIndexOutOfRange { vertex, bone, bone_count }) => {
                assert_eq!((vertex, bone, bone_count), (1, 7, 2));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_and_boneless_meshes() {
        assert!(matches!(build_layout(&SkinnedMesh::default(), Vec3::Y), Err(SkinningError::EmptyMesh)));
        let mut mesh = strip_mesh(3);
        mesh.bind_poses.clear();
        assert!(matches!(build_layout(&mesh, Vec3::Y), Err(SkinningError::NoBones)));
    }

    #[test]
    fn missing_normals_are_allowed_but_short_ones_are_not() {
        let mut mesh = strip_mesh(3);
        mesh.normals.clear();
        assert!(build_layout(&mesh, Vec3::Y).is_ok());
        mesh.normals = vec![Vec3::Y; 2];
        assert!(matches!(
            build_layout(&mesh, Vec3::Y),
            Err(SkinningError::AttributeCountMismatch { attribute: "normals", .. })
        ));
    }

    #[test]
    fn dual_quaternion_from_matrix_transforms_like_the_matrix() {
        let m = Mat4::from_rotation_translation(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let dq = DualQuaternion::from_mat4(&m);
        let p = Vec3::new(0.5, -1.0, 2.0);
        assert!(dq.transform_point(p).abs_diff_eq(m.transform_point3(p), 1e-5));
    }

    #[test]
    fn gpu_struct_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<VertexInfo>(), 96);
        assert_eq!(std::mem::size_of::<MorphDelta>(), 48);
        assert_eq!(std::mem::size_of::<DualQuaternion>(), 32);
    }
}
