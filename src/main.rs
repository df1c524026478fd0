use std::env;
use std::f32::consts::PI;
use std::sync::Arc;

use anyhow::Context as _;
use dq_skinning::logging::{init_logging, LoggingConfig};
use dq_skinning::{
    AlwaysVisible, BlendShape, BoneOrientation, BoneWeight, FrameInput, SkinnedMesh, Skinner, SkinnerConfig,
    SkinningPipelines, WgpuContext,
};
use glam::{Mat4, Quat, Vec3, Vec4};
use pollster::FutureExt as _;

const RINGS: usize = 9;
const SEGMENTS: usize = 12;
const LENGTH: f32 = 2.0;
const RADIUS: f32 = 0.25;

/// Tube along +X with a joint at x = 1. Vertices near the joint are shared
/// between the two bones.
fn bent_tube() -> SkinnedMesh {
    let mut mesh = SkinnedMesh::default();
    let mut swell = Vec::new();
    for ring in 0..RINGS {
        let x = LENGTH * ring as f32 / (RINGS - 1) as f32;
        let child_weight = ((x - 0.75) / 0.5).clamp(0.0, 1.0);
        for segment in 0..SEGMENTS {
            let angle = 2.0 * PI * segment as f32 / SEGMENTS as f32;
            let radial = Vec3::new(0.0, angle.cos(), angle.sin());
            mesh.positions.push(Vec3::new(x, 0.0, 0.0) + radial * RADIUS);
            mesh.normals.push(radial);
            mesh.tangents.push(Vec4::new(1.0, 0.0, 0.0, 1.0));
            mesh.bone_weights
                .push(BoneWeight::pair(0, 1.0 - child_weight, 1, child_weight));
            swell.push(radial * 0.1 * (1.0 - (x - 1.0).abs()).max(0.0));
        }
    }
    mesh.bind_poses = vec![Mat4::IDENTITY, Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0))];
    mesh.blend_shapes.push(BlendShape::with_positions("swell", swell));
    mesh.recalculate_bounds();
    mesh
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let config = match env::args().nth(1) {
        Some(path) => SkinnerConfig::from_json_file(&path).with_context(|| format!("loading config {path}"))?,
        None => SkinnerConfig {
            bone_orientation: BoneOrientation::PositiveX,
            bulge_compensation: 0.5,
            ..Default::default()
        },
    };
    log::info!("config: {config:?}");

    let wgpu_context = Arc::new(WgpuContext::headless().block_on().context("creating GPU context")?);
    let pipelines = Arc::new(SkinningPipelines::new(&wgpu_context.device)?);

    let mesh = bent_tube();
    let tip = mesh.vertex_count() - SEGMENTS;
    let mut skinner = Skinner::new(wgpu_context, pipelines, mesh, config);
    let swell = skinner.blend_shape_index("swell").context("missing blend shape")?;
    skinner.set_blend_shape_weight(swell, 60.0)?;
    skinner.start()?;

    for step in 0..=6 {
        let angle = step as f32 * 15f32.to_radians();
        let bones = [
            Mat4::IDENTITY,
            Mat4::from_rotation_translation(Quat::from_rotation_z(angle), Vec3::new(1.0, 0.0, 0.0)),
        ];
        let frame = FrameInput {
            bone_transforms: &bones,
            object_to_world: Mat4::IDENTITY,
            root_bone_to_world: Mat4::IDENTITY,
        };
        let outcome = skinner.tick(&frame, &AlwaysVisible)?;

        let vertices = skinner.read_skinned_vertices()?;
        log::info!(
            "{:>3} deg: {outcome:?}, tip {:?}, joint {:?}",
            step * 15,
            vertices[tip].position,
            vertices[(RINGS / 2) * SEGMENTS].position
        );
    }

    skinner.stop();
    Ok(())
}
