use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt as _;

use crate::error::{Result, SkinningError};
use crate::layout::{self, DualQuaternion, MeshLayout, VertexInfo};
use crate::renderer::bindgroups::skinned_data::{SkinnedDataBinding, SkinnedSurfaces};
use crate::renderer::pipelines::apply_morph::{MorphParams, MorphedVertices, PingPong};
use crate::renderer::pipelines::bone_dq::BoneParams;
use crate::renderer::pipelines::dq_blend::BlendParams;
use crate::renderer::pipelines::SkinningPipelines;
use crate::renderer::utils;
use crate::renderer::wgpu_context::WgpuContext;

/// Every device allocation of one mesh assignment. Dropping it releases them
/// all, exactly once.
pub struct SkinningResources {
    pub vertex_count: u32,
    pub bone_count: u32,

    pub vertex_infos: wgpu::Buffer,
    pub morph_scratch: PingPong,
    pub morph_deltas: Vec<wgpu::Buffer>,
    pub morphed: MorphedVertices,

    pub pose_matrices: wgpu::Buffer,
    pub bind_dual_quaternions: wgpu::Buffer,
    pub skinned_dual_quaternions: wgpu::Buffer,
    pub bone_directions: wgpu::Buffer,

    pub surfaces: SkinnedSurfaces,
    pub skinned_data: SkinnedDataBinding,

    bone_params: wgpu::Buffer,
    blend_params: wgpu::Buffer,
    morph_params: wgpu::Buffer,
    bone_bind_group: wgpu::BindGroup,
    blend_bind_group: wgpu::BindGroup,

    /// Host copy of the base vertex buffer, so coefficient updates never read
    /// back from the device.
    pub host_vertex_infos: Vec<VertexInfo>,
}

fn storage_buffer_init(device: &wgpu::Device, label: &str, contents: &[u8]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
    })
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl SkinningResources {
    /// Allocates everything for `layout`. Limits or formats the device
    /// rejects come back as `ResourceValidation`.
    pub fn new(wgpu_context: &WgpuContext, pipelines: &SkinningPipelines, layout: MeshLayout) -> Result<Self> {
        let (resources, error) = utils::with_validation_scope(&wgpu_context.device, || {
            Self::allocate(wgpu_context, pipelines, layout)
        });
        match error {
            Some(e) => Err(SkinningError::ResourceValidation { message: e.to_string() }),
            None => Ok(resources),
        }
    }

    fn allocate(wgpu_context: &WgpuContext, pipelines: &SkinningPipelines, layout: MeshLayout) -> Self {
        let device = &wgpu_context.device;
        let aligned_vertices = layout.aligned_vertex_count();
        let aligned_bones = layout.aligned_bone_count();

        let vertex_infos = storage_buffer_init(device, "Vertex Infos", bytemuck::cast_slice(&layout.vertex_infos));
        let morph_scratch = PingPong::new(device, vertex_infos.size());
        let morph_deltas = layout
            .morph_deltas
            .iter()
            .map(|deltas| storage_buffer_init(device, "Morph Deltas", bytemuck::cast_slice(deltas)))
            .collect::<Vec<_>>();

        let pose_matrices = storage_buffer_init(
            device,
            "Pose Matrices",
            bytemuck::cast_slice(&vec![Mat4::IDENTITY; aligned_bones as usize]),
        );
        let bind_dual_quaternions = storage_buffer_init(
            device,
            "Bind Dual Quaternions",
            bytemuck::cast_slice(&layout.bind_dual_quaternions),
        );
        let skinned_dual_quaternions = storage_buffer_init(
            device,
            "Skinned Dual Quaternions",
            bytemuck::cast_slice(&vec![DualQuaternion::IDENTITY; aligned_bones as usize]),
        );
        let bone_directions = storage_buffer_init(
            device,
            "Bone Directions",
            bytemuck::cast_slice(&vec![[0f32; 4]; aligned_bones as usize]),
        );

        let surfaces = SkinnedSurfaces::new(device, layout.vertex_count);
        let skinned_data = SkinnedDataBinding::new(&pipelines.skinned_data_layout, device, &surfaces);

        let bone_params = uniform_buffer(device, "Bone DQ Params", size_of::<BoneParams>());
        let blend_params = uniform_buffer(device, "DQ Blend Params", size_of::<BlendParams>());
        let morph_params = uniform_buffer(device, "Apply Morph Params", size_of::<MorphParams>());

        let bone_bind_group = pipelines.bone_dq.create_bind_group(
            device,
            &bone_params,
            &pose_matrices,
            &bind_dual_quaternions,
            &skinned_dual_quaternions,
            &bone_directions,
        );
        let blend_bind_group = pipelines.dq_blend.create_bind_group(
            device,
            &blend_params,
            &vertex_infos,
            &skinned_dual_quaternions,
            &bone_directions,
            &surfaces,
        );

        log::debug!(
            "allocated skinning resources: {} vertices ({} aligned), {} bones ({} aligned), {} blend shapes, surfaces {}x{}",
            layout.vertex_count,
            aligned_vertices,
            layout.bone_count,
            aligned_bones,
            morph_deltas.len(),
            surfaces.width,
            surfaces.height,
        );

        Self {
            vertex_count: layout.vertex_count,
            bone_count: layout.bone_count,
            vertex_infos,
            morph_scratch,
            morph_deltas,
            morphed: MorphedVertices::Base,
            pose_matrices,
            bind_dual_quaternions,
            skinned_dual_quaternions,
            bone_directions,
            surfaces,
            skinned_data,
            bone_params,
            blend_params,
            morph_params,
            bone_bind_group,
            blend_bind_group,
            host_vertex_infos: layout.vertex_infos,
        }
    }

    /// Buffer the blend kernel currently reads vertices from.
    pub fn morphed_vertex_infos(&self) -> &wgpu::Buffer {
        self.morphed.buffer(&self.vertex_infos, &self.morph_scratch)
    }

    /// Re-runs the morph pipeline from the base buffer and points the blend
    /// kernel at the result.
    pub fn apply_morphs(&mut self, wgpu_context: &WgpuContext, pipelines: &SkinningPipelines, weights: &[f32]) -> Result<()> {
        let count = layout::aligned_count(self.vertex_count);
        self.morphed = pipelines.apply_morph.apply(
            wgpu_context,
            &self.morph_params,
            &self.vertex_infos,
            &mut self.morph_scratch,
            &self.morph_deltas,
            weights,
            count,
        )?;
        self.blend_bind_group = pipelines.dq_blend.create_bind_group(
            &wgpu_context.device,
            &self.blend_params,
            self.morphed_vertex_infos(),
            &self.skinned_dual_quaternions,
            &self.bone_directions,
            &self.surfaces,
        );
        Ok(())
    }

    pub fn upload_vertex_infos(&self, wgpu_context: &WgpuContext) {
        wgpu_context
            .queue
            .write_buffer(&self.vertex_infos, 0, bytemuck::cast_slice(&self.host_vertex_infos));
    }

    /// Uploads this frame's parameters and records bone DQ then blend into
    /// one submission.
    pub fn dispatch_frame(
        &self,
        wgpu_context: &WgpuContext,
        pipelines: &SkinningPipelines,
        pose_matrices: &[Mat4],
        self_matrix: Mat4,
        bone_orientation: Vec3,
        bulge_compensation: f32,
    ) {
        let queue = &wgpu_context.queue;
        queue.write_buffer(&self.pose_matrices, 0, bytemuck::cast_slice(pose_matrices));
        queue.write_buffer(
            &self.bone_params,
            0,
            bytemuck::cast_slice(&[BoneParams::new(self_matrix, bone_orientation, self.bone_count)]),
        );
        queue.write_buffer(
            &self.blend_params,
            0,
            bytemuck::cast_slice(&[BlendParams {
                vertex_count: self.vertex_count,
                surface_width: self.surfaces.width,
                bulge_compensation,
                _pad: 0,
            }]),
        );

        let mut encoder = wgpu_context.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Skinning Encoder"),
        });
        pipelines.bone_dq.encode(&mut encoder, &self.bone_bind_group, self.bone_count);
        pipelines.dq_blend.encode(&mut encoder, &self.blend_bind_group, self.vertex_count);
        queue.submit(Some(encoder.finish()));
    }
}
