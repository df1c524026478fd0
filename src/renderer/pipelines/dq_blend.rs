use crate::error::Result;
use crate::layout::group_count;
use crate::renderer::bindgroups::skinned_data::SkinnedSurfaces;
use crate::renderer::utils;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlendParams {
    pub vertex_count: u32,
    pub surface_width: u32,
    pub bulge_compensation: f32,
    pub _pad: u32,
}

/// Per-vertex dual quaternion blend, written into the skinned surfaces.
pub struct DqBlendPipeline {
    pub bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl DqBlendPipeline {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("DQ Blend Bind Group Layout"),
            entries: &[
                utils::uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                utils::storage_entry(1, true),
                utils::storage_entry(2, true),
                utils::storage_entry(3, true),
                utils::storage_texture_entry(4, SkinnedSurfaces::DATA_1_FORMAT),
                utils::storage_texture_entry(5, SkinnedSurfaces::DATA_2_FORMAT),
                utils::storage_texture_entry(6, SkinnedSurfaces::DATA_3_FORMAT),
            ],
        });
        let pipeline = utils::create_compute_pipeline(
            device,
            "DQ Blend Pipeline",
            include_str!("../shaders/dq_blend.wgsl"),
            &bind_group_layout,
        )?;

        Ok(Self {
            bind_group_layout,
            pipeline,
        })
    }

    /// `vertex_infos` is whichever buffer the morph pass left the morphed
    /// vertices in, so this is rebuilt whenever weights change.
    pub fn create_bind_group(
        &self,
        device: &wgpu::Device,
        params: &wgpu::Buffer,
        vertex_infos: &wgpu::Buffer,
        skinned_dual_quaternions: &wgpu::Buffer,
        bone_directions: &wgpu::Buffer,
        surfaces: &SkinnedSurfaces,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("DQ Blend Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: vertex_infos.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: skinned_dual_quaternions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: bone_directions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&surfaces.data_1_view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&surfaces.data_2_view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(&surfaces.data_3_view),
                },
            ],
        })
    }

    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, vertex_count: u32) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("DQ Blend Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(group_count(vertex_count), 1, 1);
    }
}
