use glam::{Mat4, Vec3};

use crate::error::Result;
use crate::layout::group_count;
use crate::renderer::utils;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BoneParams {
    pub self_matrix: [[f32; 4]; 4],
    pub bone_orientation: [f32; 4],
    pub bone_count: u32,
    pub _pad: [u32; 3],
}

impl BoneParams {
    pub fn new(self_matrix: Mat4, bone_orientation: Vec3, bone_count: u32) -> Self {
        Self {
            self_matrix: self_matrix.to_cols_array_2d(),
            bone_orientation: bone_orientation.extend(0.0).to_array(),
            bone_count,
            _pad: [0; 3],
        }
    }
}

/// Turns this frame's pose matrices into skinned dual quaternions.
pub struct BoneDqPipeline {
    pub bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl BoneDqPipeline {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bone DQ Bind Group Layout"),
            entries: &[
                utils::uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                utils::storage_entry(1, true),
                utils::storage_entry(2, true),
                utils::storage_entry(3, false),
                utils::storage_entry(4, false),
            ],
        });
        let pipeline = utils::create_compute_pipeline(
            device,
            "Bone DQ Pipeline",
            include_str!("../shaders/bone_dq.wgsl"),
            &bind_group_layout,
        )?;

        Ok(Self {
            bind_group_layout,
            pipeline,
        })
    }

    pub fn create_bind_group(
        &self,
        device: &wgpu::Device,
        params: &wgpu::Buffer,
        pose_matrices: &wgpu::Buffer,
        bind_dual_quaternions: &wgpu::Buffer,
        skinned_dual_quaternions: &wgpu::Buffer,
        bone_directions: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bone DQ Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pose_matrices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: bind_dual_quaternions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: skinned_dual_quaternions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: bone_directions.as_entire_binding(),
                },
            ],
        })
    }

    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, bone_count: u32) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Bone DQ Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(group_count(bone_count), 1, 1);
    }
}
