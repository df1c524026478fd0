pub mod apply_morph;
pub mod bone_dq;
pub mod dq_blend;

use crate::error::Result;

use super::bindgroups::skinned_data::SkinnedDataBinding;

/// Compiled kernels. Immutable, so any number of skinners can share one set;
/// all bound parameters live in each skinner's own buffers and bind groups.
pub struct SkinningPipelines {
    pub bone_dq: bone_dq::BoneDqPipeline,
    pub apply_morph: apply_morph::ApplyMorphPipeline,
    pub dq_blend: dq_blend::DqBlendPipeline,
    pub skinned_data_layout: wgpu::BindGroupLayout,
}

impl SkinningPipelines {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        let pipelines = Self {
            bone_dq: bone_dq::BoneDqPipeline::new(device)?,
            apply_morph: apply_morph::ApplyMorphPipeline::new(device)?,
            dq_blend: dq_blend::DqBlendPipeline::new(device)?,
            skinned_data_layout: device.create_bind_group_layout(&SkinnedDataBinding::desc()),
        };
        log::debug!("skinning pipelines created");
        Ok(pipelines)
    }
}
