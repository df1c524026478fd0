use crate::error::{Result, SkinningError};
use crate::layout::group_count;
use crate::renderer::utils;
use crate::renderer::wgpu_context::WgpuContext;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MorphParams {
    pub weight: f32,
    pub count: u32,
    pub _pad: [u32; 2],
}

/// Blend shapes to dispatch, in order, with the factor their delta is scaled
/// by. Zero weights are skipped; nothing else is clamped.
pub fn plan_morphs(weights: &[f32], delta_count: usize) -> Result<Vec<(usize, f32)>> {
    let mut plan = Vec::new();
    for (index, &weight) in weights.iter().enumerate() {
        if weight == 0.0 {
            continue;
        }
        if index >= delta_count {
            return Err(SkinningError::MissingMorphDelta { index });
        }
        plan.push((index, weight / 100.0));
    }
    Ok(plan)
}

/// Two scratch vertex buffers. A dispatch reads `front` (or the base buffer)
/// and writes `back`, then the roles flip.
pub struct PingPong {
    slots: [wgpu::Buffer; 2],
    current: usize,
}

impl PingPong {
    pub fn new(device: &wgpu::Device, size: u64) -> Self {
        let slot = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        Self {
            slots: [slot("Morph Scratch A"), slot("Morph Scratch B")],
            current: 0,
        }
    }

    pub fn front(&self) -> &wgpu::Buffer {
        &self.slots[self.current]
    }

    pub fn back(&self) -> &wgpu::Buffer {
        &self.slots[self.current ^ 1]
    }

    pub fn flip(&mut self) {
        self.current ^= 1;
    }
}

/// Where the morphed vertices ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MorphedVertices {
    Base,
    Scratch,
}

impl MorphedVertices {
    pub fn buffer<'a>(self, base: &'a wgpu::Buffer, scratch: &'a PingPong) -> &'a wgpu::Buffer {
        match self {
            MorphedVertices::Base => base,
            MorphedVertices::Scratch => scratch.front(),
        }
    }
}

pub struct ApplyMorphPipeline {
    pub bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl ApplyMorphPipeline {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Apply Morph Bind Group Layout"),
            entries: &[
                utils::uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                utils::storage_entry(1, true),
                utils::storage_entry(2, true),
                utils::storage_entry(3, false),
            ],
        });
        let pipeline = utils::create_compute_pipeline(
            device,
            "Apply Morph Pipeline",
            include_str!("../shaders/apply_morph.wgsl"),
            &bind_group_layout,
        )?;

        Ok(Self {
            bind_group_layout,
            pipeline,
        })
    }

    /// Accumulates every weighted blend shape on top of `base`. Always starts
    /// over from `base`; each blend shape is its own submission so the weight
    /// uniform can be rewritten in between.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        wgpu_context: &WgpuContext,
        params: &wgpu::Buffer,
        base: &wgpu::Buffer,
        scratch: &mut PingPong,
        deltas: &[wgpu::Buffer],
        weights: &[f32],
        count: u32,
    ) -> Result<MorphedVertices> {
        let plan = plan_morphs(weights, deltas.len())?;
        let mut morphed = MorphedVertices::Base;

        for &(index, weight) in &plan {
            let morph_params = MorphParams {
                weight,
                count,
                _pad: [0; 2],
            };
            wgpu_context
                .queue
                .write_buffer(params, 0, bytemuck::cast_slice(&[morph_params]));

            let bind_group = wgpu_context.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Apply Morph Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: morphed.buffer(base, scratch).as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: deltas[index].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: scratch.back().as_entire_binding(),
                    },
                ],
            });

            let mut encoder = wgpu_context.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Apply Morph Encoder"),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Apply Morph Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(group_count(count), 1, 1);
            }
            wgpu_context.queue.submit(Some(encoder.finish()));

            scratch.flip();
            morphed = MorphedVertices::Scratch;
        }

        log::debug!("applied {} of {} blend shapes", plan.len(), weights.len());
        Ok(morphed)
    }
}
