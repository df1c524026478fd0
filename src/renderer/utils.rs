use std::sync::mpsc;

use crate::error::{Result, SkinningError};

use super::wgpu_context::WgpuContext;

const DQ_COMMON: &str = include_str!("shaders/dq.wgsl");

/// Runs `f` inside a validation error scope, so device errors come back as a
/// value instead of reaching the uncaptured error handler.
pub fn with_validation_scope<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let error = pollster::FutureExt::block_on(device.pop_error_scope());
    (value, error)
}

/// Builds a kernel module from dq.wgsl plus `source`.
pub fn create_shader_module(device: &wgpu::Device, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
    let (shader, error) = with_validation_scope(device, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(format!("{DQ_COMMON}\n{source}").into()),
        })
    });
    match error {
        Some(e) => Err(SkinningError::ShaderValidation {
            label: label.to_string(),
            message: e.to_string(),
        }),
        None => Ok(shader),
    }
}

pub fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn storage_texture_entry(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

pub fn create_compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
) -> Result<wgpu::ComputePipeline> {
    let shader_module = create_shader_module(device, label, source)?;
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });
    Ok(device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &shader_module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    }))
}

type MapReceiver = mpsc::Receiver<std::result::Result<(), wgpu::BufferAsyncError>>;

// the callback has run once poll(Wait) returns, so nothing to wait for here
fn map_result(rx: &MapReceiver) -> Result<()> {
    let result = rx.try_recv().map_err(|_| SkinningError::MapCallbackDropped)?;
    Ok(result?)
}

fn map_staging(wgpu_context: &WgpuContext, staging: &wgpu::Buffer) -> Result<Vec<u8>> {
    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    wgpu_context.device.poll(wgpu::PollType::Wait)?;
    map_result(&rx)?;
    let data = slice.get_mapped_range().to_vec();
    staging.unmap();
    Ok(data)
}

/// Blocking copy of a whole buffer back to the host. Diagnostics and tests
/// only; the frame path never waits on the GPU.
pub fn read_buffer<T: bytemuck::Pod>(wgpu_context: &WgpuContext, buffer: &wgpu::Buffer) -> Result<Vec<T>> {
    let staging = wgpu_context.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: buffer.size(),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = wgpu_context.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, buffer.size());
    wgpu_context.queue.submit(Some(encoder.finish()));

    let data = map_staging(wgpu_context, &staging)?;
    Ok(bytemuck::pod_collect_to_vec(&data))
}

/// Blocking copy of a float texture back to the host, row-major, `channels`
/// floats per texel.
pub fn read_texture(wgpu_context: &WgpuContext, texture: &wgpu::Texture, channels: u32) -> Result<Vec<f32>> {
    let bytes_per_row = crate::align_to_256((texture.width() * channels * 4) as usize) as u32;
    let height = texture.height();
    let staging = wgpu_context.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Texture Readback Buffer"),
        size: (bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = wgpu_context.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Texture Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        texture.size(),
    );
    wgpu_context.queue.submit(Some(encoder.finish()));

    let data = map_staging(wgpu_context, &staging)?;
    let row_floats = (texture.width() * channels) as usize;
    let mut texels = Vec::with_capacity(row_floats * height as usize);
    for row in data.chunks_exact(bytes_per_row as usize) {
        let row: Vec<f32> = bytemuck::pod_collect_to_vec(&row[..row_floats * 4]);
        texels.extend_from_slice(&row);
    }
    Ok(texels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_result_passes_through_success() {
        let (tx, rx) = mpsc::channel();
        tx.send(Ok(())).unwrap();
        assert!(map_result(&rx).is_ok());
    }

    #[test]
    fn dropped_map_callback_is_an_error() {
        let (tx, rx): (_, MapReceiver) = mpsc::channel();
        drop(tx);
        assert!(matches!(map_result(&rx), Err(SkinningError::MapCallbackDropped)));
    }

    #[test]
    fn callback_that_has_not_run_is_an_error() {
        let (_tx, rx): (_, MapReceiver) = mpsc::channel();
        assert!(matches!(map_result(&rx), Err(SkinningError::MapCallbackDropped)));
    }
}
