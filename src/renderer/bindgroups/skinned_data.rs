use wgpu::util::DeviceExt as _;

use crate::layout::{surface_height, SURFACE_WIDTH};

/// Skinned vertex data, one texel per vertex at (i % width, i / width).
///
/// Storage buffers can't be bound to the vertex stage everywhere, so compute
/// output travels to rasterization through textures:
///
/// | surface  | format      | channels                |
/// |----------|-------------|-------------------------|
/// | data_1   | Rgba32Float | position.xyz, normal.x  |
/// | data_2   | Rgba32Float | normal.yz, tangent.xy   |
/// | data_3   | Rgba32Float | tangent.zw, unused      |
pub struct SkinnedSurfaces {
    pub data_1: wgpu::Texture,
    pub data_2: wgpu::Texture,
    pub data_3: wgpu::Texture,
    pub data_1_view: wgpu::TextureView,
    pub data_2_view: wgpu::TextureView,
    pub data_3_view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl SkinnedSurfaces {
    pub const DATA_1_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
    pub const DATA_2_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
    // rg32float has no storage support on downlevel GL
    pub const DATA_3_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

    pub fn new(device: &wgpu::Device, vertex_count: u32) -> Self {
        let width = SURFACE_WIDTH;
        let height = surface_height(vertex_count);
        let create = |label, format| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        };
        let data_1 = create("Skinned Data 1", Self::DATA_1_FORMAT);
        let data_2 = create("Skinned Data 2", Self::DATA_2_FORMAT);
        let data_3 = create("Skinned Data 3", Self::DATA_3_FORMAT);

        Self {
            data_1_view: data_1.create_view(&Default::default()),
            data_2_view: data_2.create_view(&Default::default()),
            data_3_view: data_3.create_view(&Default::default()),
            data_1,
            data_2,
            data_3,
            width,
            height,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
    pub _pad: [u32; 2],
}

/// What the shading stage binds to fetch skinned vertices with
/// `textureLoad(skinned_data_n, vec2(i % width, i / width), 0)`. The
/// surface size uniform at binding 3 is owned by the bind group.
pub struct SkinnedDataBinding {
    pub bind_group: wgpu::BindGroup,
}

impl SkinnedDataBinding {
    pub fn desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        const fn texture(binding: u32) -> wgpu::BindGroupLayoutEntry {
            wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }
        }
        const ENTRIES: &[wgpu::BindGroupLayoutEntry] = &[
            texture(0),
            texture(1),
            texture(2),
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ];
        wgpu::BindGroupLayoutDescriptor {
            entries: ENTRIES,
            label: Some("Skinned Data Bind Group Layout"),
        }
    }

    pub fn new(layout: &wgpu::BindGroupLayout, device: &wgpu::Device, surfaces: &SkinnedSurfaces) -> Self {
        let size = SurfaceSize {
            width: surfaces.width,
            height: surfaces.height,
            _pad: [0; 2],
        };
        let size_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skinned Data Size"),
            contents: bytemuck::cast_slice(&[size]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skinned Data Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&surfaces.data_1_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&surfaces.data_2_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&surfaces.data_3_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: size_buffer.as_entire_binding(),
                },
            ],
        });
        Self { bind_group }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_exposes_three_surfaces_and_size() {
        let desc = SkinnedDataBinding::desc();
        assert_eq!(desc.entries.len(), 4);
        assert!(desc
            .entries
            .iter()
            .all(|e| e.visibility == wgpu::ShaderStages::VERTEX));
    }

    #[test]
    fn surfaces_use_four_channel_float_storage() {
        for format in [
            SkinnedSurfaces::DATA_1_FORMAT,
            SkinnedSurfaces::DATA_2_FORMAT,
            SkinnedSurfaces::DATA_3_FORMAT,
        ] {
            assert_eq!(format, wgpu::TextureFormat::Rgba32Float);
            let features = format.guaranteed_format_features(wgpu::Features::empty());
            assert!(features.allowed_usages.contains(wgpu::TextureUsages::STORAGE_BINDING));
        }
    }
}
