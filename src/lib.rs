pub mod camera;
pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod math;
pub mod mesh;
pub mod renderer;
pub mod skinner;

pub use camera::{AlwaysVisible, Frustum, VisibilityTest};
pub use config::{BoneOrientation, SkinnerConfig};
pub use error::{Result, SkinningError};
pub use math::Aabb;
pub use mesh::{BlendShape, BlendShapeFrame, BoneWeight, SkinnedMesh};
pub use renderer::pipelines::SkinningPipelines;
pub use renderer::wgpu_context::WgpuContext;
pub use skinner::{FrameInput, FrameOutcome, SkinnedVertex, Skinner};

pub fn align_to_256(n: usize) -> usize {
    (n + 255) & !255
}
