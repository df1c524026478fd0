pub mod bindgroups;
pub mod pipelines;
pub mod resources;
pub mod utils;
pub mod wgpu_context;
