use std::io;
use thiserror::Error;

/// Errors surfaced by mesh layout, weight mutation and GPU setup.
///
/// Nothing in here originates from a compute dispatch: dispatches are
/// fire-and-forget, and a malformed kernel input shows up as wrong output.
#[derive(Error, Debug)]
pub enum SkinningError {
    #[error("skinner is not started")]
    NotStarted,

    #[error("mesh has no vertices")]
    EmptyMesh,

    #[error("mesh has no bind poses")]
    NoBones,

    #[error("{attribute} has {actual} entries, expected {expected}")]
    AttributeCountMismatch {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("vertex {vertex} references bone {bone}, but only {bone_count} bones exist")]
    BoneIndexOutOfRange {
        vertex: usize,
        bone: u32,
        bone_count: usize,
    },

    #[error(
        "an array of weights must contain one entry per blend shape: \
         {expected} blend shapes are available but {actual} weights were passed"
    )]
    WeightCountMismatch { expected: usize, actual: usize },

    #[error("blend shape index {index} out of range (blend shape count: {count})")]
    BlendShapeIndexOutOfRange { index: usize, count: usize },

    #[error("blend shape {index} has a non-zero weight but no delta buffer")]
    MissingMorphDelta { index: usize },

    #[error("expected {expected} bone transforms, got {actual}")]
    PoseCountMismatch { expected: usize, actual: usize },

    #[error("shader validation failed for {label}: {message}")]
    ShaderValidation { label: String, message: String },

    #[error("device rejected the skinning resources: {message}")]
    ResourceValidation { message: String },

    #[error("{what} count {count} does not fit the device index range")]
    CountOverflow { what: &'static str, count: usize },

    #[error("buffer mapping callback was dropped before it ran")]
    MapCallbackDropped,

    #[error("no suitable GPU adapter: {0}")]
    AdapterUnavailable(#[from] wgpu::RequestAdapterError),

    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SkinningError>;
