use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use crate::camera::VisibilityTest;
use crate::config::{clamp_bulge_compensation, BoneOrientation, SkinnerConfig};
use crate::error::{Result, SkinningError};
use crate::layout::{self, DualQuaternion, VertexInfo};
use crate::math::Aabb;
use crate::mesh::SkinnedMesh;
use crate::renderer::bindgroups::skinned_data::{SkinnedDataBinding, SkinnedSurfaces};
use crate::renderer::pipelines::SkinningPipelines;
use crate::renderer::resources::SkinningResources;
use crate::renderer::utils;
use crate::renderer::wgpu_context::WgpuContext;

/// What the host supplies every frame.
pub struct FrameInput<'a> {
    /// World transform of every bone, ordered like `SkinnedMesh::bind_poses`.
    pub bone_transforms: &'a [Mat4],
    /// World transform of the skinned object itself.
    pub object_to_world: Mat4,
    /// World transform of the root bone, used to place the culling bounds.
    pub root_bone_to_world: Mat4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Skinner is stopped, nothing happened.
    Stopped,
    /// Bounds were updated but the renderable is not visible; no dispatch.
    Culled,
    Dispatched,
}

enum SkinnerState {
    Stopped,
    Started(Box<SkinningResources>),
}

/// One vertex as decoded from the skinned surfaces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkinnedVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec4,
}

/// Dual quaternion skinning of one mesh.
///
/// Stopped until [`Skinner::start`]; started, it owns every device buffer of
/// the mesh and records the bone DQ and blend kernels on each
/// [`Skinner::tick`]. [`Skinner::stop`] releases everything again.
pub struct Skinner {
    wgpu_context: Arc<WgpuContext>,
    pipelines: Arc<SkinningPipelines>,
    config: SkinnerConfig,
    mesh: SkinnedMesh,
    weights: Vec<f32>,
    world_bounds: Aabb,
    state: SkinnerState,
}

impl Skinner {
    pub fn new(
        wgpu_context: Arc<WgpuContext>,
        pipelines: Arc<SkinningPipelines>,
        mesh: SkinnedMesh,
        config: SkinnerConfig,
    ) -> Self {
        let mut config = config;
        config.bulge_compensation = clamp_bulge_compensation(config.bulge_compensation);
        Self {
            wgpu_context,
            pipelines,
            config,
            weights: vec![0.0; mesh.blend_shape_count()],
            world_bounds: mesh.bounds,
            mesh,
            state: SkinnerState::Stopped,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self.state, SkinnerState::Started(_))
    }

    /// Allocates all buffers for the current mesh and applies the current
    /// blend-shape weights. Starting a started skinner rebuilds everything.
    pub fn start(&mut self) -> Result<()> {
        // release before allocating
        self.state = SkinnerState::Stopped;

        let layout = layout::build_layout(&self.mesh, self.config.bone_orientation.axis())?;
        let mut resources = SkinningResources::new(&self.wgpu_context, &self.pipelines, layout)?;
        resources.apply_morphs(&self.wgpu_context, &self.pipelines, &self.weights)?;
        self.state = SkinnerState::Started(Box::new(resources));

        log::info!(
            "skinner started: {} vertices, {} bones, {} blend shapes",
            self.mesh.vertex_count(),
            self.mesh.bone_count(),
            self.mesh.blend_shape_count()
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        if let SkinnerState::Started(resources) = std::mem::replace(&mut self.state, SkinnerState::Stopped) {
            drop(resources);
            log::info!("skinner stopped, resources released");
        }
    }

    /// Replaces the mesh. A started skinner releases the old buffers and
    /// builds new ones; weights reset to zero.
    pub fn set_mesh(&mut self, mesh: SkinnedMesh) -> Result<()> {
        let was_started = self.is_started();
        self.stop();
        self.weights = vec![0.0; mesh.blend_shape_count()];
        self.world_bounds = mesh.bounds;
        self.mesh = mesh;
        if was_started {
            self.start()?;
        }
        Ok(())
    }

    pub fn mesh(&self) -> &SkinnedMesh {
        &self.mesh
    }

    pub fn config(&self) -> &SkinnerConfig {
        &self.config
    }

    /// One frame: refresh bounds, early-out when invisible, otherwise upload
    /// poses and dispatch bone DQ and blend. Never waits on the GPU.
    pub fn tick(&mut self, frame: &FrameInput, visibility: &impl VisibilityTest) -> Result<FrameOutcome> {
        let SkinnerState::Started(resources) = &self.state else {
            return Ok(FrameOutcome::Stopped);
        };
        if frame.bone_transforms.len() != self.mesh.bone_count() {
            return Err(SkinningError::PoseCountMismatch {
                expected: self.mesh.bone_count(),
                actual: frame.bone_transforms.len(),
            });
        }

        self.world_bounds = if self.config.view_frustum_culling {
            self.mesh.bounds.transform(&frame.root_bone_to_world)
        } else {
            Aabb::unbounded()
        };
        if !visibility.is_visible(&self.world_bounds) {
            log::trace!("skinned mesh culled");
            return Ok(FrameOutcome::Culled);
        }

        resources.dispatch_frame(
            &self.wgpu_context,
            &self.pipelines,
            frame.bone_transforms,
            frame.object_to_world.inverse(),
            self.config.bone_orientation.axis(),
            self.config.bulge_compensation,
        );
        Ok(FrameOutcome::Dispatched)
    }

    /// World bounds computed by the last tick.
    pub fn world_bounds(&self) -> Aabb {
        self.world_bounds
    }

    pub fn blend_shape_count(&self) -> usize {
        self.weights.len()
    }

    pub fn blend_shape_index(&self, name: &str) -> Option<usize> {
        self.mesh.blend_shape_index(name)
    }

    /// Current weights. Nominal range is 0..=100; values outside it are
    /// applied as given.
    pub fn blend_shape_weights(&self) -> Vec<f32> {
        self.weights.clone()
    }

    pub fn set_blend_shape_weights(&mut self, weights: &[f32]) -> Result<()> {
        if weights.len() != self.weights.len() {
            return Err(SkinningError::WeightCountMismatch {
                expected: self.weights.len(),
                actual: weights.len(),
            });
        }
        self.apply_weights(weights.to_vec())
    }

    pub fn blend_shape_weight(&self, index: usize) -> Result<f32> {
        self.weights
            .get(index)
            .copied()
            .ok_or(SkinningError::BlendShapeIndexOutOfRange {
                index,
                count: self.weights.len(),
            })
    }

    pub fn set_blend_shape_weight(&mut self, index: usize, weight: f32) -> Result<()> {
        if index >= self.weights.len() {
            return Err(SkinningError::BlendShapeIndexOutOfRange {
                index,
                count: self.weights.len(),
            });
        }
        let mut weights = self.weights.clone();
        weights[index] = weight;
        self.apply_weights(weights)
    }

    // weights only change once the morph pass accepted them
    fn apply_weights(&mut self, weights: Vec<f32>) -> Result<()> {
        if let SkinnerState::Started(resources) = &mut self.state {
            resources.apply_morphs(&self.wgpu_context, &self.pipelines, &weights)?;
        }
        self.weights = weights;
        Ok(())
    }

    pub fn view_frustum_culling(&self) -> bool {
        self.config.view_frustum_culling
    }

    /// Takes effect on the next tick.
    pub fn set_view_frustum_culling(&mut self, enabled: bool) {
        self.config.view_frustum_culling = enabled;
    }

    pub fn bulge_compensation(&self) -> f32 {
        self.config.bulge_compensation
    }

    pub fn set_bulge_compensation(&mut self, value: f32) {
        self.config.bulge_compensation = clamp_bulge_compensation(value);
    }

    pub fn bone_orientation(&self) -> BoneOrientation {
        self.config.bone_orientation
    }

    /// The new axis reaches the bone directions on the next tick; the
    /// per-vertex coefficients need [`Skinner::update_compensation_coefficients`].
    pub fn set_bone_orientation(&mut self, orientation: BoneOrientation) {
        self.config.bone_orientation = orientation;
    }

    /// Recomputes the per-vertex compensation coefficients for the current
    /// bone orientation, re-uploads the vertex buffer and re-applies morphs.
    /// Does nothing while stopped; `start` computes them anyway.
    pub fn update_compensation_coefficients(&mut self) -> Result<()> {
        let SkinnerState::Started(resources) = &mut self.state else {
            return Ok(());
        };
        let vertex_count = resources.vertex_count as usize;
        layout::update_compensation_coefficients(
            &mut resources.host_vertex_infos,
            vertex_count,
            &self.mesh.bind_poses,
            self.config.bone_orientation.axis(),
        );
        resources.upload_vertex_infos(&self.wgpu_context);
        resources.apply_morphs(&self.wgpu_context, &self.pipelines, &self.weights)
    }

    fn resources(&self) -> Result<&SkinningResources> {
        match &self.state {
            SkinnerState::Started(resources) => Ok(&**resources),
            SkinnerState::Stopped => Err(SkinningError::NotStarted),
        }
    }

    /// Surfaces the blend kernel writes into.
    pub fn surfaces(&self) -> Option<&SkinnedSurfaces> {
        self.resources().ok().map(|r| &r.surfaces)
    }

    /// Bind group for the shading stage, see [`SkinnedDataBinding::desc`].
    pub fn skinned_data_binding(&self) -> Option<&SkinnedDataBinding> {
        self.resources().ok().map(|r| &r.skinned_data)
    }

    /// `(width, height)` of the skinned surfaces.
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.surfaces().map(|s| (s.width, s.height))
    }

    /// Blocking readback of the skinned vertices. For diagnostics and tests.
    pub fn read_skinned_vertices(&self) -> Result<Vec<SkinnedVertex>> {
        let resources = self.resources()?;
        let surfaces = &resources.surfaces;
        let data_1 = utils::read_texture(&self.wgpu_context, &surfaces.data_1, 4)?;
        let data_2 = utils::read_texture(&self.wgpu_context, &surfaces.data_2, 4)?;
        let data_3 = utils::read_texture(&self.wgpu_context, &surfaces.data_3, 4)?;

        let vertices = (0..resources.vertex_count as usize)
            .map(|i| {
                let a = &data_1[i * 4..i * 4 + 4];
                let b = &data_2[i * 4..i * 4 + 4];
                let c = &data_3[i * 4..i * 4 + 2];
                SkinnedVertex {
                    position: Vec3::new(a[0], a[1], a[2]),
                    normal: Vec3::new(a[3], b[0], b[1]),
                    tangent: Vec4::new(b[2], b[3], c[0], c[1]),
                }
            })
            .collect();
        Ok(vertices)
    }

    /// Blocking readback of the vertex buffer the blend kernel reads.
    pub fn read_morphed_vertices(&self) -> Result<Vec<VertexInfo>> {
        let resources = self.resources()?;
        let mut infos: Vec<VertexInfo> = utils::read_buffer(&self.wgpu_context, resources.morphed_vertex_infos())?;
        infos.truncate(resources.vertex_count as usize);
        Ok(infos)
    }

    /// Blocking readback of this frame's per-bone dual quaternions.
    pub fn read_bone_dual_quaternions(&self) -> Result<Vec<DualQuaternion>> {
        let resources = self.resources()?;
        let mut dqs: Vec<DualQuaternion> = utils::read_buffer(&self.wgpu_context, &resources.skinned_dual_quaternions)?;
        dqs.truncate(resources.bone_count as usize);
        Ok(dqs)
    }
}

impl Drop for Skinner {
    fn drop(&mut self) {
        self.stop();
    }
}
