use crate::assets::{ClipAsset, ClipHandle, MeshAsset, MeshHandle, SkeletonAsset, SkeletonHandle};
use crate::config::PipelineSettings;
use crate::events::PoseEvent;
use crate::library::AnimationLibrary;
use crate::model::{AnimatedModel, ModelId};
use crate::ops::{self, PoseContext};
use crate::scratch::PoseBuffers;
use crate::skinning::{assemble_skinning_matrices, RenderMatrix};
use std::path::Path;

/// Top-level driver: owns the asset library, the shared scratch buffers, and
/// every animated model. `advance` runs once per fixed-timestep frame.
pub struct PosePipeline {
    library: AnimationLibrary,
    buffers: PoseBuffers,
    models: Vec<AnimatedModel>,
    settings: PipelineSettings,
    events: Vec<PoseEvent>,
}

impl PosePipeline {
    pub fn new() -> Self {
        Self::with_settings(PipelineSettings::default())
    }

    pub fn with_settings(settings: PipelineSettings) -> Self {
        Self {
            library: AnimationLibrary::new(),
            buffers: PoseBuffers::new(),
            models: Vec::new(),
            settings,
            events: Vec::new(),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn library(&self) -> &AnimationLibrary {
        &self.library
    }

    // ---- loading; every successful load grows the shared buffers ----

    pub fn load_skeleton(&mut self, path: impl AsRef<Path>) -> SkeletonHandle {
        let handle = self.library.load_skeleton(path);
        self.buffers.grow_joints(self.library.max_joint_count());
        handle
    }

    pub fn add_skeleton(&mut self, asset: SkeletonAsset) -> SkeletonHandle {
        let handle = self.library.add_skeleton(asset);
        self.buffers.grow_joints(self.library.max_joint_count());
        handle
    }

    pub fn load_animation(&mut self, path: impl AsRef<Path>) -> ClipHandle {
        self.library.load_animation(path)
    }

    pub fn load_animations(&mut self, path: impl AsRef<Path>) -> Vec<ClipHandle> {
        self.library.load_animations(path)
    }

    pub fn add_clip(&mut self, asset: ClipAsset) -> ClipHandle {
        self.library.add_clip(asset)
    }

    pub fn load_mesh(&mut self, path: impl AsRef<Path>) -> MeshHandle {
        let handle = self.library.load_mesh(path);
        self.buffers.grow_skinning(self.library.total_skinning_matrices());
        handle
    }

    pub fn add_mesh(&mut self, asset: MeshAsset) -> MeshHandle {
        let handle = self.library.add_mesh(asset);
        self.buffers.grow_skinning(self.library.total_skinning_matrices());
        handle
    }

    // ---- models ----

    /// Binds a mesh and skeleton into a new animated model. Panics when
    /// either handle is invalid or the mesh references joints the skeleton
    /// lacks.
    pub fn spawn_model(&mut self, mesh: MeshHandle, skeleton: SkeletonHandle) -> ModelId {
        let id = ModelId::new(self.models.len());
        self.models.push(AnimatedModel::new(mesh, skeleton));
        id
    }

    pub fn model(&self, id: ModelId) -> &AnimatedModel {
        &self.models[id.index()]
    }

    pub fn model_mut(&mut self, id: ModelId) -> &mut AnimatedModel {
        &mut self.models[id.index()]
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Executes every model's operation queue, in queue insertion order per
    /// model, then derives skinning matrices and clears the queue. The shared
    /// scratch buffers make sequencing a hard invariant: one model's
    /// operations fully consume and finalize before the next model starts.
    pub fn advance(&mut self, dt: f32) {
        for (index, model) in self.models.iter_mut().enumerate() {
            let mut queue = std::mem::take(&mut model.queue);
            model.attachments.clear();
            model.pose_ready = false;

            // A paused model discards its queued operations unexecuted.
            if model.is_playing() && !queue.is_empty() {
                let skeleton = self.library.skeleton(model.skeleton());
                let mut ctx = PoseContext {
                    skeleton,
                    clips: self.library.clips(),
                    buffers: &mut self.buffers,
                    settings: &self.settings,
                    events: &mut self.events,
                    model_id: ModelId::new(index),
                };
                for op in &queue {
                    // First runtime failure leaves the pose at its last
                    // successfully computed state for this frame.
                    if !ops::run(op, model, &mut ctx, dt) {
                        break;
                    }
                }

                if model.pose_ready {
                    let mesh_handle = model.mesh();
                    let mesh = self.library.mesh(mesh_handle);
                    assemble_skinning_matrices(
                        mesh,
                        mesh_handle.skinning_offset as usize,
                        &self.buffers.models,
                        &mut self.buffers.skinning,
                        &mut self.buffers.render,
                    );
                }
            }

            // The queue is frame-scoped regardless of how execution went;
            // hand the emptied allocation back to the model.
            queue.clear();
            model.queue = queue;
        }
    }

    pub fn take_events(&mut self) -> Vec<PoseEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- render hand-off ----

    /// The full render-convention skinning palette, indexed by each mesh's
    /// reserved offset.
    pub fn render_palette(&self) -> &[RenderMatrix] {
        &self.buffers.render
    }

    /// The skinning matrices the palette mirrors, same indexing.
    pub fn skinning_matrices(&self) -> &[glam::Mat4] {
        &self.buffers.skinning
    }

    /// The palette slice reserved for one mesh.
    pub fn mesh_palette(&self, mesh: MeshHandle) -> &[RenderMatrix] {
        let offset = mesh.skinning_offset as usize;
        let count = self.library.mesh(mesh).skinning_matrix_count();
        &self.buffers.render[offset..offset + count]
    }
}

impl Default for PosePipeline {
    fn default() -> Self {
        Self::new()
    }
}
