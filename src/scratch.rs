use crate::pose::{JointTransform, MAX_BLEND_LAYERS};
use crate::skinning::RenderMatrix;
use glam::Mat4;

/// Shared scratch state for the whole pipeline: per-layer local poses, the
/// blended local pose, the model-space pose, and the skinning buffer with its
/// render-convention mirror. Grown to the largest skeleton/mesh ever loaded,
/// never shrunk, and reused by every model each frame — which is why the
/// driver must fully finish one model before starting the next.
#[derive(Default)]
pub struct PoseBuffers {
    pub locals: [Vec<JointTransform>; MAX_BLEND_LAYERS],
    pub blended: Vec<JointTransform>,
    pub models: Vec<Mat4>,
    pub skinning: Vec<Mat4>,
    pub render: Vec<RenderMatrix>,
}

impl PoseBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures every pose buffer covers `joint_count` joints.
    pub fn grow_joints(&mut self, joint_count: usize) {
        for layer in &mut self.locals {
            if layer.len() < joint_count {
                layer.resize(joint_count, JointTransform::IDENTITY);
            }
        }
        if self.blended.len() < joint_count {
            self.blended.resize(joint_count, JointTransform::IDENTITY);
        }
        if self.models.len() < joint_count {
            self.models.resize(joint_count, Mat4::IDENTITY);
        }
    }

    /// Ensures the skinning buffer and its render mirror cover the sum of all
    /// loaded meshes' remap-table lengths.
    pub fn grow_skinning(&mut self, matrix_count: usize) {
        if self.skinning.len() < matrix_count {
            self.skinning.resize(matrix_count, Mat4::IDENTITY);
            self.render.resize(matrix_count, RenderMatrix::IDENTITY);
        }
    }

    pub fn joint_capacity(&self) -> usize {
        self.models.len()
    }

    pub fn skinning_capacity(&self) -> usize {
        self.skinning.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_grow_and_never_shrink() {
        let mut buffers = PoseBuffers::new();
        buffers.grow_joints(12);
        buffers.grow_skinning(20);
        assert_eq!(buffers.joint_capacity(), 12);
        assert_eq!(buffers.skinning_capacity(), 20);

        buffers.grow_joints(4);
        buffers.grow_skinning(8);
        assert_eq!(buffers.joint_capacity(), 12);
        assert_eq!(buffers.skinning_capacity(), 20);

        for layer in &buffers.locals {
            assert_eq!(layer.len(), 12);
        }
        assert_eq!(buffers.blended.len(), 12);
        assert_eq!(buffers.render.len(), 20);
    }
}
