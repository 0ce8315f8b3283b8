use crate::assets::MeshAsset;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Column-major skinning matrix in the layout the renderer uploads directly.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RenderMatrix(pub [f32; 16]);

impl RenderMatrix {
    pub const IDENTITY: Self =
        Self([1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
}

impl From<Mat4> for RenderMatrix {
    fn from(matrix: Mat4) -> Self {
        Self(matrix.to_cols_array())
    }
}

/// Builds skinning matrices from the final model-space pose. The mesh might
/// not be skinned by all skeleton joints; each part's joint remap table
/// reorders model-space matrices into the part's influence order. Writes both
/// the skinning buffer and its render mirror at the mesh's reserved offset.
pub fn assemble_skinning_matrices(
    mesh: &MeshAsset,
    offset: usize,
    models: &[Mat4],
    skinning: &mut [Mat4],
    render: &mut [RenderMatrix],
) {
    let mut cursor = offset;
    for part in mesh.parts.iter() {
        for (remap, inverse_bind) in
            part.joint_remaps.iter().zip(part.inverse_bind_poses.iter())
        {
            let matrix = models[*remap as usize] * *inverse_bind;
            skinning[cursor] = matrix;
            render[cursor] = RenderMatrix::from(matrix);
            cursor += 1;
        }
    }
}
