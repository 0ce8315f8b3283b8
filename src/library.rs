use crate::assets::{
    gltf, ClipAsset, ClipHandle, MeshAsset, MeshHandle, SkeletonAsset, SkeletonHandle,
};
use std::path::Path;

/// Owns every loaded skeleton, clip, and mesh by stable index. Indices are
/// never reused; a failed load yields an invalid handle rather than an error,
/// leaving fatal-vs-recoverable to the caller.
#[derive(Default)]
pub struct AnimationLibrary {
    skeletons: Vec<SkeletonAsset>,
    clips: Vec<ClipAsset>,
    meshes: Vec<MeshAsset>,
    max_joint_count: usize,
    max_soa_joint_count: usize,
    total_skinning_matrices: usize,
}

impl AnimationLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_skeleton(&mut self, path: impl AsRef<Path>) -> SkeletonHandle {
        let path_ref = path.as_ref();
        match gltf::load_skeleton(path_ref) {
            Ok(asset) => self.add_skeleton(asset),
            Err(err) => {
                eprintln!("[anim] couldn't load skeleton '{}': {err:?}", path_ref.display());
                SkeletonHandle::INVALID
            }
        }
    }

    pub fn add_skeleton(&mut self, asset: SkeletonAsset) -> SkeletonHandle {
        let index = self.skeletons.len() as i32;
        let handle = SkeletonHandle {
            index,
            joint_count: asset.joint_count() as u32,
            soa_joint_count: asset.soa_joint_count() as u32,
        };
        self.max_joint_count = self.max_joint_count.max(asset.joint_count());
        self.max_soa_joint_count = self.max_soa_joint_count.max(asset.soa_joint_count());
        self.skeletons.push(asset);
        handle
    }

    /// Loads the file's first animation; files authored with several clips
    /// should go through `load_animations`.
    pub fn load_animation(&mut self, path: impl AsRef<Path>) -> ClipHandle {
        let path_ref = path.as_ref();
        match gltf::load_clips(path_ref) {
            Ok(mut clips) if !clips.is_empty() => {
                if clips.len() > 1 {
                    eprintln!(
                        "[anim] '{}' holds {} animations; taking the first.",
                        path_ref.display(),
                        clips.len()
                    );
                }
                self.add_clip(clips.swap_remove(0))
            }
            Ok(_) => {
                eprintln!("[anim] '{}' holds no animations", path_ref.display());
                ClipHandle::INVALID
            }
            Err(err) => {
                eprintln!("[anim] couldn't load animation '{}': {err:?}", path_ref.display());
                ClipHandle::INVALID
            }
        }
    }

    pub fn load_animations(&mut self, path: impl AsRef<Path>) -> Vec<ClipHandle> {
        let path_ref = path.as_ref();
        match gltf::load_clips(path_ref) {
            Ok(clips) => clips.into_iter().map(|clip| self.add_clip(clip)).collect(),
            Err(err) => {
                eprintln!("[anim] couldn't load animations '{}': {err:?}", path_ref.display());
                Vec::new()
            }
        }
    }

    pub fn add_clip(&mut self, asset: ClipAsset) -> ClipHandle {
        let index = self.clips.len() as i32;
        let handle = ClipHandle {
            index,
            track_count: asset.track_count() as u32,
            duration: asset.duration,
        };
        self.clips.push(asset);
        handle
    }

    pub fn load_mesh(&mut self, path: impl AsRef<Path>) -> MeshHandle {
        let path_ref = path.as_ref();
        match gltf::load_mesh(path_ref) {
            Ok(asset) => self.add_mesh(asset),
            Err(err) => {
                eprintln!("[anim] couldn't load mesh '{}': {err:?}", path_ref.display());
                MeshHandle::INVALID
            }
        }
    }

    pub fn add_mesh(&mut self, asset: MeshAsset) -> MeshHandle {
        let index = self.meshes.len() as i32;
        // Each mesh reserves its slice of the shared skinning buffer.
        let handle = MeshHandle {
            index,
            highest_joint_index: asset.highest_joint_index() as u32,
            skinning_offset: self.total_skinning_matrices as u32,
        };
        self.total_skinning_matrices += asset.skinning_matrix_count();
        self.meshes.push(asset);
        handle
    }

    pub fn skeleton(&self, handle: SkeletonHandle) -> &SkeletonAsset {
        assert!(handle.is_valid(), "Looking up an invalid skeleton handle");
        &self.skeletons[handle.index as usize]
    }

    pub fn clip(&self, handle: ClipHandle) -> &ClipAsset {
        assert!(handle.is_valid(), "Looking up an invalid clip handle");
        &self.clips[handle.index as usize]
    }

    pub fn mesh(&self, handle: MeshHandle) -> &MeshAsset {
        assert!(handle.is_valid(), "Looking up an invalid mesh handle");
        &self.meshes[handle.index as usize]
    }

    pub(crate) fn clips(&self) -> &[ClipAsset] {
        &self.clips
    }

    /// Largest joint count across all loaded skeletons.
    pub fn max_joint_count(&self) -> usize {
        self.max_joint_count
    }

    pub fn max_soa_joint_count(&self) -> usize {
        self.max_soa_joint_count
    }

    /// Sum of remap-table lengths across all loaded meshes.
    pub fn total_skinning_matrices(&self) -> usize {
        self.total_skinning_matrices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Joint, MeshPart};
    use crate::pose::JointTransform;
    use glam::Mat4;
    use std::sync::Arc;

    fn two_joint_skeleton(name: &str) -> SkeletonAsset {
        SkeletonAsset::new(
            name,
            vec![
                Joint { name: Arc::from("root"), parent: None, rest: JointTransform::IDENTITY },
                Joint { name: Arc::from("tip"), parent: Some(0), rest: JointTransform::IDENTITY },
            ],
        )
    }

    #[test]
    fn handles_get_stable_indices_and_maxima_grow() {
        let mut library = AnimationLibrary::new();
        let first = library.add_skeleton(two_joint_skeleton("a"));
        let second = library.add_skeleton(two_joint_skeleton("b"));
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(library.max_joint_count(), 2);
        assert_eq!(first.joint_count, 2);
        assert_eq!(first.soa_joint_count, 1);
    }

    #[test]
    fn mesh_offsets_accumulate() {
        let mut library = AnimationLibrary::new();
        let part = MeshPart {
            joint_remaps: Arc::from([0u16, 1]),
            inverse_bind_poses: Arc::from([Mat4::IDENTITY, Mat4::IDENTITY]),
        };
        let first = library.add_mesh(MeshAsset::new("a", vec![part.clone()]));
        let second = library.add_mesh(MeshAsset::new("b", vec![part]));
        assert_eq!(first.skinning_offset, 0);
        assert_eq!(second.skinning_offset, 2);
        assert_eq!(library.total_skinning_matrices(), 4);
    }

    #[test]
    fn missing_file_yields_invalid_handles() {
        let mut library = AnimationLibrary::new();
        assert!(!library.load_skeleton("no/such/file.gltf").is_valid());
        assert!(!library.load_animation("no/such/file.gltf").is_valid());
        assert!(!library.load_mesh("no/such/file.gltf").is_valid());
    }
}
