use crate::pose::JointTransform;
use anyhow::{bail, Result};
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

pub mod gltf;

#[derive(Clone)]
pub struct Joint {
    pub name: Arc<str>,
    pub parent: Option<u16>,
    pub rest: JointTransform,
}

#[derive(Clone)]
pub struct SkeletonAsset {
    pub name: Arc<str>,
    pub joints: Arc<[Joint]>,
}

impl SkeletonAsset {
    /// Joints must be in topological order: a joint's parent always has a
    /// smaller index.
    pub fn new(name: impl Into<Arc<str>>, joints: Vec<Joint>) -> Self {
        for (index, joint) in joints.iter().enumerate() {
            if let Some(parent) = joint.parent {
                assert!(
                    (parent as usize) < index,
                    "Skeleton joint '{}' appears before its parent",
                    joint.name
                );
            }
        }
        Self { name: name.into(), joints: Arc::from(joints.into_boxed_slice()) }
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// SIMD-packed group count; informational, the pipeline samples joint-wise.
    pub fn soa_joint_count(&self) -> usize {
        (self.joints.len() + 3) / 4
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|joint| joint.name.as_ref() == name)
    }

    pub fn write_rest_pose(&self, out: &mut [JointTransform]) {
        for (joint, slot) in self.joints.iter().zip(out.iter_mut()) {
            *slot = joint.rest;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keyframe<T> {
    pub time: f32,
    pub value: T,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveInterpolation {
    Linear,
    Step,
}

#[derive(Clone)]
pub struct Vec3Curve {
    pub interpolation: CurveInterpolation,
    pub keyframes: Arc<[Keyframe<Vec3>]>,
}

impl Vec3Curve {
    pub fn from_keyframes(
        keyframes: Vec<Keyframe<Vec3>>,
        interpolation: CurveInterpolation,
    ) -> Result<Self> {
        Ok(Self { interpolation, keyframes: build_keyframes(keyframes)? })
    }
}

#[derive(Clone)]
pub struct QuatCurve {
    pub interpolation: CurveInterpolation,
    pub keyframes: Arc<[Keyframe<Quat>]>,
}

impl QuatCurve {
    pub fn from_keyframes(
        keyframes: Vec<Keyframe<Quat>>,
        interpolation: CurveInterpolation,
    ) -> Result<Self> {
        Ok(Self { interpolation, keyframes: build_keyframes(keyframes)? })
    }
}

/// Per-joint animation curves; any missing component falls back to the
/// skeleton's rest pose during sampling.
#[derive(Clone, Default)]
pub struct JointTrack {
    pub translation: Option<Vec3Curve>,
    pub rotation: Option<QuatCurve>,
    pub scale: Option<Vec3Curve>,
}

#[derive(Clone)]
pub struct ClipAsset {
    pub name: Arc<str>,
    pub duration: f32,
    pub tracks: Arc<[JointTrack]>,
}

impl ClipAsset {
    pub fn new(name: impl Into<Arc<str>>, duration: f32, tracks: Vec<JointTrack>) -> Self {
        Self { name: name.into(), duration, tracks: Arc::from(tracks.into_boxed_slice()) }
    }

    /// One track per joint of the skeleton the clip was authored for.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

#[derive(Clone)]
pub struct MeshPart {
    pub joint_remaps: Arc<[u16]>,
    pub inverse_bind_poses: Arc<[Mat4]>,
}

#[derive(Clone)]
pub struct MeshAsset {
    pub name: Arc<str>,
    pub parts: Arc<[MeshPart]>,
}

impl MeshAsset {
    pub fn new(name: impl Into<Arc<str>>, parts: Vec<MeshPart>) -> Self {
        for part in &parts {
            assert_eq!(
                part.joint_remaps.len(),
                part.inverse_bind_poses.len(),
                "Mesh part remap table and inverse bind poses must pair up"
            );
        }
        Self { name: name.into(), parts: Arc::from(parts.into_boxed_slice()) }
    }

    /// Total skinning matrices this mesh reserves in the shared buffer.
    pub fn skinning_matrix_count(&self) -> usize {
        self.parts.iter().map(|part| part.joint_remaps.len()).sum()
    }

    pub fn highest_joint_index(&self) -> u16 {
        self.parts
            .iter()
            .flat_map(|part| part.joint_remaps.iter().copied())
            .max()
            .unwrap_or(0)
    }
}

const INVALID_INDEX: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkeletonHandle {
    pub index: i32,
    pub joint_count: u32,
    pub soa_joint_count: u32,
}

impl SkeletonHandle {
    pub const INVALID: Self = Self { index: INVALID_INDEX, joint_count: 0, soa_joint_count: 0 };

    pub fn is_valid(&self) -> bool {
        self.index >= 0
    }
}

impl Default for SkeletonHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipHandle {
    pub index: i32,
    pub track_count: u32,
    pub duration: f32,
}

impl ClipHandle {
    pub const INVALID: Self = Self { index: INVALID_INDEX, track_count: 0, duration: 0.0 };

    pub fn is_valid(&self) -> bool {
        self.index >= 0
    }
}

impl Default for ClipHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshHandle {
    pub index: i32,
    pub highest_joint_index: u32,
    /// Start of this mesh's reserved range in the shared skinning buffer.
    pub skinning_offset: u32,
}

impl MeshHandle {
    pub const INVALID: Self =
        Self { index: INVALID_INDEX, highest_joint_index: 0, skinning_offset: 0 };

    pub fn is_valid(&self) -> bool {
        self.index >= 0
    }
}

impl Default for MeshHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

fn build_keyframes<T: Copy>(frames: Vec<Keyframe<T>>) -> Result<Arc<[Keyframe<T>]>> {
    let mut deduped: Vec<Keyframe<T>> = Vec::with_capacity(frames.len());
    for frame in frames {
        if !frame.time.is_finite() {
            bail!("Animation curve contains non-finite time value");
        }
        if frame.time < 0.0 {
            bail!("Animation curve time cannot be negative");
        }
        if let Some(last) = deduped.last_mut() {
            if frame.time < last.time {
                bail!("Animation curve keyframes must be sorted by time");
            }
            if (frame.time - last.time).abs() <= f32::EPSILON {
                last.value = frame.value;
                continue;
            }
        }
        deduped.push(frame);
    }
    Ok(Arc::from(deduped.into_boxed_slice()))
}
