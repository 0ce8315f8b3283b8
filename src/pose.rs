use crate::assets::{ClipAsset, CurveInterpolation, QuatCurve, SkeletonAsset, Vec3Curve};
use glam::{Mat4, Quat, Vec3};
use std::ops::Range;

/// Maximum simultaneous blend inputs. Layer buffers and blend weights are
/// sized against this.
pub const MAX_BLEND_LAYERS: usize = 2;

/// One joint's parent-relative transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl JointTransform {
    pub const IDENTITY: Self =
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE };

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for JointTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Evaluates every track of `clip` at `time_ratio` into a local-space pose,
/// falling back to the skeleton rest pose per missing curve component.
pub fn sample_clip(
    clip: &ClipAsset,
    skeleton: &SkeletonAsset,
    time_ratio: f32,
    out: &mut [JointTransform],
) {
    debug_assert_eq!(clip.track_count(), skeleton.joint_count());
    let time = time_ratio.clamp(0.0, 1.0) * clip.duration;
    for (index, joint) in skeleton.joints.iter().enumerate() {
        let track = &clip.tracks[index];
        let rest = joint.rest;
        out[index] = JointTransform {
            translation: track
                .translation
                .as_ref()
                .map_or(rest.translation, |curve| sample_vec3(curve, time, rest.translation)),
            rotation: track
                .rotation
                .as_ref()
                .map_or(rest.rotation, |curve| sample_quat(curve, time, rest.rotation)),
            scale: track
                .scale
                .as_ref()
                .map_or(rest.scale, |curve| sample_vec3(curve, time, rest.scale)),
        };
    }
}

fn sample_vec3(curve: &Vec3Curve, time: f32, fallback: Vec3) -> Vec3 {
    let keys = curve.keyframes.as_ref();
    let Some(first) = keys.first() else {
        return fallback;
    };
    if time <= first.time {
        return first.value;
    }
    let last = keys.last().expect("non-empty checked above");
    if time >= last.time {
        return last.value;
    }
    let next = keys.partition_point(|kf| kf.time <= time);
    let (start, end) = (&keys[next - 1], &keys[next]);
    match curve.interpolation {
        CurveInterpolation::Step => start.value,
        CurveInterpolation::Linear => {
            let alpha = (time - start.time) / (end.time - start.time);
            start.value.lerp(end.value, alpha)
        }
    }
}

fn sample_quat(curve: &QuatCurve, time: f32, fallback: Quat) -> Quat {
    let keys = curve.keyframes.as_ref();
    let Some(first) = keys.first() else {
        return fallback;
    };
    if time <= first.time {
        return first.value;
    }
    let last = keys.last().expect("non-empty checked above");
    if time >= last.time {
        return last.value;
    }
    let next = keys.partition_point(|kf| kf.time <= time);
    let (start, end) = (&keys[next - 1], &keys[next]);
    match curve.interpolation {
        CurveInterpolation::Step => start.value,
        CurveInterpolation::Linear => {
            let alpha = (time - start.time) / (end.time - start.time);
            start.value.slerp(end.value, alpha)
        }
    }
}

/// Per-layer blend weights: a symmetric tent around each layer's evenly
/// spaced center. For two layers this is the `1-f` / `f` crossfade, so the
/// weights always sum to 1 over `factor` in [0, 1].
pub fn blend_layer_weights(blend_factor: f32) -> [f32; MAX_BLEND_LAYERS] {
    let intervals = (MAX_BLEND_LAYERS - 1) as f32;
    let interval = 1.0 / intervals;
    let mut weights = [0.0; MAX_BLEND_LAYERS];
    for (layer, weight) in weights.iter_mut().enumerate() {
        let center = layer as f32 * interval;
        *weight = ((interval - (blend_factor - center).abs()) * intervals).max(0.0);
    }
    weights
}

/// Weighted average of two local poses. Rotations blend spherically; a weight
/// sum at or below `threshold` falls back to the skeleton rest pose.
pub fn blend_poses(
    first: &[JointTransform],
    first_weight: f32,
    second: &[JointTransform],
    second_weight: f32,
    skeleton: &SkeletonAsset,
    threshold: f32,
    out: &mut [JointTransform],
) {
    let joint_count = skeleton.joint_count();
    let sum = first_weight + second_weight;
    if sum <= threshold {
        skeleton.write_rest_pose(&mut out[..joint_count]);
        return;
    }
    let alpha = second_weight / sum;
    for index in 0..joint_count {
        let a = &first[index];
        let b = &second[index];
        out[index] = JointTransform {
            translation: a.translation.lerp(b.translation, alpha),
            rotation: a.rotation.slerp(b.rotation, alpha),
            scale: a.scale.lerp(b.scale, alpha),
        };
    }
}

/// Composes local transforms into model-space matrices over `range`, walking
/// parent-before-child. Joints without a parent compose with `root` (the
/// entity world transform). Ancestors below `range.start` must already hold
/// valid model-space matrices from an earlier pass.
pub fn local_to_model(
    skeleton: &SkeletonAsset,
    locals: &[JointTransform],
    root: &Mat4,
    range: Range<usize>,
    models: &mut [Mat4],
) {
    let to = range.end.min(skeleton.joint_count());
    for index in range.start..to {
        let local = locals[index].to_mat4();
        models[index] = match skeleton.joints[index].parent {
            Some(parent) => models[parent as usize] * local,
            None => *root * local,
        };
    }
}

/// Applies a model-space rotation correction to one joint's local rotation.
/// The correction is conjugated into the joint's parent space and
/// left-multiplied onto the local rotation, so the joint's subtree rotates
/// about the joint position once model matrices are recomputed.
pub fn apply_model_correction(
    skeleton: &SkeletonAsset,
    models: &[Mat4],
    root: &Mat4,
    locals: &mut [JointTransform],
    joint: usize,
    correction: Quat,
) {
    let parent_rotation = match skeleton.joints[joint].parent {
        Some(parent) => models[parent as usize].to_scale_rotation_translation().1,
        None => root.to_scale_rotation_translation().1,
    };
    let local_correction = parent_rotation.inverse() * correction * parent_rotation;
    locals[joint].rotation = (local_correction * locals[joint].rotation).normalize();
}
