use crate::assets::{ClipHandle, MeshHandle, SkeletonHandle};
use crate::ik::IkParams;
use crate::ops::PoseOp;
use crate::playback::AnimationHandle;
use glam::{Mat4, Vec3};
use smallvec::SmallVec;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelId(u32);

impl ModelId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A joint's model-space matrix captured for an external entity this frame
/// (a weapon following a hand, for example).
#[derive(Clone, Debug)]
pub struct JointAttachment {
    pub joint: String,
    pub transform: Mat4,
}

/// Binds one mesh and one skeleton to an entity, owns the per-clip playback
/// handles, and queues pose operations for the current frame. The queue is
/// frame-scoped: the pipeline destroys it after every `advance`, so callers
/// re-issue operations each frame they want effect.
pub struct AnimatedModel {
    mesh: MeshHandle,
    skeleton: SkeletonHandle,
    animations: HashMap<String, AnimationHandle>,
    pub(crate) queue: SmallVec<[PoseOp; 4]>,
    is_playing: bool,
    pub(crate) ik_has_reached: bool,
    pub(crate) active_animation: Option<String>,
    pub(crate) attachments: Vec<JointAttachment>,
    /// True once an operation produced a model-space pose this frame.
    pub(crate) pose_ready: bool,
}

impl AnimatedModel {
    pub(crate) fn new(mesh: MeshHandle, skeleton: SkeletonHandle) -> Self {
        assert!(skeleton.is_valid(), "Binding an animated model to an invalid skeleton");
        assert!(mesh.is_valid(), "Binding an animated model to an invalid mesh");
        assert!(
            skeleton.joint_count >= mesh.highest_joint_index,
            "The provided mesh doesn't match the skeleton"
        );
        Self {
            mesh,
            skeleton,
            animations: HashMap::new(),
            queue: SmallVec::new(),
            is_playing: true,
            ik_has_reached: false,
            active_animation: None,
            attachments: Vec::new(),
            pose_ready: false,
        }
    }

    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    pub fn skeleton(&self) -> SkeletonHandle {
        self.skeleton
    }

    /// Registers a clip under `name` if absent. Returns false and leaves the
    /// existing handle (including its playback phase) untouched when the name
    /// is already taken; use `replace_animation` to overwrite.
    pub fn add_animation(&mut self, name: &str, clip: ClipHandle, should_loop: bool) -> bool {
        self.assert_clip_matches(clip);
        if self.animations.contains_key(name) {
            return false;
        }
        self.animations.insert(name.to_string(), AnimationHandle::new(clip, should_loop));
        true
    }

    /// Registers a clip under `name`, overwriting any existing handle and
    /// resetting its playback phase.
    pub fn replace_animation(&mut self, name: &str, clip: ClipHandle, should_loop: bool) {
        self.assert_clip_matches(clip);
        self.animations.insert(name.to_string(), AnimationHandle::new(clip, should_loop));
    }

    fn assert_clip_matches(&self, clip: ClipHandle) {
        assert!(clip.is_valid(), "Registering an invalid animation clip");
        assert_eq!(
            clip.track_count, self.skeleton.joint_count,
            "Skeleton joints and animation tracks don't match"
        );
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.animations.contains_key(name)
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
    }

    pub fn resume(&mut self) {
        self.is_playing = true;
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Rewinds the named animation to its start.
    pub fn reset(&mut self, name: &str) {
        let handle = self
            .animations
            .get_mut(name)
            .unwrap_or_else(|| panic!("Resetting animation '{name}' that is not loaded"));
        handle.cursor.set_time_ratio(0.0);
    }

    pub fn set_playback_speed(&mut self, name: &str, speed: f32) {
        let handle = self
            .animations
            .get_mut(name)
            .unwrap_or_else(|| panic!("Animation '{name}' was not loaded"));
        handle.cursor.set_playback_speed(speed);
    }

    /// Sticky: set whenever an IK solve reports its target reached, until
    /// explicitly cleared.
    pub fn ik_has_reached(&self) -> bool {
        self.ik_has_reached
    }

    pub fn reset_ik_reached(&mut self) {
        self.ik_has_reached = false;
    }

    /// Attachment outputs computed this frame, in queue order.
    pub fn attachments(&self) -> &[JointAttachment] {
        &self.attachments
    }

    pub fn attachment(&self, joint: &str) -> Option<&Mat4> {
        self.attachments
            .iter()
            .find(|attachment| attachment.joint == joint)
            .map(|attachment| &attachment.transform)
    }

    pub fn animation_time_ratio(&self, name: &str) -> Option<f32> {
        self.animations.get(name).map(|handle| handle.cursor.time_ratio())
    }

    pub(crate) fn animation_mut(&mut self, name: &str) -> Option<&mut AnimationHandle> {
        self.animations.get_mut(name)
    }

    pub fn queued_operation_count(&self) -> usize {
        self.queue.len()
    }

    // ---- queueing; operations execute in insertion order at `advance` ----

    pub fn play(&mut self, name: &str, entity_transform: Mat4) {
        assert!(self.is_loaded(name), "Animation '{name}' was not loaded");
        self.is_playing = true;
        self.queue.push(PoseOp::Play { name: name.to_string(), entity_transform });
    }

    pub fn blend(&mut self, first: &str, second: &str, blend_factor: f32, entity_transform: Mat4) {
        assert!(self.is_loaded(first), "Animation '{first}' was not loaded");
        assert!(self.is_loaded(second), "Animation '{second}' was not loaded");
        assert!(
            (0.0..=1.0).contains(&blend_factor),
            "Blend factor must be between 0 and 1"
        );
        self.is_playing = true;
        self.queue.push(PoseOp::Blend {
            first: first.to_string(),
            second: second.to_string(),
            blend_factor,
            entity_transform,
        });
    }

    pub fn two_bone_ik(
        &mut self,
        start_joint: &str,
        mid_joint: &str,
        end_joint: &str,
        target: Vec3,
        pole: Vec3,
        params: IkParams,
        entity_transform: Mat4,
    ) {
        self.queue.push(PoseOp::TwoBoneIk {
            start_joint: start_joint.to_string(),
            mid_joint: mid_joint.to_string(),
            end_joint: end_joint.to_string(),
            target,
            pole,
            params,
            entity_transform,
        });
    }

    /// Orients the ankle joint to the surface normal; the normal is supplied
    /// in world space.
    pub fn plant_foot(
        &mut self,
        ankle_joint: &str,
        surface_normal: Vec3,
        pole: Vec3,
        params: IkParams,
        entity_transform: Mat4,
    ) {
        self.queue.push(PoseOp::PlantFoot {
            ankle_joint: ankle_joint.to_string(),
            surface_normal,
            pole,
            params,
            entity_transform,
        });
    }

    /// Captures the joint's model-space matrix (optionally re-scaled) into
    /// this frame's attachment outputs. Queue it after every operation that
    /// can move the joint.
    pub fn attach_to_joint(&mut self, joint: &str, local_scale: f32) {
        self.queue.push(PoseOp::JointAttach { joint: joint.to_string(), local_scale });
    }

    pub fn look_at(&mut self, joint: &str, target: Vec3) {
        self.queue.push(PoseOp::LookAt { joint: joint.to_string(), target });
    }
}
