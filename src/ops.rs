use crate::assets::{ClipAsset, SkeletonAsset};
use crate::config::PipelineSettings;
use crate::events::PoseEvent;
use crate::ik::{AimIkJob, IkParams, TwoBoneIkJob};
use crate::model::{AnimatedModel, JointAttachment, ModelId};
use crate::pose::{
    apply_model_correction, blend_layer_weights, blend_poses, local_to_model, sample_clip,
};
use crate::scratch::PoseBuffers;
use glam::{EulerRot, Mat4, Quat, Vec3};

// Middle joint rotation axis is fixed and depends on the skeleton rig.
const MID_BEND_AXIS: Vec3 = Vec3::NEG_Z;
const PLANT_FORWARD: Vec3 = Vec3::NEG_X;
const PLANT_UP: Vec3 = Vec3::Y;

/// One queued unit of pose work. Operations reference animations and joints
/// by name and carry the entity transform by value; they never own pipeline
/// state.
#[derive(Clone, Debug)]
pub enum PoseOp {
    Play {
        name: String,
        entity_transform: Mat4,
    },
    Blend {
        first: String,
        second: String,
        blend_factor: f32,
        entity_transform: Mat4,
    },
    TwoBoneIk {
        start_joint: String,
        mid_joint: String,
        end_joint: String,
        target: Vec3,
        pole: Vec3,
        params: IkParams,
        entity_transform: Mat4,
    },
    PlantFoot {
        ankle_joint: String,
        surface_normal: Vec3,
        pole: Vec3,
        params: IkParams,
        entity_transform: Mat4,
    },
    JointAttach {
        joint: String,
        local_scale: f32,
    },
    LookAt {
        joint: String,
        target: Vec3,
    },
}

/// Everything an operation may read or write while it runs. Built by the
/// driver per model, which is what serializes access to the shared buffers.
pub(crate) struct PoseContext<'a> {
    pub skeleton: &'a SkeletonAsset,
    pub clips: &'a [ClipAsset],
    pub buffers: &'a mut PoseBuffers,
    pub settings: &'a PipelineSettings,
    pub events: &'a mut Vec<PoseEvent>,
    pub model_id: ModelId,
}

/// Executes one operation. Returns false on a runtime (tier-2) failure; the
/// driver then drops the model's remaining operations for this frame.
pub(crate) fn run(
    op: &PoseOp,
    model: &mut AnimatedModel,
    ctx: &mut PoseContext<'_>,
    dt: f32,
) -> bool {
    match op {
        PoseOp::Play { name, entity_transform } => run_play(name, entity_transform, model, ctx, dt),
        PoseOp::Blend { first, second, blend_factor, entity_transform } => {
            run_blend(first, second, *blend_factor, entity_transform, model, ctx, dt)
        }
        PoseOp::TwoBoneIk {
            start_joint,
            mid_joint,
            end_joint,
            target,
            pole,
            params,
            entity_transform,
        } => run_two_bone_ik(
            start_joint,
            mid_joint,
            end_joint,
            *target,
            *pole,
            *params,
            entity_transform,
            model,
            ctx,
        ),
        PoseOp::PlantFoot { ankle_joint, surface_normal, pole, params, entity_transform } => {
            run_plant_foot(ankle_joint, *surface_normal, *pole, *params, entity_transform, model, ctx)
        }
        PoseOp::JointAttach { joint, local_scale } => {
            run_joint_attach(joint, *local_scale, model, ctx)
        }
        PoseOp::LookAt { joint, .. } => {
            eprintln!("[anim] look-at is not implemented; joint '{joint}' ignored");
            false
        }
    }
}

fn run_play(
    name: &str,
    entity_transform: &Mat4,
    model: &mut AnimatedModel,
    ctx: &mut PoseContext<'_>,
    dt: f32,
) -> bool {
    let joint_count = ctx.skeleton.joint_count();
    let changed = model.active_animation.as_deref() != Some(name);

    let handle = model
        .animation_mut(name)
        .unwrap_or_else(|| panic!("Animation '{name}' was not loaded"));
    // A different clip became active: playback must not inherit the phase
    // left behind by whatever played before.
    if changed {
        handle.cursor.set_time_ratio(0.0);
    }
    handle.cursor.set_looping(handle.should_loop);
    let clip_index = handle.clip.index as usize;
    let clip = &ctx.clips[clip_index];
    if handle.cursor.advance(clip.duration, dt) {
        ctx.events
            .push(PoseEvent::ClipWrapped { model: ctx.model_id, animation: name.to_string() });
    }
    let ratio = handle.cursor.time_ratio();
    if changed {
        model.active_animation = Some(name.to_string());
    }

    sample_clip(clip, ctx.skeleton, ratio, &mut ctx.buffers.locals[0][..joint_count]);
    // Publish the single layer as the frame's working pose so IK queued after
    // a plain play corrects what was actually sampled.
    ctx.buffers.blended[..joint_count].copy_from_slice(&ctx.buffers.locals[0][..joint_count]);
    local_to_model(
        ctx.skeleton,
        &ctx.buffers.blended,
        entity_transform,
        0..joint_count,
        &mut ctx.buffers.models,
    );
    model.pose_ready = true;
    true
}

fn run_blend(
    first: &str,
    second: &str,
    blend_factor: f32,
    entity_transform: &Mat4,
    model: &mut AnimatedModel,
    ctx: &mut PoseContext<'_>,
    dt: f32,
) -> bool {
    let joint_count = ctx.skeleton.joint_count();
    let changed = model.active_animation.as_deref() != Some(first);

    for (layer, name) in [first, second].into_iter().enumerate() {
        let handle = model
            .animation_mut(name)
            .unwrap_or_else(|| panic!("Animation '{name}' was not loaded"));
        if changed {
            handle.cursor.set_time_ratio(0.0);
        }
        handle.cursor.set_looping(handle.should_loop);
        let clip_index = handle.clip.index as usize;
        let clip = &ctx.clips[clip_index];
        // Each cursor advances against its own clip's duration.
        if handle.cursor.advance(clip.duration, dt) {
            ctx.events
                .push(PoseEvent::ClipWrapped { model: ctx.model_id, animation: name.to_string() });
        }
        let ratio = handle.cursor.time_ratio();
        sample_clip(clip, ctx.skeleton, ratio, &mut ctx.buffers.locals[layer][..joint_count]);
    }
    if changed {
        model.active_animation = Some(first.to_string());
    }

    let weights = blend_layer_weights(blend_factor);
    let (first_layer, rest) = ctx.buffers.locals.split_first().expect("two blend layers");
    blend_poses(
        first_layer,
        weights[0],
        &rest[0],
        weights[1],
        ctx.skeleton,
        ctx.settings.blend_threshold,
        &mut ctx.buffers.blended,
    );
    local_to_model(
        ctx.skeleton,
        &ctx.buffers.blended,
        entity_transform,
        0..joint_count,
        &mut ctx.buffers.models,
    );
    model.pose_ready = true;
    true
}

#[allow(clippy::too_many_arguments)]
fn run_two_bone_ik(
    start_joint: &str,
    mid_joint: &str,
    end_joint: &str,
    target: Vec3,
    pole: Vec3,
    params: IkParams,
    entity_transform: &Mat4,
    model: &mut AnimatedModel,
    ctx: &mut PoseContext<'_>,
) -> bool {
    if !model.pose_ready {
        eprintln!("[anim] two-bone IK needs a sampled pose earlier in the frame");
        return false;
    }
    let skeleton = ctx.skeleton;
    let start_index = skeleton
        .joint_index(start_joint)
        .unwrap_or_else(|| panic!("IK start joint '{start_joint}' not found"));
    let mid_index = skeleton
        .joint_index(mid_joint)
        .unwrap_or_else(|| panic!("IK mid joint '{mid_joint}' not found"));
    let end_index = skeleton
        .joint_index(end_joint)
        .unwrap_or_else(|| panic!("IK end joint '{end_joint}' not found"));

    let job = TwoBoneIkJob {
        target,
        pole_vector: pole,
        mid_axis: MID_BEND_AXIS,
        params,
        start_joint: &ctx.buffers.models[start_index],
        mid_joint: &ctx.buffers.models[mid_index],
        end_joint: &ctx.buffers.models[end_index],
    };
    let Some(output) = job.run() else {
        eprintln!("[anim] two-bone IK solve failed for chain starting at '{start_joint}'");
        return false;
    };
    if output.reached {
        model.ik_has_reached = true;
        ctx.events
            .push(PoseEvent::IkReached { model: ctx.model_id, joint: end_joint.to_string() });
    }

    apply_correction(ctx, entity_transform, start_index, output.start_correction);
    apply_correction(ctx, entity_transform, mid_index, output.mid_correction);
    // Only the corrected chain's subtree moved; everything above start_index
    // still holds this frame's propagation.
    let joint_count = skeleton.joint_count();
    local_to_model(
        skeleton,
        &ctx.buffers.blended,
        entity_transform,
        start_index..joint_count,
        &mut ctx.buffers.models,
    );
    true
}

fn run_plant_foot(
    ankle_joint: &str,
    surface_normal: Vec3,
    pole: Vec3,
    params: IkParams,
    entity_transform: &Mat4,
    model: &mut AnimatedModel,
    ctx: &mut PoseContext<'_>,
) -> bool {
    if !model.pose_ready {
        eprintln!("[anim] foot planting needs a sampled pose earlier in the frame");
        return false;
    }
    let skeleton = ctx.skeleton;
    let ankle_index = skeleton
        .joint_index(ankle_joint)
        .unwrap_or_else(|| panic!("Foot planting ankle joint '{ankle_joint}' not found"));

    // The solve runs in model space but the normal arrives in world space:
    // cancel the entity yaw, then take the result through the entity
    // transform.
    let (_, entity_rotation, _) = entity_transform.to_scale_rotation_translation();
    let (yaw, _, _) = entity_rotation.to_euler(EulerRot::YXZ);
    let unyawed = Quat::from_rotation_y(-yaw) * surface_normal;
    let target = entity_transform.transform_point3(unyawed);

    let job = AimIkJob {
        target,
        forward: PLANT_FORWARD,
        up: PLANT_UP,
        pole_vector: pole,
        weight: params.weight,
        twist_angle: params.twist_angle,
        joint: &ctx.buffers.models[ankle_index],
    };
    let Some(output) = job.run() else {
        eprintln!("[anim] foot planting solve failed for '{ankle_joint}'");
        return false;
    };
    model.ik_has_reached = true;
    ctx.events
        .push(PoseEvent::IkReached { model: ctx.model_id, joint: ankle_joint.to_string() });

    apply_correction(ctx, entity_transform, ankle_index, output.joint_correction);
    let joint_count = skeleton.joint_count();
    local_to_model(
        skeleton,
        &ctx.buffers.blended,
        entity_transform,
        ankle_index..joint_count,
        &mut ctx.buffers.models,
    );
    true
}

fn run_joint_attach(
    joint: &str,
    local_scale: f32,
    model: &mut AnimatedModel,
    ctx: &mut PoseContext<'_>,
) -> bool {
    if !model.pose_ready {
        eprintln!("[anim] joint attachment needs a posed model earlier in the frame");
        return false;
    }
    let index = ctx
        .skeleton
        .joint_index(joint)
        .unwrap_or_else(|| panic!("Attachment joint '{joint}' not found"));
    let transform = ctx.buffers.models[index] * Mat4::from_scale(Vec3::splat(local_scale));
    model.attachments.push(JointAttachment { joint: joint.to_string(), transform });
    true
}

fn apply_correction(
    ctx: &mut PoseContext<'_>,
    entity_transform: &Mat4,
    joint: usize,
    correction: Quat,
) {
    apply_model_correction(
        ctx.skeleton,
        &ctx.buffers.models,
        entity_transform,
        &mut ctx.buffers.blended,
        joint,
        correction,
    );
}
