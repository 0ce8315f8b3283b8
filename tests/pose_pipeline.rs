use glam::{Mat4, Quat, Vec3};
use merlin_anim::assets::{
    ClipAsset, CurveInterpolation, Joint, JointTrack, Keyframe, MeshAsset, MeshPart, SkeletonAsset,
    Vec3Curve,
};
use merlin_anim::pose::JointTransform;
use merlin_anim::{ModelId, PoseEvent, PosePipeline};
use std::sync::Arc;

fn chain_skeleton() -> SkeletonAsset {
    let mut joints = Vec::new();
    for index in 0..3u16 {
        joints.push(Joint {
            name: Arc::from(format!("joint_{index}").as_str()),
            parent: index.checked_sub(1),
            rest: JointTransform {
                translation: if index == 0 { Vec3::ZERO } else { Vec3::Y },
                rotation: Quat::IDENTITY,
                scale: Vec3::ONE,
            },
        });
    }
    SkeletonAsset::new("chain", joints)
}

fn full_mesh() -> MeshAsset {
    MeshAsset::new(
        "chain_mesh",
        vec![MeshPart {
            joint_remaps: Arc::from([0u16, 1, 2]),
            inverse_bind_poses: Arc::from([Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY]),
        }],
    )
}

/// A clip sliding the root joint along +X over one second.
fn slide_clip(name: &str, distance: f32) -> ClipAsset {
    let mut tracks = vec![JointTrack::default(); 3];
    tracks[0].translation = Some(
        Vec3Curve::from_keyframes(
            vec![
                Keyframe { time: 0.0, value: Vec3::ZERO },
                Keyframe { time: 1.0, value: Vec3::new(distance, 0.0, 0.0) },
            ],
            CurveInterpolation::Linear,
        )
        .unwrap(),
    );
    ClipAsset::new(name, 1.0, tracks)
}

fn rest_clip(name: &str) -> ClipAsset {
    ClipAsset::new(name, 1.0, vec![JointTrack::default(); 3])
}

struct Rig {
    pipeline: PosePipeline,
    model: ModelId,
}

fn spawn_rig(clips: &[(&str, ClipAsset, bool)]) -> Rig {
    let mut pipeline = PosePipeline::new();
    let skeleton = pipeline.add_skeleton(chain_skeleton());
    let mesh = pipeline.add_mesh(full_mesh());
    let model = pipeline.spawn_model(mesh, skeleton);
    for (name, clip, looped) in clips {
        let handle = pipeline.add_clip(clip.clone());
        pipeline.model_mut(model).add_animation(name, handle, *looped);
    }
    Rig { pipeline, model }
}

#[test]
fn blend_at_endpoints_matches_plain_playback() {
    let dt = 0.25;

    let mut played = spawn_rig(&[
        ("walk", slide_clip("walk", 1.0), true),
        ("run", slide_clip("run", 4.0), true),
    ]);
    played.pipeline.model_mut(played.model).play("walk", Mat4::IDENTITY);
    played.pipeline.advance(dt);
    let played_palette = played.pipeline.render_palette().to_vec();

    let mut blended = spawn_rig(&[
        ("walk", slide_clip("walk", 1.0), true),
        ("run", slide_clip("run", 4.0), true),
    ]);
    blended.pipeline.model_mut(blended.model).blend("walk", "run", 0.0, Mat4::IDENTITY);
    blended.pipeline.advance(dt);
    let blended_palette = blended.pipeline.render_palette().to_vec();

    for (a, b) in played_palette.iter().zip(blended_palette.iter()) {
        for (x, y) in a.0.iter().zip(b.0.iter()) {
            assert!((x - y).abs() < 1e-5, "factor 0 blend must equal playing the first clip");
        }
    }

    let mut played_second = spawn_rig(&[
        ("walk", slide_clip("walk", 1.0), true),
        ("run", slide_clip("run", 4.0), true),
    ]);
    played_second.pipeline.model_mut(played_second.model).play("run", Mat4::IDENTITY);
    played_second.pipeline.advance(dt);
    let second_palette = played_second.pipeline.render_palette().to_vec();

    let mut blended_full = spawn_rig(&[
        ("walk", slide_clip("walk", 1.0), true),
        ("run", slide_clip("run", 4.0), true),
    ]);
    blended_full.pipeline.model_mut(blended_full.model).blend("walk", "run", 1.0, Mat4::IDENTITY);
    blended_full.pipeline.advance(dt);
    let full_palette = blended_full.pipeline.render_palette().to_vec();

    for (a, b) in second_palette.iter().zip(full_palette.iter()) {
        for (x, y) in a.0.iter().zip(b.0.iter()) {
            assert!((x - y).abs() < 1e-5, "factor 1 blend must equal playing the second clip");
        }
    }
}

#[test]
fn queue_is_frame_scoped() {
    let mut rig = spawn_rig(&[("walk", slide_clip("walk", 1.0), true)]);
    rig.pipeline.model_mut(rig.model).play("walk", Mat4::IDENTITY);
    assert_eq!(rig.pipeline.model(rig.model).queued_operation_count(), 1);

    rig.pipeline.advance(0.25);
    assert_eq!(rig.pipeline.model(rig.model).queued_operation_count(), 0);
    let after_first = rig.pipeline.render_palette().to_vec();

    // Nothing was re-issued: the second frame must not replay frame one.
    rig.pipeline.advance(0.25);
    assert_eq!(rig.pipeline.model(rig.model).queued_operation_count(), 0);
    assert_eq!(rig.pipeline.render_palette(), after_first.as_slice());
    let ratio = rig.pipeline.model(rig.model).animation_time_ratio("walk").unwrap();
    assert!((ratio - 0.25).abs() < 1e-6, "idle frames must not advance playback");
}

#[test]
fn paused_model_discards_queued_operations() {
    let mut rig = spawn_rig(&[("walk", slide_clip("walk", 1.0), true)]);
    let before = rig.pipeline.render_palette().to_vec();

    rig.pipeline.model_mut(rig.model).play("walk", Mat4::IDENTITY);
    rig.pipeline.model_mut(rig.model).pause();
    rig.pipeline.advance(0.25);

    assert_eq!(rig.pipeline.model(rig.model).queued_operation_count(), 0);
    assert_eq!(rig.pipeline.render_palette(), before.as_slice());
    let ratio = rig.pipeline.model(rig.model).animation_time_ratio("walk").unwrap();
    assert_eq!(ratio, 0.0);
}

#[test]
fn switching_clips_resets_the_new_phase() {
    let mut rig = spawn_rig(&[
        ("walk", slide_clip("walk", 1.0), true),
        ("run", slide_clip("run", 4.0), true),
    ]);
    rig.pipeline.model_mut(rig.model).play("walk", Mat4::IDENTITY);
    rig.pipeline.advance(0.5);
    rig.pipeline.model_mut(rig.model).play("walk", Mat4::IDENTITY);
    rig.pipeline.advance(0.25);
    let walk_ratio = rig.pipeline.model(rig.model).animation_time_ratio("walk").unwrap();
    assert!((walk_ratio - 0.75).abs() < 1e-6, "same clip keeps accumulating");

    rig.pipeline.model_mut(rig.model).play("run", Mat4::IDENTITY);
    rig.pipeline.advance(0.25);
    let run_ratio = rig.pipeline.model(rig.model).animation_time_ratio("run").unwrap();
    assert!(
        (run_ratio - 0.25).abs() < 1e-6,
        "a newly active clip must not inherit the previous clip's phase"
    );
}

#[test]
fn looping_clip_emits_wrap_event() {
    let mut rig = spawn_rig(&[("walk", slide_clip("walk", 1.0), true)]);
    rig.pipeline.model_mut(rig.model).play("walk", Mat4::IDENTITY);
    rig.pipeline.advance(0.5);
    assert!(rig.pipeline.take_events().is_empty());

    rig.pipeline.model_mut(rig.model).play("walk", Mat4::IDENTITY);
    rig.pipeline.advance(0.75);
    let events = rig.pipeline.take_events();
    assert!(events.iter().any(|event| matches!(
        event,
        PoseEvent::ClipWrapped { animation, .. } if animation == "walk"
    )));
}

#[test]
fn one_shot_clip_clamps_at_the_end() {
    let mut rig = spawn_rig(&[("settle", slide_clip("settle", 1.0), false)]);
    rig.pipeline.model_mut(rig.model).play("settle", Mat4::IDENTITY);
    rig.pipeline.advance(0.8);
    rig.pipeline.model_mut(rig.model).play("settle", Mat4::IDENTITY);
    rig.pipeline.advance(0.8);
    let ratio = rig.pipeline.model(rig.model).animation_time_ratio("settle").unwrap();
    assert_eq!(ratio, 1.0);
}

#[test]
fn add_animation_keeps_existing_handle() {
    let mut rig = spawn_rig(&[("walk", slide_clip("walk", 1.0), true)]);
    let clip = rig.pipeline.add_clip(slide_clip("walk_v2", 2.0));

    rig.pipeline.model_mut(rig.model).play("walk", Mat4::IDENTITY);
    rig.pipeline.advance(0.5);

    assert!(!rig.pipeline.model_mut(rig.model).add_animation("walk", clip, true));
    let ratio = rig.pipeline.model(rig.model).animation_time_ratio("walk").unwrap();
    assert!((ratio - 0.5).abs() < 1e-6, "add-if-absent must not reset the phase");

    rig.pipeline.model_mut(rig.model).replace_animation("walk", clip, true);
    let ratio = rig.pipeline.model(rig.model).animation_time_ratio("walk").unwrap();
    assert_eq!(ratio, 0.0, "replace resets the phase");
}

#[test]
fn reset_rewinds_and_resume_continues() {
    let mut rig = spawn_rig(&[("walk", slide_clip("walk", 1.0), true)]);
    rig.pipeline.model_mut(rig.model).play("walk", Mat4::IDENTITY);
    rig.pipeline.advance(0.5);

    rig.pipeline.model_mut(rig.model).reset("walk");
    assert_eq!(rig.pipeline.model(rig.model).animation_time_ratio("walk"), Some(0.0));

    rig.pipeline.model_mut(rig.model).pause();
    assert!(!rig.pipeline.model(rig.model).is_playing());
    rig.pipeline.model_mut(rig.model).resume();
    assert!(rig.pipeline.model(rig.model).is_playing());

    rig.pipeline.model_mut(rig.model).play("walk", Mat4::IDENTITY);
    rig.pipeline.advance(0.25);
    let ratio = rig.pipeline.model(rig.model).animation_time_ratio("walk").unwrap();
    assert!((ratio - 0.25).abs() < 1e-6);
}

#[test]
#[should_panic(expected = "not loaded")]
fn resetting_an_unknown_animation_is_fatal() {
    let mut rig = spawn_rig(&[]);
    rig.pipeline.model_mut(rig.model).reset("missing");
}

#[test]
fn attachment_outputs_follow_the_posed_joint() {
    let mut rig = spawn_rig(&[("walk", slide_clip("walk", 1.0), true)]);
    rig.pipeline.model_mut(rig.model).play("walk", Mat4::IDENTITY);
    rig.pipeline.model_mut(rig.model).attach_to_joint("joint_2", 1.0);
    rig.pipeline.advance(0.5);

    let model = rig.pipeline.model(rig.model);
    let attachment = model.attachment("joint_2").expect("attachment captured this frame");
    // Root slid to x=0.5, two +Y offsets stack on top.
    let expected = Vec3::new(0.5, 2.0, 0.0);
    let position = attachment.w_axis.truncate();
    assert!(position.distance(expected) < 1e-5);
    assert!(model.attachment("joint_0").is_none());
}

#[test]
fn attachment_before_any_pose_op_fails_the_frame() {
    let mut rig = spawn_rig(&[("walk", slide_clip("walk", 1.0), true)]);
    let before = rig.pipeline.render_palette().to_vec();

    // Queue order is semantic: the attach runs first, finds no pose, and the
    // rest of the frame's operations are dropped.
    rig.pipeline.model_mut(rig.model).attach_to_joint("joint_2", 1.0);
    rig.pipeline.model_mut(rig.model).play("walk", Mat4::IDENTITY);
    rig.pipeline.advance(0.5);

    assert!(rig.pipeline.model(rig.model).attachment("joint_2").is_none());
    assert_eq!(rig.pipeline.render_palette(), before.as_slice());
    assert_eq!(rig.pipeline.model(rig.model).queued_operation_count(), 0);
}

#[test]
fn entity_transform_roots_the_pose() {
    let mut rig = spawn_rig(&[("rest", rest_clip("rest"), true)]);
    let entity = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
    rig.pipeline.model_mut(rig.model).play("rest", entity);
    rig.pipeline.advance(0.1);

    let palette = rig.pipeline.render_palette();
    let tip = Mat4::from_cols_array(&palette[2].0).w_axis.truncate();
    assert!(tip.distance(Vec3::new(10.0, 2.0, 0.0)) < 1e-5);
}

#[test]
#[should_panic(expected = "tracks don't match")]
fn mismatched_clip_is_rejected_at_bind_time() {
    let mut pipeline = PosePipeline::new();
    let skeleton = pipeline.add_skeleton(chain_skeleton());
    let mesh = pipeline.add_mesh(full_mesh());
    let model = pipeline.spawn_model(mesh, skeleton);

    let short_clip = ClipAsset::new("short", 1.0, vec![JointTrack::default(); 2]);
    let handle = pipeline.add_clip(short_clip);
    pipeline.model_mut(model).add_animation("short", handle, true);
}

#[test]
#[should_panic(expected = "was not loaded")]
fn playing_an_unknown_animation_is_fatal() {
    let mut rig = spawn_rig(&[]);
    rig.pipeline.model_mut(rig.model).play("missing", Mat4::IDENTITY);
}

#[test]
#[should_panic(expected = "Blend factor")]
fn out_of_range_blend_factor_is_fatal() {
    let mut rig = spawn_rig(&[
        ("walk", slide_clip("walk", 1.0), true),
        ("run", slide_clip("run", 4.0), true),
    ]);
    rig.pipeline.model_mut(rig.model).blend("walk", "run", 1.5, Mat4::IDENTITY);
}

#[test]
#[should_panic(expected = "doesn't match the skeleton")]
fn binding_a_mesh_with_unknown_joints_is_fatal() {
    let mut pipeline = PosePipeline::new();
    let skeleton = pipeline.add_skeleton(chain_skeleton());
    let oversized = MeshAsset::new(
        "oversized",
        vec![MeshPart {
            joint_remaps: Arc::from([7u16]),
            inverse_bind_poses: Arc::from([Mat4::IDENTITY]),
        }],
    );
    let mesh = pipeline.add_mesh(oversized);
    pipeline.spawn_model(mesh, skeleton);
}
