use glam::{Mat4, Quat, Vec3};
use merlin_anim::assets::{ClipAsset, Joint, JointTrack, MeshAsset, MeshPart, SkeletonAsset};
use merlin_anim::pose::JointTransform;
use merlin_anim::{PosePipeline, RenderMatrix};
use std::sync::Arc;

fn five_joint_chain() -> SkeletonAsset {
    let joints = (0..5u16)
        .map(|index| Joint {
            name: Arc::from(format!("joint_{index}").as_str()),
            parent: index.checked_sub(1),
            rest: JointTransform {
                translation: Vec3::new(0.0, 1.0, 0.0),
                rotation: Quat::IDENTITY,
                scale: Vec3::ONE,
            },
        })
        .collect();
    SkeletonAsset::new("chain", joints)
}

fn rest_clip(joint_count: usize) -> ClipAsset {
    ClipAsset::new("rest", 1.0, vec![JointTrack::default(); joint_count])
}

fn expected_chain_models() -> Vec<Mat4> {
    // Rest pose stacks one +Y per joint.
    (0..5).map(|index| Mat4::from_translation(Vec3::new(0.0, (index + 1) as f32, 0.0))).collect()
}

#[test]
fn palette_applies_remap_table_and_inverse_binds() {
    let inverse_binds: Vec<Mat4> = vec![
        Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)),
        Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0)),
        Mat4::from_rotation_z(0.5),
    ];
    let mesh_asset = MeshAsset::new(
        "subset",
        vec![MeshPart {
            joint_remaps: Arc::from([3u16, 1, 4]),
            inverse_bind_poses: Arc::from(inverse_binds.clone().into_boxed_slice()),
        }],
    );

    let mut pipeline = PosePipeline::new();
    let skeleton = pipeline.add_skeleton(five_joint_chain());
    let mesh = pipeline.add_mesh(mesh_asset);
    let model = pipeline.spawn_model(mesh, skeleton);
    let clip = pipeline.add_clip(rest_clip(5));
    pipeline.model_mut(model).add_animation("rest", clip, true);

    pipeline.model_mut(model).play("rest", Mat4::IDENTITY);
    pipeline.advance(0.1);

    let models = expected_chain_models();
    let palette = pipeline.mesh_palette(mesh);
    assert_eq!(palette.len(), 3);
    assert_eq!(palette[0], RenderMatrix::from(models[3] * inverse_binds[0]));
    assert_eq!(palette[1], RenderMatrix::from(models[1] * inverse_binds[1]));
    assert_eq!(palette[2], RenderMatrix::from(models[4] * inverse_binds[2]));
}

#[test]
fn palette_spans_multiple_parts() {
    let part_a = MeshPart {
        joint_remaps: Arc::from([0u16, 2]),
        inverse_bind_poses: Arc::from([Mat4::IDENTITY, Mat4::IDENTITY]),
    };
    let part_b = MeshPart {
        joint_remaps: Arc::from([4u16]),
        inverse_bind_poses: Arc::from([Mat4::IDENTITY]),
    };
    let mesh_asset = MeshAsset::new("two_parts", vec![part_a, part_b]);

    let mut pipeline = PosePipeline::new();
    let skeleton = pipeline.add_skeleton(five_joint_chain());
    let mesh = pipeline.add_mesh(mesh_asset);
    let model = pipeline.spawn_model(mesh, skeleton);
    let clip = pipeline.add_clip(rest_clip(5));
    pipeline.model_mut(model).add_animation("rest", clip, true);

    pipeline.model_mut(model).play("rest", Mat4::IDENTITY);
    pipeline.advance(0.1);

    let models = expected_chain_models();
    let palette = pipeline.mesh_palette(mesh);
    assert_eq!(palette.len(), 3);
    assert_eq!(palette[0], RenderMatrix::from(models[0]));
    assert_eq!(palette[1], RenderMatrix::from(models[2]));
    assert_eq!(palette[2], RenderMatrix::from(models[4]));
}

#[test]
fn meshes_keep_disjoint_palette_ranges() {
    let make_mesh = |name: &str, remaps: &[u16]| {
        MeshAsset::new(
            name,
            vec![MeshPart {
                joint_remaps: Arc::from(remaps),
                inverse_bind_poses: Arc::from(vec![Mat4::IDENTITY; remaps.len()].into_boxed_slice()),
            }],
        )
    };

    let mut pipeline = PosePipeline::new();
    let skeleton = pipeline.add_skeleton(five_joint_chain());
    let mesh_a = pipeline.add_mesh(make_mesh("a", &[0, 1]));
    let mesh_b = pipeline.add_mesh(make_mesh("b", &[2, 3, 4]));
    assert_eq!(mesh_a.skinning_offset, 0);
    assert_eq!(mesh_b.skinning_offset, 2);
    assert_eq!(pipeline.render_palette().len(), 5);

    let model_a = pipeline.spawn_model(mesh_a, skeleton);
    let model_b = pipeline.spawn_model(mesh_b, skeleton);
    let clip = pipeline.add_clip(rest_clip(5));
    pipeline.model_mut(model_a).add_animation("rest", clip, true);
    pipeline.model_mut(model_b).add_animation("rest", clip, true);

    let entity_a = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
    let entity_b = Mat4::from_translation(Vec3::new(-10.0, 0.0, 0.0));
    pipeline.model_mut(model_a).play("rest", entity_a);
    pipeline.model_mut(model_b).play("rest", entity_b);
    pipeline.advance(0.1);

    // Each model finalized into its own mesh's reserved range even though
    // both shared the scratch buffers within the frame.
    let palette_a = pipeline.mesh_palette(mesh_a);
    let root_a = Mat4::from_cols_array(&palette_a[0].0).w_axis.truncate();
    assert!(root_a.distance(Vec3::new(10.0, 1.0, 0.0)) < 1e-5);

    let palette_b = pipeline.mesh_palette(mesh_b);
    let joint4_b = Mat4::from_cols_array(&palette_b[2].0).w_axis.truncate();
    assert!(joint4_b.distance(Vec3::new(-10.0, 5.0, 0.0)) < 1e-5);
}
