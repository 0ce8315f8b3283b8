use super::{
    ClipAsset, CurveInterpolation, Joint, JointTrack, Keyframe, MeshAsset, MeshPart, QuatCurve,
    SkeletonAsset, Vec3Curve,
};
use crate::pose::JointTransform;
use anyhow::{anyhow, bail, Context, Result};
use glam::{Mat4, Quat, Vec3};
use gltf::animation::util::{ReadOutputs, Rotations};
use gltf::animation::{Interpolation, Property};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub fn load_skeleton(path: impl AsRef<Path>) -> Result<SkeletonAsset> {
    let path_ref = path.as_ref();
    let (document, buffers, _) = gltf::import(path_ref)
        .with_context(|| format!("Failed to import GLTF skeleton from {}", path_ref.display()))?;
    let skin = read_skin(&document, &buffers, path_ref)?;
    Ok(SkeletonAsset::new(skin.name, skin.joints))
}

/// Imports every animation authored against the file's first skin. Track
/// tables are dense: one `JointTrack` per skin joint, untouched joints empty.
pub fn load_clips(path: impl AsRef<Path>) -> Result<Vec<ClipAsset>> {
    let path_ref = path.as_ref();
    let (document, buffers, _) = gltf::import(path_ref)
        .with_context(|| format!("Failed to import GLTF animations from {}", path_ref.display()))?;
    let skin = read_skin(&document, &buffers, path_ref)?;
    let joint_count = skin.joints.len();

    let mut clips = Vec::new();
    for (anim_index, animation) in document.animations().enumerate() {
        let clip_name: Arc<str> = animation
            .name()
            .map(|name| Arc::<str>::from(name.to_string()))
            .unwrap_or_else(|| Arc::<str>::from(format!("animation_{anim_index}")));

        let mut tracks: Vec<JointTrack> = vec![JointTrack::default(); joint_count];
        let mut any_channel = false;

        for channel in animation.channels() {
            let target_node = channel.target().node();
            let Some(&joint_index) = skin.node_to_joint.get(&target_node.index()) else {
                continue;
            };

            let interpolation = match channel.sampler().interpolation() {
                Interpolation::Linear => CurveInterpolation::Linear,
                Interpolation::Step => CurveInterpolation::Step,
                Interpolation::CubicSpline => {
                    eprintln!(
                        "[anim] animation '{}' uses CubicSpline interpolation; skipping channel (node {}).",
                        clip_name,
                        target_node.index()
                    );
                    continue;
                }
            };

            let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(inputs) = reader.read_inputs() else {
                continue;
            };
            let times: Vec<f32> = inputs.collect();
            if times.is_empty() {
                continue;
            }
            let Some(outputs) = reader.read_outputs() else {
                continue;
            };

            let track = &mut tracks[joint_index as usize];
            match (channel.target().property(), outputs) {
                (Property::Translation, ReadOutputs::Translations(values)) => {
                    let values: Vec<Vec3> = values.map(Vec3::from_array).collect();
                    track.translation =
                        Some(build_vec3_curve(&clip_name, &times, values, interpolation)?);
                    any_channel = true;
                }
                (Property::Scale, ReadOutputs::Scales(values)) => {
                    let values: Vec<Vec3> = values.map(Vec3::from_array).collect();
                    track.scale = Some(build_vec3_curve(&clip_name, &times, values, interpolation)?);
                    any_channel = true;
                }
                (Property::Rotation, ReadOutputs::Rotations(rotations)) => {
                    let values = convert_rotations(rotations);
                    track.rotation =
                        Some(build_quat_curve(&clip_name, &times, values, interpolation)?);
                    any_channel = true;
                }
                _ => {}
            }
        }

        if !any_channel {
            continue;
        }

        let mut duration = 0.0_f32;
        for track in &tracks {
            if let Some(curve) = &track.translation {
                duration = duration.max(curve.keyframes.last().map(|kf| kf.time).unwrap_or(0.0));
            }
            if let Some(curve) = &track.rotation {
                duration = duration.max(curve.keyframes.last().map(|kf| kf.time).unwrap_or(0.0));
            }
            if let Some(curve) = &track.scale {
                duration = duration.max(curve.keyframes.last().map(|kf| kf.time).unwrap_or(0.0));
            }
        }

        clips.push(ClipAsset { name: clip_name, duration, tracks: Arc::from(tracks.into_boxed_slice()) });
    }

    Ok(clips)
}

/// Imports the first skinned mesh: one part per primitive, remap table
/// listing only the skeleton joints the primitive actually weights.
pub fn load_mesh(path: impl AsRef<Path>) -> Result<MeshAsset> {
    let path_ref = path.as_ref();
    let (document, buffers, _) = gltf::import(path_ref)
        .with_context(|| format!("Failed to import GLTF mesh from {}", path_ref.display()))?;
    let skin = read_skin(&document, &buffers, path_ref)?;

    let node = document
        .nodes()
        .find(|node| node.mesh().is_some() && node.skin().is_some())
        .ok_or_else(|| anyhow!("GLTF '{}' has no skinned mesh node", path_ref.display()))?;
    let mesh = node.mesh().expect("node filtered on mesh presence");

    let mesh_name: Arc<str> = Arc::<str>::from(
        mesh.name()
            .map(|name| name.to_string())
            .or_else(|| path_ref.file_stem().and_then(|stem| stem.to_str()).map(str::to_string))
            .unwrap_or_else(|| "mesh".to_string()),
    );

    let mut parts = Vec::new();
    for primitive in mesh.primitives() {
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        let Some(joints) = reader.read_joints(0) else {
            continue;
        };
        let Some(weights) = reader.read_weights(0) else {
            continue;
        };

        let mut used = vec![false; skin.gltf_to_topo.len()];
        for (influence, weight) in joints.into_u16().zip(weights.into_f32()) {
            for lane in 0..4 {
                if weight[lane] > 0.0 {
                    let skin_joint = influence[lane] as usize;
                    if skin_joint >= used.len() {
                        bail!(
                            "GLTF '{}' primitive references joint {} beyond the skin",
                            path_ref.display(),
                            skin_joint
                        );
                    }
                    used[skin_joint] = true;
                }
            }
        }

        let mut remaps: Vec<u16> = used
            .iter()
            .enumerate()
            .filter(|(_, used)| **used)
            .map(|(skin_joint, _)| skin.gltf_to_topo[skin_joint])
            .collect();
        remaps.sort_unstable();
        let inverse_binds: Vec<Mat4> =
            remaps.iter().map(|&joint| skin.inverse_binds[joint as usize]).collect();

        parts.push(MeshPart {
            joint_remaps: Arc::from(remaps.into_boxed_slice()),
            inverse_bind_poses: Arc::from(inverse_binds.into_boxed_slice()),
        });
    }

    if parts.is_empty() {
        bail!("GLTF '{}' mesh has no skinned primitives", path_ref.display());
    }

    Ok(MeshAsset::new(mesh_name, parts))
}

struct SkinImport {
    name: Arc<str>,
    /// Topological (parent-before-child) order.
    joints: Vec<Joint>,
    /// GLTF node index to topological joint index.
    node_to_joint: HashMap<usize, u16>,
    /// Skin joint order to topological joint index.
    gltf_to_topo: Vec<u16>,
    /// Indexed by topological joint index.
    inverse_binds: Vec<Mat4>,
}

fn read_skin(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    path_ref: &Path,
) -> Result<SkinImport> {
    let mut skins = document.skins();
    let skin = skins
        .next()
        .ok_or_else(|| anyhow!("GLTF '{}' does not contain a skin", path_ref.display()))?;
    if skins.next().is_some() {
        eprintln!(
            "[anim] GLTF '{}' contains multiple skins; only the first will be imported.",
            path_ref.display()
        );
    }

    let skeleton_name: Arc<str> = Arc::<str>::from(
        skin.name()
            .map(|name| name.to_string())
            .or_else(|| {
                path_ref
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(|stem| format!("{stem}_skeleton"))
            })
            .unwrap_or_else(|| "skeleton".to_string()),
    );

    let joint_nodes: Vec<_> = skin.joints().collect();
    if joint_nodes.is_empty() {
        bail!("GLTF '{}' skin '{}' has no joints", path_ref.display(), skeleton_name);
    }

    let node_to_skin_joint: HashMap<usize, usize> =
        joint_nodes.iter().enumerate().map(|(idx, node)| (node.index(), idx)).collect();

    let mut parent_by_skin_joint: Vec<Option<usize>> = vec![None; joint_nodes.len()];
    for (parent_idx, node) in joint_nodes.iter().enumerate() {
        for child in node.children() {
            if let Some(&child_joint) = node_to_skin_joint.get(&child.index()) {
                parent_by_skin_joint[child_joint] = Some(parent_idx);
            }
        }
    }

    let skin_reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
    let mut inverse_bind_by_skin = vec![Mat4::IDENTITY; joint_nodes.len()];
    if let Some(reader) = skin_reader.read_inverse_bind_matrices() {
        for (idx, matrix) in reader.enumerate() {
            if idx < inverse_bind_by_skin.len() {
                inverse_bind_by_skin[idx] = Mat4::from_cols_array_2d(&matrix);
            }
        }
    }

    // Skin joint lists are not required to come parent-before-child; the
    // runtime pose math is, so joints are emitted in topological order.
    let joint_count = joint_nodes.len();
    let mut emit_order: Vec<usize> = Vec::with_capacity(joint_count);
    let mut emitted = vec![false; joint_count];
    while emit_order.len() < joint_count {
        let mut progressed = false;
        for skin_joint in 0..joint_count {
            if emitted[skin_joint] {
                continue;
            }
            let ready = match parent_by_skin_joint[skin_joint] {
                None => true,
                Some(parent) => emitted[parent],
            };
            if ready {
                emitted[skin_joint] = true;
                emit_order.push(skin_joint);
                progressed = true;
            }
        }
        if !progressed {
            bail!("GLTF '{}' skin '{}' joint hierarchy has a cycle", path_ref.display(), skeleton_name);
        }
    }

    let mut gltf_to_topo = vec![0u16; joint_count];
    for (topo_index, &skin_joint) in emit_order.iter().enumerate() {
        gltf_to_topo[skin_joint] = topo_index as u16;
    }

    let mut joints = Vec::with_capacity(joint_count);
    let mut node_to_joint = HashMap::with_capacity(joint_count);
    let mut inverse_binds = vec![Mat4::IDENTITY; joint_count];
    for (topo_index, &skin_joint) in emit_order.iter().enumerate() {
        let node = &joint_nodes[skin_joint];
        let joint_name =
            node.name().map(|name| name.to_string()).unwrap_or_else(|| format!("joint_{topo_index}"));
        let (translation, rotation, scale) = node.transform().decomposed();
        let rest = JointTransform {
            translation: Vec3::from_array(translation),
            rotation: normalize_or_identity(Quat::from_xyzw(
                rotation[0],
                rotation[1],
                rotation[2],
                rotation[3],
            )),
            scale: Vec3::from_array(scale),
        };
        joints.push(Joint {
            name: Arc::<str>::from(joint_name),
            parent: parent_by_skin_joint[skin_joint].map(|parent| gltf_to_topo[parent]),
            rest,
        });
        node_to_joint.insert(node.index(), topo_index as u16);
        inverse_binds[topo_index] = inverse_bind_by_skin[skin_joint];
    }

    Ok(SkinImport { name: skeleton_name, joints, node_to_joint, gltf_to_topo, inverse_binds })
}

fn build_vec3_curve(
    clip_name: &Arc<str>,
    times: &[f32],
    values: Vec<Vec3>,
    interpolation: CurveInterpolation,
) -> Result<Vec3Curve> {
    if values.len() != times.len() {
        bail!("Animation '{clip_name}' channel time/value count mismatch");
    }
    let frames = times
        .iter()
        .zip(values)
        .map(|(&time, value)| Keyframe { time, value })
        .collect();
    Vec3Curve::from_keyframes(frames, interpolation)
        .with_context(|| format!("Animation '{clip_name}' has an invalid channel"))
}

fn build_quat_curve(
    clip_name: &Arc<str>,
    times: &[f32],
    values: Vec<Quat>,
    interpolation: CurveInterpolation,
) -> Result<QuatCurve> {
    if values.len() != times.len() {
        bail!("Animation '{clip_name}' channel time/value count mismatch");
    }
    let frames = times
        .iter()
        .zip(values)
        .map(|(&time, value)| Keyframe { time, value })
        .collect();
    QuatCurve::from_keyframes(frames, interpolation)
        .with_context(|| format!("Animation '{clip_name}' has an invalid channel"))
}

fn convert_rotations(rotations: Rotations) -> Vec<Quat> {
    rotations
        .into_f32()
        .map(|components| {
            normalize_or_identity(Quat::from_xyzw(
                components[0],
                components[1],
                components[2],
                components[3],
            ))
        })
        .collect()
}

fn normalize_or_identity(quat: Quat) -> Quat {
    if quat.length_squared() > 0.0 {
        quat.normalize()
    } else {
        Quat::IDENTITY
    }
}
