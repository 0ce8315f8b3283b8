use glam::{Mat4, Quat, Vec3};

const EPSILON_SQ: f32 = 1e-8;

/// Distance slack for the `reached` signal.
pub const SOLVER_TOLERANCE: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IkParams {
    pub weight: f32,
    /// Fraction of the chain length the solver is allowed to fully extend to.
    pub soften: f32,
    pub twist_angle: f32,
}

impl Default for IkParams {
    fn default() -> Self {
        Self { weight: 1.0, soften: 1.0, twist_angle: 0.0 }
    }
}

/// Analytic three-joint chain solve. Inputs are current model-space matrices;
/// outputs are model-space rotation corrections for the start and mid joints,
/// to be applied to the local pose and followed by a partial re-propagation.
pub struct TwoBoneIkJob<'a> {
    pub target: Vec3,
    pub pole_vector: Vec3,
    /// Bend-plane fallback axis in the mid joint's local space; the rig's
    /// fixed hinge axis. Only consulted when the chain is collinear.
    pub mid_axis: Vec3,
    pub params: IkParams,
    pub start_joint: &'a Mat4,
    pub mid_joint: &'a Mat4,
    pub end_joint: &'a Mat4,
}

#[derive(Clone, Copy, Debug)]
pub struct TwoBoneIkOutput {
    pub start_correction: Quat,
    pub mid_correction: Quat,
    pub reached: bool,
}

impl TwoBoneIkJob<'_> {
    /// Returns `None` when the chain or target is degenerate (zero-length
    /// bones, target on the start joint) and no solve is possible.
    pub fn run(&self) -> Option<TwoBoneIkOutput> {
        let start = self.start_joint.w_axis.truncate();
        let mid = self.mid_joint.w_axis.truncate();
        let end = self.end_joint.w_axis.truncate();

        let start_to_mid = mid - start;
        let mid_to_end = end - mid;
        let l1 = start_to_mid.length();
        let l2 = mid_to_end.length();
        if l1 * l1 <= EPSILON_SQ || l2 * l2 <= EPSILON_SQ {
            return None;
        }

        let start_to_target = self.target - start;
        let target_distance = start_to_target.length();
        if target_distance * target_distance <= EPSILON_SQ {
            return None;
        }

        let soften = self.params.soften.clamp(1e-3, 1.0);
        let max_reach = (l1 + l2) * soften;
        let min_reach = (l1 - l2).abs();
        let pulled = target_distance.clamp(min_reach, max_reach);
        let reached = target_distance <= max_reach + SOLVER_TOLERANCE;

        // Open or close the hinge so the end sits at `pulled` from the start
        // (law of cosines on the triangle start/mid/end).
        let to_start = -start_to_mid;
        let to_end = mid_to_end;
        let cos_current = to_start.normalize().dot(to_end.normalize()).clamp(-1.0, 1.0);
        let cos_desired =
            ((l1 * l1 + l2 * l2 - pulled * pulled) / (2.0 * l1 * l2)).clamp(-1.0, 1.0);
        let current_angle = cos_current.acos();
        let desired_angle = cos_desired.acos();

        let mut bend_axis = to_start.cross(to_end);
        if bend_axis.length_squared() <= EPSILON_SQ {
            // Collinear chain: the pose no longer encodes a bend plane, so
            // fall back to the rig's hinge axis, then to the pole plane.
            let (_, mid_rotation, _) = self.mid_joint.to_scale_rotation_translation();
            bend_axis = mid_rotation * self.mid_axis;
            if bend_axis.length_squared() <= EPSILON_SQ {
                bend_axis = start_to_target.cross(self.pole_vector);
            }
            if bend_axis.length_squared() <= EPSILON_SQ {
                bend_axis = (start_to_target / target_distance).any_orthonormal_vector();
            }
        }
        let bend_axis = bend_axis.normalize();
        let mid_correction = Quat::from_axis_angle(bend_axis, desired_angle - current_angle);

        // Where the end lands once the hinge is corrected, rotated about mid.
        let corrected_end = mid + mid_correction * to_end;
        let to_corrected_end = corrected_end - start;
        if to_corrected_end.length_squared() <= EPSILON_SQ {
            return None;
        }

        let target_dir = start_to_target / target_distance;
        let align = Quat::from_rotation_arc(to_corrected_end.normalize(), target_dir);

        // Roll the chain about the start-target axis so the mid joint falls
        // into the pole plane, then add the caller's twist.
        let mid_after_align = align * start_to_mid;
        let mid_offset = reject(mid_after_align, target_dir);
        let pole_offset = reject(self.pole_vector, target_dir);
        let roll = if mid_offset.length_squared() > EPSILON_SQ
            && pole_offset.length_squared() > EPSILON_SQ
        {
            Quat::from_axis_angle(target_dir, signed_angle(mid_offset, pole_offset, target_dir))
        } else {
            Quat::IDENTITY
        };
        let twist = Quat::from_axis_angle(target_dir, self.params.twist_angle);
        let start_correction = twist * roll * align;

        let weight = self.params.weight.clamp(0.0, 1.0);
        Some(TwoBoneIkOutput {
            start_correction: Quat::IDENTITY.slerp(start_correction, weight),
            mid_correction: Quat::IDENTITY.slerp(mid_correction, weight),
            reached,
        })
    }
}

/// Single-joint orientation solve: aligns the joint's local `forward` axis
/// toward `target`, rolling about the aim direction to respect the pole.
pub struct AimIkJob<'a> {
    /// Model-space point the forward axis should aim at.
    pub target: Vec3,
    /// Joint-local forward axis.
    pub forward: Vec3,
    /// Joint-local up axis.
    pub up: Vec3,
    pub pole_vector: Vec3,
    pub weight: f32,
    pub twist_angle: f32,
    pub joint: &'a Mat4,
}

#[derive(Clone, Copy, Debug)]
pub struct AimIkOutput {
    pub joint_correction: Quat,
}

impl AimIkJob<'_> {
    /// Returns `None` when the target coincides with the joint and no aim
    /// direction exists.
    pub fn run(&self) -> Option<AimIkOutput> {
        let (_, joint_rotation, joint_position) = self.joint.to_scale_rotation_translation();
        let aim = self.target - joint_position;
        if aim.length_squared() <= EPSILON_SQ {
            return None;
        }
        let aim_dir = aim.normalize();
        let forward_ms = (joint_rotation * self.forward).normalize();
        let align = Quat::from_rotation_arc(forward_ms, aim_dir);

        let up_ms = align * (joint_rotation * self.up);
        let up_offset = reject(up_ms, aim_dir);
        let pole_offset = reject(self.pole_vector, aim_dir);
        let roll = if up_offset.length_squared() > EPSILON_SQ
            && pole_offset.length_squared() > EPSILON_SQ
        {
            Quat::from_axis_angle(aim_dir, signed_angle(up_offset, pole_offset, aim_dir))
        } else {
            Quat::IDENTITY
        };
        let twist = Quat::from_axis_angle(aim_dir, self.twist_angle);
        let correction = twist * roll * align;

        let weight = self.weight.clamp(0.0, 1.0);
        Some(AimIkOutput { joint_correction: Quat::IDENTITY.slerp(correction, weight) })
    }
}

fn reject(v: Vec3, axis: Vec3) -> Vec3 {
    v - axis * v.dot(axis)
}

fn signed_angle(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    let from_n = from.normalize();
    let to_n = to.normalize();
    let cos = from_n.dot(to_n).clamp(-1.0, 1.0);
    let sin = axis.dot(from_n.cross(to_n));
    sin.atan2(cos)
}
