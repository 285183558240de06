//! Rest-pose retargeting
//!
//! Changing a joint's rest offset changes the frame its child rotations are
//! expressed in. To keep the animation unchanged in world space every rotation
//! channel below the edited joints is rewritten to compensate.
//!
//! Each bone is described by its alignment: the minimal rotation taking the
//! canonical axis onto the bone's rest direction. When offsets change, the
//! alignment change of a joint's first child (`right`) is removed from the
//! joint's local rotation, and the change its parent removed (`left`) is put
//! back:
//!
//! ```text
//! L' = right(parent) * L * right(joint)^-1
//! ```
//!
//! so that every global rotation becomes `G' = G * right(joint)^-1` and the
//! rotated new offsets land exactly where the old ones did.

use std::f64::consts::PI;

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::channel::{Axis, AxisOrder, ChannelGroup};
use crate::document::Document;
use crate::error::{Diagnostic, Result};
use crate::skeleton::{JointId, Skeleton};

/// Below this cross-product length an offset counts as parallel to the axis
const PARALLEL_EPSILON: f64 = 1e-6;

/// Parameters of [`Document::apply_rest_pose`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetargetOptions {
    /// Axis every bone is measured against
    pub canonical_axis: Axis,
}

impl Default for RetargetOptions {
    fn default() -> Self {
        Self {
            canonical_axis: Axis::Y,
        }
    }
}

/// Minimal rotation mapping `axis` onto the direction of `offset`.
///
/// A zero offset has no direction and yields identity. An offset pointing
/// against the axis yields a half turn about a perpendicular axis.
pub fn alignment_for(offset: DVec3, axis: Axis) -> DQuat {
    let Some(direction) = offset.try_normalize() else {
        return DQuat::IDENTITY;
    };
    let canonical = axis.unit();
    let cross = canonical.cross(direction);
    let dot = canonical.dot(direction).clamp(-1.0, 1.0);

    if cross.length() < PARALLEL_EPSILON {
        if dot > 0.0 {
            DQuat::IDENTITY
        } else {
            DQuat::from_axis_angle(canonical.any_orthonormal_vector(), PI)
        }
    } else {
        DQuat::from_axis_angle(cross.normalize(), dot.acos())
    }
}

/// Alignment of every non-end-site joint, indexed by [`JointId`]
#[derive(Debug, Clone, PartialEq)]
pub struct RestAlignment {
    rotations: Vec<Option<DQuat>>,
}

impl RestAlignment {
    /// `None` for end sites
    pub fn get(&self, id: JointId) -> Option<DQuat> {
        self.rotations.get(id.index()).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointId, DQuat)> + '_ {
        self.rotations
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.map(|r| (JointId::from_index(i), r)))
    }
}

impl Skeleton {
    /// Alignment of each joint's rest offset against `axis`
    pub fn rest_pose_alignment(&self, axis: Axis) -> RestAlignment {
        let rotations = self
            .joints()
            .map(|(_, joint)| (!joint.is_end_site()).then(|| alignment_for(joint.offset(), axis)))
            .collect();
        RestAlignment { rotations }
    }
}

/// Per-frame rewrite of one joint's rotation channels
struct RotationFix {
    column: usize,
    group: ChannelGroup,
    left: DQuat,
    right_inverse: DQuat,
}

impl Document {
    /// Alignment of each joint's rest offset against `axis`
    pub fn rest_pose_alignment(&self, axis: Axis) -> RestAlignment {
        self.skeleton().rest_pose_alignment(axis)
    }

    /// Reorient the rest pose below the named joints, keeping world motion.
    ///
    /// Each target is a joint name and the Euler XYZ angles (degrees) of the
    /// new alignment. Every descendant of a target is laid along that
    /// alignment with its bone length kept, and rotation channels are
    /// rewritten so world-space joint positions stay the same in every frame.
    /// Targets are applied ancestors first regardless of the order given.
    ///
    /// Below a joint with several children only the first child's branch is
    /// kept exactly: all children are laid along one direction, so a single
    /// parent rotation cannot put each of them back.
    ///
    /// All names are resolved before anything changes: an unknown name leaves
    /// the document untouched. Joints in an affected chain that have no
    /// rotation channels are reported as [`Diagnostic::RetargetSkippedJoint`].
    pub fn apply_rest_pose<K: AsRef<str>>(
        &mut self,
        targets: impl IntoIterator<Item = (K, [f64; 3])>,
        options: &RetargetOptions,
    ) -> Result<Vec<Diagnostic>> {
        let mut requests = targets
            .into_iter()
            .map(|(name, euler)| Ok((self.skeleton().id(name.as_ref())?, euler)))
            .collect::<Result<Vec<_>>>()?;
        requests.sort_by_key(|(id, _)| *id);

        let mut diagnostics = Vec::new();
        let mut changed: Vec<JointId> = Vec::new();
        for (id, euler) in requests {
            let moved = self.retarget_joint(id, euler, options.canonical_axis, &mut diagnostics);
            changed.extend(moved);
        }

        changed.sort();
        changed.dedup();
        self.rewrite_offset_lines(&changed);
        Ok(diagnostics)
    }

    /// One request: re-lay the chain below `target`, then fix rotations.
    /// Returns the joints whose offsets changed.
    fn retarget_joint(
        &mut self,
        target: JointId,
        euler: [f64; 3],
        axis: Axis,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<JointId> {
        let new_alignment = AxisOrder::Xyz.compose(euler);
        let descendants = self.skeleton().descendants(target);
        let old_offsets: Vec<DVec3> = self.skeleton().joints().map(|(_, j)| j.offset()).collect();

        for &id in &descendants {
            let length = old_offsets[id.index()].length();
            self.set_joint_offset(id, new_alignment * (axis.unit() * length));
        }

        let skeleton = self.skeleton();
        let delta = |id: JointId| {
            let old = alignment_for(old_offsets[id.index()], axis);
            let new = alignment_for(skeleton.joint(id).offset(), axis);
            new * old.inverse()
        };
        let right = |id: JointId| {
            skeleton
                .joint(id)
                .children()
                .first()
                .map_or(DQuat::IDENTITY, |&child| delta(child))
        };

        let mut fixes = Vec::new();
        for id in std::iter::once(target).chain(descendants.iter().copied()) {
            let joint = skeleton.joint(id);
            if joint.is_end_site() {
                continue;
            }
            let Some(group) = joint.layout().rotation else {
                diagnostics.push(
                    Diagnostic::RetargetSkippedJoint {
                        joint: joint.name().to_string(),
                    }
                    .raise(),
                );
                continue;
            };
            let left = match joint.parent() {
                Some(parent) if id != target => right(parent),
                _ => DQuat::IDENTITY,
            };
            fixes.push(RotationFix {
                column: skeleton.channel_offset(id),
                group,
                left,
                right_inverse: right(id).inverse(),
            });
        }

        tracing::info!(
            joint = %skeleton.joint(target).name(),
            descendants = descendants.len(),
            rotations = fixes.len(),
            "retargeted rest pose"
        );

        for frame in self.motion_mut().frames_mut() {
            for fix in &fixes {
                let values = &mut frame[fix.column..];
                let order = fix.group.order;
                let local = order.compose(fix.group.read(values));
                let rewritten = fix.left * local * fix.right_inverse;
                fix.group.write(values, order.decompose(rewritten));
            }
        }

        descendants
    }
}
