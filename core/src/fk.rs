//! Forward kinematics
//!
//! Global transforms are composed root to leaves in a single pre-order pass:
//!
//! - root: rotation and translation come straight from its channels
//! - other joints: `rotation = parent.rotation * local`,
//!   `position = parent.rotation * offset + parent.position`
//!
//! Position channels only ever translate the root. A non-root joint that
//! declares them keeps its offset-derived position; files in the wild rely on
//! this.

use glam::{DQuat, DVec3};

use crate::document::{Dimension, Document};
use crate::error::{Error, Result};
use crate::skeleton::{JointId, Skeleton};

/// Rotation and position of one joint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTransform {
    pub rotation: DQuat,
    pub position: DVec3,
}

impl JointTransform {
    pub const IDENTITY: Self = Self {
        rotation: DQuat::IDENTITY,
        position: DVec3::ZERO,
    };
}

/// Global transform of every joint for one frame, indexed by [`JointId`]
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    transforms: Vec<JointTransform>,
}

impl Pose {
    pub fn get(&self, id: JointId) -> &JointTransform {
        &self.transforms[id.index()]
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Transforms in pre-order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (JointId, &JointTransform)> + '_ {
        self.transforms
            .iter()
            .enumerate()
            .map(|(i, t)| (JointId::from_index(i), t))
    }

    /// Transforms paired with joint names, in pre-order
    pub fn named<'a>(
        &'a self,
        skeleton: &'a Skeleton,
    ) -> impl Iterator<Item = (&'a str, &'a JointTransform)> + 'a {
        skeleton
            .joints()
            .zip(&self.transforms)
            .map(|((_, joint), t)| (joint.name(), t))
    }

    /// Transform of a named joint
    pub fn by_name(&self, skeleton: &Skeleton, name: &str) -> Result<&JointTransform> {
        skeleton.id(name).map(|id| self.get(id))
    }
}

impl Skeleton {
    /// Local rotation and translation of a joint in one frame.
    ///
    /// A missing rotation group yields identity, a missing position group
    /// yields zero.
    pub fn local_transform(&self, id: JointId, frame: &[f64]) -> JointTransform {
        let joint = self.joint(id);
        let values = self.joint_values(id, frame);
        let layout = joint.layout();

        let rotation = layout
            .rotation
            .map(|group| group.order.compose(group.read(values)))
            .unwrap_or(DQuat::IDENTITY);
        let position = layout
            .position
            .map(|group| group.read_vector(values))
            .unwrap_or(DVec3::ZERO);

        JointTransform { rotation, position }
    }

    /// Global transform of every joint in one frame
    pub fn global_transforms(&self, frame: &[f64]) -> Pose {
        debug_assert_eq!(frame.len(), self.channel_count());

        let mut transforms: Vec<JointTransform> = Vec::with_capacity(self.len());
        for (id, joint) in self.joints() {
            let local = self.local_transform(id, frame);
            let global = match joint.parent() {
                None => local,
                Some(parent) => {
                    let parent = transforms[parent.index()];
                    JointTransform {
                        rotation: parent.rotation * local.rotation,
                        position: parent.rotation * joint.offset() + parent.position,
                    }
                }
            };
            transforms.push(global);
        }

        Pose { transforms }
    }

    /// Global position of the root in one frame
    pub fn root_position(&self, frame: &[f64]) -> DVec3 {
        self.local_transform(JointId::ROOT, frame).position
    }
}

impl Document {
    /// Global transform of every joint at frame `index`
    pub fn global_transforms(&self, index: usize) -> Result<Pose> {
        let frame = self.motion().frame(index).ok_or(Error::InvalidFrameRange {
            from: index,
            to: index + 1,
            frame_count: self.frame_count(),
        })?;
        Ok(self.skeleton().global_transforms(frame))
    }

    /// Local transform of a named joint at frame `index`
    pub fn local_transform(&self, name: &str, index: usize) -> Result<JointTransform> {
        let id = self.skeleton().id(name)?;
        let frame = self.motion().frame(index).ok_or(Error::InvalidFrameRange {
            from: index,
            to: index + 1,
            frame_count: self.frame_count(),
        })?;
        Ok(self.skeleton().local_transform(id, frame))
    }

    /// Global transforms with positions divided by one skeleton extent.
    ///
    /// A zero extent leaves positions unscaled.
    pub fn global_transforms_normalized(&self, index: usize, by: Dimension) -> Result<Pose> {
        let mut pose = self.global_transforms(index)?;
        let normalizer = self.skeleton_dims().get(by);
        if normalizer > f64::EPSILON {
            for transform in &mut pose.transforms {
                transform.position /= normalizer;
            }
        } else {
            tracing::debug!(dimension = ?by, "skeleton extent is zero; positions left unscaled");
        }
        Ok(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel::*;
    use crate::skeleton::{JointDef, SkeletonBuilder};

    /// Root at origin with a three-link chain along +Y/+X, rotations only below the root
    fn chain() -> Skeleton {
        let mut b = SkeletonBuilder::new();
        let root = b
            .root(JointDef::with_channels(
                "Root",
                DVec3::new(5.0, 5.0, 5.0),
                &[Xposition, Yposition, Zposition, Zrotation, Xrotation, Yrotation],
            ))
            .unwrap();
        let a = b
            .child(
                root,
                JointDef::with_channels("A", DVec3::new(0.0, 2.0, 0.0), &[Zrotation, Xrotation, Yrotation]),
            )
            .unwrap();
        let bone = b
            .child(
                a,
                JointDef::with_channels("B", DVec3::new(1.0, 0.0, 0.0), &[Zrotation, Xrotation, Yrotation]),
            )
            .unwrap();
        b.child(bone, JointDef::end_site("B_EndSite", DVec3::new(0.0, 0.0, 3.0)))
            .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_zero_pose_sums_offsets() {
        let skeleton = chain();
        let frame = vec![0.0; skeleton.channel_count()];
        let pose = skeleton.global_transforms(&frame);

        // The root's own offset is not part of its global position
        let expected = [
            DVec3::ZERO,
            DVec3::new(0.0, 2.0, 0.0),
            DVec3::new(1.0, 2.0, 0.0),
            DVec3::new(1.0, 2.0, 3.0),
        ];
        for ((_, t), e) in pose.iter().zip(expected) {
            assert!(t.position.abs_diff_eq(e, 1e-12), "{:?} != {:?}", t.position, e);
            assert!(t.rotation.abs_diff_eq(DQuat::IDENTITY, 1e-12));
        }
    }

    #[test]
    fn test_root_translation_and_rotation() {
        let skeleton = chain();
        let mut frame = vec![0.0; skeleton.channel_count()];
        frame[0..3].copy_from_slice(&[10.0, 0.0, -4.0]);
        frame[3] = 90.0; // Zrotation of the root

        let pose = skeleton.global_transforms(&frame);
        let a = pose.by_name(&skeleton, "A").unwrap();
        // +Y offset rotated 90 degrees about Z points along -X
        assert!(a.position.abs_diff_eq(DVec3::new(8.0, 0.0, -4.0), 1e-9), "{:?}", a.position);
    }

    #[test]
    fn test_child_rotation_moves_descendants_only() {
        let skeleton = chain();
        let mut frame = vec![0.0; skeleton.channel_count()];
        frame[6] = 90.0; // Zrotation of A

        let pose = skeleton.global_transforms(&frame);
        let a = pose.by_name(&skeleton, "A").unwrap();
        let b = pose.by_name(&skeleton, "B").unwrap();
        assert!(a.position.abs_diff_eq(DVec3::new(0.0, 2.0, 0.0), 1e-12));
        // +X offset rotated 90 degrees about Z points along +Y
        assert!(b.position.abs_diff_eq(DVec3::new(0.0, 3.0, 0.0), 1e-9), "{:?}", b.position);
    }

    #[test]
    fn test_non_root_position_channels_do_not_translate() {
        let mut b = SkeletonBuilder::new();
        let root = b
            .root(JointDef::with_channels(
                "Root",
                DVec3::ZERO,
                &[Xposition, Yposition, Zposition, Zrotation, Xrotation, Yrotation],
            ))
            .unwrap();
        let mid = b
            .child(
                root,
                JointDef::with_channels(
                    "Mid",
                    DVec3::new(0.0, 3.0, 0.0),
                    &[Xposition, Yposition, Zposition, Zrotation, Xrotation, Yrotation],
                ),
            )
            .unwrap();
        b.child(mid, JointDef::end_site("Mid_EndSite", DVec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        let skeleton = b.build().unwrap();

        let mut frame = vec![0.0; skeleton.channel_count()];
        frame[6..9].copy_from_slice(&[500.0, -250.0, 1000.0]);
        let pose = skeleton.global_transforms(&frame);

        let mid = pose.by_name(&skeleton, "Mid").unwrap();
        let end = pose.by_name(&skeleton, "Mid_EndSite").unwrap();
        assert!(mid.position.abs_diff_eq(DVec3::new(0.0, 3.0, 0.0), 1e-12));
        assert!(end.position.abs_diff_eq(DVec3::new(0.0, 4.0, 0.0), 1e-12));

        // The local transform still reports the values
        let local = skeleton.local_transform(skeleton.id("Mid").unwrap(), &frame);
        assert_eq!(local.position, DVec3::new(500.0, -250.0, 1000.0));
    }

    #[test]
    fn test_missing_groups_default_to_identity() {
        let mut b = SkeletonBuilder::new();
        b.root(JointDef::with_channels("Root", DVec3::ZERO, &[Xrotation, Yrotation]))
            .unwrap();
        let skeleton = b.build().unwrap();
        let local = skeleton.local_transform(JointId::ROOT, &[45.0, 45.0]);
        assert_eq!(local, JointTransform::IDENTITY);
    }
}
