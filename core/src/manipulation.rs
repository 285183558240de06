//! Whole-clip edits: root centering, root rotation, frame slicing
//!
//! Every operation returns a new [`Document`] and leaves its input alone. Only
//! the root's channels or the frame list change; rest offsets never do.
//! The root comes first in pre-order, so its channel groups index a whole
//! frame directly.

use std::ops::Range;

use glam::DVec3;

use crate::channel::{AxisOrder, ChannelGroup, ChannelKind};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::skeleton::JointId;

impl Document {
    /// Shift the root so it sits at the origin in frame `frame`
    pub fn center_root(&self, frame: usize) -> Result<Document> {
        let root = self.root_position_at(frame)?;
        self.translate_root(-root)
    }

    /// Center the root horizontally and put the feet on the ground.
    ///
    /// In frame `frame` the root ends up above the origin and the average
    /// height of the two named joints ends up at zero.
    pub fn center_feet(&self, left: &str, right: &str, frame: usize) -> Result<Document> {
        let left = self.skeleton().id(left)?;
        let right = self.skeleton().id(right)?;
        let root = self.root_position_at(frame)?;
        let pose = self.global_transforms(frame)?;

        let feet = (pose.get(left).position.y + pose.get(right).position.y) / 2.0;
        self.translate_root(DVec3::new(-root.x, -feet, -root.z))
    }

    /// Shift the root so the named joint sits at the origin in frame `frame`
    pub fn center_on_joint(&self, name: &str, frame: usize) -> Result<Document> {
        let id = self.skeleton().id(name)?;
        let pose = self.global_transforms(frame)?;
        self.translate_root(-pose.get(id).position)
    }

    /// Apply an extra rotation (Euler XYZ degrees) in the root's own frame.
    ///
    /// The skeleton turns in place around the root; the root path is unchanged.
    pub fn rotate_root_local(&self, euler: [f64; 3]) -> Result<Document> {
        let rotation = AxisOrder::Xyz.compose(euler);
        let group = self.root_group(ChannelKind::Rotation)?;
        let mut out = self.clone();
        for frame in out.motion_mut().frames_mut() {
            let local = group.order.compose(group.read(frame));
            group.write(frame, group.order.decompose(local * rotation));
        }
        Ok(out)
    }

    /// Rotate the whole clip about the world origin (Euler XYZ degrees).
    ///
    /// Root orientation and, when present, the root path are both turned.
    pub fn rotate_root_world(&self, euler: [f64; 3]) -> Result<Document> {
        let rotation = AxisOrder::Xyz.compose(euler);
        let group = self.root_group(ChannelKind::Rotation)?;
        let position = self.skeleton().root().layout().position;
        let mut out = self.clone();
        for frame in out.motion_mut().frames_mut() {
            let local = group.order.compose(group.read(frame));
            group.write(frame, group.order.decompose(rotation * local));
            if let Some(position) = position {
                let p = position.read_vector(frame);
                position.write_vector(frame, rotation * p);
            }
        }
        Ok(out)
    }

    /// Copy of frames `from..to`, with frame time and hierarchy kept
    pub fn slice(&self, from: usize, to: usize) -> Result<Document> {
        let frame_count = self.frame_count();
        let motion = self
            .motion()
            .slice(from..to)
            .ok_or(Error::InvalidFrameRange {
                from,
                to,
                frame_count,
            })?;
        let mut out = self.clone();
        out.replace_motion(motion);
        tracing::debug!(from, to, "sliced motion");
        Ok(out)
    }

    /// One slice per range; fails on the first invalid range
    pub fn slices(&self, ranges: &[Range<usize>]) -> Result<Vec<Document>> {
        ranges
            .iter()
            .map(|range| self.slice(range.start, range.end))
            .collect()
    }

    fn root_group(&self, kind: ChannelKind) -> Result<ChannelGroup> {
        let root = self.skeleton().root();
        let layout = root.layout();
        let group = match kind {
            ChannelKind::Position => layout.position,
            ChannelKind::Rotation => layout.rotation,
        };
        group.ok_or_else(|| Error::MissingChannels {
            joint: root.name().to_string(),
            kind,
        })
    }

    /// Root translation channels in frame `frame`
    fn root_position_at(&self, frame: usize) -> Result<DVec3> {
        let group = self.root_group(ChannelKind::Position)?;
        let values = self.motion().frame(frame).ok_or(Error::InvalidFrameRange {
            from: frame,
            to: frame + 1,
            frame_count: self.frame_count(),
        })?;
        let values = self.skeleton().joint_values(JointId::ROOT, values);
        Ok(group.read_vector(values))
    }

    /// Add `shift` to the root translation of every frame
    fn translate_root(&self, shift: DVec3) -> Result<Document> {
        let group = self.root_group(ChannelKind::Position)?;
        let mut out = self.clone();
        for frame in out.motion_mut().frames_mut() {
            let p = group.read_vector(frame);
            group.write_vector(frame, p + shift);
        }
        Ok(out)
    }
}
