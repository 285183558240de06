//! BVH document: preserved header text, skeleton and motion
//!
//! Skeleton and motion are created together by the parser and mutated together
//! by retargeting and manipulation. Derived extents are computed on first use
//! and dropped by every mutating entry point of this crate.

use std::cell::OnceCell;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Diagnostic, Error, Result};
use crate::motion::Motion;
use crate::skeleton::{JointId, Skeleton};
use crate::write::{self, WriteOptions};

/// Extents of the skeleton in its first frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkeletonDims {
    /// Y extent
    pub height: f64,
    /// X extent
    pub width: f64,
    /// Z extent
    pub depth: f64,
}

/// Selects one of the [`SkeletonDims`] extents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Height,
    Width,
    Depth,
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "height" => Ok(Self::Height),
            "width" => Ok(Self::Width),
            "depth" => Ok(Self::Depth),
            other => Err(format!(
                "invalid dimension `{}` (expected height, width or depth)",
                other
            )),
        }
    }
}

impl SkeletonDims {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Height => self.height,
            Dimension::Width => self.width,
            Dimension::Depth => self.depth,
        }
    }
}

/// Bounding box of the root position over all frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionDims {
    pub min: DVec3,
    pub max: DVec3,
}

impl MotionDims {
    /// `[min_x, max_x, min_y, max_y, min_z, max_z]`
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.min.x, self.max.x, self.min.y, self.max.y, self.min.z, self.max.z,
        ]
    }
}

/// A parsed BVH file
#[derive(Debug, Clone)]
pub struct Document {
    header: Vec<String>,
    skeleton: Skeleton,
    motion: Motion,
    skeleton_dims: OnceCell<SkeletonDims>,
    motion_dims: OnceCell<Option<MotionDims>>,
}

/// Result of parsing: the document plus everything recovered along the way
#[derive(Debug, Clone)]
pub struct Parsed {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

impl Document {
    /// Assemble a document. `motion.width()` must equal the channel count.
    pub fn new(header: Vec<String>, skeleton: Skeleton, motion: Motion) -> Result<Self> {
        if motion.width() != skeleton.channel_count() {
            return Err(Error::FrameWidth {
                expected: skeleton.channel_count(),
                found: motion.width(),
            });
        }
        Ok(Self::from_parts(header, skeleton, motion))
    }

    /// Widths already checked by the caller
    pub(crate) fn from_parts(header: Vec<String>, skeleton: Skeleton, motion: Motion) -> Self {
        debug_assert_eq!(motion.width(), skeleton.channel_count());
        Self {
            header,
            skeleton,
            motion,
            skeleton_dims: OnceCell::new(),
            motion_dims: OnceCell::new(),
        }
    }

    /// Parse BVH text
    pub fn parse(text: &str) -> Result<Parsed> {
        crate::parse::parse_document(text).map_err(Error::from)
    }

    /// Read and parse a BVH file
    pub fn load(path: impl AsRef<Path>) -> Result<Parsed> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Serialize and write to a file
    pub fn save(&self, path: impl AsRef<Path>, options: &WriteOptions) -> Result<()> {
        fs::write(path, self.to_bvh_string(options))?;
        Ok(())
    }

    pub fn to_bvh_string(&self, options: &WriteOptions) -> String {
        write::write_document(self, options)
    }

    /// Hierarchy text lines, up to but excluding `MOTION`
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    /// Mutable frame access; cached extents are dropped
    pub fn motion_mut(&mut self) -> &mut Motion {
        self.invalidate_dims();
        &mut self.motion
    }

    pub fn frame_count(&self) -> usize {
        self.motion.frame_count()
    }

    /// Change a joint's rest offset and its `OFFSET` header line
    pub fn set_offset(&mut self, name: &str, offset: DVec3) -> Result<()> {
        let id = self.skeleton.id(name)?;
        self.set_joint_offset(id, offset);
        self.rewrite_offset_lines(&[id]);
        Ok(())
    }

    pub(crate) fn set_joint_offset(&mut self, id: JointId, offset: DVec3) {
        self.skeleton.set_offset(id, offset);
        self.invalidate_dims();
    }

    /// Rewrite the `OFFSET` lines of `joints` from their current offsets
    pub(crate) fn rewrite_offset_lines(&mut self, joints: &[JointId]) {
        for &id in joints {
            let joint = self.skeleton.joint(id);
            let Some(line) = joint.offset_line() else {
                continue;
            };
            if let Some(text) = self.header.get_mut(line) {
                *text = write::rewrite_offset_line(text, joint.offset());
            }
        }
    }

    /// Swap in new frames of the same width
    pub(crate) fn replace_motion(&mut self, motion: Motion) {
        debug_assert_eq!(motion.width(), self.skeleton.channel_count());
        self.motion = motion;
        self.invalidate_dims();
    }

    /// Drop cached skeleton and motion extents
    pub fn invalidate_dims(&mut self) {
        self.skeleton_dims.take();
        self.motion_dims.take();
    }

    /// Height, width and depth of the skeleton in frame 0.
    ///
    /// Without frames the rest pose (all channels zero) is measured instead.
    pub fn skeleton_dims(&self) -> SkeletonDims {
        *self.skeleton_dims.get_or_init(|| {
            let rest;
            let frame = match self.motion.frame(0) {
                Some(frame) => frame,
                None => {
                    rest = vec![0.0; self.skeleton.channel_count()];
                    &rest
                }
            };
            let pose = self.skeleton.global_transforms(frame);

            let mut min = DVec3::splat(f64::INFINITY);
            let mut max = DVec3::splat(f64::NEG_INFINITY);
            for (_, transform) in pose.iter() {
                min = min.min(transform.position);
                max = max.max(transform.position);
            }
            let extent = max - min;
            SkeletonDims {
                height: extent.y,
                width: extent.x,
                depth: extent.z,
            }
        })
    }

    /// Bounding box of the root's global position across all frames.
    ///
    /// `None` when the motion has no frames.
    pub fn motion_dims(&self) -> Option<MotionDims> {
        *self.motion_dims.get_or_init(|| {
            let mut frames = self.motion.frames();
            let first = self.skeleton.root_position(frames.next()?);
            let (min, max) = frames.fold((first, first), |(min, max), frame| {
                let p = self.skeleton.root_position(frame);
                (min.min(p), max.max(p))
            });
            Some(MotionDims { min, max })
        })
    }
}
