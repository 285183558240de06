//! bvhkit core - BVH skeleton and motion toolkit
//!
//! This crate reads and writes BVH motion-capture files and provides the
//! algorithms built on their data model.
//!
//! # Architecture
//!
//! - [`Document`] - Preserved header text, [`Skeleton`] and [`Motion`] of one file
//! - [`Skeleton`] - Joint arena in pre-order with name and frame-column indexes
//! - [`AxisOrder`] - Per-joint Euler sequence resolved from the `CHANNELS` line
//! - [`fk`] - Forward kinematics and skeleton/motion extents
//! - [`retarget`] - Rest-pose retargeting that keeps world-space motion
//! - [`manipulation`] - Root centering, rotation and frame slicing
//! - [`export`] - CSV views of channels and global positions

pub mod channel;
pub mod document;
pub mod error;
pub mod export;
pub mod fk;
pub mod manipulation;
pub mod motion;
mod parse;
pub mod retarget;
pub mod skeleton;
pub mod write;

pub use channel::{Axis, AxisOrder, Channel, ChannelGroup, ChannelKind, ChannelLayout};
pub use document::{Dimension, Document, MotionDims, Parsed, SkeletonDims};
pub use error::{Diagnostic, Error, ParseError, Result};
pub use fk::{JointTransform, Pose};
pub use motion::Motion;
pub use retarget::{RestAlignment, RetargetOptions};
pub use skeleton::{Joint, JointDef, JointId, Skeleton, SkeletonBuilder};
pub use write::{WriteOptions, write_document};
