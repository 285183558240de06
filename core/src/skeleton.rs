//! Joint tree
//!
//! Joints live in an arena ordered by a pre-order walk of the hierarchy, so the
//! root is always at index 0 and every parent precedes its children. Children
//! are owned as index lists; the parent link is a plain index.

use glam::DVec3;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::channel::{Channel, ChannelLayout};
use crate::error::{Error, Result};

/// Stable handle to a joint: its pre-order position in the skeleton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(usize);

impl JointId {
    pub const ROOT: JointId = JointId(0);

    pub const fn index(self) -> usize {
        self.0
    }

    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// A node of the skeleton hierarchy
#[derive(Debug, Clone)]
pub struct Joint {
    name: String,
    offset: DVec3,
    channels: SmallVec<[Channel; 6]>,
    layout: ChannelLayout,
    end_site: bool,
    parent: Option<JointId>,
    children: Vec<JointId>,
    /// Header line holding this joint's `OFFSET`, if it came from text
    offset_line: Option<usize>,
}

impl Joint {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rest-pose translation relative to the parent
    pub fn offset(&self) -> DVec3 {
        self.offset
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Whether this node was declared as an `End Site`
    pub fn is_end_site(&self) -> bool {
        self.end_site
    }

    pub fn parent(&self) -> Option<JointId> {
        self.parent
    }

    pub fn children(&self) -> &[JointId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn offset_line(&self) -> Option<usize> {
        self.offset_line
    }
}

/// Description of a joint handed to [`SkeletonBuilder`]
#[derive(Debug, Clone, Default)]
pub struct JointDef {
    pub name: String,
    pub offset: DVec3,
    pub channels: Vec<Channel>,
    pub layout: ChannelLayout,
    pub end_site: bool,
    pub offset_line: Option<usize>,
}

impl JointDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Joint with channels, layout resolved from them
    pub fn with_channels(name: impl Into<String>, offset: DVec3, channels: &[Channel]) -> Self {
        let name = name.into();
        let (layout, _) = ChannelLayout::detect(&name, channels);
        Self {
            name,
            offset,
            channels: channels.to_vec(),
            layout,
            ..Default::default()
        }
    }

    /// Channel-less terminal node
    pub fn end_site(name: impl Into<String>, offset: DVec3) -> Self {
        Self {
            name: name.into(),
            offset,
            end_site: true,
            ..Default::default()
        }
    }
}

/// Skeleton: the joint arena plus name and frame-column indexes
#[derive(Debug, Clone)]
pub struct Skeleton {
    joints: Vec<Joint>,
    by_name: HashMap<String, JointId>,
    /// First frame column of each joint, indexed by [`JointId`]
    channel_offsets: Vec<usize>,
    channel_count: usize,
}

impl Skeleton {
    pub fn root(&self) -> &Joint {
        &self.joints[0]
    }

    pub fn joint(&self, id: JointId) -> &Joint {
        &self.joints[id.0]
    }

    /// Number of joints, end sites included
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Joints in pre-order
    pub fn joints(&self) -> impl ExactSizeIterator<Item = (JointId, &Joint)> + '_ {
        self.joints
            .iter()
            .enumerate()
            .map(|(i, joint)| (JointId(i), joint))
    }

    pub fn find(&self, name: &str) -> Option<JointId> {
        self.by_name.get(name).copied()
    }

    /// Look up a joint by name, failing with [`Error::JointNotFound`]
    pub fn id(&self, name: &str) -> Result<JointId> {
        self.find(name).ok_or_else(|| Error::joint_not_found(name))
    }

    /// First frame column of the named joint
    pub fn joint_index(&self, name: &str) -> Result<usize> {
        self.id(name).map(|id| self.channel_offset(id))
    }

    pub fn channel_offset(&self, id: JointId) -> usize {
        self.channel_offsets[id.0]
    }

    /// Total channel count; equals the length of every frame
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// The joint's slice of a frame
    pub fn joint_values<'a>(&self, id: JointId, frame: &'a [f64]) -> &'a [f64] {
        let start = self.channel_offsets[id.0];
        &frame[start..start + self.joints[id.0].channel_count()]
    }

    pub fn joint_values_mut<'a>(&self, id: JointId, frame: &'a mut [f64]) -> &'a mut [f64] {
        let start = self.channel_offsets[id.0];
        &mut frame[start..start + self.joints[id.0].channel_count()]
    }

    /// Every joint below `id`, in pre-order, excluding `id` itself
    pub fn descendants(&self, id: JointId) -> Vec<JointId> {
        let mut out = Vec::new();
        let mut stack: Vec<JointId> = self.joints[id.0].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.joints[next.0].children.iter().rev().copied());
        }
        out
    }

    /// Whether `ancestor` lies on the path from `id` to the root
    pub fn is_ancestor(&self, ancestor: JointId, id: JointId) -> bool {
        let mut current = self.joints[id.0].parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.joints[parent.0].parent;
        }
        false
    }

    pub(crate) fn set_offset(&mut self, id: JointId, offset: DVec3) {
        self.joints[id.0].offset = offset;
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`Skeleton`] from joints added in pre-order.
#[derive(Debug, Default)]
pub struct SkeletonBuilder {
    joints: Vec<Joint>,
    by_name: HashMap<String, JointId>,
}

/// A joint name was added twice
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateName(pub String);

impl SkeletonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the root. Must be the first call.
    pub fn root(&mut self, def: JointDef) -> Result<JointId, DuplicateName> {
        debug_assert!(self.joints.is_empty(), "root must be added first");
        self.push(def, None)
    }

    /// Add a child of an already added joint.
    ///
    /// Children must be added depth-first so the arena stays in pre-order.
    pub fn child(&mut self, parent: JointId, def: JointDef) -> Result<JointId, DuplicateName> {
        let id = self.push(def, Some(parent))?;
        self.joints[parent.0].children.push(id);
        Ok(id)
    }

    pub fn name(&self, id: JointId) -> &str {
        &self.joints[id.0].name
    }

    /// Replace offset and offset line of a joint already added
    pub fn set_offset(&mut self, id: JointId, offset: DVec3, line: Option<usize>) {
        let joint = &mut self.joints[id.0];
        joint.offset = offset;
        joint.offset_line = line;
    }

    /// Replace the channel list of a joint already added
    pub fn set_channels(&mut self, id: JointId, channels: &[Channel], layout: ChannelLayout) {
        let joint = &mut self.joints[id.0];
        joint.channels = SmallVec::from_slice(channels);
        joint.layout = layout;
    }

    /// Finish the skeleton. Returns `None` when no root was added.
    pub fn build(self) -> Option<Skeleton> {
        if self.joints.is_empty() {
            return None;
        }

        let mut channel_offsets = Vec::with_capacity(self.joints.len());
        let mut channel_count = 0;
        for joint in &self.joints {
            channel_offsets.push(channel_count);
            channel_count += joint.channel_count();
        }

        Some(Skeleton {
            joints: self.joints,
            by_name: self.by_name,
            channel_offsets,
            channel_count,
        })
    }

    fn push(&mut self, def: JointDef, parent: Option<JointId>) -> Result<JointId, DuplicateName> {
        if self.by_name.contains_key(&def.name) {
            return Err(DuplicateName(def.name));
        }
        let id = JointId(self.joints.len());
        self.by_name.insert(def.name.clone(), id);
        self.joints.push(Joint {
            name: def.name,
            offset: def.offset,
            channels: SmallVec::from_vec(def.channels),
            layout: def.layout,
            end_site: def.end_site,
            parent,
            children: Vec::new(),
            offset_line: def.offset_line,
        });
        Ok(id)
    }
}
