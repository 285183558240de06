//! Channel model
//!
//! A joint declares an ordered list of channels, each bound to one axis of
//! either its translation or its rotation. The order is significant: it fixes
//! the column layout in the motion stream and, for rotations, the Euler
//! sequence the angles must be composed in.

use std::fmt;
use std::str::FromStr;

use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::Diagnostic;

/// Cartesian axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Component index (X = 0, Y = 1, Z = 2)
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Unit vector along the axis
    pub const fn unit(self) -> DVec3 {
        match self {
            Self::X => DVec3::X,
            Self::Y => DVec3::Y,
            Self::Z => DVec3::Z,
        }
    }

    fn rotation(self, radians: f64) -> DQuat {
        match self {
            Self::X => DQuat::from_rotation_x(radians),
            Self::Y => DQuat::from_rotation_y(radians),
            Self::Z => DQuat::from_rotation_z(radians),
        }
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" | "x" => Ok(Self::X),
            "Y" | "y" => Ok(Self::Y),
            "Z" | "z" => Ok(Self::Z),
            other => Err(format!("invalid axis `{}` (expected X, Y or Z)", other)),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        };
        f.write_str(name)
    }
}

/// Whether a channel animates translation or rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Position,
    Rotation,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position => f.write_str("position"),
            Self::Rotation => f.write_str("rotation"),
        }
    }
}

/// One of the six channel identifiers a BVH joint may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Xposition,
    Yposition,
    Zposition,
    Xrotation,
    Yrotation,
    Zrotation,
}

impl Channel {
    pub const fn new(axis: Axis, kind: ChannelKind) -> Self {
        match (kind, axis) {
            (ChannelKind::Position, Axis::X) => Self::Xposition,
            (ChannelKind::Position, Axis::Y) => Self::Yposition,
            (ChannelKind::Position, Axis::Z) => Self::Zposition,
            (ChannelKind::Rotation, Axis::X) => Self::Xrotation,
            (ChannelKind::Rotation, Axis::Y) => Self::Yrotation,
            (ChannelKind::Rotation, Axis::Z) => Self::Zrotation,
        }
    }

    pub const fn axis(self) -> Axis {
        match self {
            Self::Xposition | Self::Xrotation => Axis::X,
            Self::Yposition | Self::Yrotation => Axis::Y,
            Self::Zposition | Self::Zrotation => Axis::Z,
        }
    }

    pub const fn kind(self) -> ChannelKind {
        match self {
            Self::Xposition | Self::Yposition | Self::Zposition => ChannelKind::Position,
            Self::Xrotation | Self::Yrotation | Self::Zrotation => ChannelKind::Rotation,
        }
    }

    /// Name as written in a `CHANNELS` line
    pub const fn name(self) -> &'static str {
        match self {
            Self::Xposition => "Xposition",
            Self::Yposition => "Yposition",
            Self::Zposition => "Zposition",
            Self::Xrotation => "Xrotation",
            Self::Yrotation => "Yrotation",
            Self::Zrotation => "Zrotation",
        }
    }
}

impl FromStr for Channel {
    type Err = ();

    /// Axis letter followed by `position` or `rotation`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let axis = match chars.next() {
            Some('X') => Axis::X,
            Some('Y') => Axis::Y,
            Some('Z') => Axis::Z,
            _ => return Err(()),
        };
        let kind = match chars.as_str() {
            "position" => ChannelKind::Position,
            "rotation" => ChannelKind::Rotation,
            _ => return Err(()),
        };
        Ok(Self::new(axis, kind))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Axis order
// ============================================================================

/// Order in which three channels of one kind appear.
///
/// For rotations this is also the Euler sequence: angles are intrinsic and
/// applied in the listed order, so `Zxy` composes to `Rz * Rx * Ry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisOrder {
    Xyz,
    Xzy,
    Yxz,
    Yzx,
    Zxy,
    Zyx,
}

impl AxisOrder {
    pub const ALL: [AxisOrder; 6] = [
        Self::Xyz,
        Self::Xzy,
        Self::Yxz,
        Self::Yzx,
        Self::Zxy,
        Self::Zyx,
    ];

    pub const fn axes(self) -> [Axis; 3] {
        match self {
            Self::Xyz => [Axis::X, Axis::Y, Axis::Z],
            Self::Xzy => [Axis::X, Axis::Z, Axis::Y],
            Self::Yxz => [Axis::Y, Axis::X, Axis::Z],
            Self::Yzx => [Axis::Y, Axis::Z, Axis::X],
            Self::Zxy => [Axis::Z, Axis::X, Axis::Y],
            Self::Zyx => [Axis::Z, Axis::Y, Axis::X],
        }
    }

    /// Order matching a sequence of three distinct axes
    pub fn from_axes(axes: [Axis; 3]) -> Option<Self> {
        Self::ALL.into_iter().find(|order| order.axes() == axes)
    }

    /// Build a rotation from angles in degrees, given in this order.
    pub fn compose(self, degrees: [f64; 3]) -> DQuat {
        let [a, b, c] = self.axes();
        a.rotation(degrees[0].to_radians())
            * b.rotation(degrees[1].to_radians())
            * c.rotation(degrees[2].to_radians())
    }

    /// Decompose a rotation into angles in degrees, given in this order.
    ///
    /// Inverse of [`AxisOrder::compose`]: the middle angle lies in [-90, 90].
    /// At gimbal lock the last angle is pinned to zero.
    pub fn decompose(self, rotation: DQuat) -> [f64; 3] {
        let m = DMat3::from_quat(rotation.normalize());
        let r = |row: usize, col: usize| m.col(col)[row];
        let [i, j, k] = self.axes().map(Axis::index);
        let sign = if self.is_cyclic() { 1.0 } else { -1.0 };

        let sin_b = (sign * r(i, k)).clamp(-1.0, 1.0);
        let (a, b, c) = if sin_b.abs() < 1.0 - 1e-12 {
            (
                (-sign * r(j, k)).atan2(r(k, k)),
                sin_b.asin(),
                (-sign * r(i, j)).atan2(r(i, i)),
            )
        } else {
            (
                (sign * r(k, j)).atan2(r(j, j)),
                sin_b.signum() * std::f64::consts::FRAC_PI_2,
                0.0,
            )
        };

        [a.to_degrees(), b.to_degrees(), c.to_degrees()]
    }

    /// XYZ, YZX and ZXY are even permutations
    const fn is_cyclic(self) -> bool {
        matches!(self, Self::Xyz | Self::Yzx | Self::Zxy)
    }
}

impl fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.axes();
        write!(f, "{}{}{}", a, b, c)
    }
}

// ============================================================================
// Channel layout
// ============================================================================

/// Three channels of one kind within a joint's channel list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelGroup {
    /// Declared order of the three axes
    pub order: AxisOrder,
    /// Position in the joint's channel list, in declared order
    pub slots: [usize; 3],
}

impl ChannelGroup {
    /// Read the group from a joint's values, returned in declared order.
    pub fn read(&self, joint_values: &[f64]) -> [f64; 3] {
        self.slots.map(|slot| joint_values[slot])
    }

    /// Store values given in declared order.
    pub fn write(&self, joint_values: &mut [f64], values: [f64; 3]) {
        for (slot, value) in self.slots.into_iter().zip(values) {
            joint_values[slot] = value;
        }
    }

    /// Read the group as an (x, y, z) vector, whatever the declared order.
    pub fn read_vector(&self, joint_values: &[f64]) -> DVec3 {
        let mut v = DVec3::ZERO;
        for (axis, slot) in self.order.axes().into_iter().zip(self.slots) {
            v[axis.index()] = joint_values[slot];
        }
        v
    }

    /// Store an (x, y, z) vector into the declared slots.
    pub fn write_vector(&self, joint_values: &mut [f64], v: DVec3) {
        for (axis, slot) in self.order.axes().into_iter().zip(self.slots) {
            joint_values[slot] = v[axis.index()];
        }
    }
}

/// Semantic view of a joint's channel list, resolved once at parse time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelLayout {
    pub position: Option<ChannelGroup>,
    pub rotation: Option<ChannelGroup>,
}

impl ChannelLayout {
    /// Resolve the position and rotation groups of a channel list.
    ///
    /// A group exists when exactly one channel per axis of that kind is
    /// declared. Lists with one or two channels cannot hold a group at all and
    /// yield an empty layout plus a [`Diagnostic::MalformedChannelSet`]; an empty
    /// list is an end site and is not reported.
    pub fn detect(joint: &str, channels: &[Channel]) -> (Self, Option<Diagnostic>) {
        if channels.is_empty() {
            return (Self::default(), None);
        }
        if channels.len() < 3 {
            let diagnostic = Diagnostic::MalformedChannelSet {
                joint: joint.to_string(),
                channel_count: channels.len(),
            };
            return (Self::default(), Some(diagnostic.raise()));
        }

        let layout = Self {
            position: group(channels, ChannelKind::Position),
            rotation: group(channels, ChannelKind::Rotation),
        };
        (layout, None)
    }
}

fn group(channels: &[Channel], kind: ChannelKind) -> Option<ChannelGroup> {
    let mut axes = Vec::with_capacity(3);
    let mut slots = Vec::with_capacity(3);
    for (slot, channel) in channels.iter().enumerate() {
        if channel.kind() == kind {
            axes.push(channel.axis());
            slots.push(slot);
        }
    }

    let axes: [Axis; 3] = axes.try_into().ok()?;
    let slots: [usize; 3] = slots.try_into().ok()?;
    AxisOrder::from_axes(axes).map(|order| ChannelGroup { order, slots })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(names: &[&str]) -> Vec<Channel> {
        names.iter().map(|n| n.parse().unwrap()).collect()
    }

    #[test]
    fn test_channel_names() {
        for name in [
            "Xposition",
            "Yposition",
            "Zposition",
            "Xrotation",
            "Yrotation",
            "Zrotation",
        ] {
            let channel: Channel = name.parse().unwrap();
            assert_eq!(channel.name(), name);
        }
        assert!("Wrotation".parse::<Channel>().is_err());
        assert!("Xrot".parse::<Channel>().is_err());
        assert!("".parse::<Channel>().is_err());
    }

    #[test]
    fn test_detect_root_layout() {
        let list = channels(&[
            "Xposition",
            "Yposition",
            "Zposition",
            "Zrotation",
            "Xrotation",
            "Yrotation",
        ]);
        let (layout, diagnostic) = ChannelLayout::detect("Hips", &list);
        assert!(diagnostic.is_none());

        let position = layout.position.unwrap();
        assert_eq!(position.order, AxisOrder::Xyz);
        assert_eq!(position.slots, [0, 1, 2]);

        let rotation = layout.rotation.unwrap();
        assert_eq!(rotation.order, AxisOrder::Zxy);
        assert_eq!(rotation.slots, [3, 4, 5]);
    }

    #[test]
    fn test_detect_rotation_first() {
        let list = channels(&[
            "Yrotation",
            "Zrotation",
            "Xrotation",
            "Zposition",
            "Yposition",
            "Xposition",
        ]);
        let (layout, _) = ChannelLayout::detect("Spine", &list);
        assert_eq!(layout.rotation.unwrap().order, AxisOrder::Yzx);
        assert_eq!(layout.position.unwrap().order, AxisOrder::Zyx);
        assert_eq!(layout.position.unwrap().slots, [3, 4, 5]);
    }

    #[test]
    fn test_detect_short_channel_list() {
        let list = channels(&["Xrotation", "Yrotation"]);
        let (layout, diagnostic) = ChannelLayout::detect("Wrist", &list);
        assert_eq!(layout, ChannelLayout::default());
        assert_eq!(
            diagnostic,
            Some(Diagnostic::MalformedChannelSet {
                joint: "Wrist".into(),
                channel_count: 2
            })
        );
    }

    #[test]
    fn test_detect_end_site_is_silent() {
        let (layout, diagnostic) = ChannelLayout::detect("Head_EndSite", &[]);
        assert_eq!(layout, ChannelLayout::default());
        assert!(diagnostic.is_none());
    }

    #[test]
    fn test_group_vector_follows_declared_order() {
        let list = channels(&["Zposition", "Xposition", "Yposition"]);
        let (layout, _) = ChannelLayout::detect("Root", &list);
        let group = layout.position.unwrap();

        let values = [3.0, 1.0, 2.0];
        assert_eq!(group.read_vector(&values), DVec3::new(1.0, 2.0, 3.0));

        let mut out = [0.0; 3];
        group.write_vector(&mut out, DVec3::new(4.0, 5.0, 6.0));
        assert_eq!(out, [6.0, 4.0, 5.0]);
    }

    #[test]
    fn test_compose_single_axis() {
        let q = AxisOrder::Zxy.compose([90.0, 0.0, 0.0]);
        let v = q * DVec3::X;
        assert!(v.abs_diff_eq(DVec3::Y, 1e-12), "got {:?}", v);
    }

    #[test]
    fn test_compose_is_intrinsic() {
        // Zxy applies Rz, then Rx about the rotated frame: Rz * Rx
        let q = AxisOrder::Zxy.compose([30.0, 45.0, 0.0]);
        let expected = DQuat::from_rotation_z(30f64.to_radians())
            * DQuat::from_rotation_x(45f64.to_radians());
        assert!(q.abs_diff_eq(expected, 1e-12));
    }

    #[test]
    fn test_decompose_inverts_compose_for_every_order() {
        let samples = [
            [10.0, 20.0, 30.0],
            [-170.0, 85.0, 45.0],
            [120.0, -60.0, -135.0],
            [0.0, 0.0, 0.0],
        ];
        for order in AxisOrder::ALL {
            for angles in samples {
                let q = order.compose(angles);
                let back = order.compose(order.decompose(q));
                assert!(
                    q.abs_diff_eq(back, 1e-9) || q.abs_diff_eq(-back, 1e-9),
                    "{} {:?}",
                    order,
                    angles
                );
            }
        }
    }

    #[test]
    fn test_decompose_gimbal_lock() {
        for order in AxisOrder::ALL {
            let q = order.compose([25.0, 90.0, 40.0]);
            let angles = order.decompose(q);
            assert!((angles[1] - 90.0).abs() < 1e-6, "{} {:?}", order, angles);
            let back = order.compose(angles);
            assert!(q.abs_diff_eq(back, 1e-7) || q.abs_diff_eq(-back, 1e-7));
        }
    }

    #[test]
    fn test_decompose_recovers_angles_in_range() {
        let angles = [35.0, -20.0, 70.0];
        for order in AxisOrder::ALL {
            let back = order.decompose(order.compose(angles));
            for (a, b) in angles.iter().zip(back) {
                assert!((a - b).abs() < 1e-9, "{} {:?}", order, back);
            }
        }
    }
}
