//! Error and diagnostic types
//!
//! Fatal conditions are [`ParseError`] (malformed hierarchy or motion text) and
//! [`Error`] (an operation that cannot proceed). Conditions the library recovers
//! from locally are reported as [`Diagnostic`] values returned next to the result.

use std::fmt;
use std::io;

use crate::channel::ChannelKind;

/// Structural error in a BVH document.
///
/// Line numbers are 1-based and refer to the source text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// The hierarchy section contains no `ROOT` line
    #[error("no ROOT joint found in hierarchy")]
    MissingRoot,

    /// A token other than the one the grammar requires
    #[error("line {line}: expected {expected}, found `{found}`")]
    Unexpected {
        line: usize,
        expected: &'static str,
        found: String,
    },

    /// A non-numeric token where a number is required
    #[error("line {line}: invalid number `{token}`")]
    InvalidNumber { line: usize, token: String },

    /// A channel name outside `{X,Y,Z}{position,rotation}`
    #[error("line {line}: unknown channel `{name}`")]
    UnknownChannel { line: usize, name: String },

    /// `CHANNELS <n>` followed by a different number of names
    #[error("line {line}: CHANNELS declares {declared} channels but lists {listed}")]
    ChannelCount {
        line: usize,
        declared: usize,
        listed: usize,
    },

    /// The hierarchy ended before a joint's closing brace
    #[error("joint `{joint}` (line {line}) is never closed")]
    UnclosedJoint { line: usize, joint: String },

    /// A joint or synthesized end site name that is already taken
    #[error("line {line}: duplicate joint name `{name}`")]
    DuplicateJoint { line: usize, name: String },

    /// No `MOTION` marker after the hierarchy
    #[error("missing MOTION section")]
    MissingMotion,

    /// A required motion header line (`Frames:` or `Frame Time:`) is absent
    #[error("missing `{0}` line in MOTION section")]
    MissingMotionField(&'static str),

    /// A frame line whose value count differs from the skeleton's channel count
    #[error("line {line}: frame has {found} values, expected {expected}")]
    FrameWidth {
        line: usize,
        expected: usize,
        found: usize,
    },
}

/// Error returned by document operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The text could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A named joint is not part of the skeleton
    #[error("joint `{name}` not found in skeleton")]
    JointNotFound { name: String },

    /// A joint lacks the channel group an operation needs
    #[error("joint `{joint}` has no complete {kind} channels")]
    MissingChannels { joint: String, kind: ChannelKind },

    /// A frame index or range outside the motion
    #[error("invalid frame range {from}..{to} for motion with {frame_count} frames")]
    InvalidFrameRange {
        from: usize,
        to: usize,
        frame_count: usize,
    },

    /// Frames whose value count differs from the skeleton's channel count
    #[error("frame has {found} values, expected {expected}")]
    FrameWidth { expected: usize, found: usize },

    /// Reading or writing a document failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn joint_not_found(name: impl Into<String>) -> Self {
        Self::JointNotFound { name: name.into() }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A condition the library recovered from.
///
/// Every diagnostic is also logged at `warn` level when it is raised.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// `Frames:` disagrees with the number of frame lines; the line count wins
    FrameCountMismatch { declared: usize, actual: usize },

    /// A joint declares between one and two channels, so no axis order exists
    MalformedChannelSet { joint: String, channel_count: usize },

    /// A joint inside a retargeted chain has no rotation channels to rewrite
    RetargetSkippedJoint { joint: String },
}

impl Diagnostic {
    /// Log the diagnostic and hand it back, so call sites can push it.
    pub(crate) fn raise(self) -> Self {
        tracing::warn!("{}", self);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameCountMismatch { declared, actual } => write!(
                f,
                "header declares {} frames but motion has {}; using {}",
                declared, actual, actual
            ),
            Self::MalformedChannelSet {
                joint,
                channel_count,
            } => write!(
                f,
                "joint `{}` declares {} channels; no axis order can be resolved",
                joint, channel_count
            ),
            Self::RetargetSkippedJoint { joint } => write!(
                f,
                "joint `{}` has no rotation channels; its frames were left unchanged",
                joint
            ),
        }
    }
}
