//! Motion stream: fixed-width frames of channel values

use std::ops::Range;

use crate::error::{Error, Result};

/// Per-frame channel values plus frame duration.
///
/// Frames are stored back to back; each has exactly `width` values, one per
/// skeleton channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Motion {
    width: usize,
    frame_time: f64,
    values: Vec<f64>,
}

impl Motion {
    /// Build from frames. Every frame must be `width` values long.
    pub fn new(width: usize, frame_time: f64, frames: Vec<Vec<f64>>) -> Result<Self> {
        let mut values = Vec::with_capacity(width.saturating_mul(frames.len()));
        for frame in frames {
            check_width(width, frame.len())?;
            values.extend(frame);
        }
        Ok(Self {
            width,
            frame_time,
            values,
        })
    }

    pub(crate) fn from_flat(width: usize, frame_time: f64, values: Vec<f64>) -> Self {
        debug_assert!(width == 0 || values.len() % width == 0);
        Self {
            width,
            frame_time,
            values,
        }
    }

    pub fn frame_count(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.values.len() / self.width
        }
    }

    /// Seconds per frame
    pub fn frame_time(&self) -> f64 {
        self.frame_time
    }

    pub fn set_frame_time(&mut self, frame_time: f64) {
        self.frame_time = frame_time;
    }

    /// Values per frame
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&[f64]> {
        if index >= self.frame_count() {
            return None;
        }
        let start = index * self.width;
        Some(&self.values[start..start + self.width])
    }

    pub fn frame_mut(&mut self, index: usize) -> Option<&mut [f64]> {
        if index >= self.frame_count() {
            return None;
        }
        let start = index * self.width;
        Some(&mut self.values[start..start + self.width])
    }

    pub fn frames(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.width.max(1))
    }

    pub fn frames_mut(&mut self) -> impl ExactSizeIterator<Item = &mut [f64]> + '_ {
        self.values.chunks_exact_mut(self.width.max(1))
    }

    /// Frames in `range`, in order
    pub fn frame_range(&self, range: Range<usize>) -> Option<&[f64]> {
        if range.start > range.end || range.end > self.frame_count() {
            return None;
        }
        Some(&self.values[range.start * self.width..range.end * self.width])
    }

    /// One value of one frame
    pub fn value(&self, column: usize, frame: usize) -> Option<f64> {
        if column >= self.width {
            return None;
        }
        self.frame(frame).map(|f| f[column])
    }

    /// One column across every frame
    pub fn column(&self, column: usize) -> Option<Vec<f64>> {
        if column >= self.width {
            return None;
        }
        Some(self.frames().map(|f| f[column]).collect())
    }

    /// Copy of the frames in `range`, keeping width and frame time
    pub fn slice(&self, range: Range<usize>) -> Option<Motion> {
        let values = self.frame_range(range)?.to_vec();
        Some(Self::from_flat(self.width, self.frame_time, values))
    }

    pub fn push_frame(&mut self, frame: &[f64]) -> Result<()> {
        check_width(self.width, frame.len())?;
        self.values.extend_from_slice(frame);
        Ok(())
    }
}

fn check_width(expected: usize, found: usize) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        Err(Error::FrameWidth { expected, found })
    }
}
