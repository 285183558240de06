//! BVH serialization
//!
//! The hierarchy is emitted from the document's preserved header lines, so
//! comments, indentation and formatting survive a round trip. Only the motion
//! section is regenerated.

use std::fmt::Write as _;
use std::io;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Digits past this add nothing to an `f64`
pub const MAX_PRECISION: usize = 17;

/// Formatting of serialized frame values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Digits after the decimal point, capped at [`MAX_PRECISION`]
    pub precision: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { precision: 6 }
    }
}

impl WriteOptions {
    pub fn with_precision(precision: usize) -> Self {
        Self {
            precision: precision.min(MAX_PRECISION),
        }
    }
}

/// Serialize a document to BVH text
pub fn write_document(doc: &Document, options: &WriteOptions) -> String {
    let motion = doc.motion();
    let line_estimate = motion
        .width()
        .saturating_mul(options.precision.min(MAX_PRECISION) + 6);
    let mut out = String::with_capacity(
        doc.header()
            .iter()
            .map(|l| l.len() + 1)
            .sum::<usize>()
            .saturating_add(motion.frame_count().saturating_mul(line_estimate))
            .saturating_add(64),
    );

    for line in doc.header() {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("MOTION\n");
    // Writing into a String cannot fail
    let _ = writeln!(out, "Frames: {}", motion.frame_count());
    let _ = writeln!(out, "Frame Time: {}", motion.frame_time());
    for frame in motion.frames() {
        push_values(&mut out, frame, ' ', options.precision);
        out.push('\n');
    }
    out
}

/// Serialize a document into any writer
pub fn write_to<W: io::Write>(doc: &Document, writer: &mut W, options: &WriteOptions) -> io::Result<()> {
    writer.write_all(write_document(doc, options).as_bytes())
}

/// Append `values` at fixed precision, joined by `separator`
pub(crate) fn push_values(out: &mut String, values: &[f64], separator: char, precision: usize) {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(separator);
        }
        let _ = write!(out, "{:.*}", precision.min(MAX_PRECISION), value);
    }
}

/// Replace the three numbers of an `OFFSET` line, keeping its indentation.
///
/// Lines without an `OFFSET` keyword are returned unchanged.
pub(crate) fn rewrite_offset_line(line: &str, offset: DVec3) -> String {
    let Some(at) = line.find("OFFSET") else {
        return line.to_string();
    };
    let prefix = &line[..at + "OFFSET".len()];
    // Adding zero folds -0.0 into 0.0
    let [x, y, z] = offset.to_array().map(|v| v + 0.0);
    format!("{} {:.6} {:.6} {:.6}", prefix, x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_offset_line_keeps_indentation() {
        let line = "\t\tOFFSET 1.000000 2.5 -3";
        let rewritten = rewrite_offset_line(line, DVec3::new(0.0, 4.25, -0.0));
        assert_eq!(rewritten, "\t\tOFFSET 0.000000 4.250000 0.000000");
    }

    #[test]
    fn test_rewrite_offset_line_ignores_other_lines() {
        let line = "  CHANNELS 3 Zrotation Xrotation Yrotation";
        assert_eq!(rewrite_offset_line(line, DVec3::ONE), line);
    }

    #[test]
    fn test_precision_is_capped() {
        assert_eq!(WriteOptions::with_precision(usize::MAX).precision, MAX_PRECISION);
        assert_eq!(WriteOptions::with_precision(3).precision, 3);

        let mut out = String::new();
        push_values(&mut out, &[0.5], ' ', usize::MAX);
        assert_eq!(out, format!("{:.17}", 0.5));
    }

    #[test]
    fn test_push_values_precision() {
        let mut out = String::new();
        push_values(&mut out, &[1.0, -0.5, 1.0 / 3.0], ' ', 3);
        assert_eq!(out, "1.000 -0.500 0.333");

        let mut csv = String::new();
        push_values(&mut csv, &[2.0], ',', 0);
        assert_eq!(csv, "2");
    }
}
