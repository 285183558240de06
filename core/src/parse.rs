//! BVH text parser
//!
//! The hierarchy is read by recursive descent over whitespace-tokenized lines
//! with a single shared cursor. Joints are handed to a [`SkeletonBuilder`] in
//! the order they are met, which is exactly the pre-order the motion columns
//! follow. Every header line is kept verbatim so the writer can reproduce it.

use glam::DVec3;

use crate::channel::{Channel, ChannelLayout};
use crate::document::{Document, Parsed};
use crate::error::{Diagnostic, ParseError};
use crate::motion::Motion;
use crate::skeleton::{DuplicateName, JointDef, JointId, SkeletonBuilder};

/// Parse a complete BVH document
pub(crate) fn parse_document(text: &str) -> Result<Parsed, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let motion_at = lines.iter().position(|line| line.trim() == "MOTION");
    let header_end = motion_at.unwrap_or(lines.len());

    let mut hierarchy = HierarchyParser::new(&lines[..header_end]);
    hierarchy.parse()?;
    let HierarchyParser {
        builder,
        mut diagnostics,
        ..
    } = hierarchy;
    let skeleton = builder.build().ok_or(ParseError::MissingRoot)?;

    let motion_at = motion_at.ok_or(ParseError::MissingMotion)?;
    let motion = parse_motion(&lines, motion_at + 1, skeleton.channel_count(), &mut diagnostics)?;

    tracing::debug!(
        joints = skeleton.len(),
        channels = skeleton.channel_count(),
        frames = motion.frame_count(),
        "parsed BVH document"
    );

    let header = lines[..header_end].iter().map(|l| l.to_string()).collect();
    Ok(Parsed {
        document: Document::from_parts(header, skeleton, motion),
        diagnostics,
    })
}

// ============================================================================
// Hierarchy
// ============================================================================

struct HierarchyParser<'a> {
    lines: &'a [&'a str],
    cursor: usize,
    builder: SkeletonBuilder,
    diagnostics: Vec<Diagnostic>,
}

/// A non-blank line split into tokens, with its 0-based index
struct Line<'a> {
    index: usize,
    tokens: Vec<&'a str>,
}

impl Line<'_> {
    /// 1-based line number for error reporting
    fn number(&self) -> usize {
        self.index + 1
    }

    fn keyword(&self) -> &str {
        self.tokens[0]
    }

    fn text(&self) -> String {
        self.tokens.join(" ")
    }

    /// Everything after the keyword, as written
    fn name(&self) -> Result<String, ParseError> {
        if self.tokens.len() < 2 {
            return Err(ParseError::Unexpected {
                line: self.number(),
                expected: "joint name",
                found: self.text(),
            });
        }
        Ok(self.tokens[1..].join(" "))
    }
}

impl<'a> HierarchyParser<'a> {
    fn new(lines: &'a [&'a str]) -> Self {
        Self {
            lines,
            cursor: 0,
            builder: SkeletonBuilder::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Advance to the next non-blank line
    fn next_line(&mut self) -> Option<Line<'a>> {
        while self.cursor < self.lines.len() {
            let index = self.cursor;
            self.cursor += 1;
            let tokens: Vec<&str> = self.lines[index].split_whitespace().collect();
            if !tokens.is_empty() {
                return Some(Line { index, tokens });
            }
        }
        None
    }

    fn parse(&mut self) -> Result<(), ParseError> {
        // Anything before ROOT (HIERARCHY, comments) is only kept as header text
        let root_line = loop {
            match self.next_line() {
                Some(line) if line.keyword() == "ROOT" => break line,
                Some(_) => continue,
                None => return Err(ParseError::MissingRoot),
            }
        };

        let name = root_line.name()?;
        let root = self
            .builder
            .root(JointDef::new(name))
            .map_err(|e| duplicate(e, &root_line))?;
        self.joint_body(root, &root_line)?;

        if let Some(line) = self.next_line() {
            return Err(ParseError::Unexpected {
                line: line.number(),
                expected: "end of hierarchy",
                found: line.text(),
            });
        }
        Ok(())
    }

    fn open_brace(&mut self, id: JointId, decl: &Line<'_>) -> Result<(), ParseError> {
        match self.next_line() {
            Some(line) if line.tokens == ["{"] => Ok(()),
            Some(line) => Err(ParseError::Unexpected {
                line: line.number(),
                expected: "`{`",
                found: line.text(),
            }),
            None => Err(self.unclosed(id, decl)),
        }
    }

    fn joint_body(&mut self, id: JointId, decl: &Line<'_>) -> Result<(), ParseError> {
        self.open_brace(id, decl)?;

        loop {
            let Some(line) = self.next_line() else {
                return Err(self.unclosed(id, decl));
            };
            match line.keyword() {
                "OFFSET" => {
                    let offset = parse_offset(&line)?;
                    self.builder.set_offset(id, offset, Some(line.index));
                }
                "CHANNELS" => self.channels(id, &line)?,
                "JOINT" => {
                    let child = self
                        .builder
                        .child(id, JointDef::new(line.name()?))
                        .map_err(|e| duplicate(e, &line))?;
                    self.joint_body(child, &line)?;
                }
                "End" if line.tokens.get(1) == Some(&"Site") => {
                    let name = format!("{}_EndSite", self.builder.name(id));
                    let child = self
                        .builder
                        .child(id, JointDef::end_site(name, DVec3::ZERO))
                        .map_err(|e| duplicate(e, &line))?;
                    self.end_site_body(child, &line)?;
                }
                "}" => return Ok(()),
                _ => {
                    return Err(ParseError::Unexpected {
                        line: line.number(),
                        expected: "OFFSET, CHANNELS, JOINT, End Site or `}`",
                        found: line.text(),
                    });
                }
            }
        }
    }

    fn end_site_body(&mut self, id: JointId, decl: &Line<'_>) -> Result<(), ParseError> {
        self.open_brace(id, decl)?;

        loop {
            let Some(line) = self.next_line() else {
                return Err(self.unclosed(id, decl));
            };
            match line.keyword() {
                "OFFSET" => {
                    let offset = parse_offset(&line)?;
                    self.builder.set_offset(id, offset, Some(line.index));
                }
                "}" => return Ok(()),
                _ => {
                    return Err(ParseError::Unexpected {
                        line: line.number(),
                        expected: "OFFSET or `}`",
                        found: line.text(),
                    });
                }
            }
        }
    }

    fn channels(&mut self, id: JointId, line: &Line<'_>) -> Result<(), ParseError> {
        let Some(count) = line.tokens.get(1) else {
            return Err(ParseError::Unexpected {
                line: line.number(),
                expected: "channel count",
                found: line.text(),
            });
        };
        let declared: usize = count.parse().map_err(|_| ParseError::InvalidNumber {
            line: line.number(),
            token: count.to_string(),
        })?;

        let names = &line.tokens[2..];
        if names.len() != declared {
            return Err(ParseError::ChannelCount {
                line: line.number(),
                declared,
                listed: names.len(),
            });
        }

        let channels = names
            .iter()
            .map(|name| {
                name.parse::<Channel>().map_err(|()| ParseError::UnknownChannel {
                    line: line.number(),
                    name: name.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (layout, diagnostic) = ChannelLayout::detect(self.builder.name(id), &channels);
        self.diagnostics.extend(diagnostic);
        self.builder.set_channels(id, &channels, layout);
        Ok(())
    }

    fn unclosed(&self, id: JointId, decl: &Line<'_>) -> ParseError {
        ParseError::UnclosedJoint {
            line: decl.number(),
            joint: self.builder.name(id).to_string(),
        }
    }
}

fn duplicate(error: DuplicateName, line: &Line<'_>) -> ParseError {
    ParseError::DuplicateJoint {
        line: line.number(),
        name: error.0,
    }
}

fn parse_offset(line: &Line<'_>) -> Result<DVec3, ParseError> {
    if line.tokens.len() != 4 {
        return Err(ParseError::Unexpected {
            line: line.number(),
            expected: "three OFFSET values",
            found: line.text(),
        });
    }
    let mut v = DVec3::ZERO;
    for (i, token) in line.tokens[1..].iter().enumerate() {
        v[i] = parse_number(token, line.number())?;
    }
    Ok(v)
}

fn parse_number(token: &str, line: usize) -> Result<f64, ParseError> {
    token.parse().map_err(|_| ParseError::InvalidNumber {
        line,
        token: token.to_string(),
    })
}

// ============================================================================
// Motion
// ============================================================================

fn parse_motion(
    lines: &[&str],
    start: usize,
    width: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Motion, ParseError> {
    let mut rest = lines
        .iter()
        .enumerate()
        .skip(start)
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (line, value) = rest
        .next()
        .and_then(|(n, l)| l.strip_prefix("Frames:").map(|v| (n, v.trim())))
        .ok_or(ParseError::MissingMotionField("Frames:"))?;
    let declared: usize = value.parse().map_err(|_| ParseError::InvalidNumber {
        line,
        token: value.to_string(),
    })?;

    let (line, value) = rest
        .next()
        .and_then(|(n, l)| l.strip_prefix("Frame Time:").map(|v| (n, v.trim())))
        .ok_or(ParseError::MissingMotionField("Frame Time:"))?;
    let frame_time = parse_number(value, line)?;

    // `Frames:` is only a hint; nothing is reserved from it
    let mut values = Vec::new();
    let mut actual = 0;
    for (line, text) in rest {
        let before = values.len();
        for token in text.split_whitespace() {
            values.push(parse_number(token, line)?);
        }
        let found = values.len() - before;
        if found != width {
            return Err(ParseError::FrameWidth {
                line,
                expected: width,
                found,
            });
        }
        actual += 1;
    }

    if declared != actual {
        diagnostics.push(Diagnostic::FrameCountMismatch { declared, actual }.raise());
    }

    Ok(Motion::from_flat(width, frame_time, values))
}
