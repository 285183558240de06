//! Retarget job files (TOML)
//!
//! ```toml
//! input = "walk.bvh"
//! output = "walk_tpose.bvh"
//! precision = 6
//!
//! [retarget]
//! canonical_axis = "Y"
//!
//! [retarget.joints]
//! LeftArm = [0.0, 0.0, 90.0]
//! ```
//!
//! Relative paths are resolved against the job file's directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bvhkit_core::{Axis, RetargetOptions, WriteOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default = "default_precision")]
    pub precision: usize,
    #[serde(default)]
    pub retarget: RetargetSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetargetSection {
    #[serde(default = "default_axis")]
    pub canonical_axis: Axis,
    /// Joint name -> Euler XYZ degrees of the new alignment
    #[serde(default)]
    pub joints: BTreeMap<String, [f64; 3]>,
}

fn default_precision() -> usize {
    WriteOptions::default().precision
}

fn default_axis() -> Axis {
    RetargetOptions::default().canonical_axis
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            precision: default_precision(),
            retarget: RetargetSection::default(),
        }
    }
}

impl Default for RetargetSection {
    fn default() -> Self {
        Self {
            canonical_axis: default_axis(),
            joints: BTreeMap::new(),
        }
    }
}

impl JobConfig {
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions::with_precision(self.precision)
    }

    pub fn retarget_options(&self) -> RetargetOptions {
        RetargetOptions {
            canonical_axis: self.retarget.canonical_axis,
        }
    }
}

/// Read and validate a job file
pub fn load_job(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file: {:?}", path))?;
    let mut job: JobConfig =
        toml::from_str(&content).with_context(|| format!("Invalid job file: {:?}", path))?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    job.input = job.input.map(|p| base.join(p));
    job.output = job.output.map(|p| base.join(p));
    Ok(job)
}

/// Parse a `NAME=X,Y,Z` retarget target
pub fn parse_joint_target(s: &str) -> Result<(String, [f64; 3]), String> {
    let (name, angles) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=X,Y,Z, got `{}`", s))?;
    if name.is_empty() {
        return Err(format!("missing joint name in `{}`", s));
    }

    let values = angles
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid angle in `{}`: {}", s, e))?;
    let angles: [f64; 3] = values
        .try_into()
        .map_err(|_| format!("expected three angles in `{}`", s))?;
    Ok((name.to_string(), angles))
}
