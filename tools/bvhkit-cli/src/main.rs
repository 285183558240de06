//! bvhkit - BVH motion file tool
//!
//! Inspects, slices, centers, rotates, retargets and exports BVH files.

mod config;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bvhkit_core::export::{write_channel_csv, write_position_csv};
use bvhkit_core::{Axis, Dimension, Document, WriteOptions};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "bvhkit")]
#[command(about = "BVH motion file tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (RUST_LOG still applies)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Decimals written for frame values
    #[arg(long, global = true)]
    precision: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print skeleton, motion and dimension summary
    Info {
        /// Input BVH file
        input: PathBuf,
    },

    /// Print global joint transforms of one frame as JSON
    Fk {
        /// Input BVH file
        input: PathBuf,

        /// Frame index
        #[arg(short, long, default_value_t = 0)]
        frame: usize,

        /// Divide positions by a skeleton extent (height, width or depth)
        #[arg(short, long)]
        normalize: Option<Dimension>,
    },

    /// Extract a frame range
    Slice {
        /// Input BVH file
        input: PathBuf,

        /// First frame (inclusive)
        #[arg(long)]
        from: usize,

        /// Last frame (exclusive)
        #[arg(long)]
        to: usize,

        /// Output .bvh file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Move the root so the skeleton is centered at one frame
    Center {
        /// Input BVH file
        input: PathBuf,

        /// What to center on
        #[arg(value_enum)]
        mode: CenterMode,

        /// Left foot joint (feet mode)
        #[arg(long, default_value = "LeftFoot")]
        left: String,

        /// Right foot joint (feet mode)
        #[arg(long, default_value = "RightFoot")]
        right: String,

        /// Joint to center on (joint mode)
        #[arg(short, long)]
        joint: Option<String>,

        /// Reference frame
        #[arg(short, long, default_value_t = 0)]
        frame: usize,

        /// Output .bvh file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rotate the clip about the root (Euler XYZ degrees)
    Rotate {
        /// Input BVH file
        input: PathBuf,

        /// Rotation angles X Y Z in degrees
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
        euler: Vec<f64>,

        /// Rotate about the world origin instead of the root's own frame
        #[arg(long)]
        world: bool,

        /// Output .bvh file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reorient the rest pose while keeping world-space motion
    Retarget {
        /// Input BVH file (overrides the job file)
        input: Option<PathBuf>,

        /// TOML job file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// New alignment of a joint as NAME=X,Y,Z (Euler XYZ degrees)
        #[arg(short, long = "joint", value_parser = config::parse_joint_target)]
        joints: Vec<(String, [f64; 3])>,

        /// Canonical bone axis (overrides the job file)
        #[arg(short, long)]
        axis: Option<Axis>,

        /// Output .bvh file (overrides the job file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export channel values or global positions as CSV
    Csv {
        /// Input BVH file
        input: PathBuf,

        /// Write global joint positions instead of raw channels
        #[arg(long)]
        positions: bool,

        /// Output .csv file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CenterMode {
    /// Root at the origin
    Root,
    /// Root above the origin, feet on the ground
    Feet,
    /// Chosen joint at the origin
    Joint,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let write_options = cli
        .precision
        .map(WriteOptions::with_precision)
        .unwrap_or_default();

    match cli.command {
        Commands::Info { input } => info(&input)?,

        Commands::Fk {
            input,
            frame,
            normalize,
        } => fk(&input, frame, normalize)?,

        Commands::Slice {
            input,
            from,
            to,
            output,
        } => {
            let doc = load(&input)?;
            let sliced = doc.slice(from, to)?;
            let output = output.unwrap_or_else(|| default_output(&input, "slice", "bvh"));
            save(&sliced, &output, &write_options)?;
        }

        Commands::Center {
            input,
            mode,
            left,
            right,
            joint,
            frame,
            output,
        } => {
            let doc = load(&input)?;
            let centered = match mode {
                CenterMode::Root => doc.center_root(frame)?,
                CenterMode::Feet => doc.center_feet(&left, &right, frame)?,
                CenterMode::Joint => {
                    let joint = joint.context("--joint is required in joint mode")?;
                    doc.center_on_joint(&joint, frame)?
                }
            };
            let output = output.unwrap_or_else(|| default_output(&input, "center", "bvh"));
            save(&centered, &output, &write_options)?;
        }

        Commands::Rotate {
            input,
            euler,
            world,
            output,
        } => {
            let euler: [f64; 3] = euler
                .try_into()
                .map_err(|_| anyhow::anyhow!("--euler takes exactly three angles"))?;
            let doc = load(&input)?;
            let rotated = if world {
                doc.rotate_root_world(euler)?
            } else {
                doc.rotate_root_local(euler)?
            };
            let output = output.unwrap_or_else(|| default_output(&input, "rotate", "bvh"));
            save(&rotated, &output, &write_options)?;
        }

        Commands::Retarget {
            input,
            config: job_file,
            joints,
            axis,
            output,
        } => {
            let mut job = match &job_file {
                Some(path) => config::load_job(path)?,
                None => config::JobConfig::default(),
            };
            job.retarget.joints.extend(joints);
            if let Some(axis) = axis {
                job.retarget.canonical_axis = axis;
            }
            if let Some(precision) = cli.precision {
                job.precision = precision;
            }

            let input = input
                .or(job.input.take())
                .context("no input file (pass one or set `input` in the job file)")?;
            let output = output
                .or(job.output.take())
                .unwrap_or_else(|| default_output(&input, "retarget", "bvh"));
            retarget(&input, &output, &job)?;
        }

        Commands::Csv {
            input,
            positions,
            output,
        } => {
            let doc = load(&input)?;
            let output = output.unwrap_or_else(|| default_output(&input, "csv", "csv"));
            tracing::info!("Writing {:?}", output);
            let file = File::create(&output)
                .with_context(|| format!("Failed to create output: {:?}", output))?;
            let writer = BufWriter::new(file);
            let precision = write_options.precision;
            let written = if positions {
                write_position_csv(&doc, writer, precision)
            } else {
                write_channel_csv(&doc, writer, precision)
            };
            written.with_context(|| format!("Failed to write CSV: {:?}", output))?;
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<Document> {
    let parsed = Document::load(path).with_context(|| format!("Failed to load BVH: {:?}", path))?;
    tracing::debug!(
        joints = parsed.document.skeleton().len(),
        frames = parsed.document.frame_count(),
        "Loaded {:?}",
        path
    );
    Ok(parsed.document)
}

fn save(doc: &Document, path: &Path, options: &WriteOptions) -> Result<()> {
    doc.save(path, options)
        .with_context(|| format!("Failed to write BVH: {:?}", path))?;
    tracing::info!("Wrote {:?}", path);
    Ok(())
}

/// `<dir>/<stem>_<suffix>.<ext>` next to the input
fn default_output(input: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{}_{}.{}", stem, suffix, ext))
}

fn info(input: &Path) -> Result<()> {
    let parsed = Document::load(input).with_context(|| format!("Failed to load BVH: {:?}", input))?;
    let doc = &parsed.document;
    let skeleton = doc.skeleton();

    println!("{}", input.display());
    println!(
        "  joints: {} ({} channels)",
        skeleton.len(),
        skeleton.channel_count()
    );
    for (_, joint) in skeleton.joints() {
        let depth = std::iter::successors(joint.parent(), |&p| skeleton.joint(p).parent()).count();
        let channels: Vec<&str> = joint.channels().iter().map(|c| c.name()).collect();
        println!(
            "  {:indent$}{} [{}]",
            "",
            joint.name(),
            channels.join(" "),
            indent = depth * 2
        );
    }
    println!(
        "  frames: {} at {} s",
        doc.frame_count(),
        doc.motion().frame_time()
    );

    let dims = doc.skeleton_dims();
    println!(
        "  skeleton: height {:.3}, width {:.3}, depth {:.3}",
        dims.height, dims.width, dims.depth
    );
    if let Some(motion) = doc.motion_dims() {
        let [min_x, max_x, min_y, max_y, min_z, max_z] = motion.to_array();
        println!(
            "  root range: x [{:.3}, {:.3}], y [{:.3}, {:.3}], z [{:.3}, {:.3}]",
            min_x, max_x, min_y, max_y, min_z, max_z
        );
    }
    for diagnostic in &parsed.diagnostics {
        println!("  warning: {}", diagnostic);
    }
    Ok(())
}

#[derive(Serialize)]
struct JointReport<'a> {
    name: &'a str,
    position: [f64; 3],
    /// Quaternion as x, y, z, w
    rotation: [f64; 4],
}

fn fk(input: &Path, frame: usize, normalize: Option<Dimension>) -> Result<()> {
    let doc = load(input)?;
    let pose = match normalize {
        Some(dimension) => doc.global_transforms_normalized(frame, dimension)?,
        None => doc.global_transforms(frame)?,
    };

    let report: Vec<JointReport<'_>> = pose
        .named(doc.skeleton())
        .map(|(name, transform)| JointReport {
            name,
            position: transform.position.to_array(),
            rotation: transform.rotation.to_array(),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn retarget(input: &Path, output: &Path, job: &config::JobConfig) -> Result<()> {
    anyhow::ensure!(
        !job.retarget.joints.is_empty(),
        "no joints to retarget (use --joint NAME=X,Y,Z or [retarget.joints])"
    );

    let mut doc = load(input)?;
    let options = job.retarget_options();
    let diagnostics = doc
        .apply_rest_pose(
            job.retarget
                .joints
                .iter()
                .map(|(name, euler)| (name.as_str(), *euler)),
            &options,
        )
        .with_context(|| format!("Failed to retarget {:?}", input))?;
    if !diagnostics.is_empty() {
        tracing::info!("{} joints left unchanged", diagnostics.len());
    }

    save(&doc, output, &job.write_options())
}
