//! Integration tests for bvhkit
//!
//! Drives the built binary on a small clip and checks the files it writes.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use bvhkit_core::Document;
use tempfile::tempdir;

const WALK: &str = "\
HIERARCHY
ROOT Hips
{
  OFFSET 0.0 0.0 0.0
  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
  JOINT LeftFoot
  {
    OFFSET 1.0 -4.0 0.5
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
      OFFSET 0.0 -1.0 1.0
    }
  }
  JOINT RightFoot
  {
    OFFSET -1.0 -4.0 0.5
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
      OFFSET 0.0 -1.0 1.0
    }
  }
}
MOTION
Frames: 4
Frame Time: 0.033333
0.0 5.0 0.0 0.0 0.0 0.0 10.0 0.0 0.0 -10.0 0.0 0.0
1.0 5.1 0.5 5.0 0.0 0.0 20.0 5.0 0.0 -20.0 -5.0 0.0
2.0 5.2 1.0 10.0 0.0 0.0 30.0 10.0 0.0 -30.0 -10.0 0.0
3.0 5.1 1.5 5.0 0.0 0.0 40.0 15.0 0.0 -40.0 -15.0 0.0
";

fn write_walk(dir: &Path) -> PathBuf {
    let path = dir.join("walk.bvh");
    std::fs::write(&path, WALK).expect("Failed to write test clip");
    path
}

fn bvhkit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bvhkit"))
        .args(args)
        .output()
        .expect("Failed to run bvhkit")
}

fn run(args: &[&str]) -> String {
    let output = bvhkit(args);
    assert!(
        output.status.success(),
        "bvhkit {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout is not UTF-8")
}

fn load(path: &Path) -> Document {
    Document::load(path).expect("Failed to parse output").document
}

#[test]
fn test_info() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_walk(dir.path());

    let stdout = run(&["info", input.to_str().unwrap()]);
    assert!(stdout.contains("joints: 5 (12 channels)"), "{}", stdout);
    assert!(stdout.contains("frames: 4"), "{}", stdout);
    assert!(stdout.contains("LeftFoot_EndSite"), "{}", stdout);
}

#[test]
fn test_fk_json() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_walk(dir.path());

    let stdout = run(&["fk", input.to_str().unwrap(), "--frame", "2"]);
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("invalid JSON");
    let joints = report.as_array().expect("expected an array");
    assert_eq!(joints.len(), 5);
    assert_eq!(joints[0]["name"], "Hips");
    assert_eq!(joints[0]["position"][0].as_f64(), Some(2.0));
}

#[test]
fn test_fk_rejects_bad_frame() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_walk(dir.path());

    let output = bvhkit(&["fk", input.to_str().unwrap(), "--frame", "9"]);
    assert!(!output.status.success());
}

#[test]
fn test_slice_default_output() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_walk(dir.path());

    run(&["slice", input.to_str().unwrap(), "--from", "1", "--to", "3"]);
    let output = dir.path().join("walk_slice.bvh");
    assert!(output.exists(), "slice output should exist");

    let sliced = load(&output);
    assert_eq!(sliced.frame_count(), 2);
    assert_eq!(sliced.motion().value(0, 0), Some(1.0));
    assert_eq!(sliced.motion().value(0, 1), Some(2.0));
}

#[test]
fn test_center_feet() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_walk(dir.path());
    let output = dir.path().join("centered.bvh");

    run(&[
        "center",
        input.to_str().unwrap(),
        "feet",
        "-o",
        output.to_str().unwrap(),
    ]);

    let doc = load(&output);
    let pose = doc.global_transforms(0).unwrap();
    let left = pose.by_name(doc.skeleton(), "LeftFoot").unwrap().position;
    let right = pose.by_name(doc.skeleton(), "RightFoot").unwrap().position;
    assert!(((left.y + right.y) / 2.0).abs() < 1e-5);
}

#[test]
fn test_center_joint_requires_name() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_walk(dir.path());

    let output = bvhkit(&["center", input.to_str().unwrap(), "joint"]);
    assert!(!output.status.success());
}

#[test]
fn test_rotate_world() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_walk(dir.path());

    run(&[
        "rotate",
        input.to_str().unwrap(),
        "--euler",
        "0",
        "-90",
        "0",
        "--world",
    ]);

    let doc = load(&dir.path().join("walk_rotate.bvh"));
    let root = doc.global_transforms(3).unwrap().get(bvhkit_core::JointId::ROOT).position;
    // -90 degrees about Y maps (x, y, z) to (-z, y, x)
    assert!((root.x - -1.5).abs() < 1e-5, "{:?}", root);
    assert!((root.z - 3.0).abs() < 1e-5, "{:?}", root);
}

#[test]
fn test_retarget_keeps_world_positions() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_walk(dir.path());
    let output = dir.path().join("tpose.bvh");

    run(&[
        "retarget",
        input.to_str().unwrap(),
        "--joint",
        "LeftFoot=0,0,0",
        "-o",
        output.to_str().unwrap(),
    ]);

    let before = load(&input);
    let after = load(&output);
    let end = after.skeleton().id("LeftFoot_EndSite").unwrap();
    let offset = after.skeleton().joint(end).offset();
    assert!(offset.x.abs() < 1e-6 && offset.z.abs() < 1e-6, "{:?}", offset);
    assert!((offset.y - 2f64.sqrt()).abs() < 1e-6, "{:?}", offset);

    for frame in 0..before.frame_count() {
        let old = before.global_transforms(frame).unwrap();
        let new = after.global_transforms(frame).unwrap();
        for ((_, a), (_, b)) in old.iter().zip(new.iter()) {
            // Written at six decimals
            assert!(a.position.abs_diff_eq(b.position, 1e-4), "{:?} != {:?}", a, b);
        }
    }
}

#[test]
fn test_retarget_job_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_walk(dir.path());
    let job = dir.path().join("job.toml");
    std::fs::write(
        &job,
        r#"
input = "walk.bvh"
output = "walk_x.bvh"
precision = 4

[retarget]
canonical_axis = "X"

[retarget.joints]
LeftFoot = [0.0, 0.0, 0.0]
"#,
    )
    .expect("Failed to write job file");

    run(&["retarget", "--config", job.to_str().unwrap()]);

    let output = dir.path().join("walk_x.bvh");
    let text = std::fs::read_to_string(&output).expect("Failed to read output");
    assert!(text.contains("OFFSET 1.414214 0.000000 0.000000"), "{}", text);
    // Four decimals in the motion section
    assert!(text.contains("\n0.0000 5.0000 0.0000"), "{}", text);
}

#[test]
fn test_retarget_unknown_joint_fails() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_walk(dir.path());

    let output = bvhkit(&["retarget", input.to_str().unwrap(), "--joint", "Tail=0,0,0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Tail"));
    assert!(!dir.path().join("walk_retarget.bvh").exists());
}

#[test]
fn test_csv_positions() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = write_walk(dir.path());

    run(&["csv", input.to_str().unwrap(), "--positions", "--precision", "2"]);
    let csv = std::fs::read_to_string(dir.path().join("walk_csv.csv")).expect("Failed to read CSV");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("Hips_x,Hips_y,Hips_z,LeftFoot_x"));
    assert!(lines[1].starts_with("0.00,5.00,0.00,1.00,1.00,0.50"), "{}", lines[1]);
}
