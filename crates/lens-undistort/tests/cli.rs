use approx::assert_relative_eq;
use assert_cmd::Command;
use lens_undistort::core::{AnyImage, Image};
use lens_undistort::imageio::{load_image, save_image};
use lens_undistort::io::{CalibrationConfig, OptimalMatrixReport};
use predicates::prelude::*;
use std::path::Path;

fn bin() -> Command {
    Command::cargo_bin("lens-undistort").expect("binary")
}

fn identity_config(roi: Option<[i32; 4]>) -> CalibrationConfig {
    CalibrationConfig {
        camera_matrix: [[8.0, 0.0, 3.5], [0.0, 8.0, 2.5], [0.0, 0.0, 1.0]],
        distortion: vec![0.0; 5],
        new_camera_matrix: None,
        roi,
        alpha: None,
    }
}

fn write_ramp(path: &Path) -> AnyImage {
    let img = AnyImage::U8(
        Image::from_vec(8, 6, (0..48).map(|i| (i * 5 + 10) as u8).collect()).expect("image"),
    );
    save_image(path, &img).expect("save");
    img
}

#[test]
fn undistort_with_identity_calibration_copies_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    let calib = dir.path().join("calib.json");
    let img = write_ramp(&input);
    identity_config(None).write_json(&calib).expect("calib");

    bin()
        .arg("undistort")
        .arg("--image")
        .arg(&input)
        .arg("--calib")
        .arg(&calib)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    assert_eq!(load_image(&output).expect("output"), img);
}

#[test]
fn crop_zeroes_outside_roi() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    let calib = dir.path().join("calib.json");
    write_ramp(&input);
    identity_config(Some([2, 1, 4, 3])).write_json(&calib).expect("calib");

    bin()
        .args(["--verbose", "undistort", "--crop"])
        .arg("--image")
        .arg(&input)
        .arg("--calib")
        .arg(&calib)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let AnyImage::U8(out) = load_image(&output).expect("output") else {
        panic!("expected 8-bit output");
    };
    assert_eq!((out.width, out.height), (8, 6));
    for y in 0..6 {
        for x in 0..8 {
            let inside = (2..6).contains(&x) && (1..4).contains(&y);
            let v = out.data[y * 8 + x];
            if inside {
                assert_eq!(v, (y * 8 + x) as u8 * 5 + 10);
            } else {
                assert_eq!(v, 0, "pixel ({x}, {y})");
            }
        }
    }
}

#[test]
fn optimal_matrix_prints_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let calib = dir.path().join("calib.json");
    identity_config(None).write_json(&calib).expect("calib");

    let assert = bin()
        .arg("optimal-matrix")
        .arg("--calib")
        .arg(&calib)
        .args(["--width", "8", "--height", "6", "--alpha", "0.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"roi\""));

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let report: OptimalMatrixReport = serde_json::from_str(&stdout).expect("report json");
    assert_eq!(report.roi, [0, 0, 8, 6]);
    assert_relative_eq!(report.new_camera_matrix[0][0], 8.0, epsilon = 1e-9);
    assert_relative_eq!(report.new_camera_matrix[1][2], 2.5, epsilon = 1e-9);
}

#[test]
fn optimal_matrix_writes_output_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let calib = dir.path().join("calib.json");
    let report_path = dir.path().join("report.json");
    identity_config(None).write_json(&calib).expect("calib");

    bin()
        .arg("optimal-matrix")
        .arg("--calib")
        .arg(&calib)
        .args(["--width", "8", "--height", "6"])
        .arg("--output")
        .arg(&report_path)
        .assert()
        .success();

    let raw = std::fs::read_to_string(&report_path).expect("report");
    let report: OptimalMatrixReport = serde_json::from_str(&raw).expect("report json");
    assert_eq!((report.width, report.height), (8, 6));
    assert_eq!(report.alpha, 1.0);
}

#[test]
fn missing_calibration_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.png");
    write_ramp(&input);

    bin()
        .arg("undistort")
        .arg("--image")
        .arg(&input)
        .arg("--calib")
        .arg(dir.path().join("nope.json"))
        .arg("--output")
        .arg(dir.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn bad_coefficient_count_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.png");
    let calib = dir.path().join("calib.json");
    write_ramp(&input);
    let mut cfg = identity_config(None);
    cfg.distortion = vec![0.1, 0.2, 0.3];
    cfg.write_json(&calib).expect("calib");

    bin()
        .arg("undistort")
        .arg("--image")
        .arg(&input)
        .arg("--calib")
        .arg(&calib)
        .arg("--output")
        .arg(dir.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("distortion coefficients"));
}

#[test]
fn unknown_function_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.png");
    let calib = dir.path().join("calib.json");
    write_ramp(&input);
    identity_config(None).write_json(&calib).expect("calib");

    bin()
        .arg("undistort")
        .arg("--image")
        .arg(&input)
        .arg("--calib")
        .arg(&calib)
        .arg("--output")
        .arg(dir.path().join("out.png"))
        .args(["--function", "lens_undistort.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no math function registered"));
}
