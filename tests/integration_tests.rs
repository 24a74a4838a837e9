use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

use serial_test::serial;

fn hevcify() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hevcify"));
    cmd.env("RUST_LOG", "hevcify=info");
    cmd
}

fn combined_output(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn run_json(input: &Path, output: &Path, extra_env: &[(&str, &str)]) -> (Output, serde_json::Value) {
    let mut cmd = hevcify();
    cmd.args([
        "run",
        input.to_str().unwrap(),
        output.to_str().unwrap(),
        "--workers",
        "3",
        "--json",
    ]);
    for (key, value) in extra_env {
        cmd.env(key, value);
    }
    let result = cmd.output().expect("Failed to execute run command");
    let summary = serde_json::from_slice(&result.stdout).unwrap_or_else(|e| {
        panic!(
            "run did not print a JSON summary ({e}): {}",
            combined_output(&result)
        )
    });
    (result, summary)
}

/// Test help commands work
#[test]
#[serial]
fn test_help_commands() {
    let help_output = hevcify()
        .arg("--help")
        .output()
        .expect("Failed to execute help command");

    assert!(help_output.status.success(), "Help command failed");

    let help_stdout = String::from_utf8_lossy(&help_output.stdout);
    assert!(help_stdout.contains("hevcify"), "Help should contain program name");
    assert!(help_stdout.contains("run"), "Help should list run command");
    assert!(help_stdout.contains("scan"), "Help should list scan command");
    assert!(help_stdout.contains("clean"), "Help should list clean command");
}

/// Test that invalid paths are handled gracefully
#[test]
#[serial]
fn test_invalid_paths() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("out");

    let run_output = hevcify()
        .args(["run", "/non/existent/path", out.to_str().unwrap()])
        .output()
        .expect("Failed to execute run command");
    assert_eq!(run_output.status.code(), Some(1), "Run should fail with invalid path");
    assert!(!out.exists(), "Run must not create the output for a missing input");

    let scan_output = hevcify()
        .args(["scan", "/non/existent/path", out.to_str().unwrap()])
        .output()
        .expect("Failed to execute scan command");
    assert!(!scan_output.status.success(), "Scan should fail with invalid path");

    let clean_output = hevcify()
        .args(["clean", "/non/existent/path"])
        .output()
        .expect("Failed to execute clean command");
    assert!(!clean_output.status.success(), "Clean should fail with invalid path");
}

#[test]
#[serial]
fn test_zero_workers_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let output = hevcify()
        .args([
            "run",
            temp_dir.path().to_str().unwrap(),
            temp_dir.path().join("out").to_str().unwrap(),
            "--workers",
            "0",
        ])
        .output()
        .expect("Failed to execute run command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--workers"));
}

#[test]
#[serial]
fn test_run_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("in");
    let output = temp_dir.path().join("out");
    fs::create_dir_all(&input).unwrap();

    let (result, summary) = run_json(&input, &output, &[]);

    assert!(result.status.success(), "{}", combined_output(&result));
    for key in ["converted", "copied", "skipped", "failed", "workers"] {
        assert_eq!(summary[key], 0, "{key} should be 0");
    }
    assert!(output.is_dir());
}

/// Existing outputs are skipped before any probing, so no ffmpeg is needed
#[test]
#[serial]
fn test_run_skips_existing_outputs() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("in");
    let output = temp_dir.path().join("out");
    fs::create_dir_all(input.join("Season 01")).unwrap();
    fs::create_dir_all(output.join("Season 01")).unwrap();
    fs::write(input.join("Season 01/e01.mkv"), "source").unwrap();
    fs::write(input.join("movie.mov"), "source").unwrap();
    fs::write(output.join("Season 01/e01.mp4"), "done").unwrap();
    fs::write(output.join("movie.mp4"), "done").unwrap();

    let (result, summary) = run_json(
        &input,
        &output,
        &[("FFPROBE_BIN", "/nonexistent/ffprobe"), ("FFMPEG_BIN", "/nonexistent/ffmpeg")],
    );

    assert!(result.status.success(), "{}", combined_output(&result));
    assert_eq!(summary["skipped"], 2);
    assert_eq!(summary["failed"], 0);
    assert_eq!(fs::read_to_string(output.join("movie.mp4")).unwrap(), "done");
}

/// A failing probe is reported per file and turns the exit status to 2
#[test]
#[serial]
fn test_run_reports_failures_with_exit_status() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("in");
    let output = temp_dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    fs::create_dir_all(&output).unwrap();
    fs::write(input.join("new.mov"), "source").unwrap();
    fs::write(input.join("old.mov"), "source").unwrap();
    fs::write(output.join("old.mp4"), "done").unwrap();

    let (result, summary) = run_json(&input, &output, &[("FFPROBE_BIN", "/nonexistent/ffprobe")]);

    assert_eq!(result.status.code(), Some(2), "{}", combined_output(&result));
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["skipped"], 1);
    let failure = &summary["failures"][0];
    assert!(failure["source"].as_str().unwrap().ends_with("new.mov"));
    assert!(failure["cause"].as_str().unwrap().contains("ffprobe failed"));
    assert!(!output.join("new.mp4").exists());
}

/// Rerunning with relative roots must not pick up the output tree as input
#[test]
#[serial]
fn test_run_relative_roots_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("out/show")).unwrap();
    fs::create_dir_all(root.join("show")).unwrap();
    fs::write(root.join("a.mov"), "source").unwrap();
    fs::write(root.join("show/e01.mkv"), "source").unwrap();
    fs::write(root.join("out/a.mp4"), "done").unwrap();
    fs::write(root.join("out/show/e01.mp4"), "done").unwrap();

    let result = hevcify()
        .current_dir(root)
        .args(["run", ".", "out", "--json"])
        .env("FFPROBE_BIN", "/nonexistent/ffprobe")
        .output()
        .expect("Failed to execute run command");
    let summary: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();

    assert!(result.status.success(), "{}", combined_output(&result));
    assert_eq!(summary["skipped"], 2);
    assert_eq!(summary["failed"], 0);
    assert!(!root.join("out/out").exists());
}

#[test]
#[serial]
fn test_scan_respects_ignore_file() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("in");
    let output = temp_dir.path().join("out");
    fs::create_dir_all(input.join("Samples")).unwrap();
    fs::create_dir_all(&output).unwrap();
    fs::write(input.join(".hevcifyignore"), "Samples/\n*.nfo\n").unwrap();
    fs::write(input.join("Samples/sample.mkv"), "").unwrap();
    fs::write(input.join("movie.nfo"), "").unwrap();
    fs::write(input.join("movie.mkv"), "").unwrap();
    fs::write(input.join("other.mov"), "").unwrap();
    fs::write(output.join("other.mp4"), "").unwrap();

    let scan_output = hevcify()
        .args(["scan", input.to_str().unwrap(), output.to_str().unwrap()])
        .output()
        .expect("Failed to execute scan command");

    assert!(scan_output.status.success(), "Scan command failed");
    let stdout = String::from_utf8_lossy(&scan_output.stdout);
    assert!(
        stdout.contains("1 pending, 1 already produced"),
        "Unexpected scan output: {}",
        combined_output(&scan_output)
    );
}

#[test]
#[serial]
fn test_clean_removes_staging_files() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path();
    fs::write(output.join("done.mp4"), "done").unwrap();
    fs::write(
        output.join("half.7d444840-9dc0-11d1-b245-5ffdce74fad2.part.mp4"),
        "partial",
    )
    .unwrap();

    let clean_output = hevcify()
        .args(["clean", output.to_str().unwrap()])
        .output()
        .expect("Failed to execute clean command");

    assert!(clean_output.status.success(), "Clean command failed");
    assert!(output.join("done.mp4").exists());
    assert!(!output
        .join("half.7d444840-9dc0-11d1-b245-5ffdce74fad2.part.mp4")
        .exists());
}
