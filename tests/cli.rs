use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_configs(dir: &Path, job: &str) -> (String, String) {
    let shares = dir.join("shares.yaml");
    fs::write(&shares, "shares:\n  - server: nas\n    dir: builds\n").unwrap();

    let job_path = dir.join("job.yaml");
    fs::write(&job_path, job).unwrap();

    (
        shares.to_string_lossy().to_string(),
        job_path.to_string_lossy().to_string(),
    )
}

fn cifs_publish() -> Command {
    let mut cmd = Command::cargo_bin("cifs-publish").unwrap();
    cmd.env_remove("CIFS_SHARE")
        .env_remove("CIFS_WINS_SERVER")
        .env_remove("BUILD_NUMBER")
        .env_remove("JOB_NAME")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn publish_json_keeps_stdout_machine_readable() {
    let config_dir = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    fs::create_dir_all(ws.path().join("build")).unwrap();
    fs::write(ws.path().join("build/out.jar"), "jar").unwrap();

    let (shares, job) = write_configs(
        config_dir.path(),
        "entries:\n  - sourcePattern: \"build/*.jar\"\n    destinationTemplate: releases\n    flatten: true\n",
    );

    let output = cifs_publish()
        .args(["--shares-config", &shares, "publish"])
        .arg(ws.path())
        .args(["-c", &job, "--dry-run", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["filesCopied"], 1);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Connecting to nas"));
    assert!(stderr.contains("Transferred 1 files."));
}

#[test]
fn publish_without_json_prints_log_to_stdout() {
    let config_dir = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    fs::write(ws.path().join("notes.txt"), "notes").unwrap();

    let (shares, job) = write_configs(
        config_dir.path(),
        "entries:\n  - sourcePattern: \"*.txt\"\n    destinationTemplate: docs\n",
    );

    cifs_publish()
        .args(["--shares-config", &shares, "publish"])
        .arg(ws.path())
        .args(["-c", &job, "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Connecting to nas"))
        .stdout(predicate::str::contains("Published 1 files"));
}

#[test]
fn validate_warns_about_wins_server() {
    let config_dir = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();

    let (shares, job) = write_configs(
        config_dir.path(),
        "winsServer: 10.0.0.5\nentries:\n  - sourcePattern: \"**\"\n    destinationTemplate: out\n",
    );

    cifs_publish()
        .args(["--shares-config", &shares, "validate"])
        .arg(ws.path())
        .args(["-c", &job])
        .assert()
        .success()
        .stdout(predicate::str::contains("[winsServer]"))
        .stdout(predicate::str::contains("10.0.0.5"));
}

#[test]
fn publish_help_mentions_wins_server() {
    cifs_publish()
        .args(["publish", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("winsServer"));
}
