//! A driver that outlives the per-file timeout is killed, recorded as a
//! failure, and the run still exits cleanly instead of hanging.

use crate::prelude::{annobatch, write_fake_driver, write_input_file, DriverBehavior};

#[test]
fn slow_driver_times_out_and_is_recorded_as_failed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    std::fs::create_dir_all(&input).expect("mkdir");

    write_input_file(&input, "slow.txt", "patient presents with fever\n");

    let driver = write_fake_driver(dir.path(), DriverBehavior::SleepSeconds(5));

    annobatch()
        .args(["run", "--input-dir"])
        .arg(&input)
        .args(["--output-dir"])
        .arg(&output)
        .args(["--driver"])
        .arg(&driver)
        .args(["--timeout-per-file-secs", "1"])
        .args(["--no-retries"])
        .assert()
        .success();

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("manifest.json")).expect("read manifest"))
            .expect("parse manifest");
    assert_eq!(manifest["statistics"]["total_processed"], 0);
    assert_eq!(manifest["files"]["slow.txt"]["status"], "failed");
}

#[test]
fn missing_sentinel_output_is_a_validation_failure_not_a_crash() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    std::fs::create_dir_all(&input).expect("mkdir");

    write_input_file(&input, "bad.txt", "no acute distress\n");

    let driver = write_fake_driver(dir.path(), DriverBehavior::MissingSentinel);

    annobatch()
        .args(["run", "--input-dir"])
        .arg(&input)
        .args(["--output-dir"])
        .arg(&output)
        .args(["--driver"])
        .arg(&driver)
        .args(["--no-retries"])
        .assert()
        .success();

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("manifest.json")).expect("read manifest"))
            .expect("parse manifest");
    assert_eq!(manifest["files"]["bad.txt"]["status"], "failed");
}

#[test]
fn a_driver_that_fails_once_then_succeeds_is_recovered_by_retry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    std::fs::create_dir_all(&input).expect("mkdir");

    write_input_file(&input, "flaky.txt", "patient reports chest pain\n");

    let driver = write_fake_driver(dir.path(), DriverBehavior::FailOnceThenSucceed);

    annobatch()
        .args(["run", "--input-dir"])
        .arg(&input)
        .args(["--output-dir"])
        .arg(&output)
        .args(["--driver"])
        .arg(&driver)
        .assert()
        .success();

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("manifest.json")).expect("read manifest"))
            .expect("parse manifest");
    assert_eq!(manifest["files"]["flaky.txt"]["status"], "completed");
    assert_eq!(manifest["statistics"]["total_processed"], 1);
}
