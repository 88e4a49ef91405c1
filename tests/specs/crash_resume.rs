//! A second run against the same output directory resumes from the
//! existing manifest: already-completed files are left alone, and a
//! previously failed file gets picked up once the driver starts succeeding.

use crate::prelude::{annobatch, write_fake_driver, write_input_file, DriverBehavior};

#[test]
fn second_run_skips_completed_files_and_retries_failed_ones() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    std::fs::create_dir_all(&input).expect("mkdir");

    write_input_file(&input, "a.txt", "patient presents with fever\n");
    write_input_file(&input, "b.txt", "history of hypertension\n");

    let failing_driver = write_fake_driver(dir.path(), DriverBehavior::Fail);

    annobatch()
        .args(["run", "--input-dir"])
        .arg(&input)
        .args(["--output-dir"])
        .arg(&output)
        .args(["--driver"])
        .arg(&failing_driver)
        .args(["--no-retries"])
        .assert()
        .success();

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("manifest.json")).expect("read manifest"))
            .expect("parse manifest");
    assert_eq!(manifest["files"]["a.txt"]["status"], "failed");
    assert_eq!(manifest["files"]["b.txt"]["status"], "failed");

    let succeeding_driver = write_fake_driver(dir.path(), DriverBehavior::Succeed);

    annobatch()
        .args(["run", "--input-dir"])
        .arg(&input)
        .args(["--output-dir"])
        .arg(&output)
        .args(["--driver"])
        .arg(&succeeding_driver)
        .args(["--no-retries"])
        .assert()
        .success();

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("manifest.json")).expect("read manifest"))
            .expect("parse manifest");
    assert_eq!(manifest["files"]["a.txt"]["status"], "completed");
    assert_eq!(manifest["files"]["b.txt"]["status"], "completed");
    assert_eq!(manifest["statistics"]["total_processed"], 2);
}
