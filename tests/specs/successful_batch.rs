//! Three input files, all succeed, manifest records every one completed.

use crate::prelude::{annobatch, write_fake_driver, write_input_file, DriverBehavior};

#[test]
fn three_files_all_succeed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    std::fs::create_dir_all(&input).expect("mkdir");

    write_input_file(&input, "a.txt", "patient presents with fever\n");
    write_input_file(&input, "b.txt", "history of hypertension\n");
    write_input_file(&input, "c.txt", "no acute distress\n");

    let driver = write_fake_driver(dir.path(), DriverBehavior::Succeed);

    annobatch()
        .args(["run", "--input-dir"])
        .arg(&input)
        .args(["--output-dir"])
        .arg(&output)
        .args(["--max-workers", "2"])
        .args(["--driver"])
        .arg(&driver)
        .assert()
        .success();

    for name in ["a", "b", "c"] {
        assert!(output.join(format!("{name}.csv")).exists(), "missing output for {name}");
    }

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("manifest.json")).expect("read manifest"))
            .expect("parse manifest");
    assert_eq!(manifest["statistics"]["total_processed"], 3);
}
