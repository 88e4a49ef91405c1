//! An input directory with no `.txt` files is a successful no-op batch.

use crate::prelude::annobatch;

#[test]
fn empty_input_directory_exits_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    std::fs::create_dir_all(&input).expect("mkdir");

    annobatch()
        .args(["run", "--input-dir"])
        .arg(&input)
        .args(["--output-dir"])
        .arg(&output)
        .assert()
        .success();

    assert!(output.join("manifest.json").exists());
}
