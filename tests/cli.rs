mod common;

use assert_cmd::cargo_bin_cmd;
use common::Strike;
use predicates::prelude::*;

#[test]
fn help_lists_commands() {
    cargo_bin_cmd!("cdmkit")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("tree"))
        .stdout(predicate::str::contains("records"))
        .stdout(predicate::str::contains("index"));
}

#[test]
fn formats_lists_builtin_decoders() {
    cargo_bin_cmd!("cdmkit")
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("NLDN"))
        .stdout(predicate::str::contains("GHCNM"));
}

#[test]
fn tree_prints_outline() {
    let dir = tempfile::tempdir().unwrap();
    let data = common::sample_archive(dir.path());
    cargo_bin_cmd!("cdmkit")
        .arg("tree")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("Tree Structure: ghcnm.dat"))
        .stdout(predicate::str::contains("dim month = 12"))
        .stdout(predicate::str::contains("stn_data: sequence"))
        .stdout(predicate::str::contains("Sequences: all_data, station, station/stn_data"));
}

#[test]
fn tree_describes_one_variable() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_lightning(dir.path(), &[vec![Strike::new(5, 1, 2)]]);
    cargo_bin_cmd!("cdmkit")
        .args(["tree", "--variable", "record"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Variable: record"))
        .stdout(predicate::str::contains("Type: sequence"));
}

#[test]
fn records_by_key_with_limit() {
    let dir = tempfile::tempdir().unwrap();
    let data = common::sample_archive(dir.path());
    cargo_bin_cmd!("cdmkit")
        .arg("records")
        .arg(&data)
        .args(["station/stn_data", "--key", "10160360000", "--limit", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("year=1961"))
        .stdout(predicate::str::contains("year=1962"))
        .stdout(predicate::str::contains("year=1963").not());
}

#[test]
fn index_summary() {
    let dir = tempfile::tempdir().unwrap();
    let data = common::sample_archive(dir.path());
    cargo_bin_cmd!("cdmkit")
        .arg("index")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("Keys: 3"))
        .stdout(predicate::str::contains("Ordering violations: 0"))
        .stdout(predicate::str::contains("10160360000 @"));
    assert!(dir.path().join("ghcnm.dat.cdmx").exists());
}

#[test]
fn unsupported_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "hello").unwrap();
    cargo_bin_cmd!("cdmkit")
        .arg("tree")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open"));
}

#[test]
fn log_file_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let data = common::sample_archive(dir.path());
    let log = dir.path().join("cdmkit.log");
    cargo_bin_cmd!("cdmkit")
        .arg("--log")
        .arg(&log)
        .args(["records"])
        .arg(&data)
        .arg("all_data")
        .assert()
        .success();
    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("Starting cdmkit"));
}
