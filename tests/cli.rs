//! CLI smoke tests against the checked-in fixtures.

use assert_cmd::Command;
use predicates::prelude::*;

fn litrun() -> Command {
    Command::cargo_bin("litrun").expect("binary builds")
}

#[test]
fn run_prints_annotated_output() {
    litrun()
        .args(["run", "tests/fixtures/basic.lua"])
        .assert()
        .success()
        .stdout(predicate::str::contains("local total = 0"))
        .stdout(predicate::str::contains("-- 10"));
}

#[test]
fn run_emits_parseable_json() {
    let output = litrun()
        .args(["run", "--output", "json", "tests/fixtures/basic.lua"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let reports: serde_json::Value =
        serde_json::from_slice(&output).expect("stdout is valid JSON");
    let lines = reports[0]["lines"].as_array().expect("lines array");
    assert!(lines
        .iter()
        .any(|l| l["text"] == "-- 10" && l["class"] == "result"));
}

#[test]
fn run_scopes_require_to_the_modules_root() {
    litrun()
        .args([
            "run",
            "--modules-root",
            "tests/fixtures/modules",
            "tests/fixtures/basic.lua",
        ])
        .assert()
        .success();
}

#[test]
fn run_fails_on_missing_file() {
    litrun()
        .args(["run", "tests/fixtures/does_not_exist.lua"])
        .assert()
        .failure();
}

#[test]
fn check_accepts_well_formed_directives() {
    litrun()
        .args(["check", "tests/fixtures/basic.lua"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn check_rejects_capture_clumps_without_an_expression() {
    litrun()
        .args(["check", "tests/fixtures/no_capture.lua"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no expression to capture"));
}

#[test]
fn check_rejects_unknown_directives() {
    litrun()
        .args(["check", "tests/fixtures/bad_directive.lua"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown directive"));
}
