//! ---
//! jm_section: "05-operator-tooling"
//! jm_subsection: "integration-tests"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "End-to-end checks for the joulemetryctl binary."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::io::Write;

use assert_cmd::Command;

#[test]
fn version_flag_prints_the_build_string() {
    let output = Command::cargo_bin("joulemetryctl")
        .unwrap()
        .arg("-V")
        .env_remove("JOULEMETRY_CONFIG")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Joulemetry v1.2.0.72"), "stdout: {stdout}");
    assert!(stdout.contains("Store compatibility: major 1"), "stdout: {stdout}");
}

#[test]
fn sensors_lists_synthetic_sources_from_a_config_file() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    write!(
        config,
        "[sources]\nrapl = false\nhwmon = false\n\n[sources.synthetic]\nenabled = true\ncount = 2\n"
    )
    .unwrap();

    let output = Command::cargo_bin("joulemetryctl")
        .unwrap()
        .arg("sensors")
        .arg("--config")
        .arg(config.path())
        .env_remove("JOULEMETRY_CONFIG")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("synthetic-0"), "stdout: {stdout}");
    assert!(stdout.contains("synthetic-1"), "stdout: {stdout}");
}

#[test]
fn analyze_rejects_a_trace_without_a_header() {
    let empty = tempfile::NamedTempFile::new().unwrap();
    let output = Command::cargo_bin("joulemetryctl")
        .unwrap()
        .arg("analyze")
        .arg(empty.path())
        .env_remove("JOULEMETRY_CONFIG")
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn config_validate_reports_the_source_and_effective_settings() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    write!(config, "[sampling]\ninterval = 250\n").unwrap();

    let output = Command::cargo_bin("joulemetryctl")
        .unwrap()
        .arg("config")
        .arg("validate")
        .arg(config.path())
        .env_remove("JOULEMETRY_CONFIG")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Configuration OK"), "stdout: {stdout}");
    assert!(stdout.contains("interval = 250"), "stdout: {stdout}");
}

#[test]
fn config_validate_rejects_an_invalid_file() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    write!(config, "[sampling]\ninterval = 0\n").unwrap();

    let output = Command::cargo_bin("joulemetryctl")
        .unwrap()
        .arg("config")
        .arg("validate")
        .arg(config.path())
        .env_remove("JOULEMETRY_CONFIG")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("sampling interval"), "stderr: {stderr}");
}
