//! ---
//! jm_section: "06-testing-qa"
//! jm_subsection: "integration-tests"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Integration and validation tests for the Joulemetry stack."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use joulemetry_bench::{BenchmarkRecord, BenchmarkStore};
use joulemetry_common::version::{
    Version, VersionInfo, VER_BUILD, VER_MAJOR, VER_MINOR, VER_RELEASE,
};
use tempfile::tempdir;
use uuid::Uuid;

#[test]
fn release_identity_concatenates_to_the_published_string() {
    let dotted = format!("{VER_MAJOR}.{VER_MINOR}.{VER_RELEASE}.{VER_BUILD}");
    assert_eq!(dotted, "1.2.0.72");
    assert_eq!(Version::CURRENT.to_string(), dotted);
}

#[test]
fn banner_and_cli_string_agree_on_the_build() {
    let info = VersionInfo::current();
    assert_eq!(info.banner(), "Joulemetry v1.2.0.72");
    assert!(info.cli_string().contains("build 72"));
    assert!(info.extended().contains("Store compatibility: major 1"));
}

#[test]
fn new_stores_are_stamped_with_the_current_version() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("benchmarks.json");

    let mut store = BenchmarkStore::open(&path).expect("open store");
    store
        .append(BenchmarkRecord {
            benchmark_id: Uuid::new_v4(),
            session_id: "20260825120000000000000".to_owned(),
            command: "true".to_owned(),
            notes: String::new(),
            pre_baseline_start_ns: 0,
            pre_baseline_end_ns: 1,
            post_baseline_start_ns: 2,
            post_baseline_end_ns: 3,
            error: None,
        })
        .expect("append record");

    let raw = std::fs::read_to_string(&path).expect("read store");
    let envelope: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(envelope["version"], "1.2.0.72");
}

#[test]
fn any_build_of_the_current_major_reads_our_artifacts() {
    let older = Version::new(1, 0, 0, 12);
    assert!(older < Version::CURRENT);
    assert!(Version::CURRENT.is_compatible_with(&older));
    assert!(!Version::CURRENT.is_compatible_with(&Version::new(2, 0, 0, 73)));
}
