mod integration;

use integration::fixtures::*;
use integration::TestFixture;
use serde_json::Value;
use std::fs;
use std::process::Command;

fn bratlink() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bratlink"))
}

/// Test that --stats-out flag creates valid JSON file with correct structure
#[tokio::test]
async fn test_stats_output_json_structure() {
    let fixture = TestFixture::new();
    fixture.create_pair("001", REVIEW_TEXT, REVIEW_ANN);
    fixture.create_pair("002", REVIEW_TEXT, MISSING_REF_ANN);

    let stats_file = fixture.subdir("out/test_stats.json");
    let output = bratlink()
        .arg(&fixture.root_path)
        .arg("--stats-out")
        .arg(&stats_file)
        .arg("--no-progress")
        .output()
        .expect("Failed to run bratlink");

    assert!(
        output.status.success(),
        "bratlink failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json_content = fs::read_to_string(&stats_file).expect("Failed to read stats file");
    let stats: Value = serde_json::from_str(&json_content).expect("Failed to parse JSON");

    let obj = stats.as_object().expect("Stats should be a JSON object");
    for field in [
        "run_start",
        "total_processing_time_ms",
        "documents_loaded",
        "documents_skipped",
        "documents_failed",
        "total_annotations",
        "total_bindings",
        "document_stats",
    ] {
        assert!(obj.contains_key(field), "Missing {field} field");
    }
    assert_eq!(obj["documents_loaded"], 1);
    assert_eq!(obj["documents_failed"], 1);
    assert_eq!(obj["total_annotations"], 6);

    let document_stats = obj["document_stats"]
        .as_array()
        .expect("document_stats should be an array");
    assert_eq!(document_stats.len(), 2);

    let first = &document_stats[0];
    assert_eq!(first["key"], "001");
    assert_eq!(first["status"], "success");
    assert_eq!(first["sentences"], 2);
    assert_eq!(first["words"], 12);
    assert_eq!(first["notes"], 1);
    assert!(first["error"].is_null());

    let second = &document_stats[1];
    assert_eq!(second["status"], "failed");
    assert!(second["error"].as_str().unwrap().contains("T99"));
}

#[tokio::test]
async fn test_fail_fast_exit_status() {
    let fixture = TestFixture::new();
    fixture.create_pair("001", REVIEW_TEXT, MISSING_REF_ANN);

    let output = bratlink()
        .arg(&fixture.root_path)
        .arg("--fail-fast")
        .arg("--no-progress")
        .arg("--stats-out")
        .arg(fixture.subdir("stats.json"))
        .output()
        .expect("Failed to run bratlink");

    assert!(!output.status.success());
    assert!(!fixture.subdir("stats.json").exists());
}

#[tokio::test]
async fn test_export_then_import_from_cli() {
    let fixture = TestFixture::new();
    fixture.create_pair("001", REVIEW_TEXT, REVIEW_ANN);
    let xml_dir = fixture.subdir("xml");

    let export = bratlink()
        .arg(&fixture.root_path)
        .arg("--no-progress")
        .arg("--export-xml")
        .arg(&xml_dir)
        .arg("--stats-out")
        .arg(fixture.subdir("export_stats.json"))
        .output()
        .expect("Failed to run bratlink");
    assert!(export.status.success());
    assert!(xml_dir.join("001.xml").is_file());

    let import_stats = fixture.subdir("import_stats.json");
    let import = bratlink()
        .arg(&xml_dir)
        .arg("--from-xml")
        .arg("--stats-out")
        .arg(&import_stats)
        .output()
        .expect("Failed to run bratlink");
    assert!(import.status.success());

    let stats: Value =
        serde_json::from_str(&fs::read_to_string(&import_stats).unwrap()).unwrap();
    assert_eq!(stats["documents_loaded"], 1);
    assert_eq!(stats["total_annotations"], 6);
}

#[test]
fn test_missing_root_is_rejected() {
    let fixture = TestFixture::new();
    let output = bratlink()
        .arg(fixture.subdir("does-not-exist"))
        .arg("--no-progress")
        .output()
        .expect("Failed to run bratlink");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "unexpected stderr: {stderr}");
}
