//! Integration tests for the coach binary.
//!
//! These tests verify end-to-end behavior including:
//! - Building and storing a week of plans
//! - Reading stored plans back as dated schedules
//! - Rendering stored sessions as device workouts
//! - Pushing to the partner outbox

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const TIMESTAMP: &str = "2024-01-30-06-15-00";

/// Helper to create a test directory holding data, config and input files
fn setup_test_dir() -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let targets = json!({
        "alice": {
            "day1": { "kmTotal": 5, "kmZ5": 1 },
            "day3": { "kmTotal": "8", "kmZ3Z4": 2, "numberStrengthSessions": 1 }
        },
        "bob": {
            "day2": { "kmTotal": 1.2 }
        }
    });
    fs::write(temp_dir.path().join("targets.json"), targets.to_string()).unwrap();

    let table = json!({
        "zone1Lower": 100, "zone1Upper": 120,
        "zone2Lower": 120, "zone2Upper": 140,
        "zone3Lower": 140, "zone3Upper": 155,
        "zone4Lower": 155, "zone4Upper": 170,
        "zone5Lower": 170, "zone5Upper": 190
    });
    let zones = json!({ "alice": table, "bob": table });
    fs::write(temp_dir.path().join("zones.json"), zones.to_string()).unwrap();

    temp_dir
}

/// Helper to get the CLI binary isolated from the user's own config
fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("coach"));
    cmd.env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(temp_dir.path().join("data"));
    cmd
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should be JSON")
}

fn build(temp_dir: &TempDir, extra: &[&str]) -> Value {
    let output = cli(temp_dir)
        .arg("build")
        .arg("--targets")
        .arg(temp_dir.path().join("targets.json"))
        .arg("--timestamp")
        .arg(TIMESTAMP)
        .args(extra)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    stdout_json(&output)
}

fn count_json_files(dir: &Path) -> usize {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .count(),
        Err(_) => 0,
    }
}

#[test]
fn test_cli_help() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Training plan builder and device workout exporter",
        ));
}

#[test]
fn test_build_writes_one_record_per_user() {
    let temp_dir = setup_test_dir();
    let report = build(&temp_dir, &["--inactive", "carol,dave"]);

    assert_eq!(report["timestamp"], TIMESTAMP);
    assert_eq!(
        report["persisted"]["written"],
        json!(["alice", "bob", "carol", "dave"])
    );
    assert_eq!(report["persisted"]["failed"], json!([]));
    assert!(report["pushed"].is_null());

    let plans_dir = temp_dir.path().join("data").join("plans");
    assert_eq!(count_json_files(&plans_dir), 4);

    let record: Value =
        serde_json::from_str(&fs::read_to_string(plans_dir.join("alice.json")).unwrap()).unwrap();
    assert_eq!(record["userId"], "alice");
    assert_eq!(record["dateDay1"], "2024-01-30");
    assert_eq!(record["updatedTimestamp"], TIMESTAMP);
    assert_eq!(record["day2"], r#"{"running":0}"#);
}

#[test]
fn test_show_returns_dated_schedule() {
    let temp_dir = setup_test_dir();
    build(&temp_dir, &[]);

    let output = cli(&temp_dir)
        .args(["show", "alice", "bob", "nobody"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let schedules = stdout_json(&output);

    let schedules = schedules.as_array().unwrap();
    assert_eq!(schedules.len(), 2);

    let alice = schedules.iter().find(|s| s["userId"] == "alice").unwrap();
    let plan = alice["workoutPlan"].as_object().unwrap();
    let keys: Vec<&str> = plan.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["2024-01-30_1", "2024-02-01_1", "2024-02-01_2"]);

    let first = &plan["2024-01-30_1"];
    assert_eq!(first["type"], "RUNNING");
    assert_eq!(first["workout"]["warmup"], json!({ "Z2": 1.5 }));
    assert_eq!(first["workout"]["cooldown"], json!({ "Z2": 1.5 }));
    assert_eq!(
        first["workout"]["main"]["interval_1"],
        json!([{ "Z5": 1.0 }, { "Z2": 1.0 }])
    );
    assert_eq!(
        plan["2024-02-01_2"],
        json!({ "type": "STRENGTH", "workout": true })
    );

    // bob's only day is below the warmup floor
    let bob = schedules.iter().find(|s| s["userId"] == "bob").unwrap();
    assert_eq!(bob["workoutPlan"], json!({}));
}

#[test]
fn test_inactive_user_has_empty_schedule() {
    let temp_dir = setup_test_dir();
    build(&temp_dir, &["--inactive", "alice"]);

    let output = cli(&temp_dir)
        .args(["show", "alice"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(
        stdout_json(&output),
        json!([{ "userId": "alice", "workoutPlan": {} }])
    );
}

#[test]
fn test_device_renders_running_sessions() {
    let temp_dir = setup_test_dir();
    build(&temp_dir, &[]);

    let output = cli(&temp_dir)
        .args(["device", "alice", "--zones"])
        .arg(temp_dir.path().join("zones.json"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let workouts = stdout_json(&output);
    let workouts = workouts.as_object().unwrap();

    // Strength entries have no device form
    let keys: Vec<&str> = workouts.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["2024-01-30_1", "2024-02-01_1"]);

    let day1 = &workouts["2024-01-30_1"];
    assert_eq!(day1["workoutName"], "Run");
    assert_eq!(day1["sport"], "RUNNING");
    assert_eq!(day1["workoutProvider"], "Blaze");
    assert_eq!(day1["estimatedDistanceInMeters"].as_f64(), Some(5000.0));

    let steps = day1["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0]["type"], "WorkoutStep");
    assert_eq!(steps[0]["intensity"], "WARMUP");
    assert_eq!(steps[0]["targetValueLow"], 120);
    assert_eq!(steps[1]["type"], "WorkoutRepeatStep");
    assert_eq!(steps[1]["stepOrder"], 2);
    assert_eq!(steps[1]["steps"][0]["intensity"], "INTERVAL");
    assert_eq!(steps[1]["steps"][0]["targetValueLow"], 170);
    assert_eq!(steps[1]["steps"][1]["intensity"], "RECOVERY");
    assert_eq!(steps[2]["intensity"], "COOLDOWN");
    assert_eq!(steps[2]["stepOrder"], 5);

    let day3 = &workouts["2024-02-01_1"];
    assert_eq!(day3["estimatedDistanceInMeters"].as_f64(), Some(7000.0));
}

#[test]
fn test_device_without_zones_fails() {
    let temp_dir = setup_test_dir();
    build(&temp_dir, &[]);
    fs::write(temp_dir.path().join("zones.json"), "{}").unwrap();

    cli(&temp_dir)
        .args(["device", "alice", "--zones"])
        .arg(temp_dir.path().join("zones.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No heart rate zones for user alice"));
}

#[test]
fn test_device_without_stored_plan_fails() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["device", "alice", "--zones"])
        .arg(temp_dir.path().join("zones.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No stored plan for user alice"));
}

#[test]
fn test_push_writes_outbox_and_replaces_previous_week() {
    let temp_dir = setup_test_dir();
    let zones = temp_dir.path().join("zones.json");
    let zones = zones.to_str().unwrap();

    let report = build(&temp_dir, &["--push", "--zones", zones, "--inactive", "carol"]);
    assert_eq!(report["pushed"]["pushed"], json!([["alice", 2], ["bob", 0]]));
    assert_eq!(report["pushed"]["cleared"], json!(["carol"]));
    assert_eq!(report["pushed"]["failed"], json!([]));

    let data_dir = temp_dir.path().join("data");
    let workouts_dir = data_dir.join("outbox").join("alice").join("workouts");
    let schedules_dir = data_dir.join("outbox").join("alice").join("schedules");
    assert_eq!(count_json_files(&workouts_dir), 2);
    assert_eq!(count_json_files(&schedules_dir), 2);

    let ledger: Value = serde_json::from_str(
        &fs::read_to_string(data_dir.join("tracked_workouts.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(ledger["users"]["alice"].as_array().unwrap().len(), 2);

    // A second push deletes the first week before creating the new one
    build(&temp_dir, &["--push", "--zones", zones]);
    assert_eq!(count_json_files(&workouts_dir), 2);
    assert_eq!(count_json_files(&schedules_dir), 2);
}

#[test]
fn test_push_reports_user_without_zones() {
    let temp_dir = setup_test_dir();
    let zones = temp_dir.path().join("zones.json");
    fs::write(
        &zones,
        json!({ "alice": {
            "zone1Lower": 100, "zone1Upper": 120,
            "zone2Lower": 120, "zone2Upper": 140,
            "zone3Lower": 140, "zone3Upper": 155,
            "zone4Lower": 155, "zone4Upper": 170,
            "zone5Lower": 170, "zone5Upper": 190
        }})
        .to_string(),
    )
    .unwrap();

    let output = cli(&temp_dir)
        .arg("build")
        .arg("--targets")
        .arg(temp_dir.path().join("targets.json"))
        .arg("--timestamp")
        .arg(TIMESTAMP)
        .arg("--push")
        .arg("--zones")
        .arg(&zones)
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    // Plans are still stored and alice still pushed
    let report = stdout_json(&output);
    assert_eq!(report["persisted"]["written"], json!(["alice", "bob"]));
    assert_eq!(report["pushed"]["pushed"], json!([["alice", 2]]));
    assert_eq!(report["pushed"]["failed"][0]["userId"], "bob");
}

#[test]
fn test_invalid_timestamp_fails() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .arg("build")
        .arg("--targets")
        .arg(temp_dir.path().join("targets.json"))
        .arg("--timestamp")
        .arg("tomorrow")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid anchor timestamp 'tomorrow'"));

    assert!(!temp_dir.path().join("data").join("plans").exists());
}

#[test]
fn test_config_file_changes_builder_distances() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("coach.toml");
    fs::write(&config_path, "[builder]\nwarmup_km = 2.0\ncooldown_km = 1.0\n").unwrap();

    cli(&temp_dir)
        .arg("--config")
        .arg(&config_path)
        .arg("build")
        .arg("--targets")
        .arg(temp_dir.path().join("targets.json"))
        .arg("--timestamp")
        .arg(TIMESTAMP)
        .assert()
        .success();

    let output = cli(&temp_dir)
        .args(["show", "alice"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let schedules = stdout_json(&output);
    let session = &schedules[0]["workoutPlan"]["2024-01-30_1"]["workout"];
    assert_eq!(session["warmup"], json!({ "Z2": 2.0 }));
    assert_eq!(session["cooldown"], json!({ "Z2": 1.0 }));
}

#[test]
fn test_json_logs_go_to_stderr() {
    let temp_dir = setup_test_dir();
    let output = cli(&temp_dir)
        .arg("--log-json")
        .arg("build")
        .arg("--targets")
        .arg(temp_dir.path().join("targets.json"))
        .arg("--timestamp")
        .arg(TIMESTAMP)
        .assert()
        .success()
        .stderr(predicate::str::contains(r#""level":"INFO""#))
        .get_output()
        .stdout
        .clone();

    // stdout stays a single JSON document
    stdout_json(&output);
}
