//! End-to-end tests against the simulated stage.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Write a config plus position/recipe stores into `dir`. The simulated
/// track is short and the step delay tiny so full pours run in
/// milliseconds.
fn write_fixtures(dir: &Path) -> PathBuf {
    let positions = dir.join("positions.json");
    fs::write(
        &positions,
        r#"{ "positions": [
            { "name": "left", "offset": 0, "id": 1 },
            { "name": "mid", "offset": 30, "id": 2, "label": "bottle slot 2" },
            { "name": "right", "offset": 60 },
            { "name": "ghost", "offset": 100 }
        ] }"#,
    )
    .expect("write positions");

    let recipes = dir.join("recipes.json");
    fs::write(
        &recipes,
        r#"{ "recipes": [
            { "name": "demo", "steps": [
                { "position": "left", "dwell_s": 0.0 },
                { "position": "mid", "dwell_s": 0.01 },
                { "position": "right", "dwell_s": 0.0 }
            ] },
            { "name": "broken", "steps": [
                { "position": "mid", "dwell_s": 0.0 },
                { "position": "vermouth", "dwell_s": 1.0 }
            ] },
            { "name": "overreach", "steps": [
                { "position": "mid", "dwell_s": 0.0 },
                { "position": "ghost", "dwell_s": 0.0 }
            ] }
        ] }"#,
    )
    .expect("write recipes");

    let config = dir.join("barbot.toml");
    fs::write(
        &config,
        format!(
            r#"
[pins]
step = 13
dir = 19
end_stop_left = 23
end_stop_right = 24

[motor]
step_delay_us = 1
min_step_delay_us = 1
pulse_width_us = 1
max_travel_steps = 500
slow_delay_us = 3
medium_delay_us = 2
fast_delay_us = 1

[store]
positions = "{}"
recipes = "{}"

[simulation]
track_steps = 60
start_pos = 0
"#,
            positions.display(),
            recipes.display()
        ),
    )
    .expect("write config");
    config
}

fn barbot(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("barbot").expect("binary");
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn status_reports_uncalibrated_at_startup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    let out = barbot(&config)
        .args(["--json", "status"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(v["position"], 0);
    assert_eq!(v["calibrated"], false);
    assert_eq!(v["enabled"], true);
    assert_eq!(v["busy"], false);
    assert!(v["travel"].is_null());
}

#[test]
fn calibrate_discovers_the_simulated_travel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .arg("calibrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("travel is 60 steps"));
}

#[test]
fn move_homes_first_and_reaches_the_station() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .args(["move", "mid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Carriage at step 30"));
}

#[test]
fn move_accepts_numeric_ids() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .args(["move", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Carriage at step 30"));
}

#[test]
fn unknown_position_fails_with_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .args(["move", "vermouth"])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("No position or recipe named"));
}

#[test]
fn pour_runs_the_full_recipe() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .args(["pour", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Recipe complete: 3 steps poured, carriage at step 60",
        ));
}

#[test]
fn recipe_with_unknown_station_is_rejected_before_moving() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .args(["pour", "broken"])
        .assert()
        .failure()
        .code(5)
        .stderr(predicate::str::contains("failed validation"));
}

#[test]
fn station_beyond_the_track_reports_the_aborted_step() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .args(["pour", "overreach"])
        .assert()
        .failure()
        .code(11)
        .stderr(
            predicate::str::contains("aborted at step 2")
                .and(predicate::str::contains("carriage is at step 60")),
        );
}

#[test]
fn direct_move_past_the_end_stop_is_limit_reached() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .args(["move", "ghost"])
        .assert()
        .failure()
        .code(8)
        .stderr(predicate::str::contains("end stop interrupted the move"));
}

#[test]
fn jog_moves_without_calibration() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .args(["jog", "right", "--steps", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Carriage at step 5"));
}

#[test]
fn assume_at_skips_homing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    // The simulated carriage really is at 0, so trusting that and moving
    // to mid lands exactly on the station.
    barbot(&config)
        .args(["--assume-at", "0", "move", "mid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Carriage at step 30"));
}

#[test]
fn positions_lists_the_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .arg("positions")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("mid")
                .and(predicate::str::contains("bottle slot 2"))
                .and(predicate::str::contains("60")),
        );
}

#[test]
fn missing_store_fails_positions_but_not_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());
    fs::remove_file(dir.path().join("positions.json")).expect("remove");

    barbot(&config)
        .arg("positions")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("could not be read"));

    barbot(&config).arg("status").assert().success();
}

#[test]
fn disable_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .arg("disable")
        .assert()
        .success()
        .stdout(predicate::str::contains("Motor disabled"));
}

#[test]
fn servo_and_scale_toggle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .args(["servo", "disable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("servo disabled"));
    barbot(&config)
        .args(["scale", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scale initialized"));
}

#[test]
fn self_check_passes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    barbot(&config)
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("self-check ok"));
}

#[test]
fn json_outcome_is_machine_readable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    let out = barbot(&config)
        .args(["--json", "pour", "demo"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(v["outcome"], "sequence_done");
    assert_eq!(v["steps_completed"], 3);
    assert_eq!(v["final_position"], 60);
}

#[test]
fn json_error_carries_kind_and_details() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_fixtures(dir.path());

    let out = barbot(&config)
        .args(["--json", "--log-level", "error", "move", "ghost"])
        .assert()
        .failure()
        .code(8)
        .get_output()
        .stderr
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(v["kind"], "LimitReached");
    assert_eq!(v["details"]["position"], 60);
    assert_eq!(v["details"]["target"], 100);
}
