//! Integration tests for the skald CLI commands.
#![allow(deprecated)] // Command::cargo_bin – macro replacement not yet stable

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn skald() -> Command {
    Command::cargo_bin("skald").unwrap()
}

const INIT_GAME: &str = r#"{
    "name": "init_game",
    "arguments": {
        "game_config": {
            "id": "cli-test",
            "initiative_order": ["DungeonMaster", "Thorin"],
            "party": [{"name": "Thorin", "current_hp": 28, "max_hp": 28, "ac": 16}],
            "enemies": [{"name": "Goblin", "current_hp": 7, "max_hp": 7}]
        }
    }
}"#;

fn tool(dir: &Path, args: &[&str], request: &str) -> Command {
    let mut cmd = skald();
    cmd.arg("tool").arg("--state-dir").arg(dir).args(args).arg(request);
    cmd
}

// -- roll / validate / calc --

#[test]
fn roll_prints_a_record() {
    skald()
        .args(["roll", "2d6+3", "--purpose", "attack", "--actor", "Thorin", "--seed", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""kind": "roll""#))
        .stdout(predicate::str::contains(r#""notation": "2d6+3""#))
        .stdout(predicate::str::contains(r#""actor": "Thorin""#));
}

#[test]
fn roll_is_reproducible_with_a_seed() {
    let first = skald().args(["roll", "4d6", "--seed", "11"]).output().unwrap();
    let second = skald().args(["roll", "4d6", "--seed", "11"]).output().unwrap();
    let dice = |out: &[u8]| {
        let json: serde_json::Value = serde_json::from_slice(out).unwrap();
        json["result"]["dice"].clone()
    };
    assert_eq!(dice(&first.stdout), dice(&second.stdout));
}

#[test]
fn unusable_notation_falls_back_to_d20() {
    skald()
        .args(["roll", "banana", "--seed", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""notation_fallback": true"#))
        .stdout(predicate::str::contains(r#""notation": "1d20""#));
}

#[test]
fn validate_reports_validity() {
    skald()
        .args(["validate", "3d6+2"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""valid": true"#));
    skald()
        .args(["validate", "0d6"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""valid": false"#));
}

#[test]
fn calc_evaluates_arithmetic() {
    skald()
        .args(["calc", "2 + 3 * 4"])
        .assert()
        .success()
        .stdout("14\n");
    skald()
        .args(["calc", "(17 - 10) / 2"])
        .assert()
        .success()
        .stdout("3.5\n");
}

#[test]
fn calc_rejects_code() {
    skald().args(["calc", "__import__('os')"]).assert().failure();
}

// -- tool --

#[test]
fn tool_runs_against_persisted_sessions() {
    let dir = TempDir::new().unwrap();
    tool(dir.path(), &[], INIT_GAME)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""kind": "session""#))
        .stdout(predicate::str::contains("cli-test"));
    assert!(dir.path().join("cli-test.json").exists());

    tool(
        dir.path(),
        &[],
        r#"{"name": "apply_damage", "arguments": {"target_name": "Goblin", "amount": 5, "source": "axe"}}"#,
    )
    .assert()
    .success()
    .stdout(predicate::str::contains(r#""after": 2"#));

    tool(dir.path(), &[], r#"{"name": "get_state", "arguments": {"session": "cli-test"}}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""current_hp": 2"#));
}

#[test]
fn participant_writes_are_refused() {
    let dir = TempDir::new().unwrap();
    tool(dir.path(), &[], INIT_GAME).assert().success();

    tool(
        dir.path(),
        &["--role", "participant", "--caller", "Thorin"],
        r#"{"name": "apply_damage", "arguments": {"target_name": "Goblin", "amount": 5}}"#,
    )
    .assert()
    .failure()
    .stdout(predicate::str::contains("permission_error"));

    tool(
        dir.path(),
        &["--role", "participant", "--caller", "Thorin"],
        r#"{"name": "get_state"}"#,
    )
    .assert()
    .success()
    .stdout(predicate::str::contains(r#""current_hp": 7"#));
}

#[test]
fn stale_patches_conflict() {
    let dir = TempDir::new().unwrap();
    tool(dir.path(), &[], INIT_GAME).assert().success();
    tool(
        dir.path(),
        &[],
        r#"{"name": "apply_patch", "arguments": {"expected_version": 99, "patch": {"round": 2}}}"#,
    )
    .assert()
    .failure()
    .stdout(predicate::str::contains("conflict_error"));
}

#[test]
fn unknown_tools_are_validation_errors() {
    let dir = TempDir::new().unwrap();
    tool(dir.path(), &[], r#"{"name": "delete_everything"}"#)
        .assert()
        .failure()
        .stdout(predicate::str::contains("validation_error"));
}

#[test]
fn tool_reads_stdin() {
    let dir = TempDir::new().unwrap();
    tool(dir.path(), &[], "-")
        .write_stdin(INIT_GAME)
        .assert()
        .success()
        .stdout(predicate::str::contains("cli-test"));
}

// -- run / show --

#[test]
fn run_plays_to_an_outcome() {
    let dir = TempDir::new().unwrap();
    skald()
        .arg("run")
        .arg("--state-dir")
        .arg(dir.path())
        .args(["--session", "crypt", "--seed", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Adventure"))
        .stdout(predicate::str::contains("crypt-of-the-shadow-lord"))
        .stdout(predicate::str::contains("Thorin"));

    skald()
        .arg("show")
        .arg("--state-dir")
        .arg(dir.path())
        .arg("crypt")
        .assert()
        .success()
        .stdout(predicate::str::contains("ended"))
        .stdout(predicate::str::contains("Recent Events"));

    skald()
        .arg("show")
        .arg("--state-dir")
        .arg(dir.path())
        .arg("--markdown")
        .assert()
        .success()
        .stdout(predicate::str::contains("# Session Log"))
        .stdout(predicate::str::contains("GAME OVER"));
}

#[test]
fn passive_run_is_lost_to_the_round_limit() {
    skald()
        .args(["run", "--passive", "--max-rounds", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DEFEAT"))
        .stdout(predicate::str::contains("round limit exceeded"));
}

#[test]
fn run_reads_a_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("engine.json");
    std::fs::write(&config, r#"{"seed": 5, "max_rounds": 2, "turn_timeout_ms": 2000}"#).unwrap();
    skald()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--passive")
        .assert()
        .success()
        .stdout(predicate::str::contains("seed=5"));
}

#[test]
fn bad_config_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("engine.json");
    std::fs::write(&config, r#"{"max_rounds": 0}"#).unwrap();
    skald().arg("run").arg("--config").arg(&config).assert().failure();
}

#[test]
fn show_without_sessions_fails() {
    let dir = TempDir::new().unwrap();
    skald()
        .arg("show")
        .arg("--state-dir")
        .arg(dir.path())
        .assert()
        .failure();
}
