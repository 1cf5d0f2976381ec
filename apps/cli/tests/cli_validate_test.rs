//! Integration tests for the `lcm validate` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn recipe(rel: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../recipes").join(rel)
}

/// Command isolated from the user's config files and environment.
fn lcm(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lcm-cli").unwrap();
    cmd.current_dir(temp.path()).env("HOME", temp.path()).env("NO_COLOR", "1").env_remove("LCM_OUTPUT_DIR");
    cmd
}

#[test]
fn test_validate_pretrain_recipe() {
    let temp = TempDir::new().unwrap();
    lcm(&temp)
        .arg("validate")
        .arg(recipe("train/pretrain/mse.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1/1 valid"))
        .stdout(predicate::str::contains("output directory is unset"));
}

#[test]
fn test_validate_json() {
    let temp = TempDir::new().unwrap();
    lcm(&temp)
        .arg("validate")
        .arg(recipe("train/pretrain/mse.yaml"))
        .arg(recipe("prepare/wikipedia.yaml"))
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": 2"))
        .stdout(predicate::str::contains("\"package\": \"prepare\""));
}

#[test]
fn test_validate_unknown_arch_fails_with_hint() {
    let temp = TempDir::new().unwrap();
    lcm(&temp)
        .arg("validate")
        .arg(recipe("train/pretrain/mse.yaml"))
        .args(["-o", "model_arch=base_lcm_16B"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("did you mean `base_lcm_1_6B`"))
        .stderr(predicate::str::contains("failed validation"));
}

#[test]
fn test_validate_malformed_yaml() {
    let temp = TempDir::new().unwrap();
    let broken = temp.path().join("broken.yaml");
    std::fs::write(&broken, "# @package trainer\nmax_steps: [1, 2\n").unwrap();

    lcm(&temp)
        .arg("validate")
        .arg(&broken)
        .assert()
        .failure()
        .stdout(predicate::str::contains("failed to parse recipe"));
}

#[test]
fn test_local_config_overrides_apply() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(".lcmrc"), "overrides = [\"checkpoint_every_n_steps=0\"]\n").unwrap();

    lcm(&temp)
        .arg("validate")
        .arg(recipe("train/pretrain/mse.yaml"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("checkpoint_every_n_steps"));
}

#[test]
fn test_broken_local_config_is_logged_and_skipped() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(".lcmrc"), "overrides = [").unwrap();

    lcm(&temp)
        .arg("validate")
        .arg(recipe("train/pretrain/mse.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1/1 valid"))
        .stderr(predicate::str::contains("ignoring .lcmrc"));
}

#[test]
fn test_validate_requires_a_path() {
    let temp = TempDir::new().unwrap();
    lcm(&temp).arg("validate").assert().failure();
}
