use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;

const ETXTBSY: i32 = 26;

/// Writes a fake `docker` script into `dir` and waits until it can be run.
fn fake_docker(dir: &Path, body: &str) -> PathBuf {
    let program = dir.join("docker");
    fs::write(
        &program,
        format!("#!/bin/sh\n[ \"$1\" = __probe__ ] && exit 0\n{}\n", body),
    )
    .unwrap();
    fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();
    for _ in 0..50 {
        match std::process::Command::new(&program).arg("__probe__").status() {
            Err(e) if e.raw_os_error() == Some(ETXTBSY) => sleep(Duration::from_millis(20)),
            _ => break,
        }
    }
    program
}

fn tool(cwd: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("containerdbtool").unwrap();
    cmd.current_dir(cwd.path())
        .env_remove("CONTAINERDBTOOL_CONFIG")
        .env_remove("CONTAINERDBTOOL_DEFAULT_CONTAINER")
        .env_remove("CONTAINERDBTOOL_CONTAINER_FILTER")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn no_subcommand_prints_usage() {
    let cwd = TempDir::new().unwrap();
    tool(&cwd)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn unknown_subcommand_prints_usage() {
    let cwd = TempDir::new().unwrap();
    tool(&cwd)
        .arg("backup")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn help_exits_zero() {
    let cwd = TempDir::new().unwrap();
    tool(&cwd)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("restore"));
}

#[test]
fn restore_with_one_argument_prints_usage() {
    let cwd = TempDir::new().unwrap();
    tool(&cwd)
        .args(["restore", "dump.sql"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("restore <backup-file> [container-id] <database-name>"));
}

#[test]
fn query_with_too_many_arguments_prints_usage() {
    let cwd = TempDir::new().unwrap();
    tool(&cwd)
        .args(["query", "testdb", "SELECT 1", "pg", "extra"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn restore_missing_backup_file_fails() {
    let cwd = TempDir::new().unwrap();
    let docker = fake_docker(cwd.path(), "exit 0");
    tool(&cwd)
        .env("CONTAINERDBTOOL_DOCKER", &docker)
        .args(["restore", "does-not-exist.sql", "testdb"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Backup file not found"));
}

#[test]
fn explicit_missing_config_fails() {
    let cwd = TempDir::new().unwrap();
    tool(&cwd)
        .args(["--config", "missing.json", "query", "testdb", "SELECT 1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.json"));
}

#[test]
fn query_with_two_postgres_containers_lists_both() {
    let cwd = TempDir::new().unwrap();
    let docker = fake_docker(
        cwd.path(),
        r#"case "$1" in
  ps)
    echo '{"ID":"aaa","Names":"pg-a","Image":"postgres:16","Status":"Up"}'
    echo '{"ID":"bbb","Names":"pg-b","Image":"postgres:15","Status":"Up"}'
    echo '{"ID":"ccc","Names":"cache","Image":"redis:7","Status":"Up"}'
    ;;
  *) exit 1 ;;
esac"#,
    );

    tool(&cwd)
        .env("CONTAINERDBTOOL_DOCKER", &docker)
        .args(["query", "testdb", "SELECT 1"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1) pg-a"))
        .stdout(predicate::str::contains("2) pg-b"))
        .stdout(predicate::str::contains("3)").not());
}

#[test]
fn query_exit_code_mirrors_psql() {
    let cwd = TempDir::new().unwrap();
    let docker = fake_docker(
        cwd.path(),
        r#"case "$1" in
  inspect)
    echo '[{"Id":"aaa","Name":"/pg","Config":{"Image":"postgres:16"},"State":{"Status":"running","Running":true}}]'
    ;;
  exec)
    echo ' count '
    echo '-------'
    echo '     3'
    exit 0
    ;;
esac"#,
    );

    tool(&cwd)
        .env("CONTAINERDBTOOL_DOCKER", &docker)
        .args(["query", "testdb", "SELECT COUNT(*) FROM t", "pg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("     3"));
}
