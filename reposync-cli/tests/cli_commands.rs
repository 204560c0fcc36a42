//! Command line behaviour that needs no network: validation, exit codes,
//! output shape.

use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;

const CONFIG: &str = r#"
repositories:
  - acme/api
  - acme/web
bindings:
  - source: README.md
    destination: README.md
  - source: missing.md
    destination: missing.md
source_root: shared
workspace: work
commit_message: "chore: sync shared files"
"#;

fn reposync_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("reposync"));
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("GITHUB_URL")
        .env_remove("DRY_RUN")
        .env_remove("REPOSYNC_CONFIG")
        .env_remove("REPOSYNC_CONCURRENCY")
        .env_remove("REPOSITORIES")
        .env_remove("FILES_BINDINGS")
        .env_remove("COMMIT_MESSAGE")
        .env_remove("FILE_SYNC_BRANCH_REGEXP")
        .env_remove("REPOSYNC_BRANCH_TEMPLATE")
        .env_remove("WORKSPACE")
        .env("NO_COLOR", "1");
    cmd
}

fn project() -> assert_fs::TempDir {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child("reposync.yaml").write_str(CONFIG).expect("config");
    dir.child("shared/README.md")
        .write_str("# Shared\n")
        .expect("readme");
    dir
}

#[test]
fn check_prints_effective_configuration() {
    let dir = project();
    reposync_cmd()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "ghp_example")
        .arg("check")
        .assert()
        .success()
        .stdout(contains("configuration is valid"))
        .stdout(contains("acme/web"))
        .stdout(contains("missing.md -> missing.md (source missing)"))
        .stdout(contains("dry run:        true"))
        .stdout(contains("ghp_example").not());
}

#[test]
fn check_json_is_machine_readable() {
    let dir = project();
    let output = reposync_cmd()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "ghp_example")
        .args(["check", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["repositories"][0], "acme/api");
    assert_eq!(value["bindings"][0]["source_exists"], true);
    assert_eq!(value["bindings"][1]["source_exists"], false);
    assert_eq!(value["host"], "github.com");
}

#[test]
fn missing_token_is_a_configuration_error() {
    let dir = project();
    reposync_cmd()
        .current_dir(dir.path())
        .arg("check")
        .assert()
        .code(2)
        .stderr(contains("GITHUB_TOKEN is empty"));
}

#[test]
fn missing_config_file_exits_with_code_2() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    reposync_cmd()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "ghp_example")
        .args(["sync", "--config", "nope.yaml"])
        .assert()
        .code(2)
        .stderr(contains("nope.yaml"));
}

#[test]
fn unknown_repo_filter_is_rejected_before_any_work() {
    let dir = project();
    reposync_cmd()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "ghp_example")
        .args(["sync", "--repo", "acme/unknown"])
        .assert()
        .code(2)
        .stderr(contains("'acme/unknown' is not part of the configuration"));
    assert!(!dir.path().join("work").exists());
}

#[test]
fn invalid_dry_run_value_is_a_usage_error() {
    let dir = project();
    reposync_cmd()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "ghp_example")
        .args(["sync", "--dry-run=maybe"])
        .assert()
        .failure()
        .stderr(contains("maybe"));
}

#[test]
fn check_honours_dry_run_from_the_environment() {
    let dir = project();
    reposync_cmd()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "ghp_example")
        .env("DRY_RUN", "false")
        .arg("check")
        .assert()
        .success()
        .stdout(contains("dry run:        false"));
}

#[test]
fn environment_alone_configures_a_run_without_a_file() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child("LICENSE").write_str("MIT\n").expect("license");
    let output = reposync_cmd()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "ghp_example")
        .env("REPOSITORIES", "acme/api\nacme/web\n")
        .env("FILES_BINDINGS", "LICENSE=LICENSE\nci.yml=.github/workflows/ci.yml")
        .env("COMMIT_MESSAGE", "chore: sync from env")
        .args(["check", "--json"])
        .output()
        .expect("run");
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["repositories"][1], "acme/web");
    assert_eq!(value["bindings"][0]["binding"], "LICENSE -> LICENSE");
    assert_eq!(value["bindings"][0]["source_exists"], true);
    assert_eq!(value["bindings"][1]["source_exists"], false);
    assert_eq!(value["commit_message"], "chore: sync from env");
}

#[test]
fn malformed_environment_binding_is_a_configuration_error() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    reposync_cmd()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "ghp_example")
        .env("REPOSITORIES", "acme/api")
        .env("FILES_BINDINGS", "LICENSE")
        .env("COMMIT_MESSAGE", "chore: sync")
        .arg("check")
        .assert()
        .code(2)
        .stderr(contains("expected SOURCE=DESTINATION"));
}
