//! End-to-end tests for the `beaver build` and `beaver version` commands.
//!
//! These tests invoke the binary directly. Builds that need tools use small
//! shell scripts that print the files they are given, so they only run on
//! Unix.

#[allow(dead_code)]
mod common;
#[allow(unused_imports)]
use common::prelude::*;

#[test]
fn test_version_prints_engine_version() {
    let mut cmd = cargo_bin_cmd!("beaver");
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::diff(format!(
            "beaver {}\n",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_build_help() {
    let mut cmd = cargo_bin_cmd!("beaver");
    cmd.arg("build")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--keep-tmp"))
        .stdout(predicate::str::contains("--skip-hydrate"))
        .stdout(predicate::str::contains("CONFIG_DIR"));
}

#[test]
fn test_build_without_config_fails() {
    let fixture = TestFixture::new();
    let mut cmd = cargo_bin_cmd!("beaver");
    cmd.current_dir(fixture.path())
        .arg("build")
        .arg("missing")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"))
        .stderr(predicate::str::contains("missing"));
}

#[test]
fn test_build_rejects_version_mismatch() {
    let fixture = TestFixture::new().with_file("app/beaver.yaml", "beaverversion: 0.0.1-pinned\n");
    let mut cmd = cargo_bin_cmd!("beaver");
    cmd.current_dir(fixture.path())
        .args(["build", "app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("0.0.1-pinned"));
}

#[test]
fn test_build_reports_inheritance_cycle() {
    let fixture = TestFixture::new()
        .with_file("a/beaver.yaml", "inherit: ../b\n")
        .with_file("b/beaver.yaml", "inherit: ../a\n");
    let mut cmd = cargo_bin_cmd!("beaver");
    cmd.current_dir(fixture.path())
        .args(["build", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Recursive inherit loop detected"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let fixture = TestFixture::hashed_project();
    let mut cmd = cargo_bin_cmd!("beaver");
    cmd.current_dir(fixture.path())
        .args(["--log-level", "info", "build", "app", "--dry-run"])
        .env("BEAVER_HELM", "beaver-test-no-such-helm")
        .assert()
        .success()
        .stderr(predicate::str::contains("dry-run command=beaver-test-no-such-helm template settings"))
        .stderr(predicate::str::contains("dry-run command=ytt"));

    fixture.child("build").assert(predicate::path::missing());
}

#[cfg(unix)]
#[test]
fn test_build_with_fake_tools() {
    let fixture = TestFixture::hashed_project().with_script("bin/cat-tool", configs::CAT_TOOL);
    let tool = fixture.path().join("bin/cat-tool");

    let mut cmd = cargo_bin_cmd!("beaver");
    cmd.current_dir(fixture.path())
        .args(["build", "app"])
        .arg("--helm-bin")
        .arg(&tool)
        .arg("--ytt-bin")
        .arg(&tool)
        .assert()
        .success();

    fixture
        .child("build/demo/ConfigMap.v1.demo.settings.yaml")
        .assert(predicate::str::contains("listen: 0.0.0.0:8080"));
    fixture
        .child("build/demo/Deployment.apps_v1.demo.web.yaml")
        .assert(predicate::str::contains("checksum/settings:"))
        .assert(predicate::str::contains("<[").not());
}

#[cfg(unix)]
#[test]
fn test_build_to_stdout() {
    let fixture = TestFixture::hashed_project().with_script("bin/cat-tool", configs::CAT_TOOL);
    let tool = fixture.path().join("bin/cat-tool");

    let mut cmd = cargo_bin_cmd!("beaver");
    cmd.current_dir(fixture.path())
        .args(["build", "app", "-o", "stdout"])
        .env("BEAVER_HELM", &tool)
        .env("BEAVER_YTT", &tool)
        .assert()
        .success()
        .stdout(predicate::str::contains("kind: ConfigMap"))
        .stdout(predicate::str::contains("kind: Deployment"));

    fixture.child("build").assert(predicate::path::missing());
}

#[cfg(unix)]
#[test]
fn test_tool_failure_surfaces_stderr_and_keeps_scratch() {
    let fixture = TestFixture::hashed_project()
        .with_script("bin/cat-tool", configs::CAT_TOOL)
        .with_script("bin/broken-helm", configs::FAILING_TOOL);
    let scratch = fixture.path().join("scratch");

    let mut cmd = cargo_bin_cmd!("beaver");
    cmd.current_dir(fixture.path())
        .args(["build", "app", "--tmp-dir"])
        .arg(&scratch)
        .arg("--helm-bin")
        .arg(fixture.path().join("bin/broken-helm"))
        .arg("--ytt-bin")
        .arg(fixture.path().join("bin/cat-tool"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: chart is broken"))
        .stderr(predicate::str::contains("Build failed"));

    assert!(scratch.is_dir());
    fixture.child("build").assert(predicate::path::missing());
}
