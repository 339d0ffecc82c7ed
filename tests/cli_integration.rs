//! CLI integration tests for keel.
//!
//! Every command runs against the bundled Vistle descriptor with HOME pointed at an
//! empty directory so no user configuration leaks in.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

fn vistle() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join("vistle.toml")
}

/// The keel binary, isolated in `tmp`.
fn keel(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("keel").unwrap();
    cmd.current_dir(tmp.path())
        .env("HOME", tmp.path())
        .env_remove("KEEL_FORMAT")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

// ============================================================================
// keel resolve
// ============================================================================

#[test]
fn test_resolve_defaults() {
    let tmp = temp_dir();
    keel(&tmp)
        .arg("resolve")
        .arg(vistle())
        .args(["--prefix", "vistle=/opt/vistle"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vistle@2025.1"))
        .stdout(predicate::str::contains("toolchain: host"))
        .stdout(predicate::str::contains("-DVISTLE_INTERNAL_VTKM:BOOL=OFF"))
        .stdout(predicate::str::contains("fingerprint: "));
}

#[test]
fn test_resolve_conflict_exits_2() {
    let tmp = temp_dir();
    keel(&tmp)
        .arg("resolve")
        .arg(vistle())
        .arg("~python+tui")
        .args(["--prefix", "vistle=/opt/vistle"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Python is required to interpret user input"));
}

#[test]
fn test_resolve_inactive_variant_exits_2() {
    let tmp = temp_dir();
    keel(&tmp)
        .arg("resolve")
        .arg(vistle())
        .arg("+kokkos")
        .args(["--prefix", "vistle=/opt/vistle"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("kokkos"))
        .stderr(predicate::str::contains("keel variants"));
}

#[test]
fn test_resolve_missing_prefix_exits_2() {
    let tmp = temp_dir();
    keel(&tmp)
        .arg("resolve")
        .arg(vistle())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("vistle"));
}

#[test]
fn test_resolve_many_reports_failures() {
    let tmp = temp_dir();
    keel(&tmp)
        .arg("resolve")
        .arg(vistle())
        .args(["+python", "~python+tui"])
        .args(["--prefix", "vistle=/opt/vistle"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("vistle@2025.1"))
        .stderr(predicate::str::contains("1 of 2 resolution(s) failed"));
}

#[test]
fn test_resolve_json() {
    let tmp = temp_dir();
    let output = keel(&tmp)
        .args(["--format", "json", "resolve"])
        .arg(vistle())
        .args(["--prefix", "vistle=/opt/vistle", "--version", "2020.9"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["fingerprint"].as_str().map(str::len), Some(64));
    assert_eq!(value["resolution"]["version"], "2020.9");
}

#[test]
fn test_resolve_is_reproducible() {
    let tmp = temp_dir();
    let run = || {
        keel(&tmp)
            .arg("resolve")
            .arg(vistle())
            .arg("~vtkm +rocm +kokkos amdgpu_target=gfx90a")
            .args(["--prefix", "vistle=/opt/vistle", "--prefix", "hip=/opt/rocm"])
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn test_resolve_unknown_version() {
    let tmp = temp_dir();
    keel(&tmp)
        .arg("resolve")
        .arg(vistle())
        .arg("@1999.1")
        .args(["--prefix", "vistle=/opt/vistle"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Known versions"));
}

// ============================================================================
// keel args / env / deps
// ============================================================================

#[test]
fn test_args_rocm_toolchain() {
    let tmp = temp_dir();
    keel(&tmp)
        .arg("args")
        .arg(vistle())
        .arg("~vtkm +rocm +kokkos amdgpu_target=gfx90a")
        .args(["--prefix", "vistle=/opt/vistle", "--prefix", "hip=/opt/rocm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-DVISTLE_USE_KOKKOS:BOOL=ON"))
        .stdout(predicate::str::contains("-DCMAKE_HIP_ARCHITECTURES"))
        .stdout(predicate::str::contains("-DCMAKE_CXX_COMPILER:PATH=/opt/rocm/bin/hipcc"));
}

#[test]
fn test_env_build_unsets_first() {
    let tmp = temp_dir();
    let output = keel(&tmp)
        .arg("env")
        .arg(vistle())
        .args(["--prefix", "vistle=/opt/vistle"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.first(), Some(&"unset EXTERNLIBS"));
    assert_eq!(lines.last(), Some(&"export ARCHSUFFIX=\"spack\""));
}

#[test]
fn test_env_run() {
    let tmp = temp_dir();
    keel(&tmp)
        .args(["env", "--run"])
        .arg(vistle())
        .args(["--prefix", "vistle=/opt/vistle"])
        .assert()
        .success()
        .stdout(predicate::str::contains("export VISTLE_ROOT=\"/opt/vistle\""))
        .stdout(predicate::str::contains("PYTHONPATH"));
}

#[test]
fn test_deps_list_and_dot() {
    let tmp = temp_dir();
    keel(&tmp)
        .arg("deps")
        .arg(vistle())
        .args(["--prefix", "vistle=/opt/vistle"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cmake@3.3:"))
        .stdout(predicate::str::contains("[build]"));

    keel(&tmp)
        .args(["deps", "--dot"])
        .arg(vistle())
        .args(["--prefix", "vistle=/opt/vistle"])
        .assert()
        .success()
        .stdout(predicate::str::contains("digraph"));
}

#[test]
fn test_deps_filtered_by_linkage() {
    let tmp = temp_dir();
    keel(&tmp)
        .args(["deps", "--type", "run"])
        .arg(vistle())
        .args(["--prefix", "vistle=/opt/vistle"])
        .assert()
        .success()
        .stdout(predicate::str::contains("py-ipython"))
        .stdout(predicate::str::contains("python@2.7:"))
        .stdout(predicate::str::contains("cmake").not());
}

// ============================================================================
// keel variants / check
// ============================================================================

#[test]
fn test_variants_table() {
    let tmp = temp_dir();
    keel(&tmp)
        .arg("variants")
        .arg(vistle())
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"))
        .stdout(predicate::str::contains("kokkos"))
        .stdout(predicate::str::contains("~vtkm"));
}

#[test]
fn test_check_valid_descriptor() {
    let tmp = temp_dir();
    keel(&tmp)
        .arg("check")
        .arg(vistle())
        .assert()
        .success()
        .stdout(predicate::str::contains("vistle is valid"))
        .stdout(predicate::str::contains("sha256: "));
}

#[test]
fn test_check_directory_finds_keel_toml() {
    let tmp = temp_dir();
    let pkg = tmp.path().join("pkg");
    fs::create_dir(&pkg).unwrap();
    fs::write(
        pkg.join("keel.toml"),
        r#"
[package]
name = "tiny"

[variants.shared]
default = true

[[args]]
define = "BUILD_SHARED_LIBS"
variant = "shared"
"#,
    )
    .unwrap();

    keel(&tmp)
        .args(["check", "pkg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tiny is valid"));

    keel(&tmp)
        .args(["args", "pkg", "~shared"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-DBUILD_SHARED_LIBS:BOOL=OFF"));
}

#[test]
fn test_check_missing_descriptor() {
    let tmp = temp_dir();
    keel(&tmp)
        .args(["check", "nope.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("descriptor not found"));
}

#[test]
fn test_check_syntax_error() {
    let tmp = temp_dir();
    fs::write(tmp.path().join("broken.toml"), "[package\nname = \"x\"\n").unwrap();

    keel(&tmp)
        .args(["check", "broken.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("broken.toml"));
}

#[test]
fn test_check_invalid_declaration() {
    let tmp = temp_dir();
    fs::write(
        tmp.path().join("keel.toml"),
        r#"
[package]
name = "Bad Name"
"#,
    )
    .unwrap();

    keel(&tmp)
        .args(["check", "."])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid descriptor"))
        .stderr(predicate::str::contains("not a valid package name"));
}

// ============================================================================
// configuration
// ============================================================================

#[test]
fn test_project_config_supplies_prefixes() {
    let tmp = temp_dir();
    fs::create_dir(tmp.path().join(".keel")).unwrap();
    fs::write(
        tmp.path().join(".keel").join("config.toml"),
        "[store]\nroot = \"/opt/keel\"\n\n[output]\nformat = \"json\"\n",
    )
    .unwrap();

    let output = keel(&tmp).args(["env", "--run"]).arg(vistle()).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value.to_string().contains("/opt/keel/vistle"));
}

#[test]
fn test_completions() {
    let tmp = temp_dir();
    keel(&tmp)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keel"));
}
