//! CLI Integration Tests for tba
//!
//! These tests execute the binary and verify correct behavior for:
//! - JUnit and TestNG allocation end to end
//! - Config file loading and CLI overrides
//! - Dry runs
//! - Error handling and exit codes

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A JUnit 5 test class with `count` test methods, each tagged `tag` if given
fn junit_class(name: &str, count: usize, tag: Option<&str>) -> String {
    let mut body = String::new();
    for i in 0..count {
        if let Some(tag) = tag {
            body.push_str(&format!("    @Tag(\"{}\")\n", tag));
        }
        body.push_str(&format!("    @Test\n    void case{}() {{}}\n", i));
    }
    format!(
        "package com.acme;\n\nimport org.junit.jupiter.api.Tag;\nimport org.junit.jupiter.api.Test;\n\nclass {} {{\n{}}}\n",
        name, body
    )
}

/// Helper to create a Maven-style project with sources and compiled classes
fn create_test_project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    for (name, count, tag) in [
        ("AlphaTest", 5, None),
        ("BravoTest", 4, None),
        ("CharlieTest", 3, Some("fast")),
        ("DeltaTest", 2, Some("fast")),
    ] {
        write(
            root,
            &format!("src/test/java/com/acme/{}.java", name),
            &junit_class(name, count, tag),
        );
        write(root, &format!("target/test-classes/com/acme/{}.class", name), "");
    }
    write(root, "target/test-classes/com/acme/AlphaTest$Inner.class", "");
    temp_dir
}

fn tba() -> Command {
    Command::cargo_bin("tba").unwrap()
}

fn read_artifact(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_junit_allocation_writes_artifact() {
    let project = create_test_project();

    tba()
        .arg(project.path())
        .args(["--max-methods", "5", "--parallel-methods"])
        .assert()
        .success()
        .stdout(predicate::str::contains("test-buckets.json"))
        .stderr(predicate::str::contains("TEST BUCKET ALLOCATION"));

    let artifact = read_artifact(&project.path().join("target/test-buckets.json"));
    let buckets = artifact.as_array().unwrap();
    assert_eq!(buckets.len(), 3);
    assert_eq!(buckets[0]["jobIndex"], 0);
    assert_eq!(buckets[0]["classes"][0], "com.acme.AlphaTest");
    assert_eq!(buckets[0]["totalMethods"], 5);
    assert_eq!(buckets[2]["classes"][0], "com.acme.CharlieTest");
    assert_eq!(buckets[2]["classes"][1], "com.acme.DeltaTest");
    assert_eq!(buckets[2]["totalMethods"], 5);
}

#[test]
fn test_whole_class_weighting() {
    let project = create_test_project();

    tba()
        .arg(project.path())
        .args(["--max-methods", "2", "--dry-run", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalMethods\": 2"))
        .stdout(predicate::str::contains("AlphaTest$Inner").not());
}

#[test]
fn test_include_tags_override() {
    let project = create_test_project();

    let output = tba()
        .arg(project.path())
        .args(["-m", "100", "--parallel-methods", "--include-tags", "fast", "--dry-run", "-q"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let buckets: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(buckets.as_array().unwrap().len(), 1);
    assert_eq!(buckets[0]["totalMethods"], 5);
    assert_eq!(buckets[0]["classes"].as_array().unwrap().len(), 2);
}

#[test]
fn test_dry_run_writes_nothing() {
    let project = create_test_project();

    tba()
        .arg(project.path())
        .args(["-m", "5", "--dry-run", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("["));

    assert!(!project.path().join("target/test-buckets.json").exists());
}

#[test]
fn test_config_file_and_cli_override() {
    let project = create_test_project();
    write(
        project.path(),
        ".bucket-allocator.json",
        r#"{
            "maxMethodsPerBucket": 100,
            "parallelMethods": true,
            "jsonOutputFile": "build/ci/buckets",
            "policy": "first-fit"
        }"#,
    );

    tba()
        .arg(project.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("first-fit"));
    let artifact = read_artifact(&project.path().join("build/ci/buckets.json"));
    assert_eq!(artifact.as_array().unwrap().len(), 1);

    // CLI wins over the file
    tba()
        .arg(project.path())
        .args(["--max-methods", "5", "-o", "out/split"])
        .assert()
        .success();
    let artifact = read_artifact(&project.path().join("out/split.json"));
    assert_eq!(artifact.as_array().unwrap().len(), 3);
}

#[test]
fn test_explicit_config_path() {
    let project = create_test_project();
    let config_dir = TempDir::new().unwrap();
    let config = config_dir.path().join("alloc.json");
    fs::write(&config, r#"{"maxMethodsPerBucket": 3, "parallelMethods": true}"#).unwrap();

    tba()
        .arg(project.path())
        .arg("--config")
        .arg(&config)
        .args(["--dry-run", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalMethods\": 5"))
        .stdout(predicate::str::contains("\"totalMethods\": 4"));
}

#[test]
fn test_testng_allocation() {
    let project = TempDir::new().unwrap();
    let root = project.path();
    write(
        root,
        "src/test/java/com/acme/CheckoutTest.java",
        r#"package com.acme;

import org.testng.annotations.Test;

public class CheckoutTest {
    @Test public void pay() {}
    @Test public void refund() {}
    @Test public void cancel() {}
}
"#,
    );
    write(
        root,
        "src/test/resources/testng.xml",
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE suite SYSTEM "https://testng.org/testng-1.0.dtd">
<suite name="checkout">
  <test name="payments">
    <classes>
      <class name="com.acme.CheckoutTest">
        <methods>
          <include name="pay"/>
          <include name="refund"/>
        </methods>
      </class>
      <class name="com.acme.RemovedTest"/>
    </classes>
  </test>
</suite>
"#,
    );

    tba()
        .arg(root)
        .args([
            "--framework",
            "testng",
            "--suite",
            "src/test/resources/testng.xml",
            "--max-methods",
            "10",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("Skipped: 1 unresolved class(es)"));

    let artifact = read_artifact(&root.join("target/test-buckets.json"));
    assert_eq!(artifact[0]["classes"][0], "com.acme.CheckoutTest");
    assert_eq!(artifact[0]["totalMethods"], 2);
}

#[test]
fn test_zero_max_is_config_error() {
    let project = create_test_project();

    tba()
        .arg(project.path())
        .args(["--max-methods", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("maxMethodsPerBucket"));
}

#[test]
fn test_missing_max_is_config_error() {
    let project = create_test_project();

    tba().arg(project.path()).assert().code(2);
}

#[test]
fn test_missing_output_directory_is_config_error() {
    let project = TempDir::new().unwrap();
    fs::create_dir_all(project.path().join("src/test/java")).unwrap();

    tba()
        .arg(project.path())
        .args(["-m", "5"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Directory not found"));
}

#[test]
fn test_testng_missing_suite_is_config_error() {
    let project = create_test_project();

    tba()
        .arg(project.path())
        .args(["-m", "5", "--framework", "testng", "--suite", "missing.xml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing.xml"));
}

#[test]
fn test_bad_config_file_is_config_error() {
    let project = create_test_project();
    write(project.path(), ".bucket-allocator.json", "{ not json");

    tba().arg(project.path()).assert().code(2);
}

#[test]
fn test_unwritable_output_is_fatal() {
    let project = create_test_project();
    write(project.path(), "blocker", "a file where a directory should be");

    tba()
        .arg(project.path())
        .args(["-m", "5", "-o", "blocker/buckets"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_version_flag() {
    tba()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
