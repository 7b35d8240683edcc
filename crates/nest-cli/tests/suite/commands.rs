use std::path::Path;

use assert_cmd::Command;
use nest_test_utils::JarBuilder;
use predicates::prelude::*;
use tempfile::TempDir;

fn nest() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("nest"))
}

fn outer_jar(dir: &Path) -> String {
    let path = dir.join("outer.jar");
    JarBuilder::new()
        .class("lib/Helper")
        .file("shared.txt", "outer")
        .jar(
            "inner.jar",
            JarBuilder::new().class("Util").file("shared.txt", "inner"),
        )
        .write_to(&path);
    path.display().to_string()
}

#[test]
fn help_mentions_commands() {
    nest().arg("--help").assert().success().stdout(
        predicate::str::contains("index")
            .and(predicate::str::contains("resolve"))
            .and(predicate::str::contains("resources"))
            .and(predicate::str::contains("cat"))
            .and(predicate::str::contains("boot")),
    );
}

#[test]
fn index_json_lists_children() {
    let tmp = TempDir::new().unwrap();
    let jar = outer_jar(tmp.path());

    let output = nest().args(["index", &jar, "--json"]).output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["inline_entries"].as_u64(), Some(1));
    let children = v["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert!(children[0]["origin"].as_str().unwrap().ends_with("outer.jar!/inner.jar"));
}

#[test]
fn resolve_reports_defining_archive() {
    let tmp = TempDir::new().unwrap();
    let jar = outer_jar(tmp.path());

    nest()
        .args(["resolve", "Util", "--archive", &jar])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("defined_by: archive://")
                .and(predicate::str::contains("!/inner.jar")),
        );
}

#[test]
fn missing_class_exits_with_one() {
    let tmp = TempDir::new().unwrap();
    let jar = outer_jar(tmp.path());

    nest()
        .args(["resolve", "Missing", "--archive", &jar])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("`Missing` not found"));
}

#[test]
fn resources_are_listed_in_lookup_order() {
    let tmp = TempDir::new().unwrap();
    let jar = outer_jar(tmp.path());

    let output = nest()
        .args(["resources", "shared.txt", "--archive", &jar])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("outer.jar!/shared.txt"));
    assert!(lines[1].ends_with("outer.jar!/inner.jar!/shared.txt"));
}

#[test]
fn cat_streams_nested_entry() {
    let tmp = TempDir::new().unwrap();
    let jar = outer_jar(tmp.path());

    nest()
        .args(["cat", &format!("archive://{jar}!/inner.jar!/shared.txt")])
        .assert()
        .success()
        .stdout("inner");
}

#[test]
fn boot_uses_manifest_class_path() {
    let tmp = TempDir::new().unwrap();
    let jar = tmp.path().join("app.jar");
    JarBuilder::new()
        .file(
            "META-INF/MANIFEST.MF",
            "Manifest-Version: 1.0\nBoot-Class: app.Main\nCompact-Class-Path: lib/a.jar\n  lib/b.jar\n\n",
        )
        .jar("lib/a.jar", JarBuilder::new().class("app/Helper"))
        .jar("lib/b.jar", JarBuilder::new().class("app/Main"))
        .write_to(&jar);

    let output = nest()
        .args(["boot", &jar.display().to_string(), "--json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["archives"].as_array().unwrap().len(), 3);
    assert!(v["boot"]["defined_by"].as_str().unwrap().ends_with("app.jar!/lib/b.jar"));
}

#[test]
fn invalid_config_exits_with_two() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("nest.toml");
    std::fs::write(&config, "[index]\nbogus = 1\n").unwrap();
    let jar = outer_jar(tmp.path());

    nest()
        .args(["--config", &config.display().to_string(), "index", &jar])
        .assert()
        .code(2);
}
