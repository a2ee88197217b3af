// Copyright (C) 2024 Jelmer Vernooij <jelmer@samba.org>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::{tempdir, TempDir};

const MODEL: &str = r#"{
    "modules": [
        {
            "name": "app",
            "files": [
                {
                    "package": "p",
                    "declarations": [
                        {"kind": "function", "name": "g", "parameters": [{"name": "value", "type": "Int"}]},
                        {
                            "kind": "function",
                            "name": "old",
                            "parameters": [{"name": "x", "type": "Int"}],
                            "replace_with": {"expression": "g(x)", "message": "Use g"}
                        },
                        {"kind": "class", "name": "C", "members": [
                            {"kind": "function", "name": "h"},
                            {"kind": "function", "name": "m", "replace_with": {"expression": "h()"}}
                        ]}
                    ]
                }
            ]
        }
    ]
}"#;

const BROKEN: &str = r#"{
    "modules": [
        {
            "name": "app",
            "files": [
                {
                    "package": "q",
                    "declarations": [
                        {"kind": "function", "name": "old", "replace_with": {"expression": "nope()"}}
                    ]
                }
            ]
        }
    ]
}"#;

fn replacewith_cmd() -> Command {
    Command::cargo_bin("replacewith").expect("replacewith binary")
}

fn write_model(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write model");
    path
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

#[test]
fn test_analyze_prints_template() {
    let dir = tempdir().expect("tempdir");
    let model = write_model(&dir, "model.json", MODEL);

    replacewith_cmd()
        .args(["analyze", path_arg(&model), "p.old"])
        .assert()
        .success()
        .stdout(contains("g(x)\n"))
        .stdout(contains("  Template: g({x})"))
        .stdout(contains("  Import: p.g"));

    replacewith_cmd()
        .args(["analyze", path_arg(&model), "p.C.m"])
        .assert()
        .success()
        .stdout(contains("this.h()"))
        .stdout(contains("Import:").not());
}

#[test]
fn test_analyze_json_output() {
    let dir = tempdir().expect("tempdir");
    let model = write_model(&dir, "model.json", MODEL);

    let output = replacewith_cmd()
        .args(["analyze", path_arg(&model), "p.old", "--json"])
        .output()
        .expect("run replacewith");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(json["declaration"], "p.old");
    assert_eq!(json["expression"], "g(x)");
    assert_eq!(json["template"], "g({x})");
    assert_eq!(json["imports"], serde_json::json!(["p.g"]));
    assert_eq!(json["parameters"], serde_json::json!(["x"]));
}

#[test]
fn test_analyze_explicit_expression() {
    let dir = tempdir().expect("tempdir");
    let model = write_model(&dir, "model.json", MODEL);

    replacewith_cmd()
        .args([
            "analyze",
            path_arg(&model),
            "p.old",
            "--expression",
            "listOf(x)",
            "--import",
            "kotlin.collections.listOf",
        ])
        .assert()
        .success()
        .stdout(contains("listOf<kotlin.Int>(x)"))
        .stdout(contains("  Import: kotlin.collections.listOf"));
}

#[test]
fn test_analyze_unknown_declaration_fails() {
    let dir = tempdir().expect("tempdir");
    let model = write_model(&dir, "model.json", MODEL);

    replacewith_cmd()
        .args(["analyze", path_arg(&model), "p.missing"])
        .assert()
        .failure()
        .stderr(contains("No declaration named p.missing"));
}

#[test]
fn test_check_success_and_failure() {
    let dir = tempdir().expect("tempdir");
    let good = write_model(&dir, "good.json", MODEL);

    replacewith_cmd()
        .args(["check", path_arg(&good)])
        .assert()
        .success()
        .stdout(contains("2 ReplaceWith annotation(s) can be applied"));

    let broken = write_model(&dir, "broken.json", BROKEN);
    replacewith_cmd()
        .args(["check", path_arg(&broken)])
        .assert()
        .code(1)
        .stdout(contains("ERRORS found"))
        .stdout(contains("q.old: unresolved reference: nope"));
}

#[test]
fn test_check_directory_skips_unannotated_models() {
    let dir = tempdir().expect("tempdir");
    write_model(&dir, "good.json", MODEL);
    write_model(
        &dir,
        "plain.json",
        r#"{"modules": [{"name": "app", "files": [{"package": "p"}]}]}"#,
    );
    write_model(&dir, "notes.txt", "\"replace_with\": not a model");

    replacewith_cmd()
        .args(["check", path_arg(dir.path())])
        .assert()
        .success()
        .stdout(contains("good.json"))
        .stdout(contains("plain.json").not())
        .stdout(contains("notes.txt").not());
}

#[test]
fn test_no_default_imports_flag() {
    let dir = tempdir().expect("tempdir");
    let model = write_model(&dir, "model.json", MODEL);

    replacewith_cmd()
        .args([
            "--no-default-imports",
            "analyze",
            path_arg(&model),
            "p.old",
            "--expression",
            "listOf(x)",
        ])
        .assert()
        .success()
        .stdout(contains("listOf(x)\n"))
        .stdout(contains("Import:").not());
}

#[test]
fn test_info_lists_annotations() {
    let dir = tempdir().expect("tempdir");
    let model = write_model(&dir, "model.json", MODEL);

    replacewith_cmd()
        .args(["info", path_arg(&model)])
        .assert()
        .success()
        .stdout(contains("2 deprecated declaration(s)"))
        .stdout(contains("  - p.old"))
        .stdout(contains("    Replacement: g(x)"))
        .stdout(contains("    Template: g({x})"))
        .stdout(contains("    Imports: p.g"))
        .stdout(contains("    Message: Use g"))
        .stdout(contains("  - p.C.m"))
        .stdout(contains("    Template: this.h()"))
        .stdout(contains("Total files analyzed: 1"))
        .stdout(contains("Total deprecated declarations found: 2"));
}
