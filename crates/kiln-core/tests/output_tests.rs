//! Integration tests for the output directory lifecycle.
//!
//! These tests verify:
//! - Clearing (and not clearing) existing output
//! - Path traversal prevention
//! - prepare → emit → finalize ordering
//! - Directory locking between passes
//! - URL rebasing and the JSON manifest

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use kiln_core::{
    BuildManifest, EmittedAsset, Error, OutputConfig, OutputManager, OutputState,
};

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn docs_config(project: &TempDir) -> OutputConfig {
    OutputConfig::new(project.path().join("docs"), "/", project.path())
}

#[test]
fn test_clear_before_write_leaves_only_new_output() {
    let project = TempDir::new().unwrap();
    let docs = project.path().join("docs");
    fs::create_dir_all(docs.join("assets")).unwrap();
    fs::write(docs.join("old.txt"), "stale").unwrap();
    fs::write(docs.join("assets").join("old.js"), "stale").unwrap();

    let mut output = OutputManager::new();
    output
        .prepare(docs_config(&project).with_clear_before_write(true))
        .unwrap();
    output
        .emit(EmittedAsset::new("index.html", "<!doctype html>"))
        .unwrap();
    let manifest = output.finalize().unwrap();

    assert_eq!(listing(&docs), vec!["index.html"]);
    assert_eq!(manifest.paths().collect::<Vec<_>>(), vec!["index.html"]);
}

#[test]
fn test_without_clearing_existing_files_survive() {
    let project = TempDir::new().unwrap();
    let docs = project.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("old.txt"), "kept").unwrap();

    let mut output = OutputManager::new();
    output.prepare(docs_config(&project)).unwrap();
    output.emit(EmittedAsset::new("index.html", "new")).unwrap();
    let manifest = output.finalize().unwrap();

    assert_eq!(listing(&docs), vec!["index.html", "old.txt"]);
    assert_eq!(fs::read_to_string(docs.join("old.txt")).unwrap(), "kept");
    assert!(!manifest.contains("old.txt"));
}

#[test]
fn test_path_traversal_is_rejected() {
    let project = TempDir::new().unwrap();

    let mut output = OutputManager::new();
    output.prepare(docs_config(&project)).unwrap();

    let err = output
        .emit(EmittedAsset::new("../../etc/passwd", "root:x:0:0"))
        .unwrap_err();
    assert!(matches!(err, Error::PathEscape { .. }), "got {err:?}");

    let err = output
        .emit(EmittedAsset::new("assets/../../escape.txt", "x"))
        .unwrap_err();
    assert!(matches!(err, Error::PathEscape { .. }), "got {err:?}");

    // The pass is still usable after a rejected emit
    assert_eq!(output.state(), OutputState::Prepared);
    let manifest = output.finalize().unwrap();
    assert!(manifest.is_empty());
    assert!(!project.path().join("escape.txt").exists());
    assert_eq!(listing(&project.path().join("docs")), Vec::<String>::new());
}

#[test]
fn test_operations_out_of_order_are_invalid_state() {
    let project = TempDir::new().unwrap();
    let mut output = OutputManager::new();

    let err = output.emit(EmittedAsset::new("a.txt", "a")).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            operation: "emit",
            state: OutputState::Unprepared
        }
    ));
    assert!(matches!(
        output.finalize().unwrap_err(),
        Error::InvalidState { operation: "finalize", .. }
    ));
    assert!(!project.path().join("docs").exists());

    output.prepare(docs_config(&project)).unwrap();
    assert!(matches!(
        output.prepare(docs_config(&project)).unwrap_err(),
        Error::InvalidState { operation: "prepare", .. }
    ));

    output.finalize().unwrap();
    assert_eq!(output.state(), OutputState::Finalized);
    assert!(matches!(
        output.emit(EmittedAsset::new("late.txt", "late")).unwrap_err(),
        Error::InvalidState {
            state: OutputState::Finalized,
            ..
        }
    ));
}

#[test]
fn test_manager_can_run_another_pass_after_finalize() {
    let project = TempDir::new().unwrap();
    let mut output = OutputManager::new();

    output.prepare(docs_config(&project)).unwrap();
    output.emit(EmittedAsset::new("first.txt", "1")).unwrap();
    output.finalize().unwrap();

    output
        .prepare(docs_config(&project).with_clear_before_write(true))
        .unwrap();
    output.emit(EmittedAsset::new("second.txt", "2")).unwrap();
    let manifest = output.finalize().unwrap();

    assert_eq!(manifest.paths().collect::<Vec<_>>(), vec!["second.txt"]);
    assert_eq!(listing(&project.path().join("docs")), vec!["second.txt"]);
}

#[test]
fn test_concurrent_pass_on_same_directory_is_refused() {
    let project = TempDir::new().unwrap();

    let mut first = OutputManager::new();
    first.prepare(docs_config(&project)).unwrap();

    let mut second = OutputManager::new();
    let err = second.prepare(docs_config(&project)).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "got {err:?}");
    assert_eq!(second.state(), OutputState::Unprepared);

    first.finalize().unwrap();
    second.prepare(docs_config(&project)).unwrap();
    second.finalize().unwrap();
}

#[test]
fn test_manifest_keeps_emission_order() {
    let project = TempDir::new().unwrap();
    let mut output = OutputManager::new();
    output.prepare(docs_config(&project)).unwrap();

    for name in ["index.html", "assets/index.js", "assets/index.css", "favicon.ico"] {
        output.emit(EmittedAsset::new(name, name)).unwrap();
    }
    output
        .emit(EmittedAsset::new("index.html", "rewritten"))
        .unwrap();
    let manifest = output.finalize().unwrap();

    assert_eq!(
        manifest.paths().collect::<Vec<_>>(),
        vec!["index.html", "assets/index.js", "assets/index.css", "favicon.ico"]
    );
    assert_eq!(manifest.get("index.html").unwrap().size, "rewritten".len() as u64);
    assert_eq!(
        fs::read_to_string(project.path().join("docs/assets/index.js")).unwrap(),
        "assets/index.js"
    );
}

#[test]
fn test_references_are_rebased_onto_base_path() {
    let project = TempDir::new().unwrap();
    let config = OutputConfig::new(project.path().join("docs"), "./", project.path());

    let mut output = OutputManager::new();
    output.prepare(config).unwrap();
    let html = r#"<script type="module" src="/assets/index.js"></script><link rel="stylesheet" href="https://cdn.example.com/x.css">"#;
    let written = output
        .emit(
            EmittedAsset::new("index.html", html)
                .with_references(["/assets/index.js", "https://cdn.example.com/x.css"]),
        )
        .unwrap();
    let manifest = output.finalize().unwrap();

    assert_eq!(
        fs::read_to_string(written).unwrap(),
        r#"<script type="module" src="./assets/index.js"></script><link rel="stylesheet" href="https://cdn.example.com/x.css">"#
    );
    assert_eq!(
        manifest.get("index.html").unwrap().references,
        vec!["./assets/index.js", "https://cdn.example.com/x.css"]
    );
    assert_eq!(manifest.base, "./");
}

#[test]
fn test_binary_contents_are_written_verbatim() {
    let project = TempDir::new().unwrap();
    let bytes = vec![0x89, b'P', b'N', b'G', 0xff, 0xfe, b'/', b'a'];

    let mut output = OutputManager::new();
    output.prepare(docs_config(&project)).unwrap();
    let written = output
        .emit(EmittedAsset::new("logo.png", bytes.clone()).with_references(["/a"]))
        .unwrap();
    output.finalize().unwrap();

    assert_eq!(fs::read(written).unwrap(), bytes);
}

#[test]
fn test_manifest_file_is_written_at_finalize() {
    let project = TempDir::new().unwrap();
    let docs = project.path().join("docs");

    let mut output = OutputManager::new();
    output
        .prepare(docs_config(&project).with_manifest_file("manifest.json"))
        .unwrap();
    output.emit(EmittedAsset::new("index.html", "<p>")).unwrap();

    let err = output
        .emit(EmittedAsset::new("manifest.json", "{}"))
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
    assert!(!docs.join("manifest.json").exists());

    let manifest = output.finalize().unwrap();
    let on_disk: BuildManifest =
        serde_json::from_slice(&fs::read(docs.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(on_disk, manifest);
    assert_eq!(listing(&docs), vec!["index.html", "manifest.json"]);
}

#[test]
fn test_lock_file_name_is_reserved() {
    let project = TempDir::new().unwrap();
    let mut output = OutputManager::new();
    output.prepare(docs_config(&project)).unwrap();

    let err = output
        .emit(EmittedAsset::new(".kiln-lock", "mine"))
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
    output.finalize().unwrap();
}

#[test]
fn test_directory_outside_boundary_is_unsafe() {
    let project = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();

    let mut output = OutputManager::new();
    let err = output
        .prepare(
            OutputConfig::new(elsewhere.path().join("docs"), "/", project.path())
                .with_clear_before_write(true),
        )
        .unwrap_err();

    assert!(matches!(err, Error::UnsafeDirectory { .. }), "got {err:?}");
    assert!(!elsewhere.path().join("docs").exists());
}

#[test]
fn test_clearing_the_project_itself_is_unsafe() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join("package.json"), "{}").unwrap();

    let mut output = OutputManager::new();
    let err = output
        .prepare(
            OutputConfig::new(project.path(), "/", project.path())
                .with_clear_before_write(true),
        )
        .unwrap_err();

    assert!(matches!(err, Error::UnsafeDirectory { .. }));
    assert!(project.path().join("package.json").exists());
}

#[test]
fn test_relative_directory_is_a_configuration_error() {
    let mut output = OutputManager::new();
    let err = output
        .prepare(OutputConfig::new("docs", "/", "/srv/project"))
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}

#[test]
fn test_nested_directories_are_created() {
    let project = TempDir::new().unwrap();
    let mut output = OutputManager::new();
    output.prepare(docs_config(&project)).unwrap();

    let written = output
        .emit(EmittedAsset::new("assets/img/icons/logo.svg", "<svg/>"))
        .unwrap();
    let manifest = output.finalize().unwrap();

    assert!(written.ends_with("assets/img/icons/logo.svg"));
    assert_eq!(fs::read_to_string(&written).unwrap(), "<svg/>");
    assert!(manifest.contains("assets/img/icons/logo.svg"));
}

#[test]
fn test_clearing_a_project_root_without_a_wider_boundary_is_unsafe() {
    let project = TempDir::new().unwrap();
    fs::create_dir_all(project.path().join("src")).unwrap();
    fs::write(project.path().join("src").join("main.ts"), "export {}").unwrap();

    // A directory that contains its boundary is never emptied
    let mut output = OutputManager::new();
    let err = output
        .prepare(
            OutputConfig::new(project.path().join("src").join(".."), "/", project.path())
                .with_clear_before_write(true),
        )
        .unwrap_err();

    assert!(matches!(err, Error::UnsafeDirectory { .. }), "got {err:?}");
    assert!(project.path().join("src").join("main.ts").exists());
}

#[cfg(unix)]
#[test]
fn test_symlink_inside_output_cannot_redirect_writes() {
    let project = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let docs = project.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    std::os::unix::fs::symlink(elsewhere.path(), docs.join("sub")).unwrap();

    let mut output = OutputManager::new();
    output.prepare(docs_config(&project)).unwrap();
    let err = output
        .emit(EmittedAsset::new("sub/pwned.txt", "owned"))
        .unwrap_err();
    let manifest = output.finalize().unwrap();

    assert!(matches!(err, Error::PathEscape { .. }), "got {err:?}");
    assert!(!elsewhere.path().join("pwned.txt").exists());
    assert!(manifest.is_empty());
}

#[test]
fn test_rebased_reference_is_not_rebased_twice() {
    let project = TempDir::new().unwrap();
    let config = OutputConfig::new(project.path().join("docs"), "/app/", project.path());

    let mut output = OutputManager::new();
    output.prepare(config).unwrap();
    let written = output
        .emit(
            EmittedAsset::new("index.html", r#"<a href="x.js">"#)
                .with_references(["x.js", "/app/x.js"]),
        )
        .unwrap();
    output.finalize().unwrap();

    assert_eq!(fs::read_to_string(written).unwrap(), r#"<a href="/app/x.js">"#);
}

#[test]
fn test_failed_manifest_write_keeps_pass_open() {
    let project = TempDir::new().unwrap();
    let docs = project.path().join("docs");

    let mut output = OutputManager::new();
    output
        .prepare(docs_config(&project).with_manifest_file("manifest.json"))
        .unwrap();
    output.emit(EmittedAsset::new("index.html", "<p>")).unwrap();

    // A directory in the way makes the rename onto the manifest path fail
    fs::create_dir_all(docs.join("manifest.json").join("blocker")).unwrap();
    let err = output.finalize().unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "got {err:?}");
    assert_eq!(output.state(), OutputState::Prepared);

    fs::remove_dir_all(docs.join("manifest.json")).unwrap();
    let manifest = output.finalize().unwrap();
    assert_eq!(manifest.paths().collect::<Vec<_>>(), vec!["index.html"]);
    assert!(docs.join("manifest.json").is_file());
}
