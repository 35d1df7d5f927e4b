//! Frontend build stage tests

mod support;

use std::path::{Path, PathBuf};

use gitship::app::settings::ClientSettings;
use gitship::deploy::build::{BuildOutcome, FrontendBuild};
use gitship::deploy::narrator::Narrator;
use gitship::errors::DeployError;
use gitship::tools::{ToolEnv, ToolPath, ToolSource};

use support::{fail, ok, ScriptedRunner};

fn npm() -> ToolPath {
    ToolPath {
        name: "npm".to_string(),
        resolved_path: PathBuf::from("npm"),
        source: ToolSource::Fallback,
    }
}

fn frontend(root: &Path) -> PathBuf {
    let dir = root.join("frontend");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("package.json"), r#"{"scripts":{"build":"vite build"}}"#).unwrap();
    dir
}

fn settings(root: &Path) -> ClientSettings {
    ClientSettings {
        project_root: root.to_path_buf(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_missing_manifest_skips_build() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::succeeding();
    let (narrator, npm, env) = (Narrator::quiet(), npm(), ToolEnv::new());

    let outcome = FrontendBuild::new(&runner, &settings, &narrator, &npm, &env)
        .run(false)
        .await
        .unwrap();

    assert_eq!(outcome, BuildOutcome::Skipped);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_dry_run_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    frontend(dir.path());
    let settings = settings(dir.path());
    let runner = ScriptedRunner::succeeding();
    let (narrator, npm, env) = (Narrator::quiet(), npm(), ToolEnv::new());

    let outcome = FrontendBuild::new(&runner, &settings, &narrator, &npm, &env)
        .run(true)
        .await
        .unwrap();

    assert_eq!(outcome, BuildOutcome::DryRun);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_unusable_npm_fails_before_building() {
    let dir = tempfile::tempdir().unwrap();
    frontend(dir.path());
    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|_| fail(127, "failed to start `npm`: No such file or directory"));
    let (narrator, npm, env) = (Narrator::quiet(), npm(), ToolEnv::new());

    let err = FrontendBuild::new(&runner, &settings, &narrator, &npm, &env)
        .run(false)
        .await
        .unwrap_err();

    match err {
        DeployError::Build(message) => assert!(message.contains("npm is not usable")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!runner.ran_arg("build"));
}

#[tokio::test]
async fn test_failed_build_reports_stderr() {
    let dir = tempfile::tempdir().unwrap();
    frontend(dir.path());
    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|cmd| {
        if cmd.args.iter().any(|a| a == "--version") {
            ok("10.2.0\n")
        } else {
            fail(1, "error TS2304: Cannot find name 'foo'")
        }
    });
    let (narrator, npm, env) = (Narrator::quiet(), npm(), ToolEnv::new());

    let err = FrontendBuild::new(&runner, &settings, &narrator, &npm, &env)
        .run(false)
        .await
        .unwrap_err();

    match err {
        DeployError::Build(message) => {
            assert!(message.contains("Cannot find name 'foo'"));
            assert!(message.contains("npm install"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_artifact_fails() {
    let dir = tempfile::tempdir().unwrap();
    frontend(dir.path());
    let settings = settings(dir.path());
    let runner = ScriptedRunner::succeeding();
    let (narrator, npm, env) = (Narrator::quiet(), npm(), ToolEnv::new());

    let err = FrontendBuild::new(&runner, &settings, &narrator, &npm, &env)
        .run(false)
        .await
        .unwrap_err();

    match err {
        DeployError::Build(message) => assert!(message.contains("index.html")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_successful_build_runs_in_frontend_dir() {
    let dir = tempfile::tempdir().unwrap();
    let frontend_dir = frontend(dir.path());
    std::fs::create_dir_all(frontend_dir.join("dist")).unwrap();
    std::fs::write(frontend_dir.join("dist/index.html"), "<html></html>").unwrap();

    let settings = settings(dir.path());
    let runner = ScriptedRunner::succeeding();
    let (narrator, npm, env) = (Narrator::quiet(), npm(), ToolEnv::new());

    let outcome = FrontendBuild::new(&runner, &settings, &narrator, &npm, &env)
        .run(false)
        .await
        .unwrap();

    assert_eq!(outcome, BuildOutcome::Built);
    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].args, vec!["--version"]);
    assert_eq!(calls[1].args, vec!["run", "build"]);
    assert_eq!(calls[1].cwd.as_deref(), Some(frontend_dir.as_path()));
    assert!(calls[1].timeout.is_some());
}
