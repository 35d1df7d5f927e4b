//! Tool locator tests
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use gitship::tools::{resolve, ToolEnv, ToolSource, ToolSpec};

fn executable(path: &Path) -> PathBuf {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "#!/bin/sh\necho 1.0.0\n").unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_path_buf()
}

#[test]
fn test_override_wins_over_env_and_path() {
    let dir = tempfile::tempdir().unwrap();
    let custom = executable(&dir.path().join("custom/npm"));
    let from_env = executable(&dir.path().join("env/npm"));
    executable(&dir.path().join("bin/npm"));

    let env = ToolEnv::new()
        .with_var("NPM_PATH", from_env.to_string_lossy())
        .with_var("PATH", dir.path().join("bin").to_string_lossy());

    let tool = resolve(&ToolSpec::npm(), Some(custom.to_str().unwrap()), &env);
    assert_eq!(tool.source, ToolSource::Override);
    assert_eq!(tool.resolved_path, custom);
}

#[test]
fn test_missing_override_falls_through_to_env() {
    let dir = tempfile::tempdir().unwrap();
    let from_env = executable(&dir.path().join("env/composer"));
    let env = ToolEnv::new().with_var("COMPOSER_PATH", from_env.to_string_lossy());

    let tool = resolve(
        &ToolSpec::composer(Vec::new()),
        Some("/does/not/exist/composer"),
        &env,
    );
    assert_eq!(tool.source, ToolSource::Env);
    assert_eq!(tool.resolved_path, from_env);
}

#[test]
fn test_path_scan() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first");
    std::fs::create_dir_all(&first).unwrap();
    let npm = executable(&dir.path().join("second/npm"));

    let path = std::env::join_paths([first, dir.path().join("second")]).unwrap();
    let env = ToolEnv::new().with_var("PATH", path.to_string_lossy());

    let tool = resolve(&ToolSpec::npm(), None, &env);
    assert_eq!(tool.source, ToolSource::Which);
    assert_eq!(tool.resolved_path, npm);
}

#[test]
fn test_path_scan_skips_non_executables() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    std::fs::write(bin.join("npm"), "not executable").unwrap();

    let env = ToolEnv::new().with_var("PATH", bin.to_string_lossy());
    let tool = resolve(&ToolSpec::npm(), None, &env);
    assert_eq!(tool.source, ToolSource::Fallback);
}

#[test]
fn test_php_prefers_versioned_binary() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    executable(&bin.join("php"));
    let versioned = executable(&bin.join("php8.2"));

    let env = ToolEnv::new().with_var("PATH", bin.to_string_lossy());
    let tool = resolve(&ToolSpec::php("php8.2"), None, &env);
    assert_eq!(tool.resolved_path, versioned);

    std::fs::remove_file(&versioned).unwrap();
    let tool = resolve(&ToolSpec::php("php8.2"), None, &env);
    assert_eq!(tool.resolved_path, bin.join("php"));
}

#[test]
fn test_nvm_picks_highest_version() {
    let home = tempfile::tempdir().unwrap();
    let versions = home.path().join(".nvm/versions/node");
    executable(&versions.join("v18.17.0/bin/npm"));
    executable(&versions.join("v9.11.2/bin/npm"));
    let latest = executable(&versions.join("v20.1.0/bin/npm"));

    let env = ToolEnv::new().with_home(home.path());
    let spec = ToolSpec::npm();
    let tool = resolve(&spec, None, &env);

    assert_eq!(tool.source, ToolSource::WellKnown);
    assert_eq!(tool.resolved_path, latest);

    let vars = tool.exec_env(&env, &spec);
    let path = vars.iter().find(|(k, _)| k == "PATH").map(|(_, v)| v.clone()).unwrap();
    assert!(path.starts_with(&*versions.join("v20.1.0/bin").to_string_lossy()));
    let nvm_dir = vars.iter().find(|(k, _)| k == "NVM_DIR").map(|(_, v)| v.clone()).unwrap();
    assert_eq!(PathBuf::from(nvm_dir), home.path().join(".nvm"));
}

#[test]
fn test_composer_user_bin_then_extra_paths() {
    let home = tempfile::tempdir().unwrap();
    let extra = executable(&home.path().join("opt/composer"));
    let env = ToolEnv::new().with_home(home.path());

    let tool = resolve(&ToolSpec::composer(vec![extra.clone()]), None, &env);
    assert_eq!(tool.source, ToolSource::WellKnown);
    assert_eq!(tool.resolved_path, extra);

    let user_bin = executable(&home.path().join("bin/composer"));
    let tool = resolve(&ToolSpec::composer(vec![extra]), None, &env);
    assert_eq!(tool.resolved_path, user_bin);
}

#[test]
fn test_fallback_is_bare_name() {
    let env = ToolEnv::new();
    let tool = resolve(&ToolSpec::composer(Vec::new()), None, &env);
    assert_eq!(tool.source, ToolSource::Fallback);
    assert_eq!(tool.program(), "composer");

    let info = tool.info(None);
    assert_eq!(info.source, "fallback");
    assert_eq!(info.path, "composer");
}
