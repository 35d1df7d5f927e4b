//! Git sync stage tests

mod support;

use gitship::app::settings::ClientSettings;
use gitship::deploy::git::{GitSync, RemoteAction};
use gitship::deploy::narrator::Narrator;
use gitship::errors::{DeployError, GitError};
use gitship::process::{CommandSpec, ExecutionResult};

use support::{fail, ok, ScriptedConfirmer, ScriptedRunner};

const REPO: &str = "git@example.com:team/app.git";

fn settings(root: &std::path::Path) -> ClientSettings {
    ClientSettings {
        project_root: root.to_path_buf(),
        repository_url: Some(REPO.to_string()),
        ..Default::default()
    }
}

/// Answers the branch query, `None` for anything else
fn branch_or(cmd: &CommandSpec) -> Option<ExecutionResult> {
    cmd.starts_with(&["git", "rev-parse", "--abbrev-ref"]).then(|| ok("main\n"))
}

#[tokio::test]
async fn test_clean_tree_has_no_changes() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|_| ok(""));
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    let status = git.check_status().await.unwrap();

    assert!(!status.has_changes);
    assert!(status.changed_files.is_empty());
    assert_eq!(runner.calls().len(), 1);
    assert!(runner.ran(&["git", "status", "--porcelain"]));
}

#[tokio::test]
async fn test_archive_is_flagged_without_prompt_when_non_interactive() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|_| ok("?? archive.zip\n M src/app.php\n"));
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    let status = git.check_status().await.unwrap();

    assert!(status.has_changes);
    assert_eq!(status.changed_files, vec!["archive.zip", "src/app.php"]);
    assert_eq!(status.large_files.len(), 1);
    assert_eq!(status.large_files[0].path, "archive.zip");
    assert!(confirmer.prompts().is_empty());
}

#[tokio::test]
async fn test_oversized_file_declined_cancels() {
    let dir = tempfile::tempdir().unwrap();
    let big = std::fs::File::create(dir.path().join("video.mp4")).unwrap();
    big.set_len(11 * 1024 * 1024).unwrap();

    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|_| ok("?? video.mp4\n"));
    let confirmer = ScriptedConfirmer::interactive(false);
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    let result = git.check_status().await;

    assert!(matches!(result, Err(DeployError::Cancelled(_))));
    assert_eq!(confirmer.prompts().len(), 1);
}

#[tokio::test]
async fn test_small_file_is_not_flagged() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|_| ok("?? notes.txt\n"));
    let confirmer = ScriptedConfirmer::interactive(false);
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    let status = git.check_status().await.unwrap();
    assert!(status.large_files.is_empty());
    assert!(confirmer.prompts().is_empty());
}

#[tokio::test]
async fn test_ensure_remote_adds_missing_origin() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|_| ok(""));
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    let action = git.ensure_remote(REPO).await.unwrap();

    assert_eq!(action, RemoteAction::Added);
    let adds = runner.matching(&["git", "remote", "add"]);
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].args, vec!["remote", "add", "origin", REPO]);
}

#[tokio::test]
async fn test_ensure_remote_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let remotes = format!("origin\t{} (fetch)\norigin\t{} (push)\n", REPO, REPO);
    let runner = ScriptedRunner::new(move |_| ok(&remotes));
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    assert_eq!(git.ensure_remote(REPO).await.unwrap(), RemoteAction::Unchanged);
    assert_eq!(git.ensure_remote(REPO).await.unwrap(), RemoteAction::Unchanged);

    assert!(!runner.ran(&["git", "remote", "add"]));
    assert!(!runner.ran(&["git", "remote", "set-url"]));
}

#[tokio::test]
async fn test_ensure_remote_updates_other_url() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|_| ok("origin\tgit@old.example.com:app.git (fetch)\n"));
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    assert_eq!(git.ensure_remote(REPO).await.unwrap(), RemoteAction::Updated);
    let updates = runner.matching(&["git", "remote", "set-url"]);
    assert_eq!(updates[0].args, vec!["remote", "set-url", "origin", REPO]);
}

#[tokio::test]
async fn test_repository_url_falls_back_to_origin() {
    let dir = tempfile::tempdir().unwrap();
    let settings = ClientSettings {
        project_root: dir.path().to_path_buf(),
        ..Default::default()
    };
    let runner = ScriptedRunner::new(|_| ok("https://example.com/app.git\n"));
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    assert_eq!(git.repository_url().await.unwrap(), "https://example.com/app.git");

    let runner = ScriptedRunner::new(|_| fail(2, "error: No such remote 'origin'"));
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);
    assert_eq!(git.repository_url().await, Err(GitError::MissingRepository));
}

#[tokio::test]
async fn test_stage_force_adds_build_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("frontend/dist")).unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::succeeding();
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    tokio_test::assert_ok!(git.stage().await);

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].args, vec!["add", "-f", "frontend/dist"]);
    assert_eq!(calls[1].args, vec!["add", "."]);
}

#[tokio::test]
async fn test_commit_uses_default_message() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::succeeding();
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    let message = git.commit(None).await.unwrap();

    assert!(message.starts_with("Deploy: "));
    let commits = runner.matching(&["git", "commit", "-m"]);
    assert_eq!(commits[0].args[2], message);
}

#[tokio::test]
async fn test_nothing_to_commit_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|_| stdout_failure("nothing to commit, working tree clean"));
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    assert_eq!(git.commit(Some("Deploy: test")).await.unwrap(), "Deploy: test");
}

fn stdout_failure(stdout: &str) -> ExecutionResult {
    ExecutionResult {
        exit_code: 1,
        stdout: stdout.to_string(),
        stderr: String::new(),
        duration_ms: 1,
    }
}

#[tokio::test]
async fn test_non_fast_forward_requires_force() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|cmd| {
        if let Some(result) = branch_or(cmd) {
            return result;
        }
        if cmd.args.iter().any(|a| a == "--force") {
            ok("")
        } else {
            fail(1, " ! [rejected]        main -> main (non-fast-forward)")
        }
    });
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    let err = git.push(false).await.unwrap_err();
    assert!(matches!(err, DeployError::Git(GitError::NonFastForward)));
    assert!(err.to_string().contains("--force"));

    assert_eq!(git.push(true).await.unwrap(), "main");
    let forced = runner.matching(&["git", "push", "--force"]);
    assert_eq!(forced[0].args, vec!["push", "--force", "origin", "main"]);
}

#[tokio::test]
async fn test_push_retries_with_upstream() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|cmd| {
        if let Some(result) = branch_or(cmd) {
            return result;
        }
        if cmd.args.iter().any(|a| a == "-u") {
            ok("")
        } else {
            fail(128, "fatal: The current branch main has no upstream branch.")
        }
    });
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    assert_eq!(git.push(false).await.unwrap(), "main");

    let pushes = runner.matching(&["git", "push"]);
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[1].args, vec!["push", "-u", "origin", "main"]);
}

#[tokio::test]
async fn test_push_timeout_is_classified() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|cmd| {
        branch_or(cmd).unwrap_or_else(|| fail(124, "timeout: process exceeded 300s limit: git push origin main"))
    });
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    let err = git.push(false).await.unwrap_err();
    assert!(matches!(err, DeployError::Git(GitError::PushTimeout)));
}

#[tokio::test]
async fn test_branch_falls_back_to_main() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::new(|_| fail(128, "fatal: not a git repository"));
    let confirmer = ScriptedConfirmer::non_interactive();
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, false);

    assert_eq!(git.current_branch().await, "main");
    assert_eq!(git.head_commit().await, "unknown");
}

#[tokio::test]
async fn test_dry_run_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let runner = ScriptedRunner::succeeding();
    let confirmer = ScriptedConfirmer::interactive(false);
    let narrator = Narrator::quiet();
    let git = GitSync::new(&runner, &settings, &narrator, &confirmer, true);

    assert!(git.check_status().await.unwrap().has_changes);
    assert_eq!(git.ensure_remote(REPO).await.unwrap(), RemoteAction::DryRun);
    git.stage().await.unwrap();
    git.commit(None).await.unwrap();
    git.push(true).await.unwrap();

    assert!(runner.calls().is_empty());
    assert!(confirmer.prompts().is_empty());
}
