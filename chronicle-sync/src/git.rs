//! Thin wrapper over the `git` executable.
//!
//! Every call blocks until git exits. No timeouts; interactive credential
//! prompts are disabled so a private or missing remote fails instead of
//! hanging.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use crate::SyncError;

/// Returns true if `git` is available in PATH.
pub fn is_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// `git clone <url> <dest>`.
pub fn clone(url: &str, dest: &Path) -> Result<(), SyncError> {
    run_git(
        None,
        &[OsStr::new("clone"), OsStr::new(url), dest.as_os_str()],
    )
    .map(|_| ())
}

/// `git pull origin <branch>` inside `repo`.
pub fn pull(repo: &Path, branch: &str) -> Result<(), SyncError> {
    run_git(
        Some(repo),
        &[OsStr::new("pull"), OsStr::new("origin"), OsStr::new(branch)],
    )
    .map(|_| ())
}

/// `git remote get-url origin` inside `repo`, or `None` if there is no
/// `origin` remote.
pub fn origin_url(repo: &Path) -> Option<String> {
    run_git(
        Some(repo),
        &[OsStr::new("remote"), OsStr::new("get-url"), OsStr::new("origin")],
    )
    .ok()
    .filter(|url| !url.is_empty())
}

/// `git diff --stat` inside `repo`, for display only.
///
/// Returns `None` if `repo` is not a work tree, git is missing, or there is
/// nothing to report.
pub fn diff_stat(repo: &Path) -> Option<String> {
    run_git(Some(repo), &[OsStr::new("diff"), OsStr::new("--stat")])
        .ok()
        .filter(|stat| !stat.is_empty())
}

fn run_git(cwd: Option<&Path>, args: &[&OsStr]) -> Result<String, SyncError> {
    let display = args
        .iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");

    let mut cmd = Command::new("git");
    cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }

    tracing::debug!("running: git {display}");
    let output = cmd.output().map_err(|err| SyncError::Git {
        args: display.clone(),
        message: if err.kind() == ErrorKind::NotFound {
            "git executable is not available in PATH".to_string()
        } else {
            err.to_string()
        },
    })?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(SyncError::Git {
        args: display,
        message: if stderr.is_empty() {
            format!("exit status {}", output.status)
        } else {
            stderr
        },
    })
}
