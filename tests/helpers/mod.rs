#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;
use vcs_fixtures::{BackendKind, BackendSettings, CommandRunner, FixtureExecutor, Identity};

pub const AUTHOR: &str = "Some Author <some.author@mail.com>";

pub fn author() -> Identity {
    Identity::parse(AUTHOR)
}

/// 2014-08-`day` 15:00 UTC
pub fn date(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2014, 8, day, 15, 0, 0).unwrap()
}

/// Whether `program` can be started, so optional backends can be skipped
pub fn tool_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Scratch directory with a fixture target and, for Subversion, a store
pub fn create_workspace(kind: BackendKind) -> (TempDir, PathBuf, BackendSettings) {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join(format!("{}-fixture", kind.as_str()));
    let store = (kind == BackendKind::Svn).then(|| temp_dir.path().join("svn-store"));
    let settings = BackendSettings::defaults(kind, store);
    (temp_dir, target, settings)
}

pub fn executor(settings: BackendSettings) -> FixtureExecutor {
    FixtureExecutor::new(settings, CommandRunner::new())
}

/// Write a config artifact for `kind` next to the fixture
pub fn write_config(dir: &Path, kind: BackendKind, target: &Path) -> PathBuf {
    let path = dir.join(format!("{}-config.json", kind.as_str()));
    let mut config = serde_json::json!({
        "referenceProject": target,
        "authorWithEmail": AUTHOR,
        "author": "Some Author",
        "revisions": [],
    });
    if kind == BackendKind::Svn {
        config["svnRepository"] = serde_json::json!(dir.join("svn-store"));
    }
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

/// Run git directly against a fixture, for cross-checking the extractor
pub fn git(repo: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .expect("Failed to run git");
    assert!(output.status.success(), "git {:?} failed", args);
    String::from_utf8_lossy(&output.stdout).into_owned()
}
