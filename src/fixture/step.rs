use crate::backend::{BackendKind, Identity};
use crate::config::settings::{ConfigError, ConfigResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// One scripted action
///
/// Scripts are TOML tables tagged with `action`:
///
/// ```toml
/// [[steps]]
/// action = "write_file"
/// path = "file1.txt"
/// content = "file1 content\n"
///
/// [[steps]]
/// action = "commit"
/// message = "initial commit"
/// author_date = "2014-08-10T15:00:00Z"
/// committer_date = "2014-08-10T15:00:00Z"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FixtureStep {
    /// Create or overwrite a file; new files are tracked
    WriteFile { path: String, content: String },
    MoveFile { from: String, to: String },
    RemoveFile { path: String },
    MakeDir { path: String },
    Commit {
        message: String,
        author_date: DateTime<Utc>,
        committer_date: DateTime<Utc>,
        /// Falls back to the fixture author
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<Identity>,
    },
    CreateBranch { name: String },
    CheckoutBranch { name: String },
    MergeBranch {
        name: String,
        message: String,
        date: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<Identity>,
    },
    /// Rebase the current branch onto `onto`, then rewrite the tip's message
    /// and committer date
    Rebase {
        onto: String,
        message: String,
        date: DateTime<Utc>,
    },
}

impl FixtureStep {
    /// Whether the step records a new revision
    pub fn creates_revision(&self) -> bool {
        matches!(
            self,
            FixtureStep::Commit { .. } | FixtureStep::MergeBranch { .. }
        )
    }
}

impl fmt::Display for FixtureStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureStep::WriteFile { path, .. } => write!(f, "write {}", path),
            FixtureStep::MoveFile { from, to } => write!(f, "move {} -> {}", from, to),
            FixtureStep::RemoveFile { path } => write!(f, "remove {}", path),
            FixtureStep::MakeDir { path } => write!(f, "mkdir {}", path),
            FixtureStep::Commit {
                message,
                committer_date,
                ..
            } => write!(f, "commit {:?} at {}", message, committer_date.to_rfc3339()),
            FixtureStep::CreateBranch { name } => write!(f, "create branch {}", name),
            FixtureStep::CheckoutBranch { name } => write!(f, "checkout {}", name),
            FixtureStep::MergeBranch { name, date, .. } => {
                write!(f, "merge {} at {}", name, date.to_rfc3339())
            }
            FixtureStep::Rebase { onto, date, .. } => {
                write!(f, "rebase onto {} at {}", onto, date.to_rfc3339())
            }
        }
    }
}

/// A complete fixture: where to build it, for which backend, and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFixtureSpec {
    pub backend: BackendKind,
    pub target: PathBuf,
    pub author: Identity,
    #[serde(default)]
    pub steps: Vec<FixtureStep>,
}

impl RepositoryFixtureSpec {
    pub fn new(backend: BackendKind, target: impl Into<PathBuf>, author: Identity) -> Self {
        Self {
            backend,
            target: target.into(),
            author,
            steps: Vec::new(),
        }
    }

    /// Parse a TOML fixture script
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let spec: Self = toml::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load a TOML fixture script from disk
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Paths must stay inside the working copy
    pub fn validate(&self) -> ConfigResult<()> {
        for step in &self.steps {
            let paths: Vec<&str> = match step {
                FixtureStep::WriteFile { path, .. }
                | FixtureStep::RemoveFile { path }
                | FixtureStep::MakeDir { path } => vec![path.as_str()],
                FixtureStep::MoveFile { from, to } => vec![from.as_str(), to.as_str()],
                _ => Vec::new(),
            };
            for path in paths {
                if !is_contained(path) {
                    return Err(ConfigError::InvalidValue(format!(
                        "step '{}' uses a path outside the working copy: {}",
                        step, path
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of steps that record a revision when nothing is skipped
    pub fn planned_revisions(&self) -> usize {
        self.steps.iter().filter(|s| s.creates_revision()).count()
    }

    pub fn step(mut self, step: FixtureStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn write_file(self, path: &str, content: &str) -> Self {
        self.step(FixtureStep::WriteFile {
            path: path.to_string(),
            content: content.to_string(),
        })
    }

    pub fn move_file(self, from: &str, to: &str) -> Self {
        self.step(FixtureStep::MoveFile {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    pub fn remove_file(self, path: &str) -> Self {
        self.step(FixtureStep::RemoveFile {
            path: path.to_string(),
        })
    }

    pub fn make_dir(self, path: &str) -> Self {
        self.step(FixtureStep::MakeDir {
            path: path.to_string(),
        })
    }

    /// Commit with identical author and committer dates
    pub fn commit(self, message: &str, date: DateTime<Utc>) -> Self {
        self.commit_dated(message, date, date)
    }

    pub fn commit_dated(
        self,
        message: &str,
        author_date: DateTime<Utc>,
        committer_date: DateTime<Utc>,
    ) -> Self {
        self.step(FixtureStep::Commit {
            message: message.to_string(),
            author_date,
            committer_date,
            author: None,
        })
    }

    pub fn create_branch(self, name: &str) -> Self {
        self.step(FixtureStep::CreateBranch {
            name: name.to_string(),
        })
    }

    pub fn checkout_branch(self, name: &str) -> Self {
        self.step(FixtureStep::CheckoutBranch {
            name: name.to_string(),
        })
    }

    pub fn merge_branch(self, name: &str, message: &str, date: DateTime<Utc>) -> Self {
        self.step(FixtureStep::MergeBranch {
            name: name.to_string(),
            message: message.to_string(),
            date,
            author: None,
        })
    }

    pub fn rebase(self, onto: &str, message: &str, date: DateTime<Utc>) -> Self {
        self.step(FixtureStep::Rebase {
            onto: onto.to_string(),
            message: message.to_string(),
            date,
        })
    }
}

fn is_contained(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)))
}
