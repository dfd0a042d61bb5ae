//! Backend adapters: one uniform mutation API per version-control system.
//!
//! Backends differ in what they can express (empty commits, separate author
//! and committer dates, branches). Those differences are declared up front as
//! [`Capabilities`] so the fixture executor can skip a step before touching
//! the repository instead of interpreting a failed command.

pub mod git;
pub mod hg;
pub mod svn;
pub mod version;

pub use git::GitBackend;
pub use hg::HgBackend;
pub use svn::SvnBackend;
pub use version::BackendVersion;

use crate::error::{VcsError, VcsResult};
use crate::runner::CommandRunner;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Supported version-control systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Git,
    #[serde(alias = "mercurial")]
    #[value(alias = "mercurial")]
    Hg,
    #[serde(alias = "subversion")]
    #[value(alias = "subversion")]
    Svn,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Git, BackendKind::Hg, BackendKind::Svn];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Git => "git",
            BackendKind::Hg => "hg",
            BackendKind::Svn => "svn",
        }
    }

    /// Whether revision identifiers are content hashes rather than counters
    pub fn has_content_addressed_ids(&self) -> bool {
        !matches!(self, BackendKind::Svn)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Git => "Git",
            BackendKind::Hg => "Mercurial",
            BackendKind::Svn => "Subversion",
        };
        f.write_str(name)
    }
}

/// What a backend can express natively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Commits without any file change
    pub empty_commits: bool,
    /// Commits with an empty message
    pub empty_messages: bool,
    /// Author date and committer date set independently
    pub separate_committer_date: bool,
    /// create/checkout/merge branches
    pub branching: bool,
    pub rebase: bool,
    /// Directories are versioned objects (creating one is a change)
    pub tracks_directories: bool,
}

/// Author identity in `Name <email>` form, email optional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identity {
    pub name: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            name: name.into(),
            email,
        }
    }

    /// Parse `"Some Author <author@example.com>"` or a bare name
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if let (Some(start), true) = (value.find('<'), value.ends_with('>')) {
            let name = value[..start].trim();
            let email = value[start + 1..value.len() - 1].trim();
            return Self::new(name, (!email.is_empty()).then(|| email.to_string()));
        }
        Self::new(value, None)
    }

    pub fn email_or_empty(&self) -> &str {
        self.email.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(f, "{} <{}>", self.name, email),
            None => f.write_str(&self.name),
        }
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_string()
    }
}

/// Executables and storage locations for one backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub program: PathBuf,
    /// `svnadmin` for Subversion
    pub admin_program: Option<PathBuf>,
    /// Central repository store, Subversion only
    pub store: Option<PathBuf>,
}

impl BackendSettings {
    /// Settings that rely on the backend's executables being on `PATH`
    pub fn defaults(kind: BackendKind, store: Option<PathBuf>) -> Self {
        match kind {
            BackendKind::Git => Self {
                program: PathBuf::from("git"),
                admin_program: None,
                store: None,
            },
            BackendKind::Hg => Self {
                program: PathBuf::from("hg"),
                admin_program: None,
                store: None,
            },
            BackendKind::Svn => Self {
                program: PathBuf::from("svn"),
                admin_program: Some(PathBuf::from("svnadmin")),
                store,
            },
        }
    }
}

/// Parameters of a single commit
#[derive(Debug, Clone)]
pub struct CommitRequest<'a> {
    pub message: &'a str,
    pub author_date: DateTime<Utc>,
    pub committer_date: DateTime<Utc>,
    pub author: &'a Identity,
    pub allow_empty_message: bool,
    pub allow_empty_changeset: bool,
}

/// Parameters of a merge commit
#[derive(Debug, Clone)]
pub struct MergeRequest<'a> {
    pub branch: &'a str,
    pub message: &'a str,
    pub date: DateTime<Utc>,
    pub author: &'a Identity,
}

/// Uniform mutation API over one repository working directory
///
/// Paths are relative to [`Backend::workdir`]. Operations outside the
/// backend's [`Capabilities`] return [`VcsError::UnsupportedStep`].
pub trait Backend: Send + fmt::Debug {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> Capabilities;

    fn workdir(&self) -> &Path;

    /// Create the repository (and any backing store) at the working directory
    fn init(&mut self) -> VcsResult<()>;

    /// Put new files under version control
    fn track(&mut self, paths: &[&str]) -> VcsResult<()>;

    fn move_path(&mut self, from: &str, to: &str) -> VcsResult<()>;

    fn remove(&mut self, path: &str) -> VcsResult<()>;

    fn make_dir(&mut self, path: &str) -> VcsResult<()>;

    fn commit(&mut self, request: &CommitRequest<'_>) -> VcsResult<()>;

    fn create_branch(&mut self, name: &str) -> VcsResult<()> {
        let _ = name;
        Err(unsupported(self.kind(), "create branch"))
    }

    fn checkout(&mut self, name: &str) -> VcsResult<()> {
        let _ = name;
        Err(unsupported(self.kind(), "checkout branch"))
    }

    fn merge(&mut self, request: &MergeRequest<'_>) -> VcsResult<()> {
        let _ = request;
        Err(unsupported(self.kind(), "merge branch"))
    }

    /// Rebase the current branch onto `onto`, then stamp the rebased tip with
    /// `message` and committer date `date` (its author date is kept)
    fn rebase(&mut self, onto: &str, message: &str, date: DateTime<Utc>) -> VcsResult<()> {
        let _ = (onto, message, date);
        Err(unsupported(self.kind(), "rebase"))
    }

    /// Run the backend's log command with `format` arguments, returning stdout
    ///
    /// Read-only: never mutates the repository.
    fn log(&self, format: &[String]) -> VcsResult<String>;

    fn version(&self) -> VcsResult<BackendVersion>;
}

/// Build the adapter for `kind` over `workdir`
///
/// `identity` is the committer identity for backends that record one.
pub fn open(
    kind: BackendKind,
    settings: &BackendSettings,
    workdir: &Path,
    identity: &Identity,
    runner: CommandRunner,
) -> VcsResult<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match kind {
        BackendKind::Git => Box::new(GitBackend::new(
            &settings.program,
            workdir,
            identity.clone(),
            runner,
        )),
        BackendKind::Hg => Box::new(HgBackend::new(
            &settings.program,
            workdir,
            identity.clone(),
            runner,
        )),
        BackendKind::Svn => {
            let store = settings.store.as_ref().ok_or_else(|| {
                VcsError::Execution("Subversion needs a repository store path".to_string())
            })?;
            let admin = settings
                .admin_program
                .clone()
                .unwrap_or_else(|| PathBuf::from("svnadmin"));
            Box::new(SvnBackend::new(
                &settings.program,
                &admin,
                store,
                workdir,
                identity.clone(),
                runner,
            ))
        }
    };
    Ok(backend)
}

pub(crate) fn unsupported(backend: BackendKind, step: &str) -> VcsError {
    VcsError::UnsupportedStep {
        backend,
        step: step.to_string(),
    }
}

/// Create the parent directories of `path` inside `workdir`
pub(crate) fn ensure_parent(workdir: &Path, path: &str) -> VcsResult<()> {
    if let Some(parent) = workdir.join(path).parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
