//! Commit Log Extractor: native log output to [`CommitRecord`]s.
//!
//! Every backend is asked for a fixed, sentinel-delimited (or XML) format so
//! multi-line messages and odd file names cannot shift fields. Parsing fails
//! loudly: a record that cannot be read aborts the extraction instead of being
//! dropped.

pub mod git;
pub mod hg;
pub mod svn;

use crate::backend::{Backend, BackendKind};
use crate::error::VcsResult;
use crate::fixture::RepositoryHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Marks the start of each record in sentinel-delimited log output
pub const RECORD_START: &str = "\u{15}\u{16}\u{17}\u{18}\u{19}";

/// Terminates each field of a record
pub const FIELD_END: &str = "\u{19}\u{18}\u{17}\u{16}\u{15}";

/// Separates file names inside one field
pub const FILE_SEPARATOR: &str = "\u{17}\u{16}\u{15}\u{19}\u{18}";

/// How a file changed in a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    /// Relocated within the same directory
    Renamed,
    /// Relocated to another directory
    Moved,
}

impl ChangeStatus {
    /// Classify a relocation from `from` to `to`
    pub fn relocation(from: &str, to: &str) -> Self {
        if Path::new(from).parent() == Path::new(to).parent() {
            ChangeStatus::Renamed
        } else {
            ChangeStatus::Moved
        }
    }
}

/// One `(status, path)` entry of a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub status: ChangeStatus,
    pub path: String,
    /// Source path of a rename, move or copy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
}

impl FileChange {
    pub fn new(status: ChangeStatus, path: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
            previous_path: None,
        }
    }

    pub fn relocated(from: impl Into<String>, to: impl Into<String>) -> Self {
        let (from, to) = (from.into(), to.into());
        Self {
            status: ChangeStatus::relocation(&from, &to),
            path: to,
            previous_path: Some(from),
        }
    }

    /// An added file that was copied from `from`
    pub fn copied(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            status: ChangeStatus::Added,
            path: to.into(),
            previous_path: Some(from.into()),
        }
    }
}

/// A backend-neutral commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Hash for Git/Mercurial, revision number for Subversion
    pub id: String,
    pub parents: Vec<String>,
    pub author_name: String,
    pub author_email: String,
    pub committer_time: DateTime<Utc>,
    pub author_time: DateTime<Utc>,
    pub subject: String,
    pub body: String,
    pub changes: Vec<FileChange>,
}

impl CommitRecord {
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Subject and body joined back into a full message
    pub fn message(&self) -> String {
        if self.body.is_empty() {
            self.subject.clone()
        } else {
            format!("{}\n\n{}", self.subject, self.body)
        }
    }
}

/// Log arguments requesting the canonical format of `kind`
pub fn log_format(kind: BackendKind) -> Vec<String> {
    match kind {
        BackendKind::Git => git::log_format(),
        BackendKind::Hg => hg::log_format(),
        BackendKind::Svn => svn::log_format(),
    }
}

/// Parse canonical log output, keeping the backend's (newest first) order
pub fn parse(kind: BackendKind, raw: &str) -> VcsResult<Vec<CommitRecord>> {
    match kind {
        BackendKind::Git => git::parse_log(raw),
        BackendKind::Hg => hg::parse_log(raw),
        BackendKind::Svn => svn::parse_log(raw),
    }
}

/// Read the finished fixture's history, oldest commit first
pub fn extract(handle: &RepositoryHandle) -> VcsResult<Vec<CommitRecord>> {
    extract_from(handle.backend())
}

/// Read the history of the repository `backend` points at, oldest commit first
pub fn extract_from(backend: &dyn Backend) -> VcsResult<Vec<CommitRecord>> {
    let kind = backend.kind();
    let raw = backend.log(&log_format(kind))?;

    let mut records = parse(kind, &raw)?;
    records.reverse();

    info!(backend = %kind, commits = records.len(), "extracted history");
    Ok(records)
}

/// Split a commit message into subject (first line) and body
pub(crate) fn split_message(message: &str) -> (String, String) {
    let message = message.trim_start_matches(['\r', '\n']);
    match message.split_once('\n') {
        Some((subject, body)) => (subject.trim().to_string(), body.trim().to_string()),
        None => (message.trim().to_string(), String::new()),
    }
}

/// Split sentinel-delimited output into record bodies
///
/// Anything other than whitespace before the first sentinel means the output
/// is not in the requested format.
pub(crate) fn split_records(raw: &str) -> VcsResult<Vec<&str>> {
    let mut parts = raw.split(RECORD_START);
    let preamble = parts.next().unwrap_or("");
    if !preamble.trim().is_empty() {
        return Err(crate::error::VcsError::Parse(format!(
            "unexpected output before the first record: {}",
            preamble.trim()
        )));
    }
    Ok(parts.collect())
}

pub(crate) fn parse_epoch(value: &str) -> VcsResult<DateTime<Utc>> {
    let seconds = value.trim().parse::<i64>().map_err(|_| {
        crate::error::VcsError::Parse(format!("invalid timestamp: '{}'", value.trim()))
    })?;
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        crate::error::VcsError::Parse(format!("timestamp out of range: {}", seconds))
    })
}
