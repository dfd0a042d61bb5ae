use crate::backend::{
    self, unsupported, Backend, BackendKind, BackendSettings, Capabilities, CommitRequest,
    Identity, MergeRequest,
};
use crate::error::{VcsError, VcsResult};
use crate::fixture::step::{FixtureStep, RepositoryFixtureSpec};
use crate::runner::{CommandJournal, CommandRunner};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// A step left out because the backend cannot express it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedStep {
    /// Position in the script, starting at 0
    pub index: usize,
    pub step: String,
    pub reason: String,
}

/// A built (or reopened) fixture repository
#[derive(Debug)]
pub struct RepositoryHandle {
    kind: BackendKind,
    workdir: PathBuf,
    backend: Box<dyn Backend>,
    revisions: usize,
    skipped: Vec<SkippedStep>,
}

impl RepositoryHandle {
    /// Open an existing fixture for read-only use, e.g. log extraction
    pub fn open(
        kind: BackendKind,
        settings: &BackendSettings,
        workdir: &Path,
        runner: CommandRunner,
    ) -> VcsResult<Self> {
        if !workdir.is_dir() {
            return Err(VcsError::Execution(format!(
                "No fixture repository at {}",
                workdir.display()
            )));
        }
        let workdir = std::path::absolute(workdir)?;
        let settings = absolute_store(settings)?;
        let backend = backend::open(kind, &settings, &workdir, &Identity::new("", None), runner)?;
        Ok(Self {
            kind,
            workdir,
            backend,
            revisions: 0,
            skipped: Vec::new(),
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Revisions created by the build; 0 for a reopened repository
    pub fn revisions_created(&self) -> usize {
        self.revisions
    }

    pub fn skipped(&self) -> &[SkippedStep] {
        &self.skipped
    }
}

/// Applies a [`RepositoryFixtureSpec`] step by step
///
/// Steps run strictly in order. The first failing step aborts the build and
/// the partially built repository is left on disk for inspection.
#[derive(Debug, Clone)]
pub struct FixtureExecutor {
    settings: BackendSettings,
    runner: CommandRunner,
    clean: bool,
    journal: bool,
}

/// Mutable bookkeeping while a script runs
#[derive(Debug, Default)]
struct BuildState {
    /// Changes waiting for the next commit
    pending: bool,
    revisions: usize,
    skipped: Vec<SkippedStep>,
}

impl FixtureExecutor {
    pub fn new(settings: BackendSettings, runner: CommandRunner) -> Self {
        Self {
            settings,
            runner,
            clean: false,
            journal: false,
        }
    }

    /// Remove an existing target (and store) instead of refusing to build
    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Record every command in `<target>.commands.log`
    pub fn journal(mut self, journal: bool) -> Self {
        self.journal = journal;
        self
    }

    pub fn build(&self, spec: &RepositoryFixtureSpec) -> VcsResult<RepositoryHandle> {
        spec.validate()
            .map_err(|e| VcsError::Execution(format!("invalid fixture script: {}", e)))?;

        let target = std::path::absolute(&spec.target)?;
        let settings = absolute_store(&self.settings)?;
        if spec.backend == BackendKind::Svn && settings.store.is_none() {
            return Err(VcsError::Execution(
                "Subversion needs a repository store path".to_string(),
            ));
        }

        self.claim(&target)?;
        if spec.backend == BackendKind::Svn {
            if let Some(store) = &settings.store {
                self.claim(store)?;
            }
        }

        let runner = if self.journal {
            self.runner
                .clone()
                .with_journal(CommandJournal::beside(&target)?)
        } else {
            self.runner.clone()
        };

        info!(
            backend = %spec.backend,
            target = %target.display(),
            steps = spec.steps.len(),
            "Building fixture"
        );

        let mut backend =
            backend::open(spec.backend, &settings, &target, &spec.author, runner.clone())?;
        backend.init()?;

        let capabilities = backend.capabilities();
        let mut state = BuildState::default();

        for (index, step) in spec.steps.iter().enumerate() {
            if let Some(journal) = runner.journal() {
                journal.note(&format!("step {}: {}", index + 1, step))?;
            }

            if let Err(reason) = check_supported(spec.backend, capabilities, step, state.pending) {
                warn!(backend = %spec.backend, index, step = %step, reason = %reason, "Skipping step");
                state.skipped.push(SkippedStep {
                    index,
                    step: step.to_string(),
                    reason: reason.to_string(),
                });
                continue;
            }

            debug!(index, step = %step, "Applying step");
            if let Err(e) = apply(backend.as_mut(), capabilities, spec, step, &mut state) {
                error!(index, step = %step, error = %e, "Fixture step failed");
                return Err(e);
            }
        }

        info!(
            backend = %spec.backend,
            revisions = state.revisions,
            skipped = state.skipped.len(),
            "Fixture built"
        );

        Ok(RepositoryHandle {
            kind: spec.backend,
            workdir: target,
            backend,
            revisions: state.revisions,
            skipped: state.skipped,
        })
    }

    /// Refuse to overwrite `path` unless cleaning was requested
    fn claim(&self, path: &Path) -> VcsResult<()> {
        if !path.exists() {
            return Ok(());
        }
        if !self.clean {
            return Err(VcsError::Precondition(path.to_path_buf()));
        }
        info!(path = %path.display(), "Removing existing fixture");
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn absolute_store(settings: &BackendSettings) -> VcsResult<BackendSettings> {
    let mut settings = settings.clone();
    if let Some(store) = &settings.store {
        settings.store = Some(std::path::absolute(store)?);
    }
    Ok(settings)
}

/// Write `content` to `path`; false when the file already held exactly that
fn write_content(path: &Path, content: &str) -> VcsResult<bool> {
    match fs::read(path) {
        Ok(existing) if existing == content.as_bytes() => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(true)
}

/// Decide up front whether `step` can be expressed by the backend
fn check_supported(
    kind: BackendKind,
    capabilities: Capabilities,
    step: &FixtureStep,
    pending: bool,
) -> VcsResult<()> {
    match step {
        FixtureStep::Commit { message, .. }
            if message.is_empty() && !capabilities.empty_messages =>
        {
            Err(unsupported(kind, "commit with an empty message"))
        }
        FixtureStep::Commit { .. } if !pending && !capabilities.empty_commits => {
            Err(unsupported(kind, "commit without changes"))
        }
        FixtureStep::CreateBranch { .. } if !capabilities.branching => {
            Err(unsupported(kind, "create branch"))
        }
        FixtureStep::CheckoutBranch { .. } if !capabilities.branching => {
            Err(unsupported(kind, "checkout branch"))
        }
        FixtureStep::MergeBranch { .. } if !capabilities.branching => {
            Err(unsupported(kind, "merge branch"))
        }
        FixtureStep::Rebase { .. } if !capabilities.rebase => Err(unsupported(kind, "rebase")),
        _ => Ok(()),
    }
}

fn apply(
    backend: &mut dyn Backend,
    capabilities: Capabilities,
    spec: &RepositoryFixtureSpec,
    step: &FixtureStep,
    state: &mut BuildState,
) -> VcsResult<()> {
    match step {
        FixtureStep::WriteFile { path, content } => {
            let full_path = backend.workdir().join(path);
            let is_new = !full_path.exists();
            if write_content(&full_path, content)? {
                if is_new {
                    backend.track(&[path.as_str()])?;
                }
                state.pending = true;
            }
        }
        FixtureStep::MoveFile { from, to } => {
            backend.move_path(from, to)?;
            state.pending = true;
        }
        FixtureStep::RemoveFile { path } => {
            backend.remove(path)?;
            state.pending = true;
        }
        FixtureStep::MakeDir { path } => {
            backend.make_dir(path)?;
            if capabilities.tracks_directories {
                state.pending = true;
            }
        }
        FixtureStep::Commit {
            message,
            author_date,
            committer_date,
            author,
        } => {
            backend.commit(&CommitRequest {
                message,
                author_date: *author_date,
                committer_date: *committer_date,
                author: author.as_ref().unwrap_or(&spec.author),
                allow_empty_message: message.is_empty(),
                allow_empty_changeset: !state.pending,
            })?;
            state.pending = false;
            state.revisions += 1;
        }
        FixtureStep::CreateBranch { name } => backend.create_branch(name)?,
        FixtureStep::CheckoutBranch { name } => backend.checkout(name)?,
        FixtureStep::MergeBranch {
            name,
            message,
            date,
            author,
        } => {
            backend.merge(&MergeRequest {
                branch: name,
                message,
                date: *date,
                author: author.as_ref().unwrap_or(&spec.author),
            })?;
            state.pending = false;
            state.revisions += 1;
        }
        FixtureStep::Rebase {
            onto,
            message,
            date,
        } => backend.rebase(onto, message, *date)?,
    }
    Ok(())
}
