//! Build → extract → sync for one backend, or for several concurrently.

use crate::backend::{self, BackendKind, BackendVersion};
use crate::config::settings::{ConfigArtifact, ConfigError};
use crate::config::sync;
use crate::error::{AppError, AppResult};
use crate::fixture::{reference, FixtureExecutor, RepositoryFixtureSpec, SkippedStep};
use crate::history::{self, CommitRecord};
use crate::runner::CommandRunner;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RegenerateOptions {
    /// TOML script to run instead of the reference history
    pub script: Option<PathBuf>,
    /// Remove an existing fixture first
    pub clean: bool,
    /// Write the extracted ids back to the config artifact
    pub sync: bool,
    /// Overrides `commandTimeoutSeconds`
    pub timeout: Option<Duration>,
    /// Keep a command journal next to the fixture
    pub journal: bool,
}

impl Default for RegenerateOptions {
    fn default() -> Self {
        Self {
            script: None,
            clean: false,
            sync: true,
            timeout: None,
            journal: true,
        }
    }
}

/// Outcome of one successful regeneration
#[derive(Debug)]
pub struct Regenerated {
    pub kind: BackendKind,
    pub workdir: PathBuf,
    pub version: BackendVersion,
    /// Oldest first
    pub records: Vec<CommitRecord>,
    pub skipped: Vec<SkippedStep>,
}

impl Regenerated {
    pub fn revisions(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }
}

/// Rebuild the fixture described by `config_path` and record its history
pub fn regenerate(
    kind: BackendKind,
    config_path: &Path,
    options: &RegenerateOptions,
) -> AppResult<Regenerated> {
    let config = ConfigArtifact::load(config_path)?;
    // A config that cannot take the ids must fail before the fixture is touched
    if options.sync {
        sync::check(config_path, kind)?;
    }
    let settings = config.settings(kind)?;
    let identity = config.identity(kind)?;
    let target = config.reference_project()?.to_path_buf();
    let runner = CommandRunner::new().with_timeout(options.timeout.unwrap_or(config.timeout()));

    let version = backend::open(kind, &settings, &target, &identity, runner.clone())?
        .version()?
        .validate()?;
    info!(backend = %kind, %version, "Detected backend");

    let spec = match &options.script {
        Some(path) => {
            let mut spec = RepositoryFixtureSpec::load(path)?;
            if spec.backend != kind {
                return Err(ConfigError::InvalidValue(format!(
                    "script {} is for {}, not {}",
                    path.display(),
                    spec.backend,
                    kind
                ))
                .into());
            }
            spec.target = target;
            spec.author = identity;
            spec
        }
        None => reference::script(kind, &target, identity),
    };

    let handle = FixtureExecutor::new(settings, runner)
        .clean(options.clean)
        .journal(options.journal)
        .build(&spec)?;
    let records = history::extract(&handle)?;

    let regenerated = Regenerated {
        kind,
        workdir: handle.workdir().to_path_buf(),
        version,
        records,
        skipped: handle.skipped().to_vec(),
    };

    if options.sync {
        sync::update(config_path, kind, &regenerated.revisions())?;
    }

    Ok(regenerated)
}

/// Run [`regenerate`] for every `(backend, config)` pair concurrently
///
/// Each job runs on its own blocking task; a failing backend does not stop
/// the others. Results come back in job order.
pub async fn regenerate_all(
    jobs: Vec<(BackendKind, PathBuf)>,
    options: RegenerateOptions,
) -> Vec<(BackendKind, AppResult<Regenerated>)> {
    let handles: Vec<_> = jobs
        .into_iter()
        .map(|(kind, config_path)| {
            let options = options.clone();
            let handle = tokio::task::spawn_blocking(move || {
                regenerate(kind, &config_path, &options)
            });
            (kind, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (kind, handle) in handles {
        let result = handle.await.unwrap_or_else(|e| {
            Err(AppError::Join {
                backend: kind,
                reason: e.to_string(),
            })
        });
        results.push((kind, result));
    }
    results
}
