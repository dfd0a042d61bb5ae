use crate::backend::{BackendKind, BackendSettings, Identity};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Failed to parse fixture script: {0}")]
    ScriptParseError(#[from] toml::de::Error),

    #[error("Unexpected config format: {0}")]
    Format(String),

    #[error("Missing config field: {0}")]
    MissingField(&'static str),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default for `commandTimeoutSeconds`
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// The per-backend JSON config the test suite reads its expectations from
///
/// Everything except `revisions` is input; `revisions` is only ever written by
/// [`crate::config::sync::update`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigArtifact {
    #[serde(default)]
    pub path_to_git: Option<PathBuf>,
    #[serde(default)]
    pub path_to_hg: Option<PathBuf>,
    #[serde(default)]
    pub path_to_svn: Option<PathBuf>,
    #[serde(default)]
    pub path_to_svn_admin: Option<PathBuf>,
    #[serde(default)]
    pub reference_project: Option<PathBuf>,
    #[serde(default)]
    pub svn_repository: Option<PathBuf>,
    #[serde(default)]
    pub author_with_email: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub command_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub revisions: Vec<Value>,
}

impl ConfigArtifact {
    /// Load and validate an artifact
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: ConfigArtifact = serde_json::from_str(text)?;

        // Validate config
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.command_timeout_seconds == Some(0) {
            return Err(ConfigError::InvalidValue(
                "commandTimeoutSeconds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Working directory of the fixture
    pub fn reference_project(&self) -> ConfigResult<&Path> {
        self.reference_project
            .as_deref()
            .ok_or(ConfigError::MissingField("referenceProject"))
    }

    /// Executables (and store) for `kind`, defaulting to programs on `PATH`
    pub fn settings(&self, kind: BackendKind) -> ConfigResult<BackendSettings> {
        let mut settings = BackendSettings::defaults(kind, self.svn_repository.clone());
        match kind {
            BackendKind::Git => {
                if let Some(program) = &self.path_to_git {
                    settings.program = program.clone();
                }
            }
            BackendKind::Hg => {
                if let Some(program) = &self.path_to_hg {
                    settings.program = program.clone();
                }
            }
            BackendKind::Svn => {
                if settings.store.is_none() {
                    return Err(ConfigError::MissingField("svnRepository"));
                }
                if let Some(program) = &self.path_to_svn {
                    settings.program = program.clone();
                }
                if let Some(admin) = &self.path_to_svn_admin {
                    settings.admin_program = Some(admin.clone());
                }
            }
        }
        Ok(settings)
    }

    /// `authorWithEmail` for Git/Mercurial, `author` for Subversion, each
    /// falling back to the other
    pub fn identity(&self, kind: BackendKind) -> ConfigResult<Identity> {
        let (preferred, fallback) = match kind {
            BackendKind::Svn => (&self.author, &self.author_with_email),
            _ => (&self.author_with_email, &self.author),
        };
        preferred
            .as_deref()
            .or(fallback.as_deref())
            .filter(|value| !value.trim().is_empty())
            .map(Identity::parse)
            .ok_or(ConfigError::MissingField("authorWithEmail"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.command_timeout_seconds
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        )
    }

    /// Known revisions as strings; Subversion stores them as numbers
    pub fn revisions(&self) -> Vec<String> {
        self.revisions
            .iter()
            .map(|value| match value {
                Value::String(id) => id.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}
