pub mod backend;
pub mod config;
pub mod error;
pub mod fixture;
pub mod history;
pub mod logging;
pub mod pipeline;
pub mod runner;

// Re-export commonly used types for convenience
pub use backend::{Backend, BackendKind, BackendSettings, Capabilities, Identity};
pub use config::{ConfigArtifact, ConfigError};
pub use error::{AppError, AppResult, VcsError, VcsResult};
pub use fixture::{FixtureExecutor, FixtureStep, RepositoryFixtureSpec, RepositoryHandle};
pub use history::{ChangeStatus, CommitRecord, FileChange};
pub use runner::{CommandOutput, CommandRunner};
