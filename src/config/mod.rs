pub mod settings;
pub mod sync;

pub use settings::{ConfigArtifact, ConfigError, ConfigResult};
