pub mod executor;
pub mod journal;

// Re-export commonly used types
pub use executor::{CommandOutput, CommandRunner, DEFAULT_TIMEOUT};
pub use journal::CommandJournal;
