//! Fixture scripts and the executor that turns them into repositories.

pub mod executor;
pub mod reference;
pub mod step;

pub use executor::{FixtureExecutor, RepositoryHandle, SkippedStep};
pub use step::{FixtureStep, RepositoryFixtureSpec};
