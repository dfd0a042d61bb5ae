//! Logging setup for the fixture builder.
//!
//! Events go to stderr so stdout stays free for command output.
//!
//! ## Environment Variables
//!
//! 1. **`VCS_FIXTURES_LOG`** (highest priority). A bare level such as `debug`
//!    applies to this crate only; full directives are used as-is.
//! 2. **`RUST_LOG`**, the standard tracing variable.
//! 3. **Default**: `warn` globally, `info` for this crate.

use std::env;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "VCS_FIXTURES_LOG";

const DEFAULT_DIRECTIVES: &str = "warn,vcs_fixtures=info";

/// Initialize logging for the binary
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    fmt()
        .with_env_filter(create_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
}

/// Initialize logging for tests.
///
/// Output goes through the test harness's capture. Safe to call from every
/// test; only the first call installs a subscriber.
pub fn test() {
    let _ = fmt()
        .with_env_filter(create_filter())
        .with_test_writer()
        .try_init();
}

fn create_filter() -> EnvFilter {
    EnvFilter::new(directives(
        env::var(LOG_ENV).ok().as_deref(),
        env::var("RUST_LOG").ok().as_deref(),
    ))
}

/// Pick the filter directives by priority
fn directives(crate_log: Option<&str>, rust_log: Option<&str>) -> String {
    if let Some(value) = crate_log {
        // Module-specific syntax is used verbatim
        if value.contains('=') || value.contains(':') || value.contains(',') {
            return value.to_string();
        }
        return format!("warn,vcs_fixtures={value}");
    }

    if let Some(value) = rust_log {
        return value.to_string();
    }

    DEFAULT_DIRECTIVES.to_string()
}
