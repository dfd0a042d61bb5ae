use crate::backend::BackendKind;
use crate::error::{VcsError, VcsResult};
use crate::runner::CommandRunner;
use std::path::Path;

/// Represents the version of a backend executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub kind: BackendKind,
}

impl BackendVersion {
    /// Minimum (major, minor) the log formats and flags rely on
    pub fn minimum(kind: BackendKind) -> (u32, u32) {
        match kind {
            BackendKind::Git => (2, 20),
            BackendKind::Hg => (4, 0),
            BackendKind::Svn => (1, 7),
        }
    }

    /// Parse the output of `<program> --version`
    ///
    /// Expected formats:
    /// - `git version 2.39.2` (also `2.39.2.windows.1`)
    /// - `Mercurial Distributed SCM (version 6.1.1)`
    /// - `svn, version 1.14.2 (r1899510)` or `1.14.2` with `--quiet`
    pub fn parse(kind: BackendKind, version_str: &str) -> VcsResult<Self> {
        let first_line = version_str.lines().next().unwrap_or("").trim();

        let token = match kind {
            BackendKind::Git => {
                let parts: Vec<&str> = first_line.split_whitespace().collect();
                if parts.len() < 3 || parts[0] != "git" || parts[1] != "version" {
                    None
                } else {
                    Some(parts[2])
                }
            }
            BackendKind::Hg => first_line
                .find("(version ")
                .map(|start| &first_line[start + "(version ".len()..])
                .map(|rest| rest.trim_end_matches(')').trim()),
            BackendKind::Svn => match first_line.strip_prefix("svn, version ") {
                Some(rest) => rest.split_whitespace().next(),
                None => first_line
                    .split_whitespace()
                    .next()
                    .filter(|t| t.starts_with(|c: char| c.is_ascii_digit())),
            },
        };

        let token = token.ok_or_else(|| {
            VcsError::Parse(format!("Unexpected {} version format: {}", kind, first_line))
        })?;

        let nums: Vec<&str> = token.split('.').collect();
        if nums.len() < 2 {
            return Err(VcsError::Parse(format!(
                "Invalid version number format: {}",
                token
            )));
        }

        let major = nums[0]
            .parse::<u32>()
            .map_err(|_| VcsError::Parse(format!("Invalid major version: {}", nums[0])))?;

        let minor = leading_number(nums[1])
            .ok_or_else(|| VcsError::Parse(format!("Invalid minor version: {}", nums[1])))?;

        // Allow patch version to have non-numeric suffixes (6.1.1+hg, 2.39.2.windows)
        let patch = nums.get(2).and_then(|p| leading_number(p)).unwrap_or(0);

        Ok(BackendVersion {
            major,
            minor,
            patch,
            kind,
        })
    }

    /// Run `<program> --version` and parse the answer
    pub fn detect(
        kind: BackendKind,
        program: &Path,
        env: &[(&str, &str)],
        runner: &CommandRunner,
    ) -> VcsResult<Self> {
        let args: &[&str] = match kind {
            BackendKind::Svn => &["--version", "--quiet"],
            _ => &["--version"],
        };
        // The working directory may not exist yet
        let output = runner.run_checked(program, args, Path::new("."), env)?;
        Self::parse(kind, &output.stdout)
    }

    /// The older of two versions of the same backend's tools
    pub fn older(self, other: Self) -> Self {
        if (other.major, other.minor, other.patch) < (self.major, self.minor, self.patch) {
            other
        } else {
            self
        }
    }

    /// Check if this version meets minimum requirements
    pub fn is_supported(&self) -> bool {
        let (major, minor) = Self::minimum(self.kind);
        self.major > major || (self.major == major && self.minor >= minor)
    }

    /// Fail unless the version is sufficient
    pub fn validate(self) -> VcsResult<Self> {
        if !self.is_supported() {
            let (major, minor) = Self::minimum(self.kind);
            return Err(VcsError::Execution(format!(
                "{} {} is too old. Minimum required: {}.{}",
                self.kind, self, major, minor
            )));
        }

        Ok(self)
    }
}

fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

impl std::fmt::Display for BackendVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
