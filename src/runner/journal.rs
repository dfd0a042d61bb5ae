use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only record of the external commands a fixture build ran
///
/// A failed build leaves its directory in place; the journal next to it shows
/// exactly which command was last executed and with what exit code.
#[derive(Debug, Clone)]
pub struct CommandJournal {
    log_path: PathBuf,
}

impl CommandJournal {
    /// Start a fresh journal at `path`, truncating any previous one
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        // Ensure directory exists
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        File::create(&log_path)?;

        Ok(Self { log_path })
    }

    /// Start a fresh journal beside `target`: `<target>.commands.log`
    pub fn beside(target: &Path) -> io::Result<Self> {
        Self::create(Self::path_beside(target))
    }

    pub fn path_beside(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "fixture".into());
        name.push(".commands.log");
        target.with_file_name(name)
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Log a command execution
    pub fn record(&self, command: &str, cwd: &Path, exit_code: i32) -> io::Result<()> {
        self.append(&format!(
            "[{}] [{}] [exit:{}] {}\n",
            Utc::now().to_rfc3339(),
            cwd.display(),
            exit_code,
            command
        ))
    }

    /// Log a free-form marker, e.g. the fixture step about to run
    pub fn note(&self, message: &str) -> io::Result<()> {
        self.append(&format!("[{}] # {}\n", Utc::now().to_rfc3339(), message))
    }

    fn append(&self, entry: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(entry.as_bytes())?;
        file.flush()
    }
}
