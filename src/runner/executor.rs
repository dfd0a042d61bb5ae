use crate::error::{VcsError, VcsResult};
use crate::runner::journal::CommandJournal;
use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default upper bound for a single external command
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of executing an external command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
}

/// Executes external programs with an explicit working directory
///
/// The runner never touches the process-wide current directory: `cwd` is set
/// on the child only, so several runners may drive different repositories
/// from different threads at once.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
    journal: Option<CommandJournal>,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            journal: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record every command this runner executes in `journal`
    pub fn with_journal(mut self, journal: CommandJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn journal(&self) -> Option<&CommandJournal> {
        self.journal.as_ref()
    }

    /// Execute `program` and return its output regardless of exit code
    ///
    /// Fails only when the program cannot be started or exceeds the timeout.
    /// A non-zero exit code is reported in [`CommandOutput`]; callers decide
    /// whether it is fatal.
    pub fn run<S: AsRef<OsStr>>(
        &self,
        program: &Path,
        args: &[S],
        cwd: &Path,
        env: &[(&str, &str)],
    ) -> VcsResult<CommandOutput> {
        let command_line = describe(program, args);
        debug!(command = %command_line, cwd = %cwd.display(), "running");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .envs(env.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VcsError::Execution(format!("Failed to start '{}': {}", command_line, e)))?;

        // Drain both pipes while waiting, a full pipe would otherwise block the child
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status: ExitStatus = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                self.record(&command_line, cwd, -1);
                return Err(VcsError::Timeout {
                    command: command_line,
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = CommandOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
            exit_code: status.code().unwrap_or(-1),
            success: status.success(),
        };

        debug!(command = %command_line, exit_code = output.exit_code, "finished");
        self.record(&command_line, cwd, output.exit_code);

        Ok(output)
    }

    /// Execute `program` and treat a non-zero exit code as an error
    pub fn run_checked<S: AsRef<OsStr>>(
        &self,
        program: &Path,
        args: &[S],
        cwd: &Path,
        env: &[(&str, &str)],
    ) -> VcsResult<CommandOutput> {
        let output = self.run(program, args, cwd, env)?;
        process_output(output, &describe(program, args))
    }

    fn record(&self, command_line: &str, cwd: &Path, exit_code: i32) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record(command_line, cwd, exit_code) {
                warn!(path = %journal.path().display(), error = %e, "failed to write command journal");
            }
        }
    }
}

/// Return an error for failed commands
fn process_output(output: CommandOutput, command_line: &str) -> VcsResult<CommandOutput> {
    if !output.success {
        return Err(VcsError::Execution(format!(
            "Command '{}' failed with exit code {}: {}",
            command_line,
            output.exit_code,
            output.stderr.trim()
        )));
    }

    Ok(output)
}

/// Render a command line for logs and error messages
pub fn describe<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
