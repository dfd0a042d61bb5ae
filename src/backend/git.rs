use crate::backend::{
    ensure_parent, Backend, BackendKind, BackendVersion, Capabilities, CommitRequest, Identity,
    MergeRequest,
};
use crate::error::VcsResult;
use crate::runner::{CommandOutput, CommandRunner};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub const CAPABILITIES: Capabilities = Capabilities {
    empty_commits: true,
    empty_messages: true,
    separate_committer_date: true,
    branching: true,
    rebase: true,
    tracks_directories: false,
};

const NULL_DEVICE: &str = if cfg!(windows) { "NUL" } else { "/dev/null" };

/// Ignore system and user configuration so hooks, templates and signing
/// settings on the host cannot leak into the fixture
const ISOLATED_ENV: [(&str, &str); 4] = [
    ("GIT_CONFIG_NOSYSTEM", "1"),
    ("GIT_CONFIG_GLOBAL", NULL_DEVICE),
    ("GIT_TERMINAL_PROMPT", "0"),
    ("GIT_EDITOR", "true"),
];

/// Git adapter
///
/// Committer date is overridden through `GIT_COMMITTER_DATE`, author date
/// through `--date`, so the two can differ (as they do after a rebase).
#[derive(Debug)]
pub struct GitBackend {
    program: PathBuf,
    workdir: PathBuf,
    identity: Identity,
    runner: CommandRunner,
}

impl GitBackend {
    pub fn new(program: &Path, workdir: &Path, identity: Identity, runner: CommandRunner) -> Self {
        Self {
            program: program.to_path_buf(),
            workdir: workdir.to_path_buf(),
            identity,
            runner,
        }
    }

    fn git(&self, args: &[&str]) -> VcsResult<CommandOutput> {
        self.git_with_env(args, &[])
    }

    fn git_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> VcsResult<CommandOutput> {
        let full_env: Vec<(&str, &str)> = ISOLATED_ENV
            .iter()
            .copied()
            .chain(env.iter().copied())
            .collect();
        self.runner
            .run_checked(&self.program, args, &self.workdir, &full_env)
    }
}

impl Backend for GitBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Git
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn init(&mut self) -> VcsResult<()> {
        fs::create_dir_all(&self.workdir)?;

        self.git(&["init", "--quiet"])?;
        // Independent of init.defaultBranch on the host
        self.git(&["symbolic-ref", "HEAD", "refs/heads/master"])?;
        self.git(&["config", "user.name", self.identity.name.as_str()])?;
        self.git(&["config", "user.email", self.identity.email_or_empty()])?;
        self.git(&["config", "commit.gpgsign", "false"])?;
        self.git(&["config", "core.autocrlf", "false"])?;
        Ok(())
    }

    fn track(&mut self, paths: &[&str]) -> VcsResult<()> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.git(&args).map(|_| ())
    }

    fn move_path(&mut self, from: &str, to: &str) -> VcsResult<()> {
        ensure_parent(&self.workdir, to)?;
        self.git(&["mv", "--", from, to]).map(|_| ())
    }

    fn remove(&mut self, path: &str) -> VcsResult<()> {
        self.git(&["rm", "--quiet", "--", path]).map(|_| ())
    }

    fn make_dir(&mut self, path: &str) -> VcsResult<()> {
        // Git does not version directories
        fs::create_dir_all(self.workdir.join(path))?;
        Ok(())
    }

    fn commit(&mut self, request: &CommitRequest<'_>) -> VcsResult<()> {
        self.git(&["add", "--all"])?;

        let author = git_identity(request.author);
        let author_date = git_date(request.author_date);
        let committer_date = git_date(request.committer_date);

        let mut args = vec!["commit", "--quiet"];
        if request.allow_empty_changeset {
            args.push("--allow-empty");
        }
        if request.allow_empty_message {
            args.push("--allow-empty-message");
        }
        args.extend([
            "--author",
            author.as_str(),
            "--date",
            author_date.as_str(),
            "-m",
            request.message,
        ]);

        self.git_with_env(&args, &[("GIT_COMMITTER_DATE", committer_date.as_str())])
            .map(|_| ())
    }

    fn create_branch(&mut self, name: &str) -> VcsResult<()> {
        self.git(&["branch", name]).map(|_| ())
    }

    fn checkout(&mut self, name: &str) -> VcsResult<()> {
        self.git(&["checkout", "--quiet", name]).map(|_| ())
    }

    fn merge(&mut self, request: &MergeRequest<'_>) -> VcsResult<()> {
        let date = git_date(request.date);
        self.git_with_env(
            &[
                "merge",
                "--no-ff",
                "--no-edit",
                "--quiet",
                "-m",
                request.message,
                request.branch,
            ],
            &[
                ("GIT_AUTHOR_NAME", request.author.name.as_str()),
                ("GIT_AUTHOR_EMAIL", request.author.email_or_empty()),
                ("GIT_AUTHOR_DATE", date.as_str()),
                ("GIT_COMMITTER_DATE", date.as_str()),
            ],
        )
        .map(|_| ())
    }

    fn rebase(&mut self, onto: &str, message: &str, date: DateTime<Utc>) -> VcsResult<()> {
        self.git(&["rebase", "--quiet", onto])?;

        // Rebase stamps the current time as committer date; pin it to the
        // scripted one while leaving the original author date alone
        let date = git_date(date);
        self.git_with_env(
            &["commit", "--amend", "--quiet", "--allow-empty", "-m", message],
            &[("GIT_COMMITTER_DATE", date.as_str())],
        )
        .map(|_| ())
    }

    fn log(&self, format: &[String]) -> VcsResult<String> {
        let mut args = vec!["-c", "core.quotepath=off", "log"];
        args.extend(format.iter().map(String::as_str));
        Ok(self.git(&args)?.stdout)
    }

    fn version(&self) -> VcsResult<BackendVersion> {
        BackendVersion::detect(BackendKind::Git, &self.program, &ISOLATED_ENV, &self.runner)
    }
}

/// RFC 2822, understood by every git version
fn git_date(date: DateTime<Utc>) -> String {
    date.to_rfc2822()
}

/// `--author` needs the `Name <email>` form even when the email is empty
fn git_identity(identity: &Identity) -> String {
    format!("{} <{}>", identity.name, identity.email_or_empty())
}
