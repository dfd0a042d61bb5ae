use crate::backend::{
    ensure_parent, Backend, BackendKind, BackendVersion, Capabilities, CommitRequest, Identity,
};
use crate::error::VcsResult;
use crate::runner::{CommandOutput, CommandRunner};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CAPABILITIES: Capabilities = Capabilities {
    empty_commits: false,
    empty_messages: false,
    separate_committer_date: false,
    branching: false,
    rebase: false,
    tracks_directories: false,
};

/// Plain, UTF-8 output with no user hgrc
const ISOLATED_ENV: [(&str, &str); 3] = [("HGPLAIN", "1"), ("HGRCPATH", ""), ("HGENCODING", "utf-8")];

/// Mercurial adapter
///
/// Mercurial records a single date per changeset, set with `commit -d`.
#[derive(Debug)]
pub struct HgBackend {
    program: PathBuf,
    workdir: PathBuf,
    identity: Identity,
    runner: CommandRunner,
}

impl HgBackend {
    pub fn new(program: &Path, workdir: &Path, identity: Identity, runner: CommandRunner) -> Self {
        Self {
            program: program.to_path_buf(),
            workdir: workdir.to_path_buf(),
            identity,
            runner,
        }
    }

    fn hg(&self, args: &[&str]) -> VcsResult<CommandOutput> {
        let user = self.identity.to_string();
        let env: Vec<(&str, &str)> = ISOLATED_ENV
            .iter()
            .copied()
            .chain([("HGUSER", user.as_str())])
            .collect();
        self.runner.run_checked(&self.program, args, &self.workdir, &env)
    }
}

impl Backend for HgBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Hg
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn init(&mut self) -> VcsResult<()> {
        fs::create_dir_all(&self.workdir)?;
        self.hg(&["init"]).map(|_| ())
    }

    fn track(&mut self, paths: &[&str]) -> VcsResult<()> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.hg(&args).map(|_| ())
    }

    fn move_path(&mut self, from: &str, to: &str) -> VcsResult<()> {
        ensure_parent(&self.workdir, to)?;
        self.hg(&["mv", "--", from, to]).map(|_| ())
    }

    fn remove(&mut self, path: &str) -> VcsResult<()> {
        self.hg(&["rm", "--", path]).map(|_| ())
    }

    fn make_dir(&mut self, path: &str) -> VcsResult<()> {
        fs::create_dir_all(self.workdir.join(path))?;
        Ok(())
    }

    fn commit(&mut self, request: &CommitRequest<'_>) -> VcsResult<()> {
        if request.author_date != request.committer_date {
            debug!(
                author_date = %request.author_date,
                committer_date = %request.committer_date,
                "Mercurial keeps one date per changeset, using the committer date"
            );
        }

        let date = hg_date(request.committer_date);
        let user = request.author.to_string();
        self.hg(&[
            "commit",
            "-d",
            date.as_str(),
            "-u",
            user.as_str(),
            "-m",
            request.message,
        ])
        .map(|_| ())
    }

    fn log(&self, format: &[String]) -> VcsResult<String> {
        let mut args = vec!["log"];
        args.extend(format.iter().map(String::as_str));
        Ok(self.hg(&args)?.stdout)
    }

    fn version(&self) -> VcsResult<BackendVersion> {
        BackendVersion::detect(BackendKind::Hg, &self.program, &ISOLATED_ENV, &self.runner)
    }
}

/// Mercurial's internal `<unixtime> <offset>` date form
fn hg_date(date: DateTime<Utc>) -> String {
    format!("{} 0", date.timestamp())
}
