use crate::backend::{
    Backend, BackendKind, BackendVersion, Capabilities, CommitRequest, Identity,
};
use crate::error::{VcsError, VcsResult};
use crate::runner::{CommandOutput, CommandRunner};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub const CAPABILITIES: Capabilities = Capabilities {
    empty_commits: false,
    empty_messages: false,
    separate_committer_date: false,
    branching: false,
    rebase: false,
    tracks_directories: true,
};

#[cfg(unix)]
const REVPROP_HOOK: (&str, &str) = ("pre-revprop-change", "#!/bin/sh\nexit 0\n");
#[cfg(windows)]
const REVPROP_HOOK: (&str, &str) = ("pre-revprop-change.bat", "@exit 0\r\n");

/// Subversion adapter
///
/// Subversion cannot date a commit before it happens, so `svn:date` and
/// `svn:author` are rewritten as revision properties right after each commit.
/// Revisions are sequential integers; the adapter tracks the last one it
/// created and refuses to continue if the server reports anything else.
#[derive(Debug)]
pub struct SvnBackend {
    program: PathBuf,
    admin_program: PathBuf,
    store: PathBuf,
    workdir: PathBuf,
    identity: Identity,
    runner: CommandRunner,
    revision: u64,
}

impl SvnBackend {
    pub fn new(
        program: &Path,
        admin_program: &Path,
        store: &Path,
        workdir: &Path,
        identity: Identity,
        runner: CommandRunner,
    ) -> Self {
        Self {
            program: program.to_path_buf(),
            admin_program: admin_program.to_path_buf(),
            store: store.to_path_buf(),
            workdir: workdir.to_path_buf(),
            identity,
            runner,
            revision: 0,
        }
    }

    /// Last revision committed through this adapter
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn store(&self) -> &Path {
        &self.store
    }

    /// Identity recorded as `svn:author` when a step names none
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// `file://` URL of the repository store
    pub fn url(&self) -> VcsResult<String> {
        let absolute = fs::canonicalize(&self.store)?;
        let path = absolute.to_string_lossy().replace('\\', "/");
        if path.starts_with('/') {
            Ok(format!("file://{}", path))
        } else {
            Ok(format!("file:///{}", path))
        }
    }

    fn svn(&self, subcommand: &str, args: &[&str]) -> VcsResult<CommandOutput> {
        self.svn_in(&self.workdir, subcommand, args)
    }

    fn svn_in(&self, cwd: &Path, subcommand: &str, args: &[&str]) -> VcsResult<CommandOutput> {
        let mut full_args = vec![subcommand, "--non-interactive"];
        full_args.extend_from_slice(args);
        self.runner.run_checked(&self.program, &full_args, cwd, &[])
    }

    fn set_revprop(&self, url: &str, revision: &str, name: &str, value: &str) -> VcsResult<()> {
        self.svn("propset", &[name, "--revprop", "-r", revision, value, url])
            .map(|_| ())
    }

    fn install_revprop_hook(&self) -> VcsResult<()> {
        let (name, script) = REVPROP_HOOK;
        let hook = self.store.join("hooks").join(name);
        fs::write(&hook, script)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&hook)?.permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&hook, perms)?;
        }

        Ok(())
    }
}

impl Backend for SvnBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Svn
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn init(&mut self) -> VcsResult<()> {
        let store = std::path::absolute(&self.store)?;
        let store_parent = parent_dir(&store);
        fs::create_dir_all(&store_parent)?;
        let store = store.to_string_lossy().into_owned();
        self.runner
            .run_checked(&self.admin_program, &["create", store.as_str()], &store_parent, &[])?;
        self.install_revprop_hook()?;

        let workdir = std::path::absolute(&self.workdir)?;
        let workdir_parent = parent_dir(&workdir);
        fs::create_dir_all(&workdir_parent)?;
        let url = self.url()?;
        let workdir = workdir.to_string_lossy().into_owned();
        self.svn_in(
            &workdir_parent,
            "checkout",
            &["--quiet", url.as_str(), workdir.as_str()],
        )?;
        self.revision = 0;
        Ok(())
    }

    fn track(&mut self, paths: &[&str]) -> VcsResult<()> {
        let pegged: Vec<String> = paths.iter().map(|p| peg(p)).collect();
        let mut args = vec!["--parents", "--quiet"];
        args.extend(pegged.iter().map(String::as_str));
        self.svn("add", &args).map(|_| ())
    }

    fn move_path(&mut self, from: &str, to: &str) -> VcsResult<()> {
        let (from, to) = (peg(from), peg(to));
        self.svn("move", &["--parents", "--quiet", from.as_str(), to.as_str()])
            .map(|_| ())
    }

    fn remove(&mut self, path: &str) -> VcsResult<()> {
        let path = peg(path);
        self.svn("rm", &["--quiet", path.as_str()]).map(|_| ())
    }

    fn make_dir(&mut self, path: &str) -> VcsResult<()> {
        let path = peg(path);
        self.svn("mkdir", &["--parents", "--quiet", path.as_str()])
            .map(|_| ())
    }

    fn commit(&mut self, request: &CommitRequest<'_>) -> VcsResult<()> {
        let output = self.svn("commit", &["-m", request.message])?;
        let revision = committed_revision(&output.stdout).ok_or_else(|| {
            VcsError::Execution(format!(
                "svn commit did not create a revision: {}",
                output.stdout.trim()
            ))
        })?;
        if revision != self.revision + 1 {
            return Err(VcsError::Execution(format!(
                "expected svn to create revision {}, it created {}",
                self.revision + 1,
                revision
            )));
        }
        self.revision = revision;

        let url = self.url()?;
        let revision = revision.to_string();
        let date = svn_date(request.committer_date);
        self.set_revprop(&url, &revision, "svn:date", &date)?;
        self.set_revprop(&url, &revision, "svn:author", &request.author.name)?;

        // Keep the working copy at a single revision for the next step
        self.svn("update", &["--quiet"]).map(|_| ())
    }

    fn log(&self, format: &[String]) -> VcsResult<String> {
        let url = self.url()?;
        let mut args: Vec<&str> = format.iter().map(String::as_str).collect();
        args.push(url.as_str());
        Ok(self.svn("log", &args)?.stdout)
    }

    /// Both `svn` and `svnadmin` must be recent enough; report the older one
    fn version(&self) -> VcsResult<BackendVersion> {
        let client = BackendVersion::detect(BackendKind::Svn, &self.program, &[], &self.runner)?;
        let admin =
            BackendVersion::detect(BackendKind::Svn, &self.admin_program, &[], &self.runner)?;
        Ok(client.older(admin))
    }
}

/// `2014-08-10T15:00:00.000000Z`, the form Subversion stores in `svn:date`
fn svn_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Paths containing `@` need a trailing `@` so svn does not read a peg revision
fn peg(path: &str) -> String {
    if path.contains('@') {
        format!("{}@", path)
    } else {
        path.to_string()
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Parse `Committed revision 7.` from `svn commit` output
fn committed_revision(stdout: &str) -> Option<u64> {
    const MARKER: &str = "Committed revision ";
    let start = stdout.find(MARKER)? + MARKER.len();
    let digits: String = stdout[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
