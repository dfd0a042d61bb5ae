use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use vcs_fixtures::config::ConfigArtifact;
use vcs_fixtures::pipeline::{self, RegenerateOptions, Regenerated};
use vcs_fixtures::runner::CommandRunner;
use vcs_fixtures::{history, logging, AppResult, BackendKind, ConfigError, RepositoryHandle};

#[derive(Debug, Parser)]
#[command(name = "vcs-fixtures", version, about = "Build reference repositories and record their history")]
struct Cli {
    /// Per-command timeout in seconds, overriding the config file
    #[arg(long, global = true, env = "VCS_FIXTURES_TIMEOUT")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build one fixture repository and store its revisions in the config
    Build {
        #[arg(long, value_enum)]
        backend: BackendKind,
        #[arg(long)]
        config: PathBuf,
        /// TOML fixture script to run instead of the reference history
        #[arg(long)]
        script: Option<PathBuf>,
        /// Remove an existing fixture first
        #[arg(long)]
        clean: bool,
        /// Leave the config's revisions untouched
        #[arg(long)]
        no_sync: bool,
    },
    /// Build several fixtures concurrently
    BuildAll {
        #[arg(long)]
        git: Option<PathBuf>,
        #[arg(long)]
        hg: Option<PathBuf>,
        #[arg(long)]
        svn: Option<PathBuf>,
        #[arg(long)]
        clean: bool,
    },
    /// Print the history of an existing fixture as JSON
    Log {
        #[arg(long, value_enum)]
        backend: BackendKind,
        #[arg(long)]
        config: PathBuf,
    },
    /// Show the detected backend version
    Version {
        #[arg(long, value_enum)]
        backend: BackendKind,
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init() {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<ExitCode> {
    let timeout = cli.timeout.map(Duration::from_secs);

    match cli.command {
        Command::Build {
            backend,
            config,
            script,
            clean,
            no_sync,
        } => {
            let options = RegenerateOptions {
                script,
                clean,
                sync: !no_sync,
                timeout,
                ..RegenerateOptions::default()
            };
            let regenerated = tokio::task::spawn_blocking(move || {
                pipeline::regenerate(backend, &config, &options)
            })
            .await
            .map_err(|e| vcs_fixtures::AppError::Join {
                backend,
                reason: e.to_string(),
            })??;
            print_summary(&regenerated);
            Ok(ExitCode::SUCCESS)
        }
        Command::BuildAll {
            git,
            hg,
            svn,
            clean,
        } => {
            let jobs: Vec<(BackendKind, PathBuf)> = [
                (BackendKind::Git, git),
                (BackendKind::Hg, hg),
                (BackendKind::Svn, svn),
            ]
            .into_iter()
            .filter_map(|(kind, config)| config.map(|path| (kind, path)))
            .collect();

            if jobs.is_empty() {
                eprintln!("Nothing to build: pass at least one of --git, --hg, --svn");
                return Ok(ExitCode::FAILURE);
            }

            let options = RegenerateOptions {
                clean,
                timeout,
                ..RegenerateOptions::default()
            };

            let mut failed = false;
            for (kind, result) in pipeline::regenerate_all(jobs, options).await {
                match result {
                    Ok(regenerated) => print_summary(&regenerated),
                    Err(e) => {
                        failed = true;
                        eprintln!("{}: {}", kind, e);
                    }
                }
            }
            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Log { backend, config } => {
            let artifact = ConfigArtifact::load(&config)?;
            let settings = artifact.settings(backend)?;
            let runner = runner_for(&artifact, timeout);
            let handle =
                RepositoryHandle::open(backend, &settings, artifact.reference_project()?, runner)?;
            let records = history::extract(&handle)?;
            let json = serde_json::to_string_pretty(&records).map_err(ConfigError::from)?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
        Command::Version { backend, config } => {
            let artifact = ConfigArtifact::load(&config)?;
            let settings = artifact.settings(backend)?;
            let runner = runner_for(&artifact, timeout);
            let identity = artifact.identity(backend)?;
            let version = vcs_fixtures::backend::open(
                backend,
                &settings,
                artifact.reference_project()?,
                &identity,
                runner,
            )?
            .version()?;
            let status = if version.is_supported() {
                "supported"
            } else {
                "too old"
            };
            println!("{} {} ({})", backend, version, status);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn runner_for(artifact: &ConfigArtifact, timeout: Option<Duration>) -> CommandRunner {
    CommandRunner::new().with_timeout(timeout.unwrap_or(artifact.timeout()))
}

fn print_summary(regenerated: &Regenerated) {
    println!(
        "{} fixture at {} ({} {}): {} revisions",
        regenerated.kind,
        regenerated.workdir.display(),
        regenerated.kind.as_str(),
        regenerated.version,
        regenerated.records.len()
    );
    for skipped in &regenerated.skipped {
        println!("  skipped step {}: {} ({})", skipped.index + 1, skipped.step, skipped.reason);
    }
    for id in regenerated.revisions() {
        println!("  {}", id);
    }
}
