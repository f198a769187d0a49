use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gitstep::prelude::*;
use gitstep::hosting::ConnectorError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gitstep")]
#[command(about = "Resumable and undoable git workflows", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Run as if started in this directory
    #[arg(short = 'C', long, global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Path to the config file (default: <repo root>/.gitstep.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print every git command and its output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new feature branch off the main branch
    Hack {
        #[arg(value_name = "BRANCH")]
        branch: String,
    },

    /// Update the current branch (or all branches) with the main branch
    Sync {
        /// Sync all local branches
        #[arg(short, long)]
        all: bool,
    },

    /// Squash-merge a feature branch into the main branch
    Ship {
        /// Branch to ship (default: the current branch)
        #[arg(value_name = "BRANCH")]
        branch: Option<String>,

        /// Commit message of the squash commit
        #[arg(short, long)]
        message: Option<String>,

        /// Author of the squash commit
        #[arg(long)]
        author: Option<String>,
    },

    /// Resume the paused command after resolving conflicts
    Continue,

    /// Skip the branch the paused command stopped on
    Skip,

    /// Abort the paused command and roll back its changes
    Abort,

    /// Revert the last finished command
    Undo,

    /// Show the persisted run state
    Status,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "gitstep=debug" } else { "gitstep=warn" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "gitstep failed");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let verbose = cli.verbose;
    let mut runner = BackendRunner::new().with_verbose(verbose);
    if let Some(dir) = &cli.directory {
        runner = runner.in_dir(dir);
    }

    let locator = GitBackend::new(runner.clone(), "origin");
    let root = locator.root_directory().await?;
    let config = match &cli.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load_for_repository(&root)?,
    };

    let backend = GitBackend::new(runner.clone(), config.remote.clone());
    let store = RunStateStore::for_repository(&root, config.state_dir.as_deref());
    let connector = build_connector(&config)?;
    let session = Session::new(&backend, &store, &config)
        .with_connector(connector.as_ref().map(|c| c as &dyn Connector));

    let outcome = match cli.command {
        Commands::Hack { branch } => commands::hack(&session, &branch).await?,
        Commands::Sync { all } => commands::sync(&session, all).await?,
        Commands::Ship {
            branch,
            message,
            author,
        } => {
            let options = ShipOptions {
                branch,
                message,
                author,
            };
            commands::ship(&session, &options).await?
        }
        Commands::Continue => commands::continue_run(&session).await?,
        Commands::Skip => commands::skip_run(&session).await?,
        Commands::Abort => commands::abort_run(&session).await?,
        Commands::Undo => commands::undo_run(&session).await?,
        Commands::Status => {
            match commands::status(&session)? {
                Some(report) => println!("{}", report),
                None => println!("No run state for this repository."),
            }
            return Ok(true);
        }
    };

    let success = report_outcome(&outcome, verbose);
    if verbose {
        println!("Ran {} shell commands.", runner.statistics().run_count());
    }
    Ok(success)
}

fn build_connector(config: &Config) -> Result<Option<GitHubConnector>, ConnectorError> {
    config
        .hosting
        .as_ref()
        .map(GitHubConnector::from_config)
        .transpose()
}

fn report_outcome(outcome: &RunOutcome, verbose: bool) -> bool {
    match outcome {
        RunOutcome::Finished(_) => true,
        RunOutcome::Paused { state, error } => {
            if verbose {
                eprintln!("{}", error);
            }
            eprintln!();
            eprintln!("To abort, run \"gitstep abort\".");
            eprintln!("To continue after having resolved conflicts, run \"gitstep continue\".");
            if state.can_skip() {
                eprintln!(
                    "To continue by skipping the current branch, run \"gitstep skip\"."
                );
            }
            false
        }
        RunOutcome::AutomaticallyAborted { message, error } => {
            if verbose {
                eprintln!("{}", error);
            }
            eprintln!("Error: {}", message);
            false
        }
    }
}
