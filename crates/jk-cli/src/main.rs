//! The jk binary: work seamlessly with Jenkins from the command line.
//!
//! Command structure mirrors the GitHub CLI: nouns (`run`, `job`, `log`,
//! `queue`, ...) with verb subcommands. Global flags select the Jenkins
//! context and the output format. Logging goes to stderr via `tracing`,
//! controlled by the `JK_LOG` environment variable (default `warn`).

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod output;
mod terminal;

use app::App;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "jk",
    version = jk_core::build_info::VERSION,
    about = "Work seamlessly with Jenkins from the command line.",
    long_about = "Work seamlessly with Jenkins from the command line.\n\n\
        Quick start:\n  \
        jk search --job-glob \"*ada*\" --limit 5    # discover jobs across folders\n  \
        jk run start <jobPath> --follow           # trigger and watch a build"
)]
struct Cli {
    /// Active Jenkins context name
    #[arg(short = 'c', long, global = true, env = "JK_CONTEXT")]
    context: Option<String>,

    /// Output in JSON format when supported
    #[arg(long, global = true)]
    json: bool,

    /// Output in YAML format when supported
    #[arg(long, global = true, conflicts_with = "json")]
    yaml: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Authenticate with Jenkins instances
    #[command(subcommand)]
    Auth(commands::auth::AuthCmd),
    /// Manage Jenkins contexts
    #[command(subcommand)]
    Context(commands::context::ContextCmd),
    /// Manage Jenkins jobs and pipelines
    #[command(subcommand)]
    Job(commands::job::JobCmd),
    /// Interact with job runs
    #[command(subcommand)]
    Run(commands::run::RunCmd),
    /// Search Jenkins jobs and runs across folders
    Search(commands::run::SearchArgs),
    /// Show Jenkins run logs
    Log(commands::log::LogArgs),
    /// Work with run artifacts
    #[command(subcommand)]
    Artifact(commands::artifact::ArtifactCmd),
    /// Inspect the build queue
    #[command(subcommand)]
    Queue(commands::queue::QueueCmd),
    /// Inspect test results
    #[command(subcommand)]
    Test(commands::test::TestCmd),
    /// Manage Jenkins credentials
    #[command(subcommand)]
    Cred(commands::cred::CredCmd),
    /// Inspect and manage Jenkins nodes
    #[command(subcommand)]
    Node(commands::node::NodeCmd),
    /// Inspect and manage Jenkins plugins
    #[command(subcommand)]
    Plugin(commands::plugin::PluginCmd),
    /// Print version information
    Version,
}

/// Sentinel error: the message was already rendered; exit with the code
/// and print nothing further.
#[derive(Debug)]
pub struct SilentExit(pub i32);

impl std::fmt::Display for SilentExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exit with code {}", self.0)
    }
}

impl std::error::Error for SilentExit {}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("JK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let code = match dispatch(cli, cancel).await {
        Ok(code) => code,
        Err(err) => report_error(&err),
    };
    ExitCode::from(code.clamp(0, 255) as u8)
}

fn report_error(err: &anyhow::Error) -> i32 {
    if let Some(silent) = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<SilentExit>())
    {
        return silent.0;
    }

    eprintln!("Error: {err:#}");
    err.chain()
        .find_map(|cause| cause.downcast_ref::<jk_core::Error>())
        .map(jk_core::Error::exit_code)
        .unwrap_or(1)
}

async fn dispatch(cli: Cli, cancel: CancellationToken) -> anyhow::Result<i32> {
    let format = OutputFormat::from_flags(cli.json, cli.yaml);
    let app = App::load(cli.context.clone(), format)?;

    match cli.command {
        Command::Auth(cmd) => commands::auth::run(app, cmd).await,
        Command::Context(cmd) => commands::context::run(app, cmd),
        Command::Job(cmd) => commands::job::run(app, cmd).await,
        Command::Run(cmd) => commands::run::run(app, cmd, cancel).await,
        Command::Search(args) => commands::run::run_search(app, args, cancel).await,
        Command::Log(args) => commands::log::run(app, args, cancel).await,
        Command::Artifact(cmd) => commands::artifact::run(app, cmd, cancel).await,
        Command::Queue(cmd) => commands::queue::run(app, cmd).await,
        Command::Test(cmd) => commands::test::run(app, cmd).await,
        Command::Cred(cmd) => commands::cred::run(app, cmd).await,
        Command::Node(cmd) => commands::node::run(app, cmd).await,
        Command::Plugin(cmd) => commands::plugin::run(app, cmd).await,
        Command::Version => commands::version::run(app),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_parse() {
        let cli = Cli::parse_from(["jk", "--json", "-c", "prod", "version"]);
        assert!(cli.json);
        assert_eq!(cli.context.as_deref(), Some("prod"));
    }

    #[test]
    fn test_json_and_yaml_conflict() {
        let err = Cli::try_parse_from(["jk", "--json", "--yaml", "version"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_run_start_parses_params() {
        let cli = Cli::parse_from([
            "jk", "run", "start", "team/app", "-p", "CHART=nova", "--follow",
        ]);
        match cli.command {
            Command::Run(commands::run::RunCmd::Start(args)) => {
                assert_eq!(args.job_path, "team/app");
                assert_eq!(args.param, vec!["CHART=nova"]);
                assert!(args.follow);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
