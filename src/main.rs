//! Sitegen CLI entry point

mod api;
mod cli;
mod config;
mod watch;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sitegen",
    version,
    about = "Command-line client for the Sitegen code-generation service"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// API base URL, overriding the configured value
    #[arg(long, global = true, env = "SITEGEN_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect and edit local settings
    Config(cli::config_cmd::ConfigArgs),
    /// Project lifecycle operations
    Project {
        #[command(subcommand)]
        command: cli::project::ProjectCommand,
    },
    /// Manage a project's modules
    Module {
        #[command(subcommand)]
        command: cli::module::ModuleCommand,
    },
    /// Download module schemas to local files
    Pull(cli::pull::PullArgs),
    /// Upload local module schemas
    Push(cli::push::PushArgs),
    /// Start a generation run and watch its progress
    Generate(cli::generate::GenerateArgs),
    /// One-shot status of a generation session
    Status(cli::status::StatusArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<()> {
    let mut ctx = cli::CliContext::load(args.api_url.as_deref())?;

    match args.command {
        Command::Config(cmd) => cli::config_cmd::run(cmd, &mut ctx).await,
        Command::Project { command } => cli::project::run(command, &mut ctx).await,
        Command::Module { command } => cli::module::run(command, &ctx).await,
        Command::Pull(cmd) => cli::pull::run(cmd, &ctx).await,
        Command::Push(cmd) => cli::push::run(cmd, &ctx).await,
        Command::Generate(cmd) => cli::generate::run(cmd, &ctx).await,
        Command::Status(cmd) => cli::status::run(cmd, &ctx).await,
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sitegen=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sitegen=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
