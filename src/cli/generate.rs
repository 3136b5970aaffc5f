//! `sitegen generate` - start a generation run and watch it

use anyhow::{bail, Result};
use clap::Args;

use crate::watch::push::HubConnector;
use crate::watch::{GenerationWatcher, WatchOutcome};

use super::{generate_session_id, CliContext};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Project name
    project: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    secret_code: Option<String>,
    /// Reuse an existing watch session id instead of generating one
    #[arg(long)]
    session: Option<String>,
    /// Start the run without watching its progress
    #[arg(long)]
    no_watch: bool,
}

pub async fn run(args: GenerateArgs, ctx: &CliContext) -> Result<()> {
    let (project, email, secret) = ctx.store.resolve_credentials(
        &ctx.config,
        &args.project,
        args.email.as_deref(),
        args.secret_code.as_deref(),
    )?;

    let session = args.session.unwrap_or_else(generate_session_id);
    let client = ctx.client()?;

    let started = client
        .generate_project_solution(&project, &email, &secret, &session)
        .await?;
    if !started {
        bail!("the server refused to start generation for '{project}'");
    }

    println!("✅ Generation started for '{project}'.");
    println!("   Session: {session}");

    if args.no_watch {
        println!("   Check on it with: sitegen status --session {session}");
        return Ok(());
    }

    let connector = HubConnector::new(client.base_url(), &session)?;
    let watcher = GenerationWatcher::new(&client, &session);
    match watcher.run(&connector).await {
        WatchOutcome::Completed => {
            println!("Watcher stopped.");
            Ok(())
        }
        WatchOutcome::Cancelled => {
            println!("Watcher cancelled.");
            Ok(())
        }
        WatchOutcome::Failed => bail!("generation session is no longer valid"),
    }
}
