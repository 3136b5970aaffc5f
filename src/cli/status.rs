//! `sitegen status` - one-shot look at a generation session

use anyhow::Result;
use clap::Args;

use crate::api::models::{Field, StartDate};

use super::CliContext;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Watch session id printed by `sitegen generate`
    #[arg(long)]
    session: String,
}

pub async fn run(args: StatusArgs, ctx: &CliContext) -> Result<()> {
    let client = ctx.client()?;
    let Some(status) = client.get_active_run(&args.session).await? else {
        println!("No active run found for session {}.", args.session);
        return Ok(());
    };

    if status.is_invalid_session() {
        println!("❌ Session {} is not valid on the server.", args.session);
        return Ok(());
    }

    println!("Project:  {}", status.project_name.as_deref().unwrap_or("-"));
    println!("Run id:   {}", status.active_run_id);
    println!(
        "State:    {}",
        if status.is_finished {
            "✅ finished"
        } else {
            "🔄 running"
        }
    );
    match &status.start_date {
        Field::Value(StartDate::Parsed(at)) => println!("Started:  {}", at.to_rfc3339()),
        Field::Value(StartDate::Raw) => println!("Started:  (unrecognized timestamp)"),
        Field::Missing | Field::Null => {}
    }
    Ok(())
}
