//! `sitegen module` - manage a project's generated modules

use anyhow::{bail, Result};
use clap::{Args, Subcommand};

use super::{render_module_table, render_template_table, CliContext};

#[derive(Subcommand, Debug)]
pub enum ModuleCommand {
    /// List the modules configured for a project
    List(ListArgs),
    /// List the module templates the service offers
    Available,
    /// Add a module to a project
    Add(AddArgs),
    /// Remove a module from a project
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Project name
    project: String,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Project name
    project: String,
    /// Module name
    module: String,
    /// Template key, see `sitegen module available`
    #[arg(long)]
    template: String,
    /// Database type key
    #[arg(long, default_value = "mssql")]
    db_type: String,
    /// Architectural pattern key
    #[arg(long, default_value = "layered")]
    pattern: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    secret_code: Option<String>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Project name
    project: String,
    /// Module name
    module: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    secret_code: Option<String>,
}

pub async fn run(command: ModuleCommand, ctx: &CliContext) -> Result<()> {
    match command {
        ModuleCommand::List(args) => list(args, ctx).await,
        ModuleCommand::Available => available(ctx).await,
        ModuleCommand::Add(args) => add(args, ctx).await,
        ModuleCommand::Remove(args) => remove(args, ctx).await,
    }
}

async fn list(args: ListArgs, ctx: &CliContext) -> Result<()> {
    let client = ctx.client()?;
    let modules = client.get_project_modules(&args.project).await?;
    render_module_table(&modules);
    Ok(())
}

async fn available(ctx: &CliContext) -> Result<()> {
    let client = ctx.client()?;
    let templates = client.get_available_modules().await?;
    render_template_table(&templates);
    Ok(())
}

async fn add(args: AddArgs, ctx: &CliContext) -> Result<()> {
    let (project, email, secret) = ctx.store.resolve_credentials(
        &ctx.config,
        &args.project,
        args.email.as_deref(),
        args.secret_code.as_deref(),
    )?;

    let client = ctx.client()?;
    let added = client
        .add_project_module(
            &project,
            &email,
            &secret,
            &args.module,
            &args.template,
            &args.db_type,
            &args.pattern,
        )
        .await?;
    if !added {
        bail!("the server rejected module '{}'", args.module);
    }
    println!("✓ Module '{}' added to '{}'.", args.module, project);
    Ok(())
}

async fn remove(args: RemoveArgs, ctx: &CliContext) -> Result<()> {
    let (project, email, secret) = ctx.store.resolve_credentials(
        &ctx.config,
        &args.project,
        args.email.as_deref(),
        args.secret_code.as_deref(),
    )?;

    let client = ctx.client()?;
    let removed = client
        .remove_project_module(&project, &email, &secret, &args.module)
        .await?;
    if !removed {
        bail!("the server refused to remove module '{}'", args.module);
    }
    println!("✓ Module '{}' removed from '{}'.", args.module, project);
    Ok(())
}
