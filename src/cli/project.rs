//! `sitegen project` - project lifecycle against the remote service

use anyhow::{bail, Result};
use clap::{Args, Subcommand};

use super::CliContext;

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Register a new project
    Create(CreateArgs),
    /// Check whether a project name is still available
    Check(CheckArgs),
    /// Email a reminder of the project secret code
    ForgotSecret(ForgotSecretArgs),
    /// Verify that a secret code is valid for a project
    VerifySecret(VerifySecretArgs),
    /// Drop a project from the local configuration
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Project name
    project: String,
    /// Contact email the secret code is sent to
    #[arg(long)]
    email: String,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Project name
    project: String,
}

#[derive(Args, Debug)]
pub struct ForgotSecretArgs {
    /// Project name
    project: String,
    /// Email the project was registered with
    #[arg(long)]
    email: Option<String>,
}

#[derive(Args, Debug)]
pub struct VerifySecretArgs {
    /// Project name
    project: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    secret_code: Option<String>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Project name
    project: String,
}

pub async fn run(command: ProjectCommand, ctx: &mut CliContext) -> Result<()> {
    match command {
        ProjectCommand::Create(args) => create(args, ctx).await,
        ProjectCommand::Check(args) => check(args, ctx).await,
        ProjectCommand::ForgotSecret(args) => forgot_secret(args, ctx).await,
        ProjectCommand::VerifySecret(args) => verify_secret(args, ctx).await,
        ProjectCommand::Remove(args) => remove(args, ctx),
    }
}

async fn create(args: CreateArgs, ctx: &mut CliContext) -> Result<()> {
    let client = ctx.client()?;

    if !client.check_project_name(&args.project).await? {
        bail!("project name '{}' is already taken", args.project);
    }
    if !client.create_project(&args.project, &args.email).await? {
        bail!("the server rejected the project creation request");
    }

    // Remember the email so later commands only need the secret code.
    ctx.config
        .projects
        .entry(args.project.clone())
        .or_default()
        .email = Some(args.email.clone());
    ctx.store.save(&ctx.config)?;

    println!("✓ Project '{}' created.", args.project);
    println!("  A secret code has been sent to {}.", args.email);
    println!(
        "  Store it with: sitegen config --project {} --set secret_code=<code>",
        args.project
    );
    Ok(())
}

async fn check(args: CheckArgs, ctx: &CliContext) -> Result<()> {
    let client = ctx.client()?;
    if client.check_project_name(&args.project).await? {
        println!("✓ Project name '{}' is available.", args.project);
    } else {
        println!("⚠ Project name '{}' is already taken.", args.project);
    }
    Ok(())
}

async fn forgot_secret(args: ForgotSecretArgs, ctx: &CliContext) -> Result<()> {
    let email = args
        .email
        .or_else(|| {
            ctx.config
                .projects
                .get(&args.project)
                .and_then(|p| p.email.clone())
        })
        .ok_or_else(|| anyhow::anyhow!("project email is required; pass --email"))?;

    let client = ctx.client()?;
    if !client.forgot_secret_code(&args.project, &email).await? {
        bail!("the server could not send a reminder for '{}'", args.project);
    }
    println!("✓ Secret code reminder sent to {email}.");
    Ok(())
}

async fn verify_secret(args: VerifySecretArgs, ctx: &CliContext) -> Result<()> {
    let (project, email, secret) = ctx.store.resolve_credentials(
        &ctx.config,
        &args.project,
        args.email.as_deref(),
        args.secret_code.as_deref(),
    )?;

    let client = ctx.client()?;
    if client.check_secret_code(&project, &email, &secret).await? {
        println!("✓ Secret code is valid for '{project}'.");
    } else {
        bail!("secret code is not valid for '{project}'");
    }
    Ok(())
}

fn remove(args: RemoveArgs, ctx: &mut CliContext) -> Result<()> {
    if ctx.config.projects.remove(&args.project).is_none() {
        println!("⚠ Project '{}' was not configured locally.", args.project);
        return Ok(());
    }
    ctx.store.save(&ctx.config)?;
    println!("✓ Project '{}' removed from local configuration.", args.project);
    Ok(())
}
