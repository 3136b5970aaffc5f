//! `sitegen config` - inspect and edit local settings

use anyhow::{bail, Result};
use clap::Args;

use crate::config::secret;

use super::CliContext;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Project whose settings to read or change
    #[arg(long)]
    project: Option<String>,

    /// Set a key=value pair (keys: api_url, email, secret_code)
    #[arg(long, value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Print the stored configuration with secrets hidden
    #[arg(long)]
    list: bool,

    /// Check stored projects for missing credentials
    #[arg(long)]
    validate: bool,
}

pub async fn run(args: ConfigArgs, ctx: &mut CliContext) -> Result<()> {
    if !args.set.is_empty() {
        apply_sets(&args, ctx)?;
        ctx.store.save(&ctx.config)?;
        println!("✓ Configuration saved.");
    }

    if args.validate {
        validate(ctx);
    }

    if args.list || (args.set.is_empty() && !args.validate) {
        list(ctx);
    }

    Ok(())
}

fn apply_sets(args: &ConfigArgs, ctx: &mut CliContext) -> Result<()> {
    for pair in &args.set {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid --set '{pair}': expected KEY=VALUE");
        };
        let value = value.trim();
        if value.is_empty() {
            bail!("invalid --set '{pair}': value is empty");
        }

        match key.trim() {
            "api_url" => ctx.config.api_url = value.to_string(),
            "email" => {
                let project = require_project(args)?;
                ctx.config.projects.entry(project).or_default().email = Some(value.to_string());
            }
            "secret_code" => {
                let project = require_project(args)?;
                let masked = ctx.store.mask_secret(value)?;
                ctx.config.projects.entry(project).or_default().secret_code = Some(masked);
            }
            other => bail!("unknown config key '{other}' (expected api_url, email or secret_code)"),
        }
    }
    Ok(())
}

fn require_project(args: &ConfigArgs) -> Result<String> {
    match &args.project {
        Some(p) if !p.trim().is_empty() => Ok(p.clone()),
        _ => bail!("this key is per-project; pass --project <name>"),
    }
}

fn list(ctx: &CliContext) {
    println!("api_url = {}", ctx.config.api_url);
    if ctx.config.projects.is_empty() {
        println!("(no projects configured)");
        return;
    }
    for (name, project) in &ctx.config.projects {
        println!();
        println!("[{name}]");
        println!("  email       = {}", project.email.as_deref().unwrap_or("-"));
        let secret = match &project.secret_code {
            Some(code) if secret::is_masked(code) => "(set)",
            Some(_) => "(set, plaintext)",
            None => "-",
        };
        println!("  secret_code = {secret}");
    }
}

fn validate(ctx: &CliContext) {
    if ctx.config.projects.is_empty() {
        println!("No projects configured.");
        return;
    }
    let mut ok = true;
    for (name, project) in &ctx.config.projects {
        let mut missing = Vec::new();
        if project.email.is_none() {
            missing.push("email");
        }
        if project.secret_code.is_none() {
            missing.push("secret_code");
        }
        if missing.is_empty() {
            println!("✓ {name}");
        } else {
            ok = false;
            println!("⚠ {name}: missing {}", missing.join(", "));
        }
    }
    if ok {
        println!("All projects have complete credentials.");
    }
}
