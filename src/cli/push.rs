//! `sitegen push` - upload local module schemas

use anyhow::{bail, Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

use super::CliContext;

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Project name
    project: String,
    /// Directory scanned for `<module>.dbml` files
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    secret_code: Option<String>,
}

pub async fn run(args: PushArgs, ctx: &CliContext) -> Result<()> {
    let (project, email, secret) = ctx.store.resolve_credentials(
        &ctx.config,
        &args.project,
        args.email.as_deref(),
        args.secret_code.as_deref(),
    )?;

    let client = ctx.client()?;

    // A file is only pushable when the server knows the module, since the
    // save call needs the module's template and database type keys.
    let modules = client.get_project_modules(&project).await?;
    let known: BTreeMap<String, (String, String)> = modules
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let name = row.get("moduleName")?.as_str()?;
                    let template = row.get("moduleTemplateKey")?.as_str()?;
                    let db_type = row
                        .get("dbTypeKey")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    Some((name.to_string(), (template.to_string(), db_type.to_string())))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut pushed = 0usize;
    let entries = std::fs::read_dir(&args.dir)
        .with_context(|| format!("cannot read {}", args.dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("dbml") {
            continue;
        }
        let Some(module) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let Some((template, db_type)) = known.get(module) else {
            warn!("skipping {}: project has no module '{module}'", path.display());
            continue;
        };

        let dbml = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;

        let saved = client
            .save_module_dbml(&project, &email, &secret, module, template, &dbml, db_type)
            .await?;
        if !saved {
            bail!("the server rejected the schema for module '{module}'");
        }
        println!("✓ {}", path.display());
        pushed += 1;
    }

    if pushed == 0 {
        println!("No matching .dbml files found in {}.", args.dir.display());
    } else {
        println!("Pushed {pushed} module schema(s).");
    }
    Ok(())
}
