//! `sitegen pull` - download module schemas to local files

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::CliContext;

#[derive(Args, Debug)]
pub struct PullArgs {
    /// Project name
    project: String,
    /// Directory the `<module>.dbml` files are written to
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

pub async fn run(args: PullArgs, ctx: &CliContext) -> Result<()> {
    let client = ctx.client()?;
    let modules = client.get_project_modules(&args.project).await?;

    let Some(rows) = modules.as_array().filter(|rows| !rows.is_empty()) else {
        println!("Project '{}' has no modules to pull.", args.project);
        return Ok(());
    };

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("cannot create {}", args.out.display()))?;

    let mut pulled = 0usize;
    for row in rows {
        let Some(module) = row.get("moduleName").and_then(|v| v.as_str()) else {
            continue;
        };
        let template = row
            .get("moduleTemplateKey")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let dbml = client
            .get_module_dbml(&args.project, module, template)
            .await?;

        let path = args.out.join(format!("{module}.dbml"));
        std::fs::write(&path, dbml).with_context(|| format!("cannot write {}", path.display()))?;
        println!("✓ {}", path.display());
        pulled += 1;
    }

    println!("Pulled {pulled} module schema(s).");
    Ok(())
}
