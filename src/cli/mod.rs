//! CLI subcommand implementations

pub mod config_cmd;
pub mod generate;
pub mod module;
pub mod project;
pub mod pull;
pub mod push;
pub mod status;

use anyhow::Result;

use crate::api::ApiClient;
use crate::config::{Config, ConfigStore};

/// Shared per-invocation state: the config store, the loaded config, and the
/// resolved API base URL (flag wins over the stored value).
pub struct CliContext {
    pub store: ConfigStore,
    pub config: Config,
    pub api_url: String,
}

impl CliContext {
    pub fn load(api_url_flag: Option<&str>) -> Result<Self> {
        let store = ConfigStore::open()?;
        let config = store.load()?;
        let api_url = api_url_flag
            .map(str::to_string)
            .unwrap_or_else(|| config.api_url.clone());
        Ok(Self {
            store,
            config,
            api_url,
        })
    }

    pub fn client(&self) -> Result<ApiClient> {
        Ok(ApiClient::new(&self.api_url)?)
    }
}

/// Client-chosen correlation id for one generation run: 16 random bytes,
/// lowercase hex.
pub fn generate_session_id() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Render a fixed-width table of the project's modules.
pub fn render_module_table(modules: &serde_json::Value) {
    let Some(rows) = modules.as_array().filter(|rows| !rows.is_empty()) else {
        println!("No modules found.");
        return;
    };

    println!("Modules ({}):", rows.len());
    println!("{}", "-".repeat(80));
    println!("{:<25} {:<20} {:<12} {:<12}", "Name", "Template", "DB Type", "Pattern");
    println!("{}", "-".repeat(80));
    for row in rows {
        println!(
            "{:<25} {:<20} {:<12} {:<12}",
            field(row, "moduleName"),
            field(row, "moduleTemplateKey"),
            field(row, "dbTypeKey"),
            field(row, "architecturalPatternKey"),
        );
    }
    println!("{}", "-".repeat(80));
}

/// Render the available module templates.
pub fn render_template_table(templates: &serde_json::Value) {
    let Some(rows) = templates.as_array().filter(|rows| !rows.is_empty()) else {
        println!("No templates found.");
        return;
    };

    println!("Available Templates ({}):", rows.len());
    println!("{}", "-".repeat(80));
    println!("{:<30} {:<50}", "Template Key", "Description");
    println!("{}", "-".repeat(80));
    for row in rows {
        let description = row
            .get("description")
            .or_else(|| row.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let description = if description.chars().count() > 50 {
            let head: String = description.chars().take(47).collect();
            format!("{head}...")
        } else {
            description.to_string()
        };
        println!("{:<30} {:<50}", field(row, "key"), description);
    }
    println!("{}", "-".repeat(80));
}

fn field<'a>(row: &'a serde_json::Value, key: &str) -> &'a str {
    row.get(key).and_then(|v| v.as_str()).unwrap_or("-")
}
