//! Local configuration storage
//!
//! Credentials and defaults live in `~/.sitegen/config.json`. Secret codes
//! are masked at rest with a per-user key file; values without the mask
//! prefix are treated as legacy plaintext and migrated on the next load.

pub(crate) mod secret;

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://api.sitegen.dev/";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            projects: BTreeMap::new(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_code: Option<String>,
}

/// Handle to the on-disk config store.
pub struct ConfigStore {
    config_path: PathBuf,
    key_path: PathBuf,
    lock_path: PathBuf,
}

impl ConfigStore {
    /// Open the store in the default location (`~/.sitegen`), or under
    /// `SITEGEN_CONFIG_DIR` when set.
    pub fn open() -> Result<Self> {
        let dir = match std::env::var_os("SITEGEN_CONFIG_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .context("cannot determine home directory")?
                .join(".sitegen"),
        };
        Ok(Self::open_at(&dir))
    }

    pub fn open_at(dir: &Path) -> Self {
        Self {
            config_path: dir.join("config.json"),
            key_path: dir.join(".key"),
            lock_path: dir.join(".config.lock"),
        }
    }

    /// Load the config, migrating any legacy plaintext secrets to the masked
    /// format in place.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let json = fs::read_to_string(&self.config_path)
            .with_context(|| format!("failed to read {}", self.config_path.display()))?;
        let mut config: Config = serde_json::from_str(&json)
            .with_context(|| format!("invalid config at {}", self.config_path.display()))?;

        let key = self.load_or_create_key()?;
        let mut needs_save = false;
        for project in config.projects.values_mut() {
            if let Some(code) = &project.secret_code {
                if !secret::is_masked(code) {
                    project.secret_code = Some(secret::mask(code, &key));
                    needs_save = true;
                }
            }
        }
        if needs_save {
            self.save(&config)?;
        }

        Ok(config)
    }

    /// Persist the config atomically, guarded by an advisory lock against
    /// concurrent invocations.
    pub fn save(&self, config: &Config) -> Result<()> {
        let dir = self
            .config_path
            .parent()
            .context("config path has no parent directory")?;
        fs::create_dir_all(dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        lock.lock_exclusive()?;

        let json = serde_json::to_string_pretty(config)?;
        let tmp_path = self.config_path.with_extension("json.tmp");
        fs::write(&tmp_path, &json)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.config_path)
            .with_context(|| format!("failed to replace {}", self.config_path.display()))?;

        let _ = fs2::FileExt::unlock(&lock);
        Ok(())
    }

    /// Store a secret code in masked form.
    pub fn mask_secret(&self, plain: &str) -> Result<String> {
        let key = self.load_or_create_key()?;
        Ok(secret::mask(plain, &key))
    }

    /// Resolve the credential triple for a project: explicit flags win over
    /// stored values; stored secrets are unmasked.
    pub fn resolve_credentials(
        &self,
        config: &Config,
        project: &str,
        email: Option<&str>,
        secret_code: Option<&str>,
    ) -> Result<(String, String, String)> {
        if project.trim().is_empty() {
            bail!("project name is required; pass --project <name>");
        }

        let stored = config.projects.get(project);

        let email = email
            .map(str::to_string)
            .or_else(|| stored.and_then(|p| p.email.clone()));
        let Some(email) = email else {
            bail!(
                "project email is required; pass --email or set it via \
                 'sitegen config --project {project} --set email=...'"
            );
        };

        let secret = match secret_code {
            Some(s) => s.to_string(),
            None => {
                let Some(masked) = stored.and_then(|p| p.secret_code.clone()) else {
                    bail!(
                        "project secret code is required; pass --secret-code or set it via \
                         'sitegen config --project {project} --set secret_code=...'"
                    );
                };
                let key = self.load_or_create_key()?;
                secret::unmask(&masked, &key)
            }
        };

        Ok((project.to_string(), email, secret))
    }

    fn load_or_create_key(&self) -> Result<Vec<u8>> {
        if self.key_path.exists() {
            let hex = fs::read_to_string(&self.key_path)?;
            match secret::decode_hex(hex.trim()) {
                Some(key) if !key.is_empty() => return Ok(key),
                // Unreadable or empty key file: secrets masked with it are
                // unrecoverable, start over rather than fail every command.
                _ => {}
            }
        }

        let dir = self
            .key_path
            .parent()
            .context("key path has no parent directory")?;
        fs::create_dir_all(dir)?;

        let key: [u8; 32] = rand::random();
        fs::write(&self.key_path, secret::encode_hex(&key))?;
        restrict_permissions(&self.key_path);
        Ok(key.to_vec())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open_at(dir.path());
        (dir, store)
    }

    #[test]
    fn test_load_missing_config_is_default() {
        let (_dir, store) = store();
        let config = store.load().unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.projects.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_dir, store) = store();
        let mut config = Config::default();
        config.projects.insert(
            "shop".to_string(),
            ProjectConfig {
                email: Some("dev@example.com".to_string()),
                secret_code: Some(store.mask_secret("hunter2").unwrap()),
            },
        );
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        let (_, email, secret) = store
            .resolve_credentials(&loaded, "shop", None, None)
            .unwrap();
        assert_eq!(email, "dev@example.com");
        assert_eq!(secret, "hunter2");
    }

    #[test]
    fn test_plaintext_secret_migrates_on_load() {
        let (_dir, store) = store();
        let mut config = Config::default();
        config.projects.insert(
            "shop".to_string(),
            ProjectConfig {
                email: Some("dev@example.com".to_string()),
                secret_code: Some("legacy-plain".to_string()),
            },
        );
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        let stored = &loaded.projects["shop"].secret_code;
        assert!(super::secret::is_masked(stored.as_deref().unwrap()));

        let (_, _, secret) = store
            .resolve_credentials(&loaded, "shop", None, None)
            .unwrap();
        assert_eq!(secret, "legacy-plain");
    }

    #[test]
    fn test_empty_key_file_is_regenerated() {
        let (dir, store) = store();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(".key"), "").unwrap();

        // Masking must not divide by a zero-length key; a fresh one is
        // written in place of the empty file.
        let masked = store.mask_secret("hunter2").unwrap();
        assert!(secret::is_masked(&masked));

        let on_disk = fs::read_to_string(dir.path().join(".key")).unwrap();
        assert!(!on_disk.trim().is_empty());
    }

    #[test]
    fn test_explicit_flags_win() {
        let (_dir, store) = store();
        let mut config = Config::default();
        config.projects.insert(
            "shop".to_string(),
            ProjectConfig {
                email: Some("stored@example.com".to_string()),
                secret_code: Some(store.mask_secret("stored").unwrap()),
            },
        );

        let (_, email, secret) = store
            .resolve_credentials(&config, "shop", Some("flag@example.com"), Some("flagged"))
            .unwrap();
        assert_eq!(email, "flag@example.com");
        assert_eq!(secret, "flagged");
    }

    #[test]
    fn test_missing_credentials_error_names_fix() {
        let (_dir, store) = store();
        let config = Config::default();
        let err = store
            .resolve_credentials(&config, "shop", None, None)
            .unwrap_err();
        assert!(err.to_string().contains("--email"));
    }
}
