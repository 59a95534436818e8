//! Initialize the configuration directory: create ~/.pushlite and a default config with a fresh API token.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

/// Create the config directory and default config file if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with default api settings, an empty destination list and a generated token if missing.
/// - Leaves an existing config untouched apart from adding a token when none is set.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let mut default_config = config::Config::default();
        default_config.api.token = Some(config::generate_token()?);
        config::save_config(&default_config, config_path)?;
        log::info!("created default config at {}", config_path.display());
    } else {
        let (mut existing, _) = config::load_config(Some(config_path.to_path_buf()))?;
        if config::ensure_api_token(&mut existing, config_path)? {
            log::info!("added api token to {}", config_path.display());
        } else {
            log::debug!("config already exists at {}, skipping", config_path.display());
        }
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_config_with_token_once() {
        let dir = std::env::temp_dir().join(format!("pushlite-init-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("config.json");

        let created = init_config_dir(&path).unwrap();
        assert_eq!(created, dir.join("nested"));
        let (first, _) = config::load_config(Some(path.clone())).unwrap();
        let token = first.api.token.clone().expect("token written");
        assert_eq!(first.api.port, 9966);

        init_config_dir(&path).unwrap();
        let (second, _) = config::load_config(Some(path.clone())).unwrap();
        assert_eq!(second.api.token.as_deref(), Some(token.as_str()));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
