use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use client_core::DEFAULT_API_BASE_URL;
use serde::Deserialize;
use storage::DEFAULT_SLOT_KEY;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub database_url: String,
    pub slot_key: String,
    pub request_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            database_url: "sqlite://./data/jokes.db".into(),
            slot_key: DEFAULT_SLOT_KEY.into(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    database_url: Option<String>,
    slot_key: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then `path` if it exists, then environment variables.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()))
        }
    };
    resolve_settings(raw.as_deref(), |key| std::env::var(key).ok())
        .with_context(|| format!("invalid configuration in '{}'", path.display()))
}

pub(crate) fn resolve_settings(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        let file_cfg: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file_cfg.api_base_url {
            settings.api_base_url = v;
        }
        if let Some(v) = file_cfg.database_url {
            settings.database_url = v;
        }
        if let Some(v) = file_cfg.slot_key {
            settings.slot_key = v;
        }
        if file_cfg.request_timeout_secs.is_some() {
            settings.request_timeout_secs = file_cfg.request_timeout_secs;
        }
    }

    if let Some(v) = env_var(&env, "JOKES_API_BASE_URL", "APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env_var(&env, "JOKES_DATABASE_URL", "APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env_var(&env, "JOKES_SLOT_KEY", "APP__SLOT_KEY") {
        settings.slot_key = v;
    }
    if let Some(v) = env_var(&env, "JOKES_REQUEST_TIMEOUT_SECS", "APP__REQUEST_TIMEOUT_SECS") {
        let secs = v
            .parse::<u64>()
            .with_context(|| format!("request timeout must be whole seconds, got '{v}'"))?;
        settings.request_timeout_secs = Some(secs);
    }

    validate(&settings)?;
    Ok(settings)
}

// The APP__ spelling wins when both are set.
fn env_var(env: &impl Fn(&str) -> Option<String>, primary: &str, app: &str) -> Option<String> {
    env(app).or_else(|| env(primary))
}

fn validate(settings: &Settings) -> anyhow::Result<()> {
    let url = Url::parse(&settings.api_base_url)
        .with_context(|| format!("invalid api_base_url '{}'", settings.api_base_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!(
            "api_base_url must start with http:// or https://, got '{}'",
            settings.api_base_url
        ));
    }
    if settings.slot_key.trim().is_empty() {
        return Err(anyhow!("slot_key must not be empty"));
    }
    Ok(())
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    let path = database_url
        .strip_prefix("sqlite://")?
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
