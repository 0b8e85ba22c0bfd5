use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::domain::Language;
use crate::infra::api::DEFAULT_BASE_URL;
use crate::infra::cache::RESOURCE_CACHE_TTL;
use crate::util::debounce::CALCULATE_DEBOUNCE;

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "Kamaskope";
const APP_NAME: &str = "Kamaskope";

/// Overrides `api_base_url` when set.
pub const API_URL_ENV: &str = "KAMASKOPE_API_URL";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub language: Language,
    pub calculate_debounce_ms: u64,
    pub resource_cache_ttl_hours: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            language: Language::default(),
            calculate_debounce_ms: CALCULATE_DEBOUNCE.as_millis() as u64,
            resource_cache_ttl_hours: RESOURCE_CACHE_TTL.as_secs() / 3600,
        }
    }
}

impl Settings {
    pub fn calculate_debounce(&self) -> Duration {
        Duration::from_millis(self.calculate_debounce_ms)
    }

    pub fn resource_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.resource_cache_ttl_hours.saturating_mul(60 * 60))
    }

    fn with_env_overrides(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|value| !value.trim().is_empty()) {
            self.api_base_url = url;
        }
        self
    }
}

pub fn settings_file() -> Option<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join("settings.json"))
}

/// Settings from disk, falling back to defaults when the file is absent or unreadable.
pub fn load_settings() -> Settings {
    let stored = settings_file()
        .and_then(|path| fs::read_to_string(path).ok())
        .and_then(|data| match serde_json::from_str::<Settings>(&data) {
            Ok(settings) => Some(settings),
            Err(e) => {
                log::warn!("[settings] Ignoring unreadable settings file: {e}");
                None
            }
        })
        .unwrap_or_default();
    stored.with_env_overrides(std::env::var(API_URL_ENV).ok())
}

pub fn save_settings(settings: &Settings) -> Result<PathBuf, SettingsError> {
    let path = settings_file().ok_or(SettingsError::StorageUnavailable)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(&path, json)?;
    Ok(path)
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("storage directory unavailable")]
    StorageUnavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] SerdeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"language": "fr"}"#).unwrap();
        assert_eq!(settings.language, Language::Fr);
        assert_eq!(settings.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.calculate_debounce(), Duration::from_millis(300));
    }

    #[test]
    fn huge_cache_ttl_saturates() {
        let settings: Settings =
            serde_json::from_str(r#"{"resource_cache_ttl_hours": 18446744073709551615}"#).unwrap();
        assert_eq!(settings.resource_cache_ttl(), Duration::from_secs(u64::MAX));
        assert_eq!(Settings::default().resource_cache_ttl(), RESOURCE_CACHE_TTL);
    }

    #[test]
    fn env_override_replaces_base_url() {
        let settings =
            Settings::default().with_env_overrides(Some("https://kamaskope.example/".to_string()));
        assert_eq!(settings.api_base_url, "https://kamaskope.example/");
        let settings = Settings::default().with_env_overrides(Some("  ".to_string()));
        assert_eq!(settings.api_base_url, DEFAULT_BASE_URL);
    }
}
