use std::{collections::HashMap, fs, path::Path, path::PathBuf, time::Duration};

use shared::protocol::WpcomClientCredentials;
use signup_core::site_step::{DEFAULT_LOGIN_URL, VALIDATION_DELAY_AFTER_FIELD_CHANGES};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub debounce_ms: u64,
    pub progress_path: PathBuf,
    pub login_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "https://public-api.wordpress.com".into(),
            client_id: None,
            client_secret: None,
            debounce_ms: VALIDATION_DELAY_AFTER_FIELD_CHANGES.as_millis() as u64,
            progress_path: PathBuf::from("./data/signup-progress.json"),
            login_url: DEFAULT_LOGIN_URL.into(),
        }
    }
}

impl Settings {
    pub fn debounce_wait(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Only sent when both halves are configured.
    pub fn credentials(&self) -> Option<WpcomClientCredentials> {
        match (&self.client_id, &self.client_secret) {
            (Some(client_id), Some(client_secret)) => Some(WpcomClientCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            }),
            _ => None,
        }
    }
}

pub fn load_settings(path: &Path) -> Settings {
    load_settings_with(path, |key| std::env::var(key).ok())
}

/// File values first, then environment overrides. `APP__*` wins over the
/// bare names.
pub fn load_settings_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            if let Some(v) = file_string(&file_cfg, "api_base") {
                settings.api_base = v;
            }
            if let Some(v) = file_string(&file_cfg, "client_id") {
                settings.client_id = Some(v);
            }
            if let Some(v) = file_string(&file_cfg, "client_secret") {
                settings.client_secret = Some(v);
            }
            if let Some(v) = file_cfg.get("debounce_ms").and_then(toml::Value::as_integer) {
                if let Ok(ms) = u64::try_from(v) {
                    settings.debounce_ms = ms;
                }
            }
            if let Some(v) = file_string(&file_cfg, "progress_path") {
                settings.progress_path = PathBuf::from(v);
            }
            if let Some(v) = file_string(&file_cfg, "login_url") {
                settings.login_url = v;
            }
        }
    }

    if let Some(v) = env("SIGNUP_API_BASE") {
        settings.api_base = v;
    }
    if let Some(v) = env("APP__API_BASE") {
        settings.api_base = v;
    }

    if let Some(v) = env("APP__CLIENT_ID") {
        settings.client_id = Some(v);
    }
    if let Some(v) = env("APP__CLIENT_SECRET") {
        settings.client_secret = Some(v);
    }

    if let Some(v) = env("APP__DEBOUNCE_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.debounce_ms = parsed;
        }
    }

    if let Some(v) = env("APP__PROGRESS_PATH") {
        settings.progress_path = PathBuf::from(v);
    }

    settings
}

fn file_string(file_cfg: &HashMap<String, toml::Value>, key: &str) -> Option<String> {
    file_cfg
        .get(key)
        .and_then(toml::Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
