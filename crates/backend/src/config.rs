use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};

pub const CONFIG_DIRECTORY_NAME: &str = "emberchat";
pub const CONFIG_FILE_NAME: &str = "backend.json";
/// Prefix for environment overrides, e.g. `EMBERCHAT_API_KEY`.
pub const CONFIG_ENV_PREFIX: &str = "EMBERCHAT_";

const DEFAULT_AUTH_ENDPOINT: &str = "https://auth.emberlink.app";
const DEFAULT_DATABASE_ENDPOINT: &str = "https://db.emberlink.app";
const DEFAULT_LISTEN_ENDPOINT: &str = "wss://db.emberlink.app";
const DEFAULT_COLLECTION: &str = "messages";
const DEFAULT_REDIRECT_PORT: u16 = 8417;

/// Static backend credentials and endpoints, supplied at process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,
    #[serde(default = "default_database_endpoint")]
    pub database_endpoint: String,
    #[serde(default = "default_listen_endpoint")]
    pub listen_endpoint: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            api_key: String::new(),
            auth_endpoint: default_auth_endpoint(),
            database_endpoint: default_database_endpoint(),
            listen_endpoint: default_listen_endpoint(),
            collection: default_collection(),
            redirect_port: default_redirect_port(),
        }
    }
}

impl BackendSettings {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(CONFIG_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".emberchat"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(CONFIG_FILE_NAME)
    }

    /// Loads settings from defaults, the JSON config file, and `EMBERCHAT_*`
    /// environment overrides, in that precedence order.
    pub fn load() -> Self {
        Self::load_from(&Self::default_config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let figment = Figment::from(Serialized::defaults(BackendSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(CONFIG_ENV_PREFIX));

        match figment.extract::<BackendSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to load backend settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                BackendSettings::default()
            }
        }
    }

    /// True when the settings carry enough identity to reach a project.
    pub fn is_configured(&self) -> bool {
        !self.project_id.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    pub fn normalized(mut self) -> Self {
        self.project_id = self.project_id.trim().to_string();
        self.api_key = self.api_key.trim().to_string();
        self.auth_endpoint = normalize_endpoint(&self.auth_endpoint, default_auth_endpoint);
        self.database_endpoint =
            normalize_endpoint(&self.database_endpoint, default_database_endpoint);
        self.listen_endpoint = normalize_endpoint(&self.listen_endpoint, default_listen_endpoint);
        self.collection = if self.collection.trim().is_empty() {
            default_collection()
        } else {
            self.collection.trim().to_string()
        };
        self
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.redirect_port)
    }
}

fn normalize_endpoint(raw: &str, fallback: fn() -> String) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

fn default_auth_endpoint() -> String {
    DEFAULT_AUTH_ENDPOINT.to_string()
}

fn default_database_endpoint() -> String {
    DEFAULT_DATABASE_ENDPOINT.to_string()
}

fn default_listen_endpoint() -> String {
    DEFAULT_LISTEN_ENDPOINT.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_redirect_port() -> u16 {
    DEFAULT_REDIRECT_PORT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_not_configured() {
        let settings = BackendSettings::default();
        assert!(!settings.is_configured());
        assert_eq!(settings.collection, "messages");
        assert_eq!(settings.redirect_port, DEFAULT_REDIRECT_PORT);
    }

    #[test]
    fn normalization_trims_endpoints_and_restores_empty_fields() {
        let settings = BackendSettings {
            project_id: "  ember-demo  ".to_string(),
            api_key: "key".to_string(),
            auth_endpoint: "https://auth.example.test/".to_string(),
            database_endpoint: "   ".to_string(),
            listen_endpoint: "wss://db.example.test//".to_string(),
            collection: " ".to_string(),
            redirect_port: 9000,
        }
        .normalized();

        assert_eq!(settings.project_id, "ember-demo");
        assert!(settings.is_configured());
        assert_eq!(settings.auth_endpoint, "https://auth.example.test");
        assert_eq!(settings.database_endpoint, DEFAULT_DATABASE_ENDPOINT);
        assert_eq!(settings.listen_endpoint, "wss://db.example.test");
        assert_eq!(settings.collection, "messages");
        assert_eq!(settings.redirect_uri(), "http://127.0.0.1:9000/callback");
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let settings = BackendSettings::load_from(Path::new("/nonexistent/emberchat.json"));
        assert_eq!(settings, BackendSettings::default());
    }
}
