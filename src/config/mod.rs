//! Application configuration
//!
//! Settings load from `flowstate.toml` with a `FLOWSTATE_`-prefixed
//! environment overlay. Secrets (model API keys, the SMTP password, the
//! token signing key) are never stored in the file; the config names the
//! environment variable each one lives in.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    pub llm: LlmSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    /// SMTP is optional; without it login links are logged instead of sent
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
    #[serde(default)]
    pub docs: DocsSettings,
}

impl Settings {
    /// Load settings from a TOML file plus the environment overlay.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("FLOWSTATE").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL used in login links
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_public_url() -> String {
    "http://localhost:8000".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:flowstate.db?mode=rwc".to_string()
}

/// One model endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Provider id: "gemini", "openai" or "groq"
    pub provider: String,
    /// Model name/identifier
    pub model: String,
    /// Environment variable containing the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Custom base URL (for self-hosted or proxied endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default temperature for completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Default max tokens for completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,
}

fn default_model_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmSettings {
    /// The main model behind the task/login/learn-more agents
    pub model: ModelConfig,
    /// A cheaper model for auxiliary work (suggested actions); the main
    /// model is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_model: Option<ModelConfig>,
}

impl LlmSettings {
    pub fn small_model(&self) -> &ModelConfig {
        self.small_model.as_ref().unwrap_or(&self.model)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthSettings {
    /// Environment variable holding the token signing key
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key_env: default_secret_key_env(),
        }
    }
}

fn default_secret_key_env() -> String {
    "SECRET_KEY".to_string()
}

impl AuthSettings {
    /// Resolve the signing key. Falls back to a fixed development key so
    /// a fresh checkout runs, but that key must never reach production.
    pub fn secret_key(&self) -> String {
        match std::env::var(&self.secret_key_env) {
            Ok(key) if !key.is_empty() => key,
            _ => {
                warn!(
                    "{} is not set; using the development signing key",
                    self.secret_key_env
                );
                "default_secret_key".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpSettings {
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    /// Environment variable containing the SMTP password
    #[serde(default = "default_smtp_password_env")]
    pub password_env: String,
    /// From address; the username is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_password_env() -> String {
    "SMTP_PASSWORD".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocsSettings {
    /// Directory the learn-more agent may read from
    #[serde(default = "default_docs_root")]
    pub root: String,
}

impl Default for DocsSettings {
    fn default() -> Self {
        Self {
            root: default_docs_root(),
        }
    }
}

fn default_docs_root() -> String {
    "docs".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_config() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[llm.model]\nprovider = \"gemini\"\nmodel = \"gemini-2.0-flash\""
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.llm.model.provider, "gemini");
        assert_eq!(settings.llm.small_model().model, "gemini-2.0-flash");
        assert!(settings.smtp.is_none());
    }
}
