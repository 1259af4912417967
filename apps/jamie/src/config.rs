// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Layered configuration: code defaults, an optional TOML file, then six
//! bare top-level environment variables for the secrets and ports that
//! should never live in a committed config file.

use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use jamie_core::{JamieError, Result};
use serde::{Deserialize, Serialize};
use tracing::Level;

fn default_database_url() -> String {
    "sqlite://jamie.db".to_string()
}

fn default_http_port() -> u16 {
    8081
}

fn default_language() -> String {
    "en".to_string()
}

fn default_asr_endpoint() -> String {
    "wss://asr.example.com/v2/listen".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct DiscordConfig {
    #[serde(default)]
    pub token: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AsrConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_asr_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self { api_key: String::new(), endpoint: default_asr_endpoint(), language: default_language() }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct TtsConfig {
    #[serde(default)]
    pub api_key: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { database_url: default_database_url() }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { http_port: default_http_port() }
    }
}

/// Log level for filtering messages.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Log file format options.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration for console and file output.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogConfig {
    #[serde(default)]
    pub console_enable: bool,
    #[serde(default)]
    pub file_enable: bool,
    #[serde(default)]
    pub console_level: LogLevel,
    #[serde(default)]
    pub file_level: LogLevel,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enable: true,
            file_enable: true,
            console_level: LogLevel::default(),
            file_level: LogLevel::Info,
            file_path: "./jamie.log".to_string(),
            file_format: LogFormat::default(),
        }
    }
}

/// Telemetry and observability configuration (OpenTelemetry).
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub tracing_enable: bool,
    pub otlp_endpoint: Option<String>,
    pub otlp_traces_endpoint: Option<String>,
    #[serde(default)]
    pub otlp_headers: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub tokio_console: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable: false,
            tracing_enable: false,
            otlp_endpoint: None,
            otlp_traces_endpoint: None,
            otlp_headers: std::collections::HashMap::new(),
            tokio_console: false,
        }
    }
}

/// Root configuration for the Jamie binary.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub asr: AsrConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads configuration from defaults, an optional TOML file at
/// `config_path`, then the bare top-level environment variable overrides.
///
/// # Errors
/// Returns `JamieError::Config` if the TOML file is malformed or `HTTP_PORT`
/// does not parse as a `u16`.
pub fn load(config_path: &str) -> Result<ConfigLoadResult> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    let mut file_missing = None;
    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    figment = figment.merge(Serialized::defaults(bare_env_overrides()?));

    let config: Config = figment.extract().map_err(|e| JamieError::Config(e.to_string()))?;
    Ok(ConfigLoadResult { config, file_missing })
}

/// Builds the override layer from the six bare top-level env vars
/// (`DISCORD_TOKEN`, `ASR_API_KEY`, `TTS_API_KEY`, `LLM_API_KEY`,
/// `DATABASE_URL`, `HTTP_PORT`), rather than a prefixed/nested scheme
/// `figment::providers::Env` can parse unaided. Only variables that are
/// actually set are included, so unset ones never clobber a TOML-file or
/// code default.
fn bare_env_overrides() -> Result<serde_json::Value> {
    let mut discord = serde_json::Map::new();
    if let Ok(token) = std::env::var("DISCORD_TOKEN") {
        discord.insert("token".to_string(), token.into());
    }

    let mut asr = serde_json::Map::new();
    if let Ok(key) = std::env::var("ASR_API_KEY") {
        asr.insert("api_key".to_string(), key.into());
    }

    let mut tts = serde_json::Map::new();
    if let Ok(key) = std::env::var("TTS_API_KEY") {
        tts.insert("api_key".to_string(), key.into());
    }

    let mut llm = serde_json::Map::new();
    if let Ok(key) = std::env::var("LLM_API_KEY") {
        llm.insert("api_key".to_string(), key.into());
    }

    let mut store = serde_json::Map::new();
    if let Ok(url) = std::env::var("DATABASE_URL") {
        store.insert("database_url".to_string(), url.into());
    }

    let mut server = serde_json::Map::new();
    if let Ok(port) = std::env::var("HTTP_PORT") {
        let port: u16 = port
            .parse()
            .map_err(|_| JamieError::Config(format!("HTTP_PORT {port:?} is not a valid port number")))?;
        server.insert("http_port".to_string(), port.into());
    }

    Ok(serde_json::json!({
        "discord": discord,
        "asr": asr,
        "tts": tts,
        "llm": llm,
        "store": store,
        "server": server,
    }))
}

/// Generates the default configuration as a pretty-printed TOML string.
///
/// # Errors
/// Returns an error if the default configuration cannot be serialized.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_any_overrides() {
        let config = Config::default();
        assert_eq!(config.server.http_port, 8081);
        assert_eq!(config.store.database_url, "sqlite://jamie.db");
    }
}
