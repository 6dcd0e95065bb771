use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::task::TaskRouting;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub bitrix: BitrixConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BitrixConfig {
    /// Base webhook URL; `tasks.task.add` is appended, so it must end
    /// with a slash (normalized during validation).
    pub webhook_url: String,
    pub responsible_id: i64,
    pub refusal_project_id: Option<i64>,
    pub claim_project_id: Option<i64>,
    pub info_project_id: Option<i64>,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl BitrixConfig {
    pub fn routing(&self) -> TaskRouting {
        TaskRouting {
            responsible_id: self.responsible_id,
            refusal_project_id: self.refusal_project_id,
            claim_project_id: self.claim_project_id,
            info_project_id: self.info_project_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

/// Programmatic overrides applied after the file and environment layers;
/// used by tests and by the binary's startup wiring.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub bot_token: Option<String>,
    pub bitrix_webhook_url: Option<String>,
    pub responsible_id: Option<i64>,
    pub refusal_project_id: Option<i64>,
    pub claim_project_id: Option<i64>,
    pub info_project_id: Option<i64>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://courierbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 25,
            },
            bitrix: BitrixConfig {
                webhook_url: String::new(),
                responsible_id: 0,
                refusal_project_id: None,
                claim_project_id: None,
                info_project_id: None,
                request_timeout_secs: 15,
                max_retries: 3,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("courierbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = bot_token_value.into();
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(bitrix) = patch.bitrix {
            if let Some(webhook_url) = bitrix.webhook_url {
                self.bitrix.webhook_url = webhook_url;
            }
            if let Some(responsible_id) = bitrix.responsible_id {
                self.bitrix.responsible_id = responsible_id;
            }
            if let Some(refusal_project_id) = bitrix.refusal_project_id {
                self.bitrix.refusal_project_id = Some(refusal_project_id);
            }
            if let Some(claim_project_id) = bitrix.claim_project_id {
                self.bitrix.claim_project_id = Some(claim_project_id);
            }
            if let Some(info_project_id) = bitrix.info_project_id {
                self.bitrix.info_project_id = Some(info_project_id);
            }
            if let Some(request_timeout_secs) = bitrix.request_timeout_secs {
                self.bitrix.request_timeout_secs = request_timeout_secs;
            }
            if let Some(max_retries) = bitrix.max_retries {
                self.bitrix.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("COURIERBOT_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(token) = env::var("COURIERBOT_BOT_TOKEN") {
            self.telegram.bot_token = token.into();
        }
        if let Ok(webhook) = env::var("COURIERBOT_BITRIX_WEBHOOK") {
            self.bitrix.webhook_url = webhook;
        }
        if let Ok(value) = env::var("COURIERBOT_RESPONSIBLE_ID") {
            self.bitrix.responsible_id = parse_env_i64("COURIERBOT_RESPONSIBLE_ID", &value)?;
        }
        if let Ok(value) = env::var("COURIERBOT_REFUSAL_PROJECT_ID") {
            self.bitrix.refusal_project_id =
                Some(parse_env_i64("COURIERBOT_REFUSAL_PROJECT_ID", &value)?);
        }
        if let Ok(value) = env::var("COURIERBOT_CLAIM_PROJECT_ID") {
            self.bitrix.claim_project_id =
                Some(parse_env_i64("COURIERBOT_CLAIM_PROJECT_ID", &value)?);
        }
        if let Ok(value) = env::var("COURIERBOT_INFO_PROJECT_ID") {
            self.bitrix.info_project_id =
                Some(parse_env_i64("COURIERBOT_INFO_PROJECT_ID", &value)?);
        }
        if let Ok(level) = env::var("COURIERBOT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("COURIERBOT_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(token) = overrides.bot_token {
            self.telegram.bot_token = token.into();
        }
        if let Some(webhook) = overrides.bitrix_webhook_url {
            self.bitrix.webhook_url = webhook;
        }
        if let Some(responsible_id) = overrides.responsible_id {
            self.bitrix.responsible_id = responsible_id;
        }
        if let Some(id) = overrides.refusal_project_id {
            self.bitrix.refusal_project_id = Some(id);
        }
        if let Some(id) = overrides.claim_project_id {
            self.bitrix.claim_project_id = Some(id);
        }
        if let Some(id) = overrides.info_project_id {
            self.bitrix.info_project_id = Some(id);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        use secrecy::ExposeSecret;

        if self.telegram.bot_token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "telegram.bot_token must be set (COURIERBOT_BOT_TOKEN)".to_string(),
            ));
        }
        if self.bitrix.webhook_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "bitrix.webhook_url must be set (COURIERBOT_BITRIX_WEBHOOK)".to_string(),
            ));
        }
        if !self.bitrix.webhook_url.ends_with('/') {
            self.bitrix.webhook_url.push('/');
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_env_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    if let Ok(path) = env::var("COURIERBOT_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }
    let default = PathBuf::from("courierbot.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    telegram: Option<TelegramPatch>,
    bitrix: Option<BitrixPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BitrixPatch {
    webhook_url: Option<String>,
    responsible_id: Option<i64>,
    refusal_project_id: Option<i64>,
    claim_project_id: Option<i64>,
    info_project_id: Option<i64>,
    request_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    fn valid_overrides() -> ConfigOverrides {
        ConfigOverrides {
            bot_token: Some("123456:test-token".to_string()),
            bitrix_webhook_url: Some("https://portal.example/rest/1/abc/".to_string()),
            responsible_id: Some(7),
            refusal_project_id: Some(101),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn defaults_fail_validation_without_credentials() {
        let result = AppConfig::load(LoadOptions::default());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn overrides_produce_a_valid_config() {
        let config = AppConfig::load(LoadOptions {
            overrides: valid_overrides(),
            ..LoadOptions::default()
        })
        .expect("overrides should satisfy validation");

        assert_eq!(config.bitrix.responsible_id, 7);
        assert_eq!(config.bitrix.refusal_project_id, Some(101));
        assert_eq!(config.bitrix.claim_project_id, None);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn webhook_url_is_normalized_to_a_trailing_slash() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                bitrix_webhook_url: Some("https://portal.example/rest/1/abc".to_string()),
                ..valid_overrides()
            },
            ..LoadOptions::default()
        })
        .expect("config");

        assert!(config.bitrix.webhook_url.ends_with('/'));
    }

    #[test]
    fn missing_required_file_is_reported() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/definitely/not/here.toml")),
            require_file: true,
            overrides: valid_overrides(),
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn toml_patch_layers_under_overrides() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
[database]
url = "sqlite://from-file.db"
max_connections = 2

[bitrix]
claim_project_id = 202
max_retries = 1

[logging]
level = "debug"
format = "json"
"#
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: valid_overrides(),
        })
        .expect("config");

        assert_eq!(config.database.url, "sqlite://from-file.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.bitrix.claim_project_id, Some(202));
        assert_eq!(config.bitrix.max_retries, 1);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        // Builder routing mirrors the per-kind mapping.
        let routing = config.bitrix.routing();
        assert_eq!(routing.claim_project_id, Some(202));
        assert_eq!(routing.info_project_id, None);
    }
}
