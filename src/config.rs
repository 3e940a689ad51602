//! Configuration for Synthgate.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Main configuration for the gateway.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub assistant: AssistantConfig,
    pub safety: SafetyConfig,
    pub poll: PollConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            server: ServerConfig::from_env()?,
            assistant: AssistantConfig::from_env()?,
            safety: SafetyConfig::from_env()?,
            poll: PollConfig::from_env()?,
        })
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: optional_env("GATEWAY_HOST")?.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_optional_env("GATEWAY_PORT", 8080)?,
        })
    }

    /// The address the gateway binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "GATEWAY_HOST/GATEWAY_PORT".to_string(),
                message: format!("not a valid socket address: {e}"),
            })
    }
}

/// Remote assistant API configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Base URL of the assistant API (default: https://api.openai.com/v1).
    pub base_url: String,
    /// Bearer token for the assistant API.
    pub api_key: SecretString,
    /// Identifier of the pre-provisioned assistant. Created out of band,
    /// never minted by the gateway at runtime.
    pub assistant_id: String,
}

/// Name of the key file consulted when `OPENAI_API_KEY` is not set.
const KEY_FILE: &str = "open_ai_key";

impl AssistantConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = optional_env("OPENAI_BASE_URL")?
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        // Priority: env var > key file in the working directory.
        let api_key = match optional_env("OPENAI_API_KEY")? {
            Some(key) => key.trim().to_string(),
            None => read_key_file(Path::new(KEY_FILE))?.ok_or_else(|| {
                ConfigError::MissingRequired {
                    key: "OPENAI_API_KEY".to_string(),
                    hint: format!(
                        "Set the OPENAI_API_KEY environment variable or create an {KEY_FILE} file"
                    ),
                }
            })?,
        };

        let assistant_id =
            optional_env("OPENAI_ASSISTANT_ID")?.ok_or_else(|| ConfigError::MissingRequired {
                key: "OPENAI_ASSISTANT_ID".to_string(),
                hint: "Set OPENAI_ASSISTANT_ID to the id of the provisioned assistant".to_string(),
            })?;

        Ok(Self {
            base_url,
            api_key: SecretString::from(api_key),
            assistant_id,
        })
    }
}

fn read_key_file(path: &Path) -> Result<Option<String>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let key = std::fs::read_to_string(path)?.trim().to_string();
    if key.is_empty() {
        return Ok(None);
    }
    tracing::info!(path = %path.display(), "using assistant API key from file");
    Ok(Some(key))
}

/// Input safety filter configuration.
#[derive(Debug, Clone)]
pub struct SafetyConfig {
    /// Master switch; when off, input passes through entirely untouched.
    pub filter_enabled: bool,
    pub jailbreak_detection_enabled: bool,
    pub domain_validation_enabled: bool,
}

impl SafetyConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            filter_enabled: parse_optional_env("SAFETY_FILTER_ENABLED", true)?,
            jailbreak_detection_enabled: parse_optional_env(
                "SAFETY_JAILBREAK_DETECTION_ENABLED",
                true,
            )?,
            domain_validation_enabled: parse_optional_env("SAFETY_DOMAIN_VALIDATION_ENABLED", true)?,
        })
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            filter_enabled: true,
            jailbreak_detection_enabled: true,
            domain_validation_enabled: true,
        }
    }
}

/// Run-poll loop configuration.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Maximum number of status checks before the turn times out.
    pub max_attempts: u32,
    /// Delay between status checks.
    pub interval: Duration,
    /// Maximum tool-resolution rounds per turn. Bounds the sleep-free
    /// re-poll path separately from `max_attempts`.
    pub max_tool_rounds: u32,
}

impl PollConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_attempts: parse_optional_env("POLL_MAX_ATTEMPTS", 30)?,
            interval: Duration::from_millis(parse_optional_env("POLL_INTERVAL_MS", 1000)?),
            max_tool_rounds: parse_optional_env("POLL_MAX_TOOL_ROUNDS", 8)?,
        })
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_millis(1000),
            max_tool_rounds: 8,
        }
    }
}

pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|v| v.unwrap_or(default))
}
