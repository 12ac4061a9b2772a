//! Configuration management for agentbrowse-server
//!
//! Loads and validates server configuration from a TOML file. Every
//! optional field has a `serde(default = ...)` fallback so a minimal or
//! empty file still produces a usable configuration; secrets (the LLM
//! API key) are read from an environment variable rather than the file.

use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bind address and TLS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Relaxed auth + permissive CORS when true.
    #[serde(default)]
    pub dev_mode: bool,

    #[serde(default = "default_enable_tls")]
    pub enable_tls: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_cert: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_key: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8443
}

fn default_enable_tls() -> bool {
    false
}

/// Bearer-token authentication and rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_token: Option<String>,

    #[serde(default)]
    pub tokens: Vec<String>,

    #[serde(default = "default_require_auth")]
    pub require_auth: bool,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

fn default_require_auth() -> bool {
    false
}

fn default_rate_limit() -> u32 {
    60
}

/// The LLM endpoint the agent loop talks to (spec §6 "LLM endpoint").
/// The API key is never read from the TOML file: it comes from
/// `AGENTBROWSE_LLM_API_KEY` so it never lands in a config file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(skip)]
    pub api_key: String,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o".to_string()
}

/// Browser-session defaults (spec §4.1, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,

    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,
}

fn default_max_concurrent_sessions() -> usize {
    20
}

/// Agent-loop and task-runner concurrency caps (spec §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunsConfig {
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    #[serde(default = "default_agent_max_iterations")]
    pub agent_max_iterations: u32,
}

fn default_max_concurrent_runs() -> usize {
    5
}

fn default_agent_max_iterations() -> u32 {
    30
}

/// Request size and content limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_request_mb")]
    pub max_request_size_mb: usize,

    #[serde(default = "default_max_prompt_length")]
    pub max_prompt_length: usize,
}

fn default_max_request_mb() -> usize {
    50
}

fn default_max_prompt_length() -> usize {
    50000
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub pretty_print: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerSettings,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub browser: BrowserConfig,
    pub runs: RunsConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from a TOML file, then overlays the LLM API
    /// key from the environment and validates the result.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServerError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ServerError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ServerError::Config(format!("Failed to parse config: {}", e)))?;

        config.llm.api_key = std::env::var("AGENTBROWSE_LLM_API_KEY").unwrap_or_default();

        config.validate()?;
        Ok(config)
    }

    /// Development-ready configuration: localhost, no TLS, auth disabled.
    pub fn dev_default() -> Self {
        Config {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8443,
                dev_mode: true,
                enable_tls: false,
                tls_cert: None,
                tls_key: None,
            },
            auth: AuthConfig {
                dev_token: Some("dev-token-12345".to_string()),
                tokens: vec![],
                require_auth: false,
                rate_limit_per_minute: 100,
            },
            llm: LlmConfig {
                base_url: default_llm_base_url(),
                model: default_llm_model(),
                api_key: std::env::var("AGENTBROWSE_LLM_API_KEY").unwrap_or_default(),
            },
            browser: BrowserConfig {
                headless: true,
                max_concurrent_sessions: 20,
            },
            runs: RunsConfig {
                max_concurrent_runs: 5,
                agent_max_iterations: 30,
            },
            limits: LimitsConfig {
                max_request_size_mb: 50,
                max_prompt_length: 50000,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                pretty_print: true,
            },
        }
    }

    /// Cross-field validation: TLS requires cert+key, auth requires a
    /// token pool, every numeric cap must be nonzero.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.server.host.is_empty() {
            return Err(ServerError::Config("Host cannot be empty".to_string()));
        }

        if self.server.port == 0 {
            return Err(ServerError::Config("Port must be greater than 0".to_string()));
        }

        if self.server.enable_tls {
            if self.server.tls_cert.is_none() || self.server.tls_key.is_none() {
                return Err(ServerError::Config(
                    "TLS cert and key required when enable_tls = true".to_string(),
                ));
            }

            if let Some(ref cert_path) = self.server.tls_cert {
                if !Path::new(cert_path).exists() {
                    return Err(ServerError::Config(format!(
                        "TLS cert file not found: {}",
                        cert_path
                    )));
                }
            }

            if let Some(ref key_path) = self.server.tls_key {
                if !Path::new(key_path).exists() {
                    return Err(ServerError::Config(format!(
                        "TLS key file not found: {}",
                        key_path
                    )));
                }
            }
        }

        if self.auth.require_auth && self.auth.tokens.is_empty() && self.auth.dev_token.is_none() {
            return Err(ServerError::Config(
                "Authentication required but no tokens configured".to_string(),
            ));
        }

        if self.auth.rate_limit_per_minute == 0 {
            return Err(ServerError::Config(
                "Rate limit must be greater than 0".to_string(),
            ));
        }

        if self.llm.base_url.is_empty() {
            return Err(ServerError::Config("LLM base_url cannot be empty".to_string()));
        }

        if self.browser.max_concurrent_sessions == 0 {
            return Err(ServerError::Config(
                "Max concurrent sessions must be greater than 0".to_string(),
            ));
        }

        if self.runs.max_concurrent_runs == 0 {
            return Err(ServerError::Config(
                "Max concurrent runs must be greater than 0".to_string(),
            ));
        }

        if self.limits.max_request_size_mb == 0 {
            return Err(ServerError::Config(
                "Max request size must be greater than 0".to_string(),
            ));
        }

        if self.limits.max_prompt_length == 0 {
            return Err(ServerError::Config(
                "Max prompt length must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ServerError::Config(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn valid_tokens(&self) -> Vec<String> {
        let mut tokens = self.auth.tokens.clone();
        if let Some(ref dev_token) = self.auth.dev_token {
            tokens.push(dev_token.clone());
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn dev_default_is_valid() {
        let config = Config::dev_default();
        assert_eq!(config.server.port, 8443);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_empty_host() {
        let mut config = Config::dev_default();
        config.server.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_tls_without_cert() {
        let mut config = Config::dev_default();
        config.server.enable_tls = true;
        config.server.tls_cert = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_auth_without_tokens() {
        let mut config = Config::dev_default();
        config.auth.require_auth = true;
        config.auth.dev_token = None;
        config.auth.tokens.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_run_concurrency() {
        let mut config = Config::dev_default();
        config.runs.max_concurrent_runs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bind_address_formats_host_and_port() {
        let config = Config::dev_default();
        assert_eq!(config.bind_address(), "127.0.0.1:8443");
    }

    #[test]
    fn from_file_applies_defaults_for_missing_sections() {
        let minimal_toml = r#"
[server]
[auth]
[llm]
[browser]
[runs]
[limits]
[logging]
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(minimal_toml.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.runs.max_concurrent_runs, 5);
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn from_file_rejects_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"not valid toml { } [ ]").unwrap();
        temp_file.flush().unwrap();

        let result = Config::from_file(temp_file.path());
        assert!(result.is_err());
    }
}
