//! Configuration parsing and validation for relaygate.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Placeholder substituted with the destination id in `upstream.url_template`.
pub const DESTINATION_PLACEHOLDER: &str = "{destinationId}";

/// Environment variable that overrides `server.port`.
pub const PORT_ENV_VAR: &str = "PORT";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub relay: RelayPolicy,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on; `PORT` in the environment takes precedence
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted inbound request body
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_body_limit() -> usize {
    50 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerConfig {
    /// Socket address string to bind, e.g. "0.0.0.0:4000".
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The single upstream every request is forwarded to.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// URL template containing `{destinationId}`
    #[serde(default = "default_url_template")]
    pub url_template: String,
    /// Bound on waiting for the upstream's initial response
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Bound on establishing the TCP/TLS connection
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_referer")]
    pub referer: String,
}

fn default_url_template() -> String {
    "https://api.lovable.dev/projects/{destinationId}/chat".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_origin() -> String {
    "https://lovable.dev".to_string()
}

fn default_referer() -> String {
    "https://lovable.dev/".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            user_agent: default_user_agent(),
            origin: default_origin(),
            referer: default_referer(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Request acceptance policy.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RelayPolicy {
    /// Reject requests whose payload is absent or null
    #[serde(default)]
    pub require_payload: bool,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Preflight cache lifetime, 0 disables the header
    #[serde(default)]
    pub max_age_seconds: u64,
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            max_age_seconds: 0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// `${VAR}` references in upstream values are expanded and the `PORT`
    /// override is applied.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string using the process environment.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse_str_with(content, |name| std::env::var(name).ok())
    }

    /// Parse configuration from a TOML string with a custom environment lookup.
    pub fn parse_str_with<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.resolve_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with every default, plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        config.resolve_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise from defaults and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// Expand `${VAR}` references and apply the `PORT` override.
    fn resolve_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let upstream = &mut self.upstream;
        upstream.url_template =
            expand_env_vars_with(&upstream.url_template, "upstream.url_template", &lookup)?;
        upstream.user_agent =
            expand_env_vars_with(&upstream.user_agent, "upstream.user_agent", &lookup)?;
        upstream.origin = expand_env_vars_with(&upstream.origin, "upstream.origin", &lookup)?;
        upstream.referer = expand_env_vars_with(&upstream.referer, "upstream.referer", &lookup)?;

        if let Some(raw) = lookup(PORT_ENV_VAR) {
            let port = raw.trim().parse::<u16>().map_err(|_| {
                ConfigError::Validation(format!(
                    "{} must be a port number, got '{}'",
                    PORT_ENV_VAR, raw
                ))
            })?;
            self.server.port = port;
        }

        Ok(())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let template = &self.upstream.url_template;
        if !template.contains(DESTINATION_PLACEHOLDER) {
            return Err(ConfigError::Validation(format!(
                "upstream.url_template must contain '{}': {}",
                DESTINATION_PLACEHOLDER, template
            )));
        }

        let sample = template.replace(DESTINATION_PLACEHOLDER, "sample");
        match reqwest::Url::parse(&sample) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::Validation(format!(
                    "upstream.url_template has unsupported scheme '{}'",
                    url.scheme()
                )))
            }
            Err(e) => {
                return Err(ConfigError::Validation(format!(
                    "upstream.url_template is not a valid URL: {}",
                    e
                )))
            }
        }

        if self.upstream.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "upstream.timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("cors.allowed_origins is empty - browsers will reject cross-origin calls");
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for '{field}': {message}")]
    EnvVar {
        var: String,
        field: String,
        message: String,
    },
}

/// Expand `${VAR}` references in an upstream setting (URL template or
/// identification header) using `lookup`.
///
/// `field` names the setting in errors, e.g. `upstream.origin`. Several
/// references may appear in one value, as in `${SCHEME}://${HOST}/{destinationId}`.
/// Fails on the first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, field: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            field: field.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                field: field.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            field: field.to_string(),
            message: format!(
                "Environment variable '{}' is not set (referenced in '{}')",
                var_name, field
            ),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}
