// crates/csig-canary-config/src/config.rs
// ============================================================================
// Module: Canary Configuration
// Description: Configuration loading and validation for the canary.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: csig-canary-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path comes from `--config`, then `CSIG_CANARY_CONFIG`, then
//! `csig-canary.toml` in the working directory. After parsing, the driver
//! variables `CSIG_ENV`, `CSIG_COLLECTIONS`, and `CANARY_LOG_LEVEL` override
//! the matching fields, and the result is validated as a whole.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use csig_canary_core::CollectionScope;
use csig_canary_core::EnvironmentKey;
use csig_canary_core::MergeMode;
use csig_canary_core::OrchestratorConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "csig-canary.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CSIG_CANARY_CONFIG";
/// Environment variable overriding `run.environment`.
pub const ENVIRONMENT_ENV_VAR: &str = "CSIG_ENV";
/// Environment variable overriding `run.collections` (comma separated).
pub const COLLECTIONS_ENV_VAR: &str = "CSIG_COLLECTIONS";
/// Environment variable overriding `logging.level`.
pub const LOG_LEVEL_ENV_VAR: &str = "CANARY_LOG_LEVEL";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Minimum step timeout in milliseconds.
pub(crate) const MIN_TIMEOUT_MS: u64 = 100;
/// Maximum step timeout in milliseconds.
pub(crate) const MAX_TIMEOUT_MS: u64 = 60_000;
/// Default step and verifier timeout in milliseconds.
pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 5_000;
/// Default maximum response size in bytes.
pub(crate) const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;
/// Maximum allowed response size in bytes.
pub(crate) const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;
/// Default redirect hops for metadata requests.
pub(crate) const DEFAULT_MAX_REDIRECTS: usize = 5;
/// Maximum redirect hops for metadata requests.
pub(crate) const MAX_REDIRECTS: usize = 20;
/// Maximum number of collections or XPI URLs per run.
pub(crate) const MAX_TARGETS: usize = 256;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Canary configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanaryConfig {
    /// Run defaults.
    #[serde(default)]
    pub run: RunConfig,
    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,
    /// External verification primitive.
    #[serde(default)]
    pub verifier: Option<VerifierConfig>,
    /// External addon installer.
    #[serde(default)]
    pub addons: AddonsConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Run defaults, overridable from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Environment key, such as `prod` or `stage-preview`.
    #[serde(default)]
    pub environment: Option<String>,
    /// `bucket/collection` targets.
    #[serde(default)]
    pub collections: Vec<String>,
    /// XPI URLs for addon runs.
    #[serde(default)]
    pub xpi_urls: Vec<String>,
    /// How local and remote records are combined.
    #[serde(default)]
    pub merge_mode: MergeMode,
    /// Bound on each fetch and install, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub step_timeout_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            environment: None,
            collections: Vec::new(),
            xpi_urls: Vec::new(),
            merge_mode: MergeMode::default(),
            step_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl RunConfig {
    /// Validates run defaults.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(environment) = &self.environment {
            EnvironmentKey::parse(environment)
                .map_err(|err| ConfigError::Invalid(format!("run.environment: {err}")))?;
        }
        if !self.collections.is_empty() && !self.xpi_urls.is_empty() {
            return Err(ConfigError::Invalid(
                "run.collections and run.xpi_urls are mutually exclusive".to_string(),
            ));
        }
        if self.collections.len() > MAX_TARGETS || self.xpi_urls.len() > MAX_TARGETS {
            return Err(ConfigError::Invalid(format!("run allows at most {MAX_TARGETS} targets")));
        }
        for path in &self.collections {
            CollectionScope::parse(path)
                .map_err(|err| ConfigError::Invalid(format!("run.collections: {err}")))?;
        }
        for raw in &self.xpi_urls {
            let url = Url::parse(raw)
                .map_err(|err| ConfigError::Invalid(format!("run.xpi_urls: {raw}: {err}")))?;
            if !matches!(url.scheme(), "https" | "http") {
                return Err(ConfigError::Invalid(format!(
                    "run.xpi_urls: {raw}: unsupported scheme"
                )));
            }
        }
        validate_timeout("run.step_timeout_ms", self.step_timeout_ms)
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// User agent for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Allow cleartext HTTP.
    #[serde(default)]
    pub allow_http: bool,
    /// Redirect hops followed by metadata requests.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Optional host allowlist.
    #[serde(default)]
    pub allowed_hosts: Option<Vec<String>>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: default_user_agent(),
            allow_http: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            allowed_hosts: None,
        }
    }
}

impl HttpConfig {
    /// Validates transport limits.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout("http.timeout_ms", self.timeout_ms)?;
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "http.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES}"
            )));
        }
        if self.max_redirects > MAX_REDIRECTS {
            return Err(ConfigError::Invalid(format!(
                "http.max_redirects must be at most {MAX_REDIRECTS}"
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("http.user_agent must be non-empty".to_string()));
        }
        if let Some(hosts) = &self.allowed_hosts
            && hosts.iter().any(|host| host.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "http.allowed_hosts entries must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// External verification primitive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifierConfig {
    /// Executable to spawn per verification.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Bound on one verification, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl VerifierConfig {
    /// Validates the verifier command.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("verifier.command", &self.command)?;
        validate_timeout("verifier.timeout_ms", self.timeout_ms)
    }
}

/// External addon installer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddonsConfig {
    /// Executable to spawn per install.
    #[serde(default)]
    pub installer_command: Option<String>,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Log level for audit events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Run and target events only.
    #[default]
    Info,
    /// Adds per-stage events and sets the settings log level.
    Debug,
}

impl LogLevel {
    /// Parses a driver log level, case-insensitively.
    ///
    /// `debug` selects [`LogLevel::Debug`]; any other named level, such as
    /// `WARNING` or `ERROR`, runs at [`LogLevel::Info`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the value is blank.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid("log level must be non-empty".to_string()));
        }
        if trimmed.eq_ignore_ascii_case("debug") {
            Ok(Self::Debug)
        } else {
            Ok(Self::Info)
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Audit event level.
    #[serde(default)]
    pub level: LogLevel,
    /// Append audit events to this file instead of stderr.
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
}

impl CanaryConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        Self::load_resolved(&resolved)
    }

    /// Loads configuration, falling back to defaults when no file exists.
    ///
    /// An explicit path or `CSIG_CANARY_CONFIG` must point at a readable file;
    /// only the implicit `csig-canary.toml` may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        let implicit = path.is_none() && env::var_os(CONFIG_ENV_VAR).is_none();
        if implicit && !resolved.exists() {
            let mut config = Self::default();
            config.apply_env_overrides(|key| env::var(key).ok())?;
            config.validate()?;
            return Ok(config);
        }
        Self::load_resolved(&resolved)
    }

    /// Reads, parses, overrides, and validates one resolved path.
    fn load_resolved(resolved: &Path) -> Result<Self, ConfigError> {
        validate_path(resolved)?;
        let bytes = fs::read(resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies driver environment overrides through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `CANARY_LOG_LEVEL` is unknown.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(environment) = lookup(ENVIRONMENT_ENV_VAR) {
            self.run.environment = Some(environment.trim().to_string());
        }
        if let Some(collections) = lookup(COLLECTIONS_ENV_VAR) {
            self.run.collections = collections
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect();
            self.run.xpi_urls.clear();
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV_VAR) {
            self.logging.level = LogLevel::parse(&level)?;
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run.validate()?;
        self.http.validate()?;
        if let Some(verifier) = &self.verifier {
            verifier.validate()?;
        }
        if let Some(command) = &self.addons.installer_command {
            validate_path_string("addons.installer_command", command)?;
        }
        if let Some(path) = &self.logging.audit_log {
            validate_path_string("logging.audit_log", &path.to_string_lossy())?;
        }
        Ok(())
    }

    /// Returns the orchestrator tuning implied by this configuration.
    #[must_use]
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let verify_timeout_ms =
            self.verifier.as_ref().map_or(DEFAULT_TIMEOUT_MS, |verifier| verifier.timeout_ms);
        OrchestratorConfig {
            step_timeout: Duration::from_millis(self.run.step_timeout_ms),
            verify_timeout: Duration::from_millis(verify_timeout_ms),
            merge_mode: self.run.merge_mode,
            debug: self.logging.level == LogLevel::Debug,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading config.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default timeout for serde.
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Default response limit for serde.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Default redirect hops for serde.
const fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

/// Default user agent for serde.
fn default_user_agent() -> String {
    concat!("csig-canary/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a millisecond timeout against the allowed range.
fn validate_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if (MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field} must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}"
        )))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
