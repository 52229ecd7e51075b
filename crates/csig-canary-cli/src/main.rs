// crates/csig-canary-cli/src/main.rs
// ============================================================================
// Module: Canary CLI Entry Point
// Description: Command dispatcher for canary runs and diagnostics.
// Purpose: Wire configured collaborators into a run and print its report.
// Dependencies: async-trait, clap, csig-canary-config, csig-canary-core,
//               csig-canary-providers, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! `csig-canary run` builds the driver arguments from flags, an `--args` JSON
//! file, or the config file, executes one run, and prints the JSON report
//! `{"success", "result"}` to stdout. The exit code is non-zero when the run
//! fails. `csig-canary info` applies an environment to a fresh settings store
//! and prints the diagnostic preference snapshot. `csig-canary config
//! validate` loads and validates configuration only.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use csig_canary_config::CanaryConfig;
use csig_canary_config::HttpConfig;
use csig_canary_core::AddonInstaller;
use csig_canary_core::AuditSink;
use csig_canary_core::BaseEnvironment;
use csig_canary_core::CanaryServices;
use csig_canary_core::CollectionTransport;
use csig_canary_core::ContentSignaturePrimitive;
use csig_canary_core::EnvironmentKey;
use csig_canary_core::FileAuditSink;
use csig_canary_core::MemorySettingsStore;
use csig_canary_core::PrimitiveError;
use csig_canary_core::PrimitiveRequest;
use csig_canary_core::SettingChange;
use csig_canary_core::SettingsSnapshot;
use csig_canary_core::SettingsStore;
use csig_canary_core::StderrAuditSink;
use csig_canary_core::TelemetryRecorder;
use csig_canary_core::addon_dev_root;
use csig_canary_core::environment::resolve;
use csig_canary_core::execute;
use csig_canary_core::settings::ADDON_DEV_ROOT_KEY;
use csig_canary_core::settings::ADDON_INFO_KEYS;
use csig_canary_core::settings::CONTENT_SIGNATURE_INFO_KEYS;
use csig_canary_core::worker_info;
use csig_canary_providers::ExternalCommand;
use csig_canary_providers::ExternalInstaller;
use csig_canary_providers::ExternalVerifier;
use csig_canary_providers::HttpTransport;
use csig_canary_providers::HttpTransportConfig;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of an `--args` JSON file.
const MAX_ARGS_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "csig-canary", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute one canary run and print its report.
    Run(RunCommand),
    /// Print the diagnostic preferences an environment produces.
    Info(InfoCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `run`.
#[derive(Args, Debug, Default)]
struct RunCommand {
    /// Config file path (defaults to `csig-canary.toml` or `CSIG_CANARY_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Environment key, overriding the config file.
    #[arg(long, value_name = "ENV")]
    env: Option<String>,
    /// `bucket/collection` targets, comma separated.
    #[arg(long, value_name = "LIST", value_delimiter = ',', conflicts_with = "xpi_urls")]
    collections: Vec<String>,
    /// XPI URLs for an addon run, comma separated.
    #[arg(long = "xpi-urls", value_name = "LIST", value_delimiter = ',')]
    xpi_urls: Vec<String>,
    /// Raw driver arguments as a JSON file; replaces the target flags.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["env", "collections", "xpi_urls"])]
    args: Option<PathBuf>,
}

/// Arguments for `info`.
#[derive(Args, Debug)]
struct InfoCommand {
    /// Environment key to apply.
    #[arg(long, value_name = "ENV")]
    env: String,
    /// Report addon preferences instead of content-signature ones.
    #[arg(long)]
    addon: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file path (defaults to `csig-canary.toml` or `CSIG_CANARY_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing failures.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors raised while reading a bounded input file.
#[derive(Debug, Error)]
enum ReadLimitError {
    /// The file could not be read.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The file exceeds the limit.
    #[error("file exceeds {limit} bytes")]
    TooLarge {
        /// Maximum accepted size.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(command) => command_run(command).await,
        Commands::Info(command) => command_info(&command),
        Commands::Config {
            command,
        } => command_config(command),
    }
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command.
async fn command_run(command: RunCommand) -> CliResult<ExitCode> {
    let config = CanaryConfig::load_or_default(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let args = build_run_args(&command, &config)?;
    let local = args_environment(&args).is_some_and(|key| key.base == BaseEnvironment::Local);
    let services = build_services(&config, local)?;
    let report = execute(&args, &services, config.orchestrator_config()).await;
    write_json(&report)?;
    Ok(if report.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Builds the driver arguments from `--args`, flags, then config defaults.
fn build_run_args(command: &RunCommand, config: &CanaryConfig) -> CliResult<Value> {
    if let Some(path) = &command.args {
        let bytes = read_bytes_with_limit(path, MAX_ARGS_BYTES).map_err(|err| {
            CliError::new(format!("failed to read args {}: {err}", path.display()))
        })?;
        return serde_json::from_slice(&bytes)
            .map_err(|err| CliError::new(format!("invalid args json: {err}")));
    }
    let environment = command
        .env
        .clone()
        .or_else(|| config.run.environment.clone())
        .ok_or_else(|| CliError::new("an environment is required (--env or run.environment)"))?;
    if !command.xpi_urls.is_empty() {
        return Ok(json!({ "env": environment, "xpi_urls": command.xpi_urls }));
    }
    if !command.collections.is_empty() {
        return Ok(json!({ "env": environment, "collections": command.collections }));
    }
    if !config.run.xpi_urls.is_empty() {
        return Ok(json!({ "env": environment, "xpi_urls": config.run.xpi_urls }));
    }
    Ok(json!({ "env": environment, "collections": config.run.collections }))
}

/// Parses the environment named by driver arguments, when it is a plain string.
fn args_environment(args: &Value) -> Option<EnvironmentKey> {
    let raw = args.get("env").or_else(|| args.get("environment"))?;
    let raw = raw.as_str().or_else(|| raw.get("autograph_env").and_then(Value::as_str))?;
    EnvironmentKey::parse(raw).ok()
}

/// Wires the configured collaborators.
fn build_services(config: &CanaryConfig, local: bool) -> CliResult<CanaryServices> {
    let transport = HttpTransport::new(transport_config(&config.http, local))
        .map_err(|err| CliError::new(format!("failed to build transport: {err}")))?;
    let primitive: Arc<dyn ContentSignaturePrimitive> = match &config.verifier {
        Some(verifier) => Arc::new(ExternalVerifier::new(ExternalCommand::new(
            verifier.command.clone(),
            verifier.args.clone(),
        ))),
        None => Arc::new(UnconfiguredVerifier),
    };
    let installer = config.addons.installer_command.as_ref().map(|program| {
        Arc::new(ExternalInstaller::new(ExternalCommand::new(
            program.clone(),
            config.addons.args.clone(),
        ))) as Arc<dyn AddonInstaller>
    });
    let audit: Arc<dyn AuditSink> = match &config.logging.audit_log {
        Some(path) => Arc::new(FileAuditSink::new(path).map_err(|err| {
            CliError::new(format!("failed to open audit log {}: {err}", path.display()))
        })?),
        None => Arc::new(StderrAuditSink),
    };
    Ok(CanaryServices {
        transport: Arc::new(transport) as Arc<dyn CollectionTransport>,
        primitive,
        settings: Arc::new(MemorySettingsStore::new()) as Arc<dyn SettingsStore>,
        audit,
        installer,
    })
}

/// Maps config-file HTTP settings onto the transport; `local` allows cleartext.
fn transport_config(http: &HttpConfig, local: bool) -> HttpTransportConfig {
    HttpTransportConfig {
        allow_http: http.allow_http || local,
        timeout_ms: http.timeout_ms,
        max_response_bytes: http.max_response_bytes,
        max_redirects: http.max_redirects,
        allowed_hosts: http
            .allowed_hosts
            .as_ref()
            .map(|hosts| hosts.iter().cloned().collect::<BTreeSet<String>>()),
        user_agent: http.user_agent.clone(),
    }
}

/// Primitive used when no verifier command is configured.
struct UnconfiguredVerifier;

#[async_trait]
impl ContentSignaturePrimitive for UnconfiguredVerifier {
    async fn verify_content_signature(
        &self,
        _request: PrimitiveRequest<'_>,
        _telemetry: &TelemetryRecorder,
    ) -> Result<bool, PrimitiveError> {
        Err(PrimitiveError::Unavailable("no verifier command configured".to_string()))
    }
}

// ============================================================================
// SECTION: Info Command
// ============================================================================

/// Executes the `info` command.
fn command_info(command: &InfoCommand) -> CliResult<ExitCode> {
    let snapshot = info_snapshot(&command.env, command.addon)?;
    write_json(&snapshot)?;
    Ok(ExitCode::SUCCESS)
}

/// Applies `environment` to a fresh store and snapshots the diagnostic keys.
fn info_snapshot(environment: &str, addon: bool) -> CliResult<SettingsSnapshot> {
    let store = MemorySettingsStore::new();
    let keys = if addon {
        let dev_root = addon_dev_root(environment).map_err(|err| CliError::new(err.to_string()))?;
        store
            .apply(&[SettingChange::set_bool(ADDON_DEV_ROOT_KEY, dev_root)])
            .map_err(|err| CliError::new(err.to_string()))?;
        ADDON_INFO_KEYS
    } else {
        let env = resolve(environment).map_err(|err| CliError::new(err.to_string()))?;
        store.apply(&env.settings_changes()).map_err(|err| CliError::new(err.to_string()))?;
        CONTENT_SIGNATURE_INFO_KEYS
    };
    worker_info(&store, keys).map_err(|err| CliError::new(err.to_string()))
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = CanaryConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error(&err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Reads a file, failing when it exceeds `limit` bytes.
fn read_bytes_with_limit(path: &Path, limit: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path)?;
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut bytes = Vec::new();
    file.take(cap).read_to_end(&mut bytes)?;
    if bytes.len() > limit {
        return Err(ReadLimitError::TooLarge {
            limit,
        });
    }
    Ok(bytes)
}

/// Writes a value as pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to encode output: {err}")))?;
    write_stdout_line(&text).map_err(|err| CliError::new(output_error(&err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(error: &std::io::Error) -> String {
    format!("failed to write output: {error}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
