// # vmaasctl - VMaaS reconciliation runner
//
// ⚠️ ARCHITECTURAL CONSTRAINTS ⚠️
//
// - This is a THIN integration layer ONLY
// - DO NOT add lifecycle, diff or retry logic here
// - All reconciliation logic MUST be in vmaas-core
// - Connection settings come from environment variables; the operation
//   comes from the command line
//
// vmaasctl is responsible for:
// 1. Reading connection settings from environment variables
// 2. Initializing tracing and the runtime
// 3. Wiring the HTTP client, the state file and the resource registry
// 4. Running exactly one reconciliation and printing its result
//
// ## Usage
//
// ```text
// vmaasctl apply   <resource-type> <name> <declaration.json>
// vmaasctl refresh <resource-type> <name>
// vmaasctl destroy <resource-type> <name>
// vmaasctl read    <data-source-type> <arguments.json>
// ```
//
// ## Configuration
//
// - `VMAAS_API_URL`: Base URL of the cloud-management API (required)
// - `VMAAS_API_TOKEN`: API token (required)
// - `VMAAS_LOCATION`: Location scope (optional)
// - `VMAAS_SPACE`: Space scope (optional)
// - `VMAAS_STATE_PATH`: Path to the state file (default: vmaas-state.json)
// - `VMAAS_RETRY_DELAY_SECS`: Delay between retries (default: 2)
// - `VMAAS_RETRY_TIMEOUT_SECS`: Retry ceiling (default: 7200)
// - `VMAAS_LOG_LEVEL`: trace, debug, info, warn or error (default: info)
//
// ## Example
//
// ```bash
// export VMAAS_API_URL=https://cmp.example.com
// export VMAAS_API_TOKEN=your_token
// export VMAAS_STATE_PATH=/var/lib/vmaas/state.json
//
// vmaasctl apply instance web-1 web-1.json
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use vmaas_cmp_client::CmpClient;
use vmaas_core::{
    FileStateStore, ProviderConfig, ProviderContext, ReconcileEvent, Reconciler, ResourceRegistry,
    RetryConfig,
};

/// Capacity of the reconciler event channel
const EVENT_CAPACITY: usize = 64;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum VmaasExitCode {
    /// The reconciliation succeeded
    Success = 0,
    /// Configuration, usage or startup error
    ConfigError = 1,
    /// The reconciliation failed
    RuntimeError = 2,
}

impl From<VmaasExitCode> for ExitCode {
    fn from(code: VmaasExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    api_url: String,
    api_token: String,
    location: Option<String>,
    space: Option<String>,
    state_path: PathBuf,
    retry_delay_secs: Option<u64>,
    retry_timeout_secs: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            api_url: env::var("VMAAS_API_URL").context("VMAAS_API_URL is required")?,
            api_token: env::var("VMAAS_API_TOKEN").context("VMAAS_API_TOKEN is required")?,
            location: non_empty_var("VMAAS_LOCATION"),
            space: non_empty_var("VMAAS_SPACE"),
            state_path: env::var("VMAAS_STATE_PATH")
                .unwrap_or_else(|_| "vmaas-state.json".to_string())
                .into(),
            retry_delay_secs: parse_var("VMAAS_RETRY_DELAY_SECS")?,
            retry_timeout_secs: parse_var("VMAAS_RETRY_TIMEOUT_SECS")?,
            log_level: env::var("VMAAS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate ranges the core does not check
    fn validate(&self) -> Result<()> {
        if let Some(delay) = self.retry_delay_secs
            && !(1..=300).contains(&delay)
        {
            anyhow::bail!(
                "VMAAS_RETRY_DELAY_SECS must be between 1 and 300 seconds. Got: {}",
                delay
            );
        }

        if let Some(timeout) = self.retry_timeout_secs
            && !(60..=86_400).contains(&timeout)
        {
            anyhow::bail!(
                "VMAAS_RETRY_TIMEOUT_SECS must be between 60 and 86400 seconds. Got: {}",
                timeout
            );
        }

        if let Some(parent) = self.state_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "VMAAS_STATE_PATH parent directory does not exist: {}. \
                 Create it first: mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        if log_level(&self.log_level).is_none() {
            anyhow::bail!(
                "VMAAS_LOG_LEVEL '{}' is not valid. \
                 Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        self.provider_config().validate()?;
        Ok(())
    }

    fn provider_config(&self) -> ProviderConfig {
        let mut retry = RetryConfig::default();
        if let Some(delay) = self.retry_delay_secs {
            retry.delay_secs = delay;
        }
        if let Some(timeout) = self.retry_timeout_secs {
            retry.timeout_secs = timeout;
        }

        let mut config =
            ProviderConfig::new(self.api_url.clone(), self.api_token.clone()).with_retry(retry);
        if let Some(location) = &self.location {
            config = config.with_location(location.clone());
        }
        if let Some(space) = &self.space {
            config = config.with_space(space.clone());
        }
        config
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_var(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a whole number of seconds. Got: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

fn log_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

#[derive(Parser, Debug)]
#[command(name = "vmaasctl")]
#[command(about = "Reconcile one VMaaS resource", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// One reconciliation requested on the command line
#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Create or update a resource to match its declaration
    Apply {
        /// Resource type, e.g. instance
        resource_type: String,
        /// Name the resource is managed under
        name: String,
        /// JSON file holding the declaration
        declaration: PathBuf,
    },
    /// Re-read a managed resource and store what the API reports
    Refresh {
        /// Resource type, e.g. instance
        resource_type: String,
        /// Name the resource is managed under
        name: String,
    },
    /// Delete a managed resource and forget it
    Destroy {
        /// Resource type, e.g. instance
        resource_type: String,
        /// Name the resource is managed under
        name: String,
    },
    /// Look up a data source
    Read {
        /// Data source type, e.g. datastore
        data_source_type: String,
        /// JSON file holding the lookup arguments
        arguments: PathBuf,
    },
}

fn main() -> ExitCode {
    let command = match Cli::try_parse() {
        Ok(cli) => cli.command,
        Err(e) => {
            // Help and version go to stdout and are not failures
            let _ = e.print();
            return if e.use_stderr() {
                VmaasExitCode::ConfigError.into()
            } else {
                VmaasExitCode::Success.into()
            };
        }
    };

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return VmaasExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return VmaasExitCode::ConfigError.into();
    }

    let level = log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return VmaasExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return VmaasExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run(config, command).await {
            Ok(output) => {
                println!("{}", output);
                VmaasExitCode::Success
            }
            Err(e) => {
                error!("Reconciliation failed: {:#}", e);
                VmaasExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run one reconciliation and render its result as JSON
async fn run(config: Config, command: Command) -> Result<String> {
    let provider_config = config.provider_config();
    let client = Arc::new(CmpClient::new(&provider_config)?);
    let ctx = ProviderContext::new(client.clone(), client, provider_config.retry.clone());
    let registry = ResourceRegistry::with_builtin();

    info!("Using state file {}", config.state_path.display());
    let store = Arc::new(FileStateStore::new(&config.state_path).await?);
    let (reconciler, mut events) = Reconciler::new(store, EVENT_CAPACITY);

    let outcome = match command {
        Command::Apply {
            resource_type,
            name,
            declaration,
        } => {
            let resource = registry.create_resource(&resource_type, &ctx)?;
            let desired = read_document(&declaration)?;
            let record = reconciler.apply(resource.as_ref(), &name, desired).await;
            record.and_then(|r| Ok(serde_json::to_string_pretty(&r)?))
        }
        Command::Refresh {
            resource_type,
            name,
        } => {
            let resource = registry.create_resource(&resource_type, &ctx)?;
            let record = reconciler.refresh(resource.as_ref(), &name).await;
            record.and_then(|r| Ok(serde_json::to_string_pretty(&r)?))
        }
        Command::Destroy {
            resource_type,
            name,
        } => {
            let resource = registry.create_resource(&resource_type, &ctx)?;
            reconciler
                .destroy(resource.as_ref(), &name)
                .await
                .map(|()| format!("{{\"destroyed\": \"{}.{}\"}}", resource_type, name))
        }
        Command::Read {
            data_source_type,
            arguments,
        } => {
            let source = registry.create_data_source(&data_source_type, &ctx)?;
            let args = read_document(&arguments)?;
            reconciler
                .read_data_source(source.as_ref(), args)
                .await
                .and_then(|(document, id)| {
                    Ok(serde_json::to_string_pretty(
                        &serde_json::json!({ "id": id, "document": document }),
                    )?)
                })
        }
    };

    log_events(&mut events);
    reconciler.flush().await?;

    Ok(outcome?)
}

fn read_document(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn log_events(events: &mut mpsc::Receiver<ReconcileEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            ReconcileEvent::Planned { key, action } => info!("{}: planned {}", key, action),
            ReconcileEvent::Succeeded { key, action, id } => {
                info!("{}: {} succeeded (id {:?})", key, action, id)
            }
            ReconcileEvent::Failed { key, action, error } => {
                warn!("{}: {} failed: {}", key, action, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("vmaasctl").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse(&["apply", "instance", "web-1", "web-1.json"]).unwrap(),
            Command::Apply {
                resource_type: "instance".to_string(),
                name: "web-1".to_string(),
                declaration: PathBuf::from("web-1.json"),
            }
        );
        assert_eq!(
            parse(&["destroy", "instance", "web-1"]).unwrap(),
            Command::Destroy {
                resource_type: "instance".to_string(),
                name: "web-1".to_string(),
            }
        );
        assert!(matches!(
            parse(&["read", "lb_ssl_server_profile", "profile.json"]).unwrap(),
            Command::Read { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_bad_usage() {
        use clap::error::ErrorKind;

        let missing = parse(&["apply", "instance", "web-1"]).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::MissingRequiredArgument);

        let unknown = parse(&["plan", "instance", "web-1"]).unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::InvalidSubcommand);

        assert!(parse(&["refresh", "instance", "web-1", "extra"]).is_err());
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(log_level("verbose"), None);
    }

    #[test]
    fn test_retry_overrides_reach_provider_config() {
        let config = Config {
            api_url: "https://cmp.example.com".to_string(),
            api_token: "token".to_string(),
            location: Some("eu-west".to_string()),
            space: None,
            state_path: PathBuf::from("state.json"),
            retry_delay_secs: Some(5),
            retry_timeout_secs: None,
            log_level: "info".to_string(),
        };

        let provider = config.provider_config();
        assert_eq!(provider.retry.delay_secs, 5);
        assert_eq!(provider.retry.timeout_secs, RetryConfig::default().timeout_secs);
        assert_eq!(provider.location.as_deref(), Some("eu-west"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_retry_is_rejected() {
        let config = Config {
            api_url: "https://cmp.example.com".to_string(),
            api_token: "token".to_string(),
            location: None,
            space: None,
            state_path: PathBuf::from("state.json"),
            retry_delay_secs: Some(0),
            retry_timeout_secs: None,
            log_level: "info".to_string(),
        };
        assert!(config.validate().is_err());
    }
}
