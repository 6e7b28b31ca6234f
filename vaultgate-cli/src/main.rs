//! Vaultgate command-line entry point.
//!
//! `serve` runs the MCP gateway on stdio; `doctor` validates a
//! configuration file and reports, per mapping, whether its environment
//! variable is set — never the value.
//!
//! Stdout is reserved for the MCP transport (and doctor's report); all
//! diagnostics go to stderr through `tracing`.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use vaultgate_core::constants::DEFAULT_CONFIG_FILE;
use vaultgate_core::{SecretResolver, VaultConfig};
use vaultgate_mcp::{ToolDispatcher, VaultServer};

const EXIT_OK: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_CONFIG: u8 = 2;
const EXIT_MISSING_DEPENDENCY: u8 = 3;

#[derive(Parser)]
#[command(
    name = "vaultgate",
    version,
    about = "Secrets-mediation gateway speaking MCP over stdio"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP gateway on stdio.
    Serve {
        /// Path to the configuration file.
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Validate a configuration file and report secret availability.
    Doctor {
        /// Path to the configuration file.
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let code = match cli.command {
        Command::Serve { config } => serve(&config).await,
        Command::Doctor { config } => doctor(&config),
    };
    ExitCode::from(code)
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(config_path: &Path) -> u8 {
    let config = match VaultConfig::load(config_path) {
        Ok(config) => Arc::new(config),
        Err(err) => {
            tracing::error!("invalid configuration: {err}");
            return EXIT_INVALID_CONFIG;
        }
    };

    let dispatcher = match ToolDispatcher::new(config) {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(err) => {
            tracing::error!("cannot start gateway: {err}");
            return EXIT_MISSING_DEPENDENCY;
        }
    };

    // Background maintenance: rate-window eviction and audit retention,
    // once a minute, cancelled on shutdown.
    let maintenance = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
            tick.tick().await;
            loop {
                tick.tick().await;
                dispatcher.maintenance_tick();
            }
        })
    };

    let server = VaultServer::new(Arc::clone(&dispatcher));
    let outcome = tokio::select! {
        served = server.serve_stdio() => served,
        () = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };
    maintenance.abort();

    match outcome {
        Ok(()) => EXIT_OK,
        Err(err) => {
            tracing::error!("server failed: {err}");
            EXIT_ERROR
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn doctor(config_path: &Path) -> u8 {
    println!("Checking configuration at {}", config_path.display());
    let config = match VaultConfig::load(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration is invalid: {err}");
            return EXIT_INVALID_CONFIG;
        }
    };
    println!(
        "Configuration is valid: {} mapping(s), {} policy(ies)",
        config.mappings.len(),
        config.policies.len()
    );

    let resolver = SecretResolver::new(Arc::new(config.clone()));
    for mapping in &config.mappings {
        let state = if resolver.is_available(mapping.secret_id.as_str()) {
            "environment variable set"
        } else {
            "environment variable MISSING or empty"
        };
        println!("  {:<24} {state}", mapping.secret_id.as_str());
    }

    if let Err(err) = probe_audit_dir(&config.settings.audit_dir) {
        eprintln!(
            "Audit directory {} is not writable: {}",
            config.settings.audit_dir.display(),
            err.kind()
        );
        return EXIT_MISSING_DEPENDENCY;
    }
    println!(
        "Audit directory {} is writable",
        config.settings.audit_dir.display()
    );
    EXIT_OK
}

/// Create the audit directory if needed and verify it accepts writes,
/// leaving nothing behind.
fn probe_audit_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(".vaultgate-doctor-probe");
    std::fs::write(&probe, b"probe")?;
    std::fs::remove_file(&probe)?;
    Ok(())
}
