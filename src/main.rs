//! rrlb - a round-robin HTTP reverse-proxy load balancer
//!
//! Usage:
//!     rrlb --config <path>
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

use rrlb::backend::BackendPool;
use rrlb::config::{load_config, validate_config, Config, ConfigError};
use rrlb::frontend::{Dispatcher, FrontendListener};
use rrlb::health::HealthMonitor;
use rrlb::util::init_logging;

/// A round-robin HTTP reverse-proxy load balancer.
#[derive(Parser, Debug)]
#[command(name = "rrlb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Override the listen port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config).with_context(|| {
        format!(
            "failed to load configuration from '{}'",
            cli.config.display()
        )
    })?;

    apply_overrides(&mut config, &cli)?;

    init_logging(&config.global.log_level, &config.global.log_format)
        .context("failed to initialize logging")?;

    if cli.validate {
        info!("configuration is valid");
        println!("Configuration is valid.");
        println!("  Listen: {}", config.listen);
        println!(
            "  Health check: every {} (timeout {})",
            humantime::format_duration(config.health_check.interval),
            humantime::format_duration(config.health_check.timeout)
        );
        println!("  Backends: {}", config.backends.len());
        for backend in &config.backends {
            println!("    - {}", backend.url);
        }
        return Ok(());
    }

    info!(
        config_path = %cli.config.display(),
        listen = %config.listen,
        backends = config.backends.len(),
        "rrlb starting"
    );

    run(config)
}

/// Apply command-line overrides, then validate the result again.
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(port) = cli.port {
        config.listen.set_port(port);
    }

    if let Some(level) = &cli.log_level {
        config.global.log_level = level.clone();
    }

    validate_config(config)
        .map_err(ConfigError::ValidationError)
        .context("invalid command-line override")?;

    Ok(())
}

/// Run the load balancer with the given configuration.
fn run(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async { run_async(config).await })
}

/// Async entry point for the load balancer.
async fn run_async(config: Config) -> Result<()> {
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let pool = BackendPool::from_config(&config.backends, config.proxy.connect_timeout)
        .context("invalid backend configuration")?;
    let pool = Arc::new(pool);

    for backend in pool.backends() {
        info!(url = %backend.url(), address = backend.address(), "configured backend");
    }

    // Liveness must be known before the first request is routed.
    let monitor = HealthMonitor::new(Arc::clone(&pool), &config.health_check);
    monitor.run_once().await;

    let monitor_handle = tokio::spawn(monitor.run(shutdown_tx.subscribe()));

    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&pool)));
    let listener = FrontendListener::bind(config.listen, dispatcher)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.listen))?;

    let listener_handle = tokio::spawn(listener.run(shutdown_tx.subscribe()));

    info!(
        listen = %config.listen,
        live = pool.live_count(),
        total = pool.len(),
        "rrlb is running"
    );
    info!("press Ctrl+C to stop");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received shutdown signal");
        }
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
        }
    }

    let _ = shutdown_tx.send(());

    let _ = listener_handle.await;
    let _ = monitor_handle.await;

    info!("rrlb shut down complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rrlb::config::parse_config;

    fn config() -> Config {
        parse_config("backends:\n  - url: \"http://localhost:8081\"\n").unwrap()
    }

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["rrlb", "--config", "rrlb.yaml"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_overrides_port_and_level() {
        let mut config = config();
        apply_overrides(&mut config, &cli(&["--port", "9090", "--log-level", "debug"])).unwrap();

        assert_eq!(config.listen.port(), 9090);
        assert_eq!(config.global.log_level, "debug");
    }

    #[test]
    fn test_unknown_cli_log_level_is_fatal() {
        let mut config = config();
        let err = apply_overrides(&mut config, &cli(&["--log-level", "verbose"])).unwrap_err();

        assert!(format!("{:#}", err).contains("invalid log level 'verbose'"));
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut config = config();
        apply_overrides(&mut config, &cli(&[])).unwrap();

        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.global.log_level, "info");
    }
}
