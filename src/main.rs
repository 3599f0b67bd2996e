//! SEB Gate
//!
//! Serves a demo courseware host protected by the Secure Exam Browser gate.

use clap::Parser;
use seb_gate::{
    config::{LogFormat, load_config},
    courses::StaticCatalog,
    gate::GatePolicy,
    permissions::PermissionRegistry,
    server::run_server,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// SEB Gate - Secure Exam Browser access control for courseware
#[derive(Parser, Debug)]
#[command(name = "seb-gate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SEB_GATE_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SEB_GATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// HTTP server host
    #[arg(long, env = "SEB_GATE_HOST")]
    host: Option<String>,

    /// HTTP server port
    #[arg(long, env = "SEB_GATE_PORT")]
    port: Option<u16>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up SEB_GATE_* variables from a local .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = load_config(args.config.as_deref());

    // Logging is configured from the file, so it starts after loading
    let (level, format) = match &config {
        Ok(config) => (config.logging.level.clone(), config.logging.format),
        Err(_) => ("info".to_string(), LogFormat::Pretty),
    };
    let level = args.log_level.clone().unwrap_or(level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting SEB gate");

    let config = config.inspect_err(|e| error!(error = %e, "Failed to load configuration"))?;

    if args.check {
        StaticCatalog::from_config(&config.catalog)
            .inspect_err(|e| error!(error = %e, "Invalid course catalog"))?;
        let policy =
            GatePolicy::from_config(&config.gate, &config.keys, &PermissionRegistry::builtin())
                .inspect_err(|e| error!(error = %e, "Invalid gate policy"))?;
        info!(
            components = ?policy.component_names(),
            courses = config.catalog.courses.len(),
            "Configuration is valid"
        );
        return Ok(());
    }

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    run_server(&config, &host, port)
        .await
        .inspect_err(|e| error!(error = %e, "Server error"))?;

    Ok(())
}
