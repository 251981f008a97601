//! Contract router entry point.

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contract_router::api::{bind, handler_set};
use contract_router::bootstrap::{bootstrap, load_contract};
use contract_router::config::{Config, LogFormat};
use contract_router::contract::SourceChain;
use contract_router::error::StartupError;
use contract_router::metrics;
use contract_router::probe;
use contract_router::utils::shutdown_signal;

/// HTTP server bound to a validated OpenAPI contract.
#[derive(Parser, Debug)]
#[command(name = "contract-router")]
#[command(about = "Serve the API declared by a validated OpenAPI contract")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap and serve (default).
    Serve {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load, validate and bind the contract without listening.
    CheckContract,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = Args::parse();

    // Configuration drives the log format, so read it before logging starts.
    let config = Config::load();
    let log_format = config.as_ref().map(|c| c.log_format).unwrap_or_default();
    init_logging(args.verbose, log_format);

    let result = match config {
        Ok(config) => match args.command {
            Some(Command::CheckContract) => cmd_check_contract(&config),
            Some(Command::Serve { port }) => cmd_serve(config, port.or(args.port)).await,
            None => cmd_serve(config, args.port).await,
        },
        Err(e) => Err(StartupError::Config(e)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(stage = e.stage(), "Startup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("contract_router=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// Run every startup stage and print what would be served.
fn cmd_check_contract(config: &Config) -> Result<(), StartupError> {
    println!("======================================================================");
    println!("CONTRACT ROUTER - CONTRACT CHECK");
    println!("======================================================================");

    config.validate()?;

    let contract = load_contract(&SourceChain::bundled_then_file(&config.openapi_spec_path))?;
    println!("Title:   {}", contract.title());
    println!("Version: {}", contract.version());

    let bound = bind(&contract, &config.base_path, handler_set())?;
    println!("----------------------------------------------------------------------");
    println!("Routes:");
    for route in &bound.routes {
        println!("  {:<7} {:<30} {}", route.method, route.path, route.operation);
    }
    println!("======================================================================");
    println!("CONTRACT CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Bootstrap the router and serve until shutdown.
async fn cmd_serve(mut config: Config, port_override: Option<u16>) -> Result<(), StartupError> {
    if let Some(port) = port_override {
        config.port = port;
    }
    config.validate()?;

    info!("Base path: {:?}", config.base_path);
    info!("Contract fallback: {}", config.openapi_spec_path.display());

    metrics::init_metrics();
    if let Some(metrics_port) = config.metrics_port {
        metrics::install_exporter(metrics_port)?;
    }

    let probe = probe::from_config(&config)?;
    let booted = bootstrap(&config, probe)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {} ({} routes)", addr, booted.routes.len());

    axum::serve(listener, booted.router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
