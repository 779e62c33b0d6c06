//! apprepo CLI application
//!
//! Command-line client for tenant-scoped application-file repositories.
//! Resolves service contexts on demand, downloads concurrently, and cleans
//! up the platform resources it created.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use apprepo::cli::{
    handle_delete, handle_destinations, handle_get, handle_info, handle_list, handle_push, Cli,
    Commands,
};
use apprepo::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    init_logging(&cli);

    info!("apprepo v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::List(args) => handle_list(args).await,
        Commands::Get(args) => handle_get(args).await,
        Commands::Info(args) => handle_info(args).await,
        Commands::Push(args) => handle_push(args).await,
        Commands::Delete(args) => handle_delete(args).await,
        Commands::Destinations(args) => handle_destinations(args).await,
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let filter = match format!("apprepo={}", log_level).parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();
}
