//! Folio support chat server entry point.
//!
//! Binary name: `folio`
//!
//! Parses CLI arguments, initializes the database and services, bootstraps
//! the admin account, then starts the REST API and WebSocket server.

mod http;
mod state;

use std::path::PathBuf;

use clap::Parser;
use folio_core::auth::provider::AuthProvider;
use tracing_subscriber::EnvFilter;

use state::AppState;

#[derive(Parser)]
#[command(name = "folio", version, about = "Portfolio support chat server")]
struct Cli {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1", env = "FOLIO_HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8080, env = "FOLIO_PORT")]
    port: u16,

    /// Data directory (defaults to ~/.folio)
    #[arg(long, env = "FOLIO_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Username for the bootstrapped admin account
    #[arg(long, default_value = "admin")]
    admin_user: String,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "info,folio=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    // Initialize application state (DB, registry, services)
    let state = AppState::init(cli.data_dir.clone()).await?;

    // Bootstrap the admin account, print the token on first run
    if let Some(token) = state.auth.ensure_admin(&cli.admin_user).await? {
        println!();
        println!(
            "  {} Admin token generated (save this -- it won't be shown again):",
            console::style("🔑").bold()
        );
        println!();
        println!("  {}", console::style(&token).yellow().bold());
        println!();
    }

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Folio chat listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("\n  Server stopped.");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
