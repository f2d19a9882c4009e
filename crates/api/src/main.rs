// Martin Luther admin server
// Entry point: serve the admin area, or enrol a new authenticator secret

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use portal_api::cleanup::start_cleanup_task;
use portal_api::state::connect_store;
use portal_api::{routes, AppState, Config};
use portal_auth::totp;
use portal_models::{SharedClock, SystemClock};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Admin session and trusted-device server for the Martin Luther website
#[derive(Parser)]
#[command(name = "portal-api", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Generate a fresh base32 secret for ADMIN_TOTP_SECRET
    GenTotpSecret {
        /// Account label shown in the authenticator app
        #[arg(long, default_value = "admin")]
        account: String,
        /// Issuer shown in the authenticator app
        #[arg(long, default_value = "Martin Luther Admin")]
        issuer: String,
        /// Also write the enrolment QR code as a PNG
        #[arg(long)]
        qr: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,portal_api=debug,tower_http=debug".into()),
        )
        .init();

    match Cli::parse().command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::GenTotpSecret {
            account,
            issuer,
            qr,
        } => gen_totp_secret(&account, &issuer, qr),
    }
}

async fn serve() -> anyhow::Result<()> {
    tracing::info!("Starting admin server");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Missing secrets stop the process here; there is no fallback password
    let config = Config::from_env().context("Invalid configuration")?;
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Server: {}:{}", config.server_host, config.server_port);

    let clock: SharedClock = Arc::new(SystemClock);

    tracing::info!("Opening {} session store...", config.store);
    let store = connect_store(&config, clock.clone())
        .await
        .with_context(|| format!("Failed to open {} session store", config.store))?;
    tracing::info!("Session store ready");

    start_cleanup_task(store.clone(), config.cleanup_interval_secs);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = Arc::new(AppState::new(config, store, clock)?);
    let app = routes::create_router(state);

    tracing::info!("Routes configured:");
    tracing::info!("   GET  /health");
    tracing::info!("   GET  /admin/login");
    tracing::info!("   POST /admin/login");
    tracing::info!("   GET  /admin/dashboard");
    tracing::info!("   GET  /admin/check");
    tracing::info!("   GET  /api/admin-session");
    tracing::info!("   POST /admin/logout");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server ready at http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

fn gen_totp_secret(account: &str, issuer: &str, qr: Option<PathBuf>) -> anyhow::Result<()> {
    let secret = totp::generate_secret();
    let uri = totp::generate_totp_uri(&secret, account, issuer);

    println!("ADMIN_TOTP_SECRET={}", secret);
    println!("{}", uri);

    if let Some(path) = qr {
        let png = totp::generate_qr_code(&uri)?;
        std::fs::write(&path, png)
            .with_context(|| format!("Failed to write QR code to {}", path.display()))?;
        println!("QR code written to {}", path.display());
    }

    Ok(())
}
