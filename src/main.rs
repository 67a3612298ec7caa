use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use auth_session::auth::adapters::grpc::start_server;
use auth_session::auth::adapters::identity_toolkit::IdentityToolkitClient;
use auth_session::auth::{AuthCoordinator, IdentityPlatform, ProviderRegistry, SessionState};
use auth_session::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting auth session service...");

    // Load configuration
    let settings = Settings::new().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let platform: Arc<dyn IdentityPlatform> =
        Arc::new(IdentityToolkitClient::new(settings.firebase.clone())?);
    let coordinator = Arc::new(AuthCoordinator::new(ProviderRegistry::from_settings(
        platform, &settings,
    )));

    let _session_log = coordinator.session().subscribe(|state| match state {
        SessionState::Authenticated(identity) => info!(user = identity.id(), "session authenticated"),
        SessionState::Unauthenticated => info!("session cleared"),
    });

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;

    if let Err(e) = start_server(coordinator, addr, shutdown_signal()).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

// Signal handling for graceful shutdown
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
