mod auth;
mod error;
mod handlers;
mod models;
mod rate_limit;
mod router;
mod state;

use router::create_router;
use state::AppState;
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Starting spot exchange gateway");

    let jwt_secret =
        std::env::var("GATEWAY_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".to_string());
    let state = AppState::new(jwt_secret);

    // Create router
    let app = create_router(state);

    // Bind and serve; ConnectInfo feeds client ips into the audit trail
    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
