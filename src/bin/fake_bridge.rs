// Standalone fake automation bridge for trying the CLI without a browser

use std::net::SocketAddr;
use tracing::info;

include!("../../tests/common/fake_bridge_app.rs");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (app, _state) = create_app();

    // Parse port from args or use default
    let port: u16 = std::env::args()
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");

    info!("Fake bridge listening on http://{}", addr);

    axum::serve(listener, app).await.expect("Server failed");
}
