// Common test utilities and fixtures

#![allow(dead_code)]

pub mod fake_bridge_app;

use std::time::Duration;

use fake_bridge_app::BridgeState;
use stepwise::ClientSettings;

/// Start the fake bridge on an ephemeral port; returns its base URL
pub async fn spawn_bridge() -> (String, BridgeState) {
    let (app, state) = fake_bridge_app::create_app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });
    (format!("http://{}", addr), state)
}

/// Client settings with every pause removed and short bounds
pub fn fast_settings() -> ClientSettings {
    ClientSettings {
        click_wait_ms: 500,
        connect_timeout: Duration::from_secs(5),
        call_timeout: Duration::from_secs(5),
        ..ClientSettings::without_delays()
    }
}
