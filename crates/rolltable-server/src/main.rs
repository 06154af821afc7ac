use tracing_subscriber::EnvFilter;

use rolltable_server::config::ServerConfig;
use rolltable_server::{build_app, spawn_room_reaper};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load();
    config.validate();
    let listen_addr = config.listen_addr.clone();

    let (app, state) = build_app(config);
    spawn_room_reaper(state);

    tracing::info!(addr = %listen_addr, "Rolltable server starting");

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind listener");
            std::process::exit(1);
        },
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}
