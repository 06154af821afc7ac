pub mod api;
pub mod archive;
pub mod config;
pub mod error;
pub mod health;
pub mod room_manager;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    let api_routes = Router::new()
        .route("/health", axum::routing::get(health::health_check))
        .route("/rooms/{room_code}", axum::routing::get(api::get_room))
        .route(
            "/rooms/{room_code}/players",
            axum::routing::get(api::get_players),
        )
        .route(
            "/rooms/{room_code}/rolls",
            axum::routing::get(api::get_rolls),
        )
        .route("/rolls/{roll_id}", axum::routing::get(api::get_roll));

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}

/// Background task that periodically reaps rooms idle beyond the configured
/// TTL.
pub fn spawn_room_reaper(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(state.config.rooms.idle_check_interval_secs);
        let max_idle = Duration::from_secs(state.config.rooms.idle_timeout_secs);
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            let removed = {
                let mut rooms = state.rooms.write().await;
                rooms.cleanup_idle_rooms(max_idle)
            };
            if removed > 0 {
                tracing::info!(removed, "Reaped idle rooms");
            }
        }
    });
}
