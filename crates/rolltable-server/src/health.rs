use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub rooms: RoomInfo,
    pub archive: crate::archive::RollArchiveStats,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
}

#[derive(Serialize)]
pub struct RoomInfo {
    pub active: usize,
    pub players: usize,
}

/// Structured health check endpoint. Returns server status, connection count,
/// room info, and archive stats as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ws = state.ws_connection_count.load(Ordering::Relaxed);

    let (active_rooms, total_players) = {
        let rooms = state.rooms.read().await;
        rooms.stats()
    };

    let archive_stats = {
        let archive = state.archive.read().await;
        archive.stats()
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo { websocket: ws },
        rooms: RoomInfo {
            active: active_rooms,
            players: total_players,
        },
        archive: archive_stats,
    })
}
