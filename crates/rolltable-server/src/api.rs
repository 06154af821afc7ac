use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use rolltable_core::player::Player;
use rolltable_core::roll::Roll;
use rolltable_core::room::Room;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/rooms/{room_code} — full room snapshot, concealed rolls redacted.
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<Room>, AppError> {
    let rooms = state.rooms.read().await;
    rooms
        .snapshot_for(&room_code, None)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Room {room_code} not found")))
}

/// A player as reported over REST, with presence derived server-side.
#[derive(Debug, Serialize)]
pub struct PlayerView {
    pub id: rolltable_core::player::PlayerId,
    pub name: String,
    pub is_dm: bool,
    pub is_online: bool,
}

#[derive(Debug, Serialize)]
pub struct PlayersResponse {
    pub players: Vec<PlayerView>,
}

fn player_view(player: &Player, room: &Room, now_ms: u64) -> PlayerView {
    PlayerView {
        id: player.id,
        name: player.name.clone(),
        is_dm: room.is_dm(&player.name),
        is_online: player.is_online(now_ms),
    }
}

/// GET /api/rooms/{room_code}/players — player list with derived presence.
pub async fn get_players(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<PlayersResponse>, AppError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .snapshot_for(&room_code, None)
        .ok_or_else(|| AppError::NotFound(format!("Room {room_code} not found")))?;
    let now_ms = rolltable_core::time::timestamp_millis();
    let players = room
        .players
        .iter()
        .map(|p| player_view(p, &room, now_ms))
        .collect();
    Ok(Json(PlayersResponse { players }))
}

#[derive(Debug, Deserialize)]
pub struct RollsQuery {
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RollsResponse {
    pub rolls: Vec<Roll>,
    pub total: usize,
}

/// GET /api/rooms/{room_code}/rolls — paginated history, newest first.
pub async fn get_rolls(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Query(query): Query<RollsQuery>,
) -> Result<Json<RollsResponse>, AppError> {
    let page_limit = state.config.limits.roll_history_page_limit;
    let limit = query.limit.unwrap_or(page_limit).min(page_limit);

    let rooms = state.rooms.read().await;
    let room = rooms
        .snapshot_for(&room_code, None)
        .ok_or_else(|| AppError::NotFound(format!("Room {room_code} not found")))?;
    drop(rooms);

    let total = room.rolls.len();
    // History is append-ordered; newest first means walking it backwards.
    let rolls = room
        .rolls
        .into_iter()
        .rev()
        .skip(query.offset)
        .take(limit)
        .collect();
    Ok(Json(RollsResponse { rolls, total }))
}

/// GET /api/rolls/{roll_id} — permalink to an archived roll. Concealed
/// rolls stay hidden here until the DM reveals them.
pub async fn get_roll(
    State(state): State<AppState>,
    Path(roll_id): Path<String>,
) -> Result<Json<Roll>, AppError> {
    let archive = state.archive.read().await;
    match archive.get(&roll_id) {
        Some(roll) if !roll.is_concealed() => Ok(Json(roll.clone())),
        _ => Err(AppError::NotFound(format!("Roll {roll_id} not found"))),
    }
}
