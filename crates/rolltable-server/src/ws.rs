use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use rolltable_core::dice::ThreadRngRoller;
use rolltable_core::net::messages::{
    ClientMessage, ErrorMsg, PlayerJoinedMsg, PongMsg, RollRevealedMsg, ServerMessage,
};
use rolltable_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, encode_server_message,
};
use rolltable_core::player::PlayerId;

use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Wait for the first message: must be a CreateRoom or JoinRoom.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };

    let Ok(client_msg) = decode_client_message(&first_msg) else {
        return;
    };

    let (room_code, player_id, rx) = match attempt_join(client_msg, &state).await {
        JoinResult::Success {
            room_code,
            player_id,
            is_new_member,
            rx,
        } => {
            let response = {
                let rooms = state.rooms.read().await;
                let viewer = rooms.player_name(&room_code, player_id);
                let Some(snapshot) = rooms.snapshot_for(&room_code, viewer.as_deref()) else {
                    return;
                };
                let Ok(response) = crate::room_manager::RoomManager::make_join_response(
                    player_id, &room_code, snapshot,
                ) else {
                    tracing::warn!("Failed to encode JoinResponse");
                    return;
                };
                response
            };

            if ws_sender
                .send(Message::Binary(response.into()))
                .await
                .is_err()
            {
                return;
            }

            // Announce the arrival and refresh everyone's player list
            {
                let rooms = state.rooms.read().await;
                if is_new_member
                    && let Some(player) = rooms
                        .snapshot_for(&room_code, None)
                        .and_then(|r| r.player_by_id(player_id).cloned())
                {
                    let msg = ServerMessage::PlayerJoined(PlayerJoinedMsg { player });
                    if let Ok(data) = encode_server_message(&msg) {
                        rooms.broadcast_to_room_except(&room_code, player_id, &data);
                    }
                }
                rooms.broadcast_player_list(&room_code);
            }

            tracing::info!(player_id, room = %room_code, "Player joined");
            (room_code, player_id, rx)
        },
        JoinResult::Error(err) => {
            send_join_error(&mut ws_sender, &err).await;
            return;
        },
    };

    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, &room_code, player_id).await;

    // Player disconnected. Mark them offline; the room persists.
    let mut rooms = state.rooms.write().await;
    rooms.disconnect(&room_code, player_id);
    rooms.broadcast_player_list(&room_code);
    drop(rooms);

    tracing::info!(player_id, room = %room_code, "Player disconnected");
}

enum JoinResult {
    Success {
        room_code: String,
        player_id: PlayerId,
        is_new_member: bool,
        rx: mpsc::Receiver<Bytes>,
    },
    Error(String),
}

async fn attempt_join(msg: ClientMessage, state: &AppState) -> JoinResult {
    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);

    match msg {
        ClientMessage::CreateRoom(create) => {
            if create.protocol_version != PROTOCOL_VERSION {
                return JoinResult::Error(format!(
                    "Protocol version mismatch: client={}, server={}",
                    create.protocol_version, PROTOCOL_VERSION
                ));
            }
            let mut rooms = state.rooms.write().await;
            match rooms.create_room(&create.player_name, tx) {
                Ok((code, pid)) => JoinResult::Success {
                    room_code: code,
                    player_id: pid,
                    is_new_member: false,
                    rx,
                },
                Err(e) => JoinResult::Error(e.to_string()),
            }
        },
        ClientMessage::JoinRoom(join) => {
            if join.protocol_version != PROTOCOL_VERSION {
                return JoinResult::Error(format!(
                    "Protocol version mismatch: client={}, server={}",
                    join.protocol_version, PROTOCOL_VERSION
                ));
            }
            let mut rooms = state.rooms.write().await;
            match rooms.join_room(&join.room_code, &join.player_name, tx) {
                Ok((pid, _player)) => JoinResult::Success {
                    room_code: join.room_code,
                    player_id: pid,
                    is_new_member: true,
                    rx,
                },
                Err(e) => JoinResult::Error(e.to_string()),
            }
        },
        _ => JoinResult::Error("First message must be CreateRoom or JoinRoom".to_string()),
    }
}

async fn send_join_error(
    ws_sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    error: &str,
) {
    if let Ok(response) = crate::room_manager::RoomManager::make_join_error(error)
        && let Err(e) = ws_sender.send(Message::Binary(response.into())).await
    {
        tracing::warn!(error = %e, "Failed to send join error response");
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender
                .send(Message::Binary(data.to_vec().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Push an Error message to one player.
async fn send_error(state: &AppState, room_code: &str, player_id: PlayerId, message: String) {
    let msg = ServerMessage::Error(ErrorMsg { message });
    if let Ok(data) = encode_server_message(&msg) {
        let rooms = state.rooms.read().await;
        rooms.send_to_player(room_code, player_id, Bytes::from(data));
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    room_code: &str,
    player_id: PlayerId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);
    let roller = ThreadRngRoller;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d.to_vec(),
            Message::Close(_) => break,
            _ => continue,
        };

        // Rate limit: drop messages that exceed per-connection rate
        if !rate_limiter.allow() {
            tracing::warn!(player_id, room_code, "Rate limited");
            continue;
        }

        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let client_msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(_) => continue,
        };

        match client_msg {
            ClientMessage::RollDice(req) => {
                let mut rooms = state.rooms.write().await;
                match rooms.record_roll(
                    room_code,
                    player_id,
                    &req.formula,
                    req.advantage,
                    req.hidden,
                    &roller,
                ) {
                    Ok(roll) => {
                        rooms.broadcast_roll(room_code, &roll);
                        // Mirror into the archive before releasing the room
                        // lock; reveal takes the locks in the same order.
                        {
                            let mut archive = state.archive.write().await;
                            archive.insert(roll.clone());
                        }
                        drop(rooms);
                        tracing::debug!(
                            player_id,
                            room_code,
                            roll_id = %roll.roll_id,
                            formula = %roll.formula,
                            total = roll.total,
                            "Roll recorded"
                        );
                    },
                    Err(e) => {
                        drop(rooms);
                        tracing::warn!(player_id, room_code, error = %e, "Roll rejected");
                        send_error(state, room_code, player_id, e.to_string()).await;
                    },
                }
            },

            ClientMessage::SetDc(req) => {
                let mut rooms = state.rooms.write().await;
                match rooms.set_dc(room_code, player_id, req.dc) {
                    Ok(()) => {
                        rooms.broadcast_room_update(room_code);
                        tracing::info!(player_id, room_code, dc = ?req.dc, "DC updated");
                    },
                    Err(e) => {
                        drop(rooms);
                        tracing::warn!(player_id, room_code, error = %e, "SetDc rejected");
                        send_error(state, room_code, player_id, e.to_string()).await;
                    },
                }
            },

            ClientMessage::Promote(req) => {
                let mut rooms = state.rooms.write().await;
                match rooms.promote(room_code, player_id, &req.dm_name) {
                    Ok(()) => {
                        rooms.broadcast_room_update(room_code);
                        tracing::info!(player_id, room_code, dm = %req.dm_name, "Room promoted to DM-led");
                    },
                    Err(e) => {
                        drop(rooms);
                        tracing::warn!(player_id, room_code, error = %e, "Promote rejected");
                        send_error(state, room_code, player_id, e.to_string()).await;
                    },
                }
            },

            ClientMessage::RevealRoll(req) => {
                let mut rooms = state.rooms.write().await;
                match rooms.reveal_roll(room_code, player_id, &req.roll_id) {
                    Ok((roll, transitioned)) => {
                        let msg = ServerMessage::RollRevealed(RollRevealedMsg {
                            roll: roll.clone(),
                        });
                        if let Ok(encoded) = encode_server_message(&msg) {
                            rooms.broadcast_to_room(room_code, &encoded);
                        }
                        if transitioned
                            && let Some(by) = roll.revealed_by.as_deref()
                        {
                            let mut archive = state.archive.write().await;
                            archive.reveal(&roll.roll_id, by);
                        }
                        drop(rooms);
                        tracing::info!(player_id, room_code, roll_id = %req.roll_id, "Roll revealed");
                    },
                    Err(e) => {
                        drop(rooms);
                        tracing::warn!(player_id, room_code, error = %e, "Reveal rejected");
                        send_error(state, room_code, player_id, e.to_string()).await;
                    },
                }
            },

            ClientMessage::CloseRoom(_) => {
                let mut rooms = state.rooms.write().await;
                match rooms.close_room(room_code, player_id) {
                    Ok(()) => {
                        drop(rooms);
                        tracing::info!(player_id, room_code, "Room closed");
                        break;
                    },
                    Err(e) => {
                        drop(rooms);
                        tracing::warn!(player_id, room_code, error = %e, "Close rejected");
                        send_error(state, room_code, player_id, e.to_string()).await;
                    },
                }
            },

            ClientMessage::Ping(_) => {
                {
                    let mut rooms = state.rooms.write().await;
                    rooms.heartbeat(room_code, player_id);
                }
                let msg = ServerMessage::Pong(PongMsg {});
                if let Ok(data) = encode_server_message(&msg) {
                    let rooms = state.rooms.read().await;
                    rooms.send_to_player(room_code, player_id, Bytes::from(data));
                }
            },

            // Session is already established; repeat joins are ignored.
            ClientMessage::CreateRoom(_) | ClientMessage::JoinRoom(_) => {
                tracing::debug!(player_id, room_code, "Ignoring join message mid-session");
            },
        }
    }
}
