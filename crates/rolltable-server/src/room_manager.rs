use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;

use rolltable_core::dice::{Advantage, DiceFormula, DiceRoller, execute};
use rolltable_core::error::Error;
use rolltable_core::net::messages::{
    JoinResponseMsg, PlayerListMsg, RollResultMsg, RoomClosedMsg, RoomUpdateMsg, ServerMessage,
};
use rolltable_core::net::protocol::{ProtocolError, encode_server_message};
use rolltable_core::player::{Player, PlayerId};
use rolltable_core::roll::Roll;
use rolltable_core::room::{
    Room, generate_room_code, is_valid_room_code, validate_player_name,
};

/// Per-player sender for outbound WebSocket binary messages.
/// Bounded to prevent memory exhaustion from slow clients.
/// Uses `Bytes` for zero-copy cloning when broadcasting to multiple players.
pub type PlayerSender = mpsc::Sender<Bytes>;

/// How many times to retry room code generation on collision.
const MAX_CODE_ATTEMPTS: usize = 10;

/// Tracks a connected player's outbound channel.
struct ConnectedPlayer {
    sender: PlayerSender,
    name: String,
}

struct RoomEntry {
    room: Room,
    connections: HashMap<PlayerId, ConnectedPlayer>,
    last_activity: Instant,
}

/// Manages all active rooms and their connected players.
pub struct RoomManager {
    rooms: HashMap<String, RoomEntry>,
    next_player_id: PlayerId,
    max_players: usize,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomManager {
    pub fn new() -> Self {
        Self::with_max_players(rolltable_core::room::MAX_ROOM_CAPACITY)
    }

    pub fn with_max_players(max_players: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            next_player_id: 1,
            max_players,
        }
    }

    fn alloc_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    /// Create a new room. Returns (room_code, player_id) for the creator.
    pub fn create_room(
        &mut self,
        player_name: &str,
        sender: PlayerSender,
    ) -> Result<(String, PlayerId), Error> {
        let name = validate_player_name(player_name)?;
        let code = self.generate_unique_room_code()?;
        let player_id = self.alloc_player_id();
        let player = Player::new(player_id, name.clone());
        let room = Room::new(code.clone(), player);
        let mut connections = HashMap::new();
        connections.insert(player_id, ConnectedPlayer { sender, name });
        self.rooms.insert(
            code.clone(),
            RoomEntry {
                room,
                connections,
                last_activity: Instant::now(),
            },
        );
        Ok((code, player_id))
    }

    fn generate_unique_room_code(&self) -> Result<String, Error> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_room_code();
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(Error::conflict("Could not allocate a unique room code"))
    }

    /// Join an existing room. Rejoining under the name of an offline member
    /// reclaims that entry (with a fresh connection id) instead of adding a
    /// duplicate.
    pub fn join_room(
        &mut self,
        room_code: &str,
        player_name: &str,
        sender: PlayerSender,
    ) -> Result<(PlayerId, Player), Error> {
        let name = validate_player_name(player_name)?;
        if !is_valid_room_code(room_code) {
            return Err(Error::validation("Invalid room code format"));
        }
        if !self.rooms.contains_key(room_code) {
            return Err(Error::not_found(format!("Room {room_code} not found")));
        }

        let player_id = self.alloc_player_id();
        let entry = self
            .rooms
            .get_mut(room_code)
            .ok_or_else(|| Error::not_found(format!("Room {room_code} not found")))?;
        entry.last_activity = Instant::now();

        if let Some(existing) = entry.room.players.iter_mut().find(|p| p.name == name) {
            if existing.connected {
                return Err(Error::conflict(format!(
                    "Player name {name} is already taken in this room"
                )));
            }
            // Reclaim the offline entry under a fresh connection id
            existing.id = player_id;
            existing.connected = true;
            existing.last_seen = rolltable_core::time::timestamp_millis();
            let player = existing.clone();
            entry
                .connections
                .insert(player_id, ConnectedPlayer { sender, name });
            return Ok((player_id, player));
        }

        if entry.room.players.len() >= self.max_players {
            return Err(Error::conflict("Room is full"));
        }

        let player = Player::new(player_id, name.clone());
        entry.room.players.push(player.clone());
        entry
            .connections
            .insert(player_id, ConnectedPlayer { sender, name });
        Ok((player_id, player))
    }

    /// Mark a player offline when their transport drops. The room and the
    /// player record persist; only the connection goes away.
    pub fn disconnect(&mut self, room_code: &str, player_id: PlayerId) {
        if let Some(entry) = self.rooms.get_mut(room_code) {
            entry.connections.remove(&player_id);
            if let Some(player) = entry.room.players.iter_mut().find(|p| p.id == player_id) {
                player.connected = false;
            }
        }
    }

    /// Stamp a player's heartbeat.
    pub fn heartbeat(&mut self, room_code: &str, player_id: PlayerId) {
        if let Some(entry) = self.rooms.get_mut(room_code) {
            entry.last_activity = Instant::now();
            if let Some(player) = entry.room.players.iter_mut().find(|p| p.id == player_id) {
                player.last_seen = rolltable_core::time::timestamp_millis();
            }
        }
    }

    /// Execute a roll server-side and append it to the room history.
    /// Hidden rolls are a DM-only privilege.
    pub fn record_roll(
        &mut self,
        room_code: &str,
        player_id: PlayerId,
        formula: &str,
        advantage: Advantage,
        hidden: bool,
        roller: &dyn DiceRoller,
    ) -> Result<Roll, Error> {
        let entry = self
            .rooms
            .get_mut(room_code)
            .ok_or_else(|| Error::not_found(format!("Room {room_code} not found")))?;
        let player_name = entry
            .room
            .player_by_id(player_id)
            .map(|p| p.name.clone())
            .ok_or_else(|| Error::not_found("Player is not in the room"))?;

        if hidden && !entry.room.is_dm(&player_name) {
            return Err(Error::forbidden("Only the DM can make hidden rolls"));
        }

        let parsed = DiceFormula::parse(formula)?;
        let outcome = execute(&parsed, advantage, roller)?;
        let roll = Roll::from_outcome(
            player_name,
            &parsed,
            advantage,
            outcome,
            hidden,
            entry.room.dc,
        );
        entry.room.rolls.push(roll.clone());
        entry.last_activity = Instant::now();
        Ok(roll)
    }

    /// Set or clear the room DC. Creator in an open room, DM once dm-led.
    pub fn set_dc(
        &mut self,
        room_code: &str,
        player_id: PlayerId,
        dc: Option<i32>,
    ) -> Result<(), Error> {
        let entry = self
            .rooms
            .get_mut(room_code)
            .ok_or_else(|| Error::not_found(format!("Room {room_code} not found")))?;
        let name = entry
            .room
            .player_by_id(player_id)
            .map(|p| p.name.clone())
            .ok_or_else(|| Error::not_found("Player is not in the room"))?;
        if !entry.room.is_moderator(&name) {
            return Err(Error::forbidden("Only the creator or DM can set the DC"));
        }
        entry.room.dc = dc;
        entry.last_activity = Instant::now();
        Ok(())
    }

    /// One-way promotion of the room to dm-led. Creator only.
    pub fn promote(
        &mut self,
        room_code: &str,
        player_id: PlayerId,
        dm_name: &str,
    ) -> Result<(), Error> {
        let entry = self
            .rooms
            .get_mut(room_code)
            .ok_or_else(|| Error::not_found(format!("Room {room_code} not found")))?;
        let name = entry
            .room
            .player_by_id(player_id)
            .map(|p| p.name.clone())
            .ok_or_else(|| Error::not_found("Player is not in the room"))?;
        if entry.room.creator != name {
            return Err(Error::forbidden("Only the creator can promote a DM"));
        }
        entry.room.promote(dm_name)?;
        entry.last_activity = Instant::now();
        Ok(())
    }

    /// Reveal a hidden roll. DM only. Returns the full roll and whether this
    /// call performed the transition (repeats are no-ops).
    pub fn reveal_roll(
        &mut self,
        room_code: &str,
        player_id: PlayerId,
        roll_id: &str,
    ) -> Result<(Roll, bool), Error> {
        let entry = self
            .rooms
            .get_mut(room_code)
            .ok_or_else(|| Error::not_found(format!("Room {room_code} not found")))?;
        let name = entry
            .room
            .player_by_id(player_id)
            .map(|p| p.name.clone())
            .ok_or_else(|| Error::not_found("Player is not in the room"))?;
        if !entry.room.is_dm(&name) {
            return Err(Error::forbidden("Only the DM can reveal rolls"));
        }
        let roll = entry
            .room
            .roll_by_id_mut(roll_id)
            .ok_or_else(|| Error::not_found(format!("Roll {roll_id} not found")))?;
        let transitioned = roll.reveal(&name);
        let roll = roll.clone();
        entry.last_activity = Instant::now();
        Ok((roll, transitioned))
    }

    /// Close a room: broadcast RoomClosed to everyone, then remove it.
    /// Creator or DM only. Archived rolls survive for permalinks.
    pub fn close_room(&mut self, room_code: &str, player_id: PlayerId) -> Result<(), Error> {
        let entry = self
            .rooms
            .get(room_code)
            .ok_or_else(|| Error::not_found(format!("Room {room_code} not found")))?;
        let name = entry
            .room
            .player_by_id(player_id)
            .map(|p| p.name.clone())
            .ok_or_else(|| Error::not_found("Player is not in the room"))?;
        if !entry.room.is_moderator(&name) {
            return Err(Error::forbidden("Only the creator or DM can close the room"));
        }
        let msg = ServerMessage::RoomClosed(RoomClosedMsg {});
        if let Ok(data) = encode_server_message(&msg) {
            self.broadcast_to_room(room_code, &data);
        }
        self.rooms.remove(room_code);
        Ok(())
    }

    /// A copy of the room with concealed rolls redacted for the named viewer.
    /// The DM sees everything; everyone else gets redacted copies.
    pub fn snapshot_for(&self, room_code: &str, viewer: Option<&str>) -> Option<Room> {
        let entry = self.rooms.get(room_code)?;
        let mut room = entry.room.clone();
        let is_dm = viewer.is_some_and(|name| room.is_dm(name));
        if !is_dm {
            for roll in &mut room.rolls {
                if roll.is_concealed() {
                    *roll = roll.redacted();
                }
            }
        }
        Some(room)
    }

    pub fn room_exists(&self, room_code: &str) -> bool {
        self.rooms.contains_key(room_code)
    }

    /// Look up a player's name by room code and connection id.
    pub fn player_name(&self, room_code: &str, player_id: PlayerId) -> Option<String> {
        self.rooms
            .get(room_code)?
            .room
            .player_by_id(player_id)
            .map(|p| p.name.clone())
    }

    /// Send a raw binary message to a specific player.
    pub fn send_to_player(&self, room_code: &str, player_id: PlayerId, data: Bytes) {
        if let Some(entry) = self.rooms.get(room_code)
            && let Some(conn) = entry.connections.get(&player_id)
            && let Err(e) = conn.sender.try_send(data)
        {
            tracing::debug!(
                player_id, room = room_code, error = %e,
                "Failed to send to player (slow or disconnected)"
            );
        }
    }

    /// Broadcast raw binary data to all connected players in a room.
    /// Uses `Bytes` internally for zero-copy cloning across player channels.
    pub fn broadcast_to_room(&self, room_code: &str, data: &[u8]) {
        if let Some(entry) = self.rooms.get(room_code) {
            let bytes = Bytes::copy_from_slice(data);
            for (&pid, conn) in &entry.connections {
                if let Err(e) = conn.sender.try_send(bytes.clone()) {
                    tracing::debug!(
                        player_id = pid, room = room_code, error = %e,
                        "Skipping broadcast to slow client"
                    );
                }
            }
        }
    }

    /// Broadcast raw binary data to all connected players except one.
    pub fn broadcast_to_room_except(&self, room_code: &str, exclude: PlayerId, data: &[u8]) {
        if let Some(entry) = self.rooms.get(room_code) {
            let bytes = Bytes::copy_from_slice(data);
            for (&pid, conn) in &entry.connections {
                if pid != exclude
                    && let Err(e) = conn.sender.try_send(bytes.clone())
                {
                    tracing::debug!(
                        player_id = pid, room = room_code, error = %e,
                        "Skipping broadcast to slow client"
                    );
                }
            }
        }
    }

    /// Build and broadcast a PlayerList update to everyone in the room.
    pub fn broadcast_player_list(&self, room_code: &str) {
        if let Some(entry) = self.rooms.get(room_code) {
            let msg = ServerMessage::PlayerList(PlayerListMsg {
                players: entry.room.players.clone(),
            });
            if let Ok(data) = encode_server_message(&msg) {
                self.broadcast_to_room(room_code, &data);
            }
        }
    }

    /// Broadcast a roll result, redacting per recipient: the DM gets the
    /// full roll, everyone else gets the redacted copy while it is concealed.
    pub fn broadcast_roll(&self, room_code: &str, roll: &Roll) {
        let Some(entry) = self.rooms.get(room_code) else {
            return;
        };
        let full = ServerMessage::RollResult(RollResultMsg { roll: roll.clone() });
        let Ok(full_data) = encode_server_message(&full) else {
            return;
        };
        if !roll.is_concealed() {
            self.broadcast_to_room(room_code, &full_data);
            return;
        }

        let redacted = ServerMessage::RollResult(RollResultMsg {
            roll: roll.redacted(),
        });
        let Ok(redacted_data) = encode_server_message(&redacted) else {
            return;
        };
        let full_bytes = Bytes::from(full_data);
        let redacted_bytes = Bytes::from(redacted_data);
        for (&pid, conn) in &entry.connections {
            let data = if entry.room.is_dm(&conn.name) {
                full_bytes.clone()
            } else {
                redacted_bytes.clone()
            };
            if let Err(e) = conn.sender.try_send(data) {
                tracing::debug!(
                    player_id = pid, room = room_code, error = %e,
                    "Skipping roll broadcast to slow client"
                );
            }
        }
    }

    /// Broadcast the room's current mode/dm/dc to everyone.
    pub fn broadcast_room_update(&self, room_code: &str) {
        if let Some(entry) = self.rooms.get(room_code) {
            let msg = ServerMessage::RoomUpdate(RoomUpdateMsg {
                mode: entry.room.mode,
                dm: entry.room.dm.clone(),
                dc: entry.room.dc,
            });
            if let Ok(data) = encode_server_message(&msg) {
                self.broadcast_to_room(room_code, &data);
            }
        }
    }

    /// Build a JoinResponse success message carrying the caller's identity
    /// and a snapshot already redacted for them.
    pub fn make_join_response(
        player_id: PlayerId,
        room_code: &str,
        snapshot: Room,
    ) -> Result<Vec<u8>, ProtocolError> {
        let msg = ServerMessage::JoinResponse(JoinResponseMsg {
            success: true,
            player_id: Some(player_id),
            room_code: Some(room_code.to_string()),
            snapshot: Some(Box::new(snapshot)),
            error: None,
        });
        encode_server_message(&msg)
    }

    /// Build a JoinResponse error message.
    pub fn make_join_error(error: &str) -> Result<Vec<u8>, ProtocolError> {
        let msg = ServerMessage::JoinResponse(JoinResponseMsg {
            success: false,
            player_id: None,
            room_code: None,
            snapshot: None,
            error: Some(error.to_string()),
        });
        encode_server_message(&msg)
    }

    /// Touch room activity timestamp (call on any incoming message).
    pub fn touch_activity(&mut self, room_code: &str) {
        if let Some(entry) = self.rooms.get_mut(room_code) {
            entry.last_activity = Instant::now();
        }
    }

    /// Remove rooms that have been idle for longer than `max_idle`.
    /// Returns the number of rooms removed.
    pub fn cleanup_idle_rooms(&mut self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.rooms.len();
        self.rooms
            .retain(|_, entry| now.duration_since(entry.last_activity) < max_idle);
        before - self.rooms.len()
    }

    /// (active rooms, total players) for the health endpoint.
    pub fn stats(&self) -> (usize, usize) {
        let players = self.rooms.values().map(|e| e.room.players.len()).sum();
        (self.rooms.len(), players)
    }
}
