use rolltable_core::net::messages::ServerMessage;
use rolltable_core::player::{Player, PlayerId};
use rolltable_core::roll::Roll;
use rolltable_core::room::{Room, RoomMode};

/// Client-side view of the active room, fed by server push messages and
/// snapshot responses. A pure reducer: every input arrives through `apply`
/// or `apply_snapshot`, and replaying the same message twice leaves the
/// cache unchanged.
#[derive(Debug, Default)]
pub struct RoomCache {
    room_code: Option<String>,
    mode: Option<RoomMode>,
    creator: Option<String>,
    dm: Option<String>,
    dc: Option<i32>,
    players: Vec<Player>,
    /// Roll history, newest first.
    rolls: Vec<Roll>,
    my_player_id: Option<PlayerId>,
    my_name: Option<String>,
    /// Set once any incremental roll event has been merged. From then on,
    /// snapshots may backfill unseen rolls but never replace the history.
    seen_roll_events: bool,
    room_closed: bool,
}

impl RoomCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record who we are. Set once at join; later calls are ignored.
    pub fn set_identity(&mut self, player_id: PlayerId, name: &str) {
        if self.my_player_id.is_none() {
            self.my_player_id = Some(player_id);
            self.my_name = Some(name.to_string());
        }
    }

    pub fn my_player_id(&self) -> Option<PlayerId> {
        self.my_player_id
    }

    pub fn my_name(&self) -> Option<&str> {
        self.my_name.as_deref()
    }

    pub fn room_code(&self) -> Option<&str> {
        self.room_code.as_deref()
    }

    pub fn mode(&self) -> Option<RoomMode> {
        self.mode
    }

    pub fn dm(&self) -> Option<&str> {
        self.dm.as_deref()
    }

    pub fn dc(&self) -> Option<i32> {
        self.dc
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Roll history, newest first.
    pub fn rolls(&self) -> &[Roll] {
        &self.rolls
    }

    pub fn is_room_closed(&self) -> bool {
        self.room_closed
    }

    /// Merge one push message into the cache.
    pub fn apply(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::JoinResponse(resp) => {
                if !resp.success {
                    return;
                }
                if let (Some(pid), Some(code)) = (resp.player_id, resp.room_code.as_deref()) {
                    // First successful join pins both identity and room
                    if self.room_code.is_none() {
                        self.room_code = Some(code.to_string());
                    }
                    if let Some(snapshot) = resp.snapshot.as_deref() {
                        if let Some(me) = snapshot.player_by_id(pid) {
                            let name = me.name.clone();
                            self.set_identity(pid, &name);
                        }
                        self.apply_snapshot(snapshot);
                    }
                }
            },
            ServerMessage::PlayerList(list) => {
                self.players = list.players.clone();
            },
            ServerMessage::PlayerJoined(joined) => {
                self.merge_player(&joined.player);
            },
            ServerMessage::RollResult(result) => {
                self.merge_roll(&result.roll);
                self.seen_roll_events = true;
            },
            ServerMessage::RollRevealed(revealed) => {
                match self.rolls.iter_mut().find(|r| r.roll_id == revealed.roll.roll_id) {
                    Some(local) => *local = revealed.roll.clone(),
                    None => self.merge_roll(&revealed.roll),
                }
                self.seen_roll_events = true;
            },
            ServerMessage::RoomUpdate(update) => {
                self.mode = Some(update.mode);
                self.dm = update.dm.clone();
                self.dc = update.dc;
            },
            ServerMessage::RoomClosed(_) => {
                self.room_closed = true;
            },
            ServerMessage::Error(_) | ServerMessage::Pong(_) => {},
        }
    }

    /// Reconcile a full room snapshot against the cached state.
    ///
    /// Metadata and players come straight from the snapshot. Roll history is
    /// taken wholesale only while the local history is empty and no
    /// incremental roll event has arrived; after that a snapshot can backfill
    /// rolls the cache has not seen, but it never removes or replaces ones it
    /// has. A snapshot for a different room than the active one is stale and
    /// ignored entirely.
    pub fn apply_snapshot(&mut self, room: &Room) {
        if let Some(active) = self.room_code.as_deref()
            && active != room.room_code
        {
            tracing::debug!(
                active,
                snapshot = %room.room_code,
                "Ignoring stale snapshot for a different room"
            );
            return;
        }
        if self.room_code.is_none() {
            self.room_code = Some(room.room_code.clone());
        }

        self.mode = Some(room.mode);
        self.creator = Some(room.creator.clone());
        self.dm = room.dm.clone();
        self.dc = room.dc;
        self.players = room.players.clone();

        if self.rolls.is_empty() && !self.seen_roll_events {
            // Server history is append-ordered; the cache shows newest first
            self.rolls = room.rolls.iter().rev().cloned().collect();
        } else {
            for roll in &room.rolls {
                if !self.rolls.iter().any(|r| r.roll_id == roll.roll_id) {
                    self.merge_roll(roll);
                }
            }
        }
    }

    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    /// Idempotent player merge, keyed by name: a repeat announcement for a
    /// known player updates the record instead of growing the list.
    fn merge_player(&mut self, player: &Player) {
        match self.players.iter_mut().find(|p| p.name == player.name) {
            Some(existing) => *existing = player.clone(),
            None => self.players.push(player.clone()),
        }
    }

    /// Insert a roll at its timestamp-ordered position (newest first).
    /// Duplicates by roll_id are dropped.
    fn merge_roll(&mut self, roll: &Roll) {
        if self.rolls.iter().any(|r| r.roll_id == roll.roll_id) {
            return;
        }
        let pos = self
            .rolls
            .iter()
            .position(|r| r.timestamp_ms <= roll.timestamp_ms)
            .unwrap_or(self.rolls.len());
        self.rolls.insert(pos, roll.clone());
    }
}
