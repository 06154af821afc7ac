use serde::{Deserialize, Serialize};

/// Server-assigned connection id, unique for the lifetime of the process.
pub type PlayerId = u32;

/// Presence staleness window: a player whose last heartbeat is older than
/// this is reported offline even if the transport has not yet dropped.
pub const ONLINE_THRESHOLD_MS: u64 = 15_000;

/// A player in a room. Identity within the room is the name; the id is the
/// current connection and changes on reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
    /// Epoch millis of the last heartbeat or join.
    pub last_seen: u64,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            connected: true,
            last_seen: crate::time::timestamp_millis(),
        }
    }

    /// Derived presence: connected and heartbeated within the threshold.
    pub fn is_online(&self, now_ms: u64) -> bool {
        self.connected && now_ms.saturating_sub(self.last_seen) < ONLINE_THRESHOLD_MS
    }
}
