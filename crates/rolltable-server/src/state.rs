use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use crate::archive::RollArchive;
use crate::config::ServerConfig;
use crate::room_manager::RoomManager;

pub type SharedRoomManager = Arc<RwLock<RoomManager>>;
pub type SharedRollArchive = Arc<RwLock<RollArchive>>;

#[derive(Clone)]
pub struct AppState {
    pub rooms: SharedRoomManager,
    pub archive: SharedRollArchive,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let archive = RollArchive::with_capacity(config.limits.max_archived_rolls);
        let rooms = RoomManager::with_max_players(config.rooms.max_players);
        Self {
            rooms: Arc::new(RwLock::new(rooms)),
            archive: Arc::new(RwLock::new(archive)),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// RAII guard around a connection counter. Increments on creation,
/// decrements on drop, so the count stays accurate on any exit path.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}
