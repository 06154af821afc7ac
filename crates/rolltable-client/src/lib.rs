pub mod cache;
pub mod status;

pub use cache::RoomCache;
pub use status::{ConnectionState, ConnectionStatus};
