/// How many reconnect attempts before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Delay between reconnect attempts, in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1_000;

/// Connection lifecycle as shown to the user: connected, retrying with an
/// attempt counter, or given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Reconnecting { attempt: u32 },
    Disconnected,
}

/// Tracks the socket lifecycle and decides whether (and when) to retry.
#[derive(Debug)]
pub struct ConnectionStatus {
    state: ConnectionState,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStatus {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// The transport came up. Resets the retry counter.
    pub fn on_connected(&mut self) {
        self.state = ConnectionState::Connected;
    }

    /// The transport dropped. Returns the delay in milliseconds before the
    /// next reconnect attempt, or None when the retry budget is spent.
    pub fn on_connection_lost(&mut self) -> Option<u64> {
        let next_attempt = match self.state {
            ConnectionState::Reconnecting { attempt } => attempt + 1,
            _ => 1,
        };
        if next_attempt > MAX_RECONNECT_ATTEMPTS {
            self.state = ConnectionState::Disconnected;
            tracing::warn!("Reconnect attempts exhausted, giving up");
            return None;
        }
        self.state = ConnectionState::Reconnecting {
            attempt: next_attempt,
        };
        Some(RETRY_DELAY_MS)
    }
}
