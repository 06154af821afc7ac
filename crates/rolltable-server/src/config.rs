use serde::Deserialize;

use rolltable_core::room::MAX_ROOM_CAPACITY;

/// Top-level server configuration, loaded from `rolltable.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub player_message_buffer: usize,
    pub ws_rate_limit_per_sec: f64,
    /// Bound on the global roll archive backing permalinks.
    pub max_archived_rolls: usize,
    /// Largest page size the roll history endpoint will serve.
    pub roll_history_page_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            player_message_buffer: 256,
            ws_rate_limit_per_sec: 20.0,
            max_archived_rolls: 10_000,
            roll_history_page_limit: 100,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Rooms idle beyond this are reaped (default 5 hours).
    pub idle_timeout_secs: u64,
    pub idle_check_interval_secs: u64,
    pub max_players: usize,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 18_000,
            idle_check_interval_secs: 60,
            max_players: MAX_ROOM_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on unusable values.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.player_message_buffer == 0 {
            tracing::error!("limits.player_message_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_archived_rolls == 0 {
            tracing::error!("limits.max_archived_rolls must be > 0");
            std::process::exit(1);
        }
        if self.limits.roll_history_page_limit == 0 {
            tracing::error!("limits.roll_history_page_limit must be > 0");
            std::process::exit(1);
        }
        if self.rooms.idle_timeout_secs == 0 {
            tracing::error!("rooms.idle_timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.idle_check_interval_secs == 0 {
            tracing::error!("rooms.idle_check_interval_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.max_players == 0 {
            tracing::error!("rooms.max_players must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `rolltable.toml` if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("rolltable.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from rolltable.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse rolltable.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No rolltable.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("ROLLTABLE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(val) = std::env::var("ROLLTABLE_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("ROLLTABLE_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }
        if let Ok(val) = std::env::var("ROLLTABLE_ROOM_IDLE_TIMEOUT_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.rooms.idle_timeout_secs = n;
        }

        config
    }
}
