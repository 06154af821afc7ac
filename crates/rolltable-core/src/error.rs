/// Error taxonomy shared by the server handlers and the client cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed input: bad player name, unparseable dice formula.
    Validation(String),
    /// Unknown room code or roll id.
    NotFound(String),
    /// Duplicate room code, full room, re-promotion of a dm-led room.
    Conflict(String),
    /// Caller is not the creator/DM for a gated mutation.
    Forbidden(String),
    /// Socket-level failure, surfaced client-side as a connection flag.
    Transport(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Forbidden(m)
            | Self::Transport(m) => write!(f, "{m}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}
