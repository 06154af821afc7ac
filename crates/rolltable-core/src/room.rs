use serde::{Deserialize, Serialize};

use rand::Rng;

use crate::error::Error;
use crate::player::{Player, PlayerId};
use crate::roll::Roll;

/// Maximum players per room.
pub const MAX_ROOM_CAPACITY: usize = 8;

/// Player name length limit (after trimming).
pub const MAX_PLAYER_NAME_LEN: usize = 20;

/// Room code vocabulary: NATO phonetic alphabet plus common words.
pub const WORD_LIST: &[&str] = &[
    "ALPHA", "BRAVO", "CHARLIE", "DELTA", "ECHO", "FOXTROT", "GOLF", "HOTEL", "INDIA", "JULIET",
    "KILO", "LIMA", "MIKE", "NOVEMBER", "OSCAR", "PAPA", "QUEBEC", "ROMEO", "SIERRA", "TANGO",
    "UNIFORM", "VICTOR", "WHISKEY", "XRAY", "YANKEE", "ZULU", "APPLE", "BANANA", "CHERRY",
    "DRAGON", "EAGLE", "FALCON", "GIRAFFE", "HORSE", "IGUANA", "JAGUAR", "KOALA", "LION",
    "MONKEY", "NEWT", "OTTER", "PANDA", "QUAIL", "RABBIT", "SNAKE", "TIGER", "UNICORN", "VIPER",
    "WALRUS", "XERUS", "YAK", "ZEBRA", "AZURE", "BRONZE", "COPPER", "DIAMOND", "EMERALD", "FROST",
    "GOLDEN", "HOLLOW", "IVORY", "JADE", "KNIGHT", "LUNAR", "MYSTIC", "NOBLE", "ONYX", "PEARL",
    "QUARTZ", "RUBY", "SILVER", "TOPAZ", "ULTRA", "VIOLET", "WINTER", "XENON", "YELLOW", "ZENITH",
    "AMBER", "BLAZE", "CRYSTAL", "DAWN", "EMBER", "FLAME", "GLACIER", "HAVEN", "IRON", "JEWEL",
    "KARMA", "LIGHT", "MAGIC", "NIGHT", "OCEAN", "PRISM", "QUEST", "RAVEN", "SHADOW", "THUNDER",
    "UNITY", "VAPOR", "WAVE", "WIZARD", "ZODIAC", "ARROW", "BLADE",
];

/// Generate a room code in the format WORD-#### (e.g. "ALPHA-1234").
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    let word = WORD_LIST[rng.random_range(0..WORD_LIST.len())];
    let number: u16 = rng.random_range(0..10000);
    format!("{word}-{number:04}")
}

/// Check that a string matches the WORD-#### room code format.
pub fn is_valid_room_code(code: &str) -> bool {
    let Some((word, digits)) = code.split_once('-') else {
        return false;
    };
    WORD_LIST.contains(&word) && digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit())
}

/// Validate and normalize a player name: trimmed, 1-20 chars, no control
/// characters.
pub fn validate_player_name(name: &str) -> Result<String, Error> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("Player name is required"));
    }
    if trimmed.chars().count() > MAX_PLAYER_NAME_LEN {
        return Err(Error::validation(format!(
            "Player name must be {MAX_PLAYER_NAME_LEN} characters or less"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(Error::validation("Player name contains invalid characters"));
    }
    Ok(trimmed.to_string())
}

/// Room mode. Starts Open; a one-way promotion makes it DmLed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomMode {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "dm-led")]
    DmLed,
}

/// A shared dice-rolling session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_code: String,
    pub mode: RoomMode,
    pub creator: String,
    pub dm: Option<String>,
    pub dc: Option<i32>,
    pub created_at: String,
    pub players: Vec<Player>,
    pub rolls: Vec<Roll>,
}

impl Room {
    /// Create a room with its creator as the first (online) player.
    pub fn new(room_code: String, creator: Player) -> Self {
        Self {
            room_code,
            mode: RoomMode::Open,
            creator: creator.name.clone(),
            dm: None,
            dc: None,
            created_at: crate::time::timestamp_now(),
            players: vec![creator],
            rolls: Vec::new(),
        }
    }

    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn player_by_id(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Whether the named player is the DM of a dm-led room.
    pub fn is_dm(&self, name: &str) -> bool {
        self.mode == RoomMode::DmLed && self.dm.as_deref() == Some(name)
    }

    /// Whether the named player may mutate room settings (DC, close).
    /// In an open room that is the creator; once dm-led, the DM as well.
    pub fn is_moderator(&self, name: &str) -> bool {
        self.creator == name || self.is_dm(name)
    }

    /// One-way transition to dm-led mode. The DM must already be a member.
    pub fn promote(&mut self, dm_name: &str) -> Result<(), Error> {
        if self.mode == RoomMode::DmLed {
            return Err(Error::conflict("Room is already DM-led"));
        }
        if self.player_by_name(dm_name).is_none() {
            return Err(Error::not_found(format!(
                "Player {dm_name} is not in the room"
            )));
        }
        self.mode = RoomMode::DmLed;
        self.dm = Some(dm_name.to_string());
        Ok(())
    }

    pub fn roll_by_id(&self, roll_id: &str) -> Option<&Roll> {
        self.rolls.iter().find(|r| r.roll_id == roll_id)
    }

    pub fn roll_by_id_mut(&mut self, roll_id: &str) -> Option<&mut Roll> {
        self.rolls.iter_mut().find(|r| r.roll_id == roll_id)
    }
}
