use serde::{Deserialize, Serialize};

use crate::dice::Advantage;
use crate::player::{Player, PlayerId};
use crate::roll::Roll;
use crate::room::{Room, RoomMode};

/// Network message type discriminator, carried as the first wire byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    CreateRoom = 0x01,
    JoinRoom = 0x02,
    RollDice = 0x03,
    SetDc = 0x04,
    Promote = 0x05,
    RevealRoll = 0x06,
    CloseRoom = 0x07,
    Ping = 0x08,

    // Server -> Client
    JoinResponse = 0x10,
    PlayerList = 0x11,
    PlayerJoined = 0x12,
    RollResult = 0x13,
    RollRevealed = 0x14,
    RoomUpdate = 0x15,
    RoomClosed = 0x16,
    Error = 0x17,
    Pong = 0x18,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::CreateRoom),
            0x02 => Some(Self::JoinRoom),
            0x03 => Some(Self::RollDice),
            0x04 => Some(Self::SetDc),
            0x05 => Some(Self::Promote),
            0x06 => Some(Self::RevealRoll),
            0x07 => Some(Self::CloseRoom),
            0x08 => Some(Self::Ping),
            0x10 => Some(Self::JoinResponse),
            0x11 => Some(Self::PlayerList),
            0x12 => Some(Self::PlayerJoined),
            0x13 => Some(Self::RollResult),
            0x14 => Some(Self::RollRevealed),
            0x15 => Some(Self::RoomUpdate),
            0x16 => Some(Self::RoomClosed),
            0x17 => Some(Self::Error),
            0x18 => Some(Self::Pong),
            _ => None,
        }
    }
}

/// Open a fresh room as its creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomMsg {
    pub player_name: String,
    pub protocol_version: u8,
}

/// Join an existing room by code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    pub room_code: String,
    pub player_name: String,
    pub protocol_version: u8,
}

/// Ask the server to roll. Only the formula travels; the server owns the
/// dice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollDiceMsg {
    pub formula: String,
    pub advantage: Advantage,
    pub hidden: bool,
}

/// Set or clear the room's difficulty check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDcMsg {
    pub dc: Option<i32>,
}

/// Promote the room to dm-led with the named member as DM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoteMsg {
    pub dm_name: String,
}

/// Reveal a hidden roll to the whole room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealRollMsg {
    pub roll_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRoomMsg {}

/// Presence heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingMsg {}

/// Reply to CreateRoom/JoinRoom. On success carries the caller's identity
/// and a full room snapshot, with concealed rolls already redacted for this
/// recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinResponseMsg {
    pub success: bool,
    pub player_id: Option<PlayerId>,
    pub room_code: Option<String>,
    pub snapshot: Option<Box<Room>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerListMsg {
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoinedMsg {
    pub player: Player,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResultMsg {
    pub roll: Roll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRevealedMsg {
    pub roll: Roll,
}

/// Room metadata delta: mode promotion or DC change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUpdateMsg {
    pub mode: RoomMode,
    pub dm: Option<String>,
    pub dc: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomClosedMsg {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongMsg {}

/// All messages a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    CreateRoom(CreateRoomMsg),
    JoinRoom(JoinRoomMsg),
    RollDice(RollDiceMsg),
    SetDc(SetDcMsg),
    Promote(PromoteMsg),
    RevealRoll(RevealRollMsg),
    CloseRoom(CloseRoomMsg),
    Ping(PingMsg),
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::CreateRoom(_) => MessageType::CreateRoom,
            Self::JoinRoom(_) => MessageType::JoinRoom,
            Self::RollDice(_) => MessageType::RollDice,
            Self::SetDc(_) => MessageType::SetDc,
            Self::Promote(_) => MessageType::Promote,
            Self::RevealRoll(_) => MessageType::RevealRoll,
            Self::CloseRoom(_) => MessageType::CloseRoom,
            Self::Ping(_) => MessageType::Ping,
        }
    }
}

/// All messages the server may push.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    JoinResponse(JoinResponseMsg),
    PlayerList(PlayerListMsg),
    PlayerJoined(PlayerJoinedMsg),
    RollResult(RollResultMsg),
    RollRevealed(RollRevealedMsg),
    RoomUpdate(RoomUpdateMsg),
    RoomClosed(RoomClosedMsg),
    Error(ErrorMsg),
    Pong(PongMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::JoinResponse(_) => MessageType::JoinResponse,
            Self::PlayerList(_) => MessageType::PlayerList,
            Self::PlayerJoined(_) => MessageType::PlayerJoined,
            Self::RollResult(_) => MessageType::RollResult,
            Self::RollRevealed(_) => MessageType::RollRevealed,
            Self::RoomUpdate(_) => MessageType::RoomUpdate,
            Self::RoomClosed(_) => MessageType::RoomClosed,
            Self::Error(_) => MessageType::Error,
            Self::Pong(_) => MessageType::Pong,
        }
    }
}
