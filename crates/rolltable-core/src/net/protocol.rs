use serde::{Deserialize, Serialize};

use super::messages::{
    ClientMessage, CloseRoomMsg, CreateRoomMsg, ErrorMsg, JoinResponseMsg, JoinRoomMsg,
    MessageType, PingMsg, PlayerJoinedMsg, PlayerListMsg, PongMsg, PromoteMsg, RevealRollMsg,
    RollDiceMsg, RollResultMsg, RollRevealedMsg, RoomClosedMsg, RoomUpdateMsg, ServerMessage,
    SetDcMsg,
};

/// Current protocol version, checked on CreateRoom/JoinRoom.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::CreateRoom(m) => encode_message(MessageType::CreateRoom, m),
        ClientMessage::JoinRoom(m) => encode_message(MessageType::JoinRoom, m),
        ClientMessage::RollDice(m) => encode_message(MessageType::RollDice, m),
        ClientMessage::SetDc(m) => encode_message(MessageType::SetDc, m),
        ClientMessage::Promote(m) => encode_message(MessageType::Promote, m),
        ClientMessage::RevealRoll(m) => encode_message(MessageType::RevealRoll, m),
        ClientMessage::CloseRoom(m) => encode_message(MessageType::CloseRoom, m),
        ClientMessage::Ping(m) => encode_message(MessageType::Ping, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::JoinResponse(m) => encode_message(MessageType::JoinResponse, m),
        ServerMessage::PlayerList(m) => encode_message(MessageType::PlayerList, m),
        ServerMessage::PlayerJoined(m) => encode_message(MessageType::PlayerJoined, m),
        ServerMessage::RollResult(m) => encode_message(MessageType::RollResult, m),
        ServerMessage::RollRevealed(m) => encode_message(MessageType::RollRevealed, m),
        ServerMessage::RoomUpdate(m) => encode_message(MessageType::RoomUpdate, m),
        ServerMessage::RoomClosed(m) => encode_message(MessageType::RoomClosed, m),
        ServerMessage::Error(m) => encode_message(MessageType::Error, m),
        ServerMessage::Pong(m) => encode_message(MessageType::Pong, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::CreateRoom => Ok(ClientMessage::CreateRoom(
            decode_payload::<CreateRoomMsg>(data)?,
        )),
        MessageType::JoinRoom => Ok(ClientMessage::JoinRoom(decode_payload::<JoinRoomMsg>(
            data,
        )?)),
        MessageType::RollDice => Ok(ClientMessage::RollDice(decode_payload::<RollDiceMsg>(
            data,
        )?)),
        MessageType::SetDc => Ok(ClientMessage::SetDc(decode_payload::<SetDcMsg>(data)?)),
        MessageType::Promote => Ok(ClientMessage::Promote(decode_payload::<PromoteMsg>(data)?)),
        MessageType::RevealRoll => Ok(ClientMessage::RevealRoll(
            decode_payload::<RevealRollMsg>(data)?,
        )),
        MessageType::CloseRoom => Ok(ClientMessage::CloseRoom(decode_payload::<CloseRoomMsg>(
            data,
        )?)),
        MessageType::Ping => Ok(ClientMessage::Ping(decode_payload::<PingMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::JoinResponse => Ok(ServerMessage::JoinResponse(decode_payload::<
            JoinResponseMsg,
        >(data)?)),
        MessageType::PlayerList => Ok(ServerMessage::PlayerList(decode_payload::<PlayerListMsg>(
            data,
        )?)),
        MessageType::PlayerJoined => Ok(ServerMessage::PlayerJoined(decode_payload::<
            PlayerJoinedMsg,
        >(data)?)),
        MessageType::RollResult => Ok(ServerMessage::RollResult(decode_payload::<RollResultMsg>(
            data,
        )?)),
        MessageType::RollRevealed => Ok(ServerMessage::RollRevealed(decode_payload::<
            RollRevealedMsg,
        >(data)?)),
        MessageType::RoomUpdate => Ok(ServerMessage::RoomUpdate(decode_payload::<RoomUpdateMsg>(
            data,
        )?)),
        MessageType::RoomClosed => Ok(ServerMessage::RoomClosed(decode_payload::<RoomClosedMsg>(
            data,
        )?)),
        MessageType::Error => Ok(ServerMessage::Error(decode_payload::<ErrorMsg>(data)?)),
        MessageType::Pong => Ok(ServerMessage::Pong(decode_payload::<PongMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
