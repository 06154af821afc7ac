use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use rolltable_core::dice::Advantage;
use rolltable_core::net::messages::{
    ClientMessage, CreateRoomMsg, JoinResponseMsg, JoinRoomMsg, RollDiceMsg, ServerMessage,
};
use rolltable_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_message, encode_client_message,
};

use rolltable_server::build_app;
use rolltable_server::config::ServerConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage over a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Create a room as the given player. Returns (JoinResponse, room_code).
pub async fn ws_create_room(stream: &mut WsStream, name: &str) -> (JoinResponseMsg, String) {
    let msg = ClientMessage::CreateRoom(CreateRoomMsg {
        player_name: name.to_string(),
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send_client_msg(stream, &msg).await;

    let resp = ws_read_server_msg(stream).await;
    match resp {
        ServerMessage::JoinResponse(join) => {
            assert!(join.success, "Expected successful create: {join:?}");
            let code = join.room_code.clone().unwrap();
            (join, code)
        },
        other => panic!("Expected JoinResponse, got: {other:?}"),
    }
}

/// Join an existing room. Returns the JoinResponse (success or error).
pub async fn ws_join_room(stream: &mut WsStream, room_code: &str, name: &str) -> JoinResponseMsg {
    let msg = ClientMessage::JoinRoom(JoinRoomMsg {
        room_code: room_code.to_string(),
        player_name: name.to_string(),
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send_client_msg(stream, &msg).await;

    let resp = ws_read_server_msg(stream).await;
    match resp {
        ServerMessage::JoinResponse(join) => join,
        other => panic!("Expected JoinResponse, got: {other:?}"),
    }
}

/// Ask the server to roll the given formula.
pub async fn ws_roll(stream: &mut WsStream, formula: &str, advantage: Advantage, hidden: bool) {
    let msg = ClientMessage::RollDice(RollDiceMsg {
        formula: formula.to_string(),
        advantage,
        hidden,
    });
    ws_send_client_msg(stream, &msg).await;
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Read server messages until one matches the predicate, skipping others.
pub async fn ws_read_until<F>(stream: &mut WsStream, mut pred: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            let msg = ws_read_server_msg(stream).await;
            if pred(&msg) {
                return msg;
            }
        }
    })
    .await
    .expect("Timed out waiting for expected message")
}
