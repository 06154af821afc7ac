#[allow(dead_code)]
mod common;

use common::{
    TestServer, ws_connect, ws_create_room, ws_join_room, ws_read_server_msg, ws_read_until,
    ws_roll, ws_send_client_msg, ws_try_read_raw,
};
use rolltable_core::dice::Advantage;
use rolltable_core::net::messages::{
    ClientMessage, CloseRoomMsg, CreateRoomMsg, JoinRoomMsg, PingMsg, PromoteMsg, RevealRollMsg,
    ServerMessage, SetDcMsg,
};
use rolltable_core::net::protocol::PROTOCOL_VERSION;
use rolltable_core::room::{RoomMode, is_valid_room_code};

#[tokio::test]
async fn create_room() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    let (join_resp, room_code) = ws_create_room(&mut stream, "Alice").await;

    assert_eq!(join_resp.player_id, Some(1));
    assert!(is_valid_room_code(&room_code));

    let snapshot = join_resp.snapshot.unwrap();
    assert_eq!(snapshot.room_code, room_code);
    assert_eq!(snapshot.creator, "Alice");
    assert_eq!(snapshot.mode, RoomMode::Open);
    assert!(snapshot.dm.is_none());
    assert!(snapshot.rolls.is_empty());

    // The creator also receives the initial PlayerList
    let msg = ws_read_server_msg(&mut stream).await;
    match msg {
        ServerMessage::PlayerList(pl) => {
            assert_eq!(pl.players.len(), 1);
            assert_eq!(pl.players[0].name, "Alice");
            assert!(pl.players[0].connected);
        },
        other => panic!("Expected PlayerList, got: {other:?}"),
    }
}

#[tokio::test]
async fn join_existing_room() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, room_code) = ws_create_room(&mut alice, "Alice").await;
    let _ = ws_read_server_msg(&mut alice).await; // PlayerList

    let mut bob = ws_connect(&server.ws_url()).await;
    let join_resp = ws_join_room(&mut bob, &room_code, "Bob").await;
    assert!(join_resp.success);
    assert_eq!(join_resp.player_id, Some(2));
    // Snapshot already contains both players
    assert_eq!(join_resp.snapshot.unwrap().players.len(), 2);

    // Bob gets the refreshed PlayerList
    let msg = ws_read_server_msg(&mut bob).await;
    match msg {
        ServerMessage::PlayerList(pl) => assert_eq!(pl.players.len(), 2),
        other => panic!("Expected PlayerList, got: {other:?}"),
    }

    // Alice sees the arrival announcement, then the refreshed list
    let msg = ws_read_server_msg(&mut alice).await;
    match msg {
        ServerMessage::PlayerJoined(pj) => assert_eq!(pj.player.name, "Bob"),
        other => panic!("Expected PlayerJoined, got: {other:?}"),
    }
    let msg = ws_read_server_msg(&mut alice).await;
    match msg {
        ServerMessage::PlayerList(pl) => assert_eq!(pl.players.len(), 2),
        other => panic!("Expected PlayerList, got: {other:?}"),
    }
}

#[tokio::test]
async fn join_nonexistent_room() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    let resp = ws_join_room(&mut stream, "ZULU-9999", "Bob").await;
    assert!(!resp.success);
    assert!(resp.error.unwrap().contains("not found"));
}

#[tokio::test]
async fn create_room_rejects_bad_name() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    let msg = ClientMessage::CreateRoom(CreateRoomMsg {
        player_name: "   ".to_string(),
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send_client_msg(&mut stream, &msg).await;

    let resp = ws_read_server_msg(&mut stream).await;
    match resp {
        ServerMessage::JoinResponse(join) => {
            assert!(!join.success);
            assert!(join.error.is_some());
        },
        other => panic!("Expected JoinResponse, got: {other:?}"),
    }
}

#[tokio::test]
async fn protocol_version_mismatch_rejected() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    let msg = ClientMessage::JoinRoom(JoinRoomMsg {
        room_code: "ALPHA-1234".to_string(),
        player_name: "Bob".to_string(),
        protocol_version: PROTOCOL_VERSION + 1,
    });
    ws_send_client_msg(&mut stream, &msg).await;

    let resp = ws_read_server_msg(&mut stream).await;
    match resp {
        ServerMessage::JoinResponse(join) => {
            assert!(!join.success);
            assert!(join.error.unwrap().contains("Protocol version mismatch"));
        },
        other => panic!("Expected JoinResponse, got: {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_name_rejected_while_connected() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, room_code) = ws_create_room(&mut alice, "Alice").await;

    let mut impostor = ws_connect(&server.ws_url()).await;
    let resp = ws_join_room(&mut impostor, &room_code, "Alice").await;
    assert!(!resp.success);
    assert!(resp.error.unwrap().contains("already taken"));
}

#[tokio::test]
async fn roll_dice_broadcast() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, _room_code) = ws_create_room(&mut alice, "Alice").await;

    ws_roll(&mut alice, "3d6+2", Advantage::None, false).await;

    let msg = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RollResult(_))).await;
    let ServerMessage::RollResult(result) = msg else {
        unreachable!()
    };
    let roll = result.roll;
    assert_eq!(roll.player_name, "Alice");
    assert_eq!(roll.formula, "3d6+2");
    assert_eq!(roll.individual_results.len(), 3);
    assert!(roll.individual_results.iter().all(|&r| (1..=6).contains(&r)));
    assert_eq!(
        roll.total,
        roll.individual_results.iter().sum::<i32>() + roll.modifier
    );
    assert_eq!(roll.modifier, 2);
    assert_eq!(roll.dc_pass, None);
    assert!(!roll.hidden);
}

#[tokio::test]
async fn advantage_roll_carries_both_values() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, _code) = ws_create_room(&mut alice, "Alice").await;

    ws_roll(&mut alice, "1d20+3", Advantage::Advantage, false).await;

    let msg = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RollResult(_))).await;
    let ServerMessage::RollResult(result) = msg else {
        unreachable!()
    };
    let roll = result.roll;
    let (first, second) = roll.advantage_rolls.unwrap();
    assert_eq!(roll.individual_results, vec![first.max(second)]);
    assert_eq!(roll.total, first.max(second) + 3);
}

#[tokio::test]
async fn dc_check_flow() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, _code) = ws_create_room(&mut alice, "Alice").await;

    // Creator sets the DC in an open room
    ws_send_client_msg(&mut alice, &ClientMessage::SetDc(SetDcMsg { dc: Some(1) })).await;
    let msg = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomUpdate(_))).await;
    let ServerMessage::RoomUpdate(update) = msg else {
        unreachable!()
    };
    assert_eq!(update.dc, Some(1));

    // Any d20 roll beats DC 1
    ws_roll(&mut alice, "1d20", Advantage::None, false).await;
    let msg = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RollResult(_))).await;
    let ServerMessage::RollResult(result) = msg else {
        unreachable!()
    };
    assert_eq!(result.roll.dc_pass, Some(true));
}

#[tokio::test]
async fn set_dc_rejected_for_regular_player() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, room_code) = ws_create_room(&mut alice, "Alice").await;

    let mut bob = ws_connect(&server.ws_url()).await;
    let _ = ws_join_room(&mut bob, &room_code, "Bob").await;

    ws_send_client_msg(&mut bob, &ClientMessage::SetDc(SetDcMsg { dc: Some(10) })).await;
    let msg = ws_read_until(&mut bob, |m| matches!(m, ServerMessage::Error(_))).await;
    let ServerMessage::Error(err) = msg else {
        unreachable!()
    };
    assert!(err.message.contains("creator or DM"));
}

#[tokio::test]
async fn invalid_formula_returns_error() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, _code) = ws_create_room(&mut alice, "Alice").await;

    ws_roll(&mut alice, "3x6", Advantage::None, false).await;
    let msg = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::Error(_))).await;
    assert!(matches!(msg, ServerMessage::Error(_)));
}

#[tokio::test]
async fn promote_flow() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, room_code) = ws_create_room(&mut alice, "Alice").await;

    let mut bob = ws_connect(&server.ws_url()).await;
    let _ = ws_join_room(&mut bob, &room_code, "Bob").await;

    ws_send_client_msg(
        &mut alice,
        &ClientMessage::Promote(PromoteMsg {
            dm_name: "Bob".to_string(),
        }),
    )
    .await;

    // Both see the mode change
    for stream in [&mut alice, &mut bob] {
        let msg = ws_read_until(stream, |m| matches!(m, ServerMessage::RoomUpdate(_))).await;
        let ServerMessage::RoomUpdate(update) = msg else {
            unreachable!()
        };
        assert_eq!(update.mode, RoomMode::DmLed);
        assert_eq!(update.dm.as_deref(), Some("Bob"));
    }

    // A second promotion is rejected (already dm-led)
    ws_send_client_msg(
        &mut alice,
        &ClientMessage::Promote(PromoteMsg {
            dm_name: "Alice".to_string(),
        }),
    )
    .await;
    let msg = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::Error(_))).await;
    let ServerMessage::Error(err) = msg else {
        unreachable!()
    };
    assert!(err.message.contains("already DM-led"));
}

#[tokio::test]
async fn promote_rejected_for_non_creator() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, room_code) = ws_create_room(&mut alice, "Alice").await;

    let mut bob = ws_connect(&server.ws_url()).await;
    let _ = ws_join_room(&mut bob, &room_code, "Bob").await;

    ws_send_client_msg(
        &mut bob,
        &ClientMessage::Promote(PromoteMsg {
            dm_name: "Bob".to_string(),
        }),
    )
    .await;
    let msg = ws_read_until(&mut bob, |m| matches!(m, ServerMessage::Error(_))).await;
    let ServerMessage::Error(err) = msg else {
        unreachable!()
    };
    assert!(err.message.contains("creator"));
}

#[tokio::test]
async fn hidden_roll_redacted_then_revealed() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, room_code) = ws_create_room(&mut alice, "Alice").await;

    let mut bob = ws_connect(&server.ws_url()).await;
    let _ = ws_join_room(&mut bob, &room_code, "Bob").await;

    // Make Bob the DM
    ws_send_client_msg(
        &mut alice,
        &ClientMessage::Promote(PromoteMsg {
            dm_name: "Bob".to_string(),
        }),
    )
    .await;
    let _ = ws_read_until(&mut bob, |m| matches!(m, ServerMessage::RoomUpdate(_))).await;

    // DM rolls hidden
    ws_roll(&mut bob, "1d20+5", Advantage::None, true).await;

    // The DM sees the full roll
    let msg = ws_read_until(&mut bob, |m| matches!(m, ServerMessage::RollResult(_))).await;
    let ServerMessage::RollResult(dm_view) = msg else {
        unreachable!()
    };
    assert!(dm_view.roll.hidden);
    assert_eq!(dm_view.roll.modifier, 5);
    assert!(dm_view.roll.total >= 6);

    // Alice sees only the redacted copy
    let msg = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RollResult(_))).await;
    let ServerMessage::RollResult(player_view) = msg else {
        unreachable!()
    };
    assert_eq!(player_view.roll.roll_id, dm_view.roll.roll_id);
    assert_eq!(player_view.roll.formula, "hidden d20");
    assert_eq!(player_view.roll.total, 0);
    assert!(player_view.roll.individual_results.is_empty());

    // DM reveals: everyone gets the full roll
    ws_send_client_msg(
        &mut bob,
        &ClientMessage::RevealRoll(RevealRollMsg {
            roll_id: dm_view.roll.roll_id.clone(),
        }),
    )
    .await;

    for stream in [&mut alice, &mut bob] {
        let msg = ws_read_until(stream, |m| matches!(m, ServerMessage::RollRevealed(_))).await;
        let ServerMessage::RollRevealed(revealed) = msg else {
            unreachable!()
        };
        assert_eq!(revealed.roll.total, dm_view.roll.total);
        assert_eq!(revealed.roll.revealed_by.as_deref(), Some("Bob"));
    }
}

#[tokio::test]
async fn hidden_roll_rejected_for_non_dm() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, _code) = ws_create_room(&mut alice, "Alice").await;

    ws_roll(&mut alice, "1d20", Advantage::None, true).await;
    let msg = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::Error(_))).await;
    let ServerMessage::Error(err) = msg else {
        unreachable!()
    };
    assert!(err.message.contains("DM"));
}

#[tokio::test]
async fn close_room_notifies_everyone() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, room_code) = ws_create_room(&mut alice, "Alice").await;

    let mut bob = ws_connect(&server.ws_url()).await;
    let _ = ws_join_room(&mut bob, &room_code, "Bob").await;

    ws_send_client_msg(&mut alice, &ClientMessage::CloseRoom(CloseRoomMsg {})).await;

    let msg = ws_read_until(&mut bob, |m| matches!(m, ServerMessage::RoomClosed(_))).await;
    assert!(matches!(msg, ServerMessage::RoomClosed(_)));

    // The room is gone: a fresh join fails
    let mut carol = ws_connect(&server.ws_url()).await;
    let resp = ws_join_room(&mut carol, &room_code, "Carol").await;
    assert!(!resp.success);
}

#[tokio::test]
async fn ping_pong_heartbeat() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, _code) = ws_create_room(&mut alice, "Alice").await;

    ws_send_client_msg(&mut alice, &ClientMessage::Ping(PingMsg {})).await;
    let msg = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::Pong(_))).await;
    assert!(matches!(msg, ServerMessage::Pong(_)));
}

#[tokio::test]
async fn disconnect_marks_offline_and_rejoin_reclaims() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, room_code) = ws_create_room(&mut alice, "Alice").await;
    let _ = ws_read_server_msg(&mut alice).await; // PlayerList

    let mut bob = ws_connect(&server.ws_url()).await;
    let resp = ws_join_room(&mut bob, &room_code, "Bob").await;
    let bob_id = resp.player_id.unwrap();
    drop(bob);

    // Alice eventually sees Bob go offline (still listed)
    let msg = ws_read_until(&mut alice, |m| {
        matches!(m, ServerMessage::PlayerList(pl)
            if pl.players.iter().any(|p| p.name == "Bob" && !p.connected))
    })
    .await;
    let ServerMessage::PlayerList(pl) = msg else {
        unreachable!()
    };
    assert_eq!(pl.players.len(), 2);

    // Bob rejoins under the same name and reclaims the entry
    let mut bob = ws_connect(&server.ws_url()).await;
    let resp = ws_join_room(&mut bob, &room_code, "Bob").await;
    assert!(resp.success);
    assert_ne!(resp.player_id.unwrap(), bob_id);
    let snapshot = resp.snapshot.unwrap();
    assert_eq!(snapshot.players.len(), 2);
    assert!(snapshot.player_by_name("Bob").unwrap().connected);
}

#[tokio::test]
async fn room_history_persists_across_rolls() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, room_code) = ws_create_room(&mut alice, "Alice").await;

    for _ in 0..3 {
        ws_roll(&mut alice, "2d8", Advantage::None, false).await;
        let _ = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RollResult(_))).await;
    }

    // A late joiner's snapshot carries the full history
    let mut bob = ws_connect(&server.ws_url()).await;
    let resp = ws_join_room(&mut bob, &room_code, "Bob").await;
    let snapshot = resp.snapshot.unwrap();
    assert_eq!(snapshot.rolls.len(), 3);
    for roll in &snapshot.rolls {
        assert_eq!(
            roll.total,
            roll.individual_results.iter().sum::<i32>() + roll.modifier
        );
    }
}

#[tokio::test]
async fn reveal_is_idempotent_over_the_wire() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let (_, _code) = ws_create_room(&mut alice, "Alice").await;

    // Promote self so hidden rolls are allowed
    ws_send_client_msg(
        &mut alice,
        &ClientMessage::Promote(PromoteMsg {
            dm_name: "Alice".to_string(),
        }),
    )
    .await;
    let _ = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomUpdate(_))).await;

    ws_roll(&mut alice, "1d20", Advantage::None, true).await;
    let msg = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RollResult(_))).await;
    let ServerMessage::RollResult(result) = msg else {
        unreachable!()
    };
    let roll_id = result.roll.roll_id;

    for _ in 0..2 {
        ws_send_client_msg(
            &mut alice,
            &ClientMessage::RevealRoll(RevealRollMsg {
                roll_id: roll_id.clone(),
            }),
        )
        .await;
        let msg =
            ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RollRevealed(_))).await;
        let ServerMessage::RollRevealed(revealed) = msg else {
            unreachable!()
        };
        // First attribution stands on the repeat
        assert_eq!(revealed.roll.revealed_by.as_deref(), Some("Alice"));
    }

    // No stray messages left over
    assert!(ws_try_read_raw(&mut alice, 200).await.is_none());
}
