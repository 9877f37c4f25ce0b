//! Integration tests for queueing and matchmaking.
//!
//! Covers the join -> queue -> match flow, initiator designation, interest
//! weighting, skip, and leave-queue idempotence.

mod common;

use common::client::events;
use common::{TestClient, TestServer};
use drift_proto::{ClientEvent, Mode, ServerEvent};

async fn joined_client(server: &TestServer, session: &str) -> TestClient {
    let mut client = TestClient::connect(&server.address())
        .await
        .expect("Failed to connect");
    client
        .send(&events::user_join(session))
        .await
        .expect("Failed to send user-join");
    match client.recv().await.expect("No session confirmation") {
        ServerEvent::SessionConfirmed { session_id } => assert_eq!(session_id, session),
        other => panic!("Expected session-confirmed, got {other:?}"),
    }
    client
}

#[tokio::test]
async fn basic_text_match_shares_common_interests() {
    let server = TestServer::spawn(17701).await.expect("Failed to spawn");
    let mut a = joined_client(&server, "alice").await;
    let mut b = joined_client(&server, "bob").await;

    a.send(&events::join_queue(&["Music", "Gaming"], Mode::Text))
        .await
        .unwrap();
    match a.recv().await.unwrap() {
        ServerEvent::QueueStatus { position, .. } => assert_eq!(position, 1),
        other => panic!("Expected queue-status, got {other:?}"),
    }

    b.send(&events::join_queue(&["Gaming"], Mode::Text))
        .await
        .unwrap();

    // Bob's join triggered the pair, so Bob initiates the call setup.
    let (b_room, a_room);
    match b.recv().await.unwrap() {
        ServerEvent::MatchFound {
            partner_id,
            common_interests,
            mode,
            send_offer,
            room_id,
        } => {
            assert_eq!(partner_id, "alice");
            assert_eq!(common_interests, vec!["gaming"]);
            assert_eq!(mode, Mode::Text);
            assert!(send_offer);
            b_room = room_id;
        }
        other => panic!("Expected match-found, got {other:?}"),
    }
    match a.recv().await.unwrap() {
        ServerEvent::MatchFound {
            partner_id,
            common_interests,
            send_offer,
            room_id,
            ..
        } => {
            assert_eq!(partner_id, "bob");
            assert_eq!(common_interests, vec!["gaming"]);
            assert!(!send_offer);
            a_room = room_id;
        }
        other => panic!("Expected match-found, got {other:?}"),
    }
    assert_eq!(a_room, b_room, "both members must share one room id");
}

#[tokio::test]
async fn empty_interest_sets_still_match() {
    let server = TestServer::spawn(17702).await.expect("Failed to spawn");
    let mut a = joined_client(&server, "a").await;
    let mut b = joined_client(&server, "b").await;

    a.send(&events::join_queue(&[], Mode::Text)).await.unwrap();
    let _ = a.recv().await.unwrap(); // queue-status
    b.send(&events::join_queue(&[], Mode::Text)).await.unwrap();

    match b.recv().await.unwrap() {
        ServerEvent::MatchFound {
            common_interests, ..
        } => assert!(common_interests.is_empty()),
        other => panic!("Expected match-found, got {other:?}"),
    }
    assert_eq!(a.recv().await.unwrap().name(), "match-found");
}

#[tokio::test]
async fn video_match_assigns_exactly_one_initiator() {
    let server = TestServer::spawn(17703).await.expect("Failed to spawn");
    let mut a = joined_client(&server, "a").await;
    let mut b = joined_client(&server, "b").await;

    a.send(&events::join_queue(&[], Mode::Video)).await.unwrap();
    let _ = a.recv().await.unwrap();
    b.send(&events::join_queue(&[], Mode::Video)).await.unwrap();

    let offer_flags = match (a.recv().await.unwrap(), b.recv().await.unwrap()) {
        (
            ServerEvent::MatchFound {
                send_offer: a_offer,
                mode: a_mode,
                ..
            },
            ServerEvent::MatchFound {
                send_offer: b_offer,
                mode: b_mode,
                ..
            },
        ) => {
            assert_eq!(a_mode, Mode::Video);
            assert_eq!(b_mode, Mode::Video);
            (a_offer, b_offer)
        }
        other => panic!("Expected two match-found events, got {other:?}"),
    };
    assert_eq!(offer_flags, (false, true), "the triggering join initiates");
}

#[tokio::test]
async fn leave_queue_then_requeue() {
    let server = TestServer::spawn(17704).await.expect("Failed to spawn");
    let mut a = joined_client(&server, "a").await;

    // leave-queue when not queued is a no-op.
    a.send(&ClientEvent::LeaveQueue).await.unwrap();

    a.send(&events::join_queue(&[], Mode::Text)).await.unwrap();
    let _ = a.recv().await.unwrap();
    a.send(&ClientEvent::LeaveQueue).await.unwrap();

    // A later joiner must not match the departed entry.
    let mut b = joined_client(&server, "b").await;
    b.send(&events::join_queue(&[], Mode::Text)).await.unwrap();
    match b.recv().await.unwrap() {
        ServerEvent::QueueStatus { position, .. } => assert_eq!(position, 1),
        other => panic!("Expected queue-status, got {other:?}"),
    }
}

#[tokio::test]
async fn skip_frees_both_sides_for_new_matches() {
    let server = TestServer::spawn(17705).await.expect("Failed to spawn");
    let mut a = joined_client(&server, "a").await;
    let mut b = joined_client(&server, "b").await;

    a.send(&events::join_queue(&[], Mode::Text)).await.unwrap();
    let _ = a.recv().await.unwrap();
    b.send(&events::join_queue(&[], Mode::Text)).await.unwrap();
    let _ = b.recv().await.unwrap();
    let _ = a.recv().await.unwrap();

    a.send(&ClientEvent::SkipUser).await.unwrap();

    assert_eq!(a.recv().await.unwrap(), ServerEvent::SkipConfirmed);
    match b.recv().await.unwrap() {
        ServerEvent::PartnerDisconnected { reason, .. } => {
            assert_eq!(reason, drift_proto::DisconnectReason::Skipped);
        }
        other => panic!("Expected partner-disconnected, got {other:?}"),
    }

    // Both can queue again and re-match each other.
    a.send(&events::join_queue(&[], Mode::Text)).await.unwrap();
    let _ = a.recv().await.unwrap();
    b.send(&events::join_queue(&[], Mode::Text)).await.unwrap();
    assert_eq!(b.recv().await.unwrap().name(), "match-found");
    assert_eq!(a.recv().await.unwrap().name(), "match-found");
}

#[tokio::test]
async fn malformed_frames_get_an_error_not_a_disconnect() {
    let server = TestServer::spawn(17706).await.expect("Failed to spawn");
    let mut a = joined_client(&server, "a").await;

    a.send_raw("not json at all").await.unwrap();
    match a.recv().await.unwrap() {
        ServerEvent::Error { message } => assert!(message.contains("Malformed")),
        other => panic!("Expected error, got {other:?}"),
    }

    // The connection survives and still works.
    a.send(&events::join_queue(&[], Mode::Text)).await.unwrap();
    assert_eq!(a.recv().await.unwrap().name(), "queue-status");
}

#[tokio::test]
async fn duplicate_session_id_is_refused_while_live() {
    let server = TestServer::spawn(17707).await.expect("Failed to spawn");
    let _a = joined_client(&server, "dup").await;

    let mut intruder = TestClient::connect(&server.address()).await.unwrap();
    intruder.send(&events::user_join("dup")).await.unwrap();
    match intruder.recv().await.unwrap() {
        ServerEvent::Error { message } => {
            assert!(message.contains("another connection"), "got: {message}");
        }
        other => panic!("Expected error, got {other:?}"),
    }
}
