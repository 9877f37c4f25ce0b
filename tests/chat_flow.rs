//! Integration tests for the chat relay: messages, typing, read receipts,
//! history, and voluntary disconnect.

mod common;

use common::client::events;
use common::{TestClient, TestServer};
use drift_proto::{ClientEvent, GetMessagesPayload, Mode, ServerEvent};

/// Join two clients and match them; returns them chatting.
async fn matched_clients(server: &TestServer, a: &str, b: &str) -> (TestClient, TestClient) {
    let mut ca = TestClient::connect(&server.address()).await.unwrap();
    ca.send(&events::user_join(a)).await.unwrap();
    ca.recv().await.unwrap();
    let mut cb = TestClient::connect(&server.address()).await.unwrap();
    cb.send(&events::user_join(b)).await.unwrap();
    cb.recv().await.unwrap();

    ca.send(&events::join_queue(&[], Mode::Text)).await.unwrap();
    ca.recv().await.unwrap(); // queue-status
    cb.send(&events::join_queue(&[], Mode::Text)).await.unwrap();
    cb.recv().await.unwrap(); // match-found
    ca.recv().await.unwrap(); // match-found
    (ca, cb)
}

#[tokio::test]
async fn message_round_trip() {
    let server = TestServer::spawn(17711).await.expect("Failed to spawn");
    let (mut a, mut b) = matched_clients(&server, "a", "b").await;

    a.send(&events::send_message("hello stranger"))
        .await
        .unwrap();

    match b.recv().await.unwrap() {
        ServerEvent::MessageReceived(msg) => {
            assert_eq!(msg.content, "hello stranger");
            assert_eq!(msg.sender_id, "a");
            assert_eq!(msg.recipient_id, "b");
            assert_eq!(msg.status, drift_proto::MessageStatus::Sent);
        }
        other => panic!("Expected message-received, got {other:?}"),
    }
    match a.recv().await.unwrap() {
        ServerEvent::MessageSent(msg) => assert_eq!(msg.content, "hello stranger"),
        other => panic!("Expected message-sent, got {other:?}"),
    }
}

#[tokio::test]
async fn sender_side_order_is_preserved() {
    let server = TestServer::spawn(17712).await.expect("Failed to spawn");
    let (mut a, mut b) = matched_clients(&server, "a", "b").await;

    for i in 0..5 {
        a.send(&events::send_message(&format!("m{i}"))).await.unwrap();
    }
    for i in 0..5 {
        match b.recv().await.unwrap() {
            ServerEvent::MessageReceived(msg) => assert_eq!(msg.content, format!("m{i}")),
            other => panic!("Expected message-received, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn send_while_idle_is_an_error() {
    let server = TestServer::spawn(17713).await.expect("Failed to spawn");
    let mut a = TestClient::connect(&server.address()).await.unwrap();
    a.send(&events::user_join("a")).await.unwrap();
    a.recv().await.unwrap();

    a.send(&events::send_message("into the void")).await.unwrap();
    match a.recv().await.unwrap() {
        ServerEvent::MessageError { error } => {
            assert!(error.contains("active chat"), "got: {error}");
        }
        other => panic!("Expected message-error, got {other:?}"),
    }
}

#[tokio::test]
async fn typing_indicator_round_trip() {
    let server = TestServer::spawn(17714).await.expect("Failed to spawn");
    let (mut a, mut b) = matched_clients(&server, "a", "b").await;

    a.send(&ClientEvent::Typing).await.unwrap();
    assert_eq!(b.recv().await.unwrap(), ServerEvent::PartnerTyping(true));

    a.send(&ClientEvent::StopTyping).await.unwrap();
    assert_eq!(b.recv().await.unwrap(), ServerEvent::PartnerTyping(false));

    // stop-typing with no prior typing still reports false.
    a.send(&ClientEvent::StopTyping).await.unwrap();
    assert_eq!(b.recv().await.unwrap(), ServerEvent::PartnerTyping(false));
}

#[tokio::test]
async fn history_and_read_receipts() {
    let server = TestServer::spawn(17715).await.expect("Failed to spawn");
    let (mut a, mut b) = matched_clients(&server, "a", "b").await;

    for i in 0..3 {
        a.send(&events::send_message(&format!("m{i}"))).await.unwrap();
        a.recv().await.unwrap();
        b.recv().await.unwrap();
    }

    b.send(&ClientEvent::GetMessages(GetMessagesPayload {
        limit: Some(2),
        skip: None,
    }))
    .await
    .unwrap();
    match b.recv().await.unwrap() {
        ServerEvent::MessagesLoaded { messages, .. } => {
            let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(contents, vec!["m1", "m2"], "latest page, oldest first");
        }
        other => panic!("Expected messages-loaded, got {other:?}"),
    }

    b.send(&ClientEvent::MarkMessagesRead).await.unwrap();
    match b.recv().await.unwrap() {
        ServerEvent::MessagesMarkedRead { count, .. } => assert_eq!(count, 3),
        other => panic!("Expected messages-marked-read, got {other:?}"),
    }
    match a.recv().await.unwrap() {
        ServerEvent::MessagesReadByPartner { read_by, count } => {
            assert_eq!(read_by, "b");
            assert_eq!(count, 3);
        }
        other => panic!("Expected messages-read-by-partner, got {other:?}"),
    }
}

#[tokio::test]
async fn voluntary_disconnect_notifies_partner() {
    let server = TestServer::spawn(17716).await.expect("Failed to spawn");
    let (mut a, mut b) = matched_clients(&server, "a", "b").await;

    a.send(&ClientEvent::DisconnectChat).await.unwrap();

    match b.recv().await.unwrap() {
        ServerEvent::PartnerDisconnected { reason, .. } => {
            assert_eq!(reason, drift_proto::DisconnectReason::Left);
        }
        other => panic!("Expected partner-disconnected, got {other:?}"),
    }

    // Messaging after the dissolve is refused on both sides.
    a.send(&events::send_message("still there?")).await.unwrap();
    assert_eq!(a.recv().await.unwrap().name(), "message-error");
    b.send(&events::send_message("hello?")).await.unwrap();
    assert_eq!(b.recv().await.unwrap().name(), "message-error");
}

#[tokio::test]
async fn report_user_is_confirmed() {
    let server = TestServer::spawn(17717).await.expect("Failed to spawn");
    let (mut a, _b) = matched_clients(&server, "a", "b").await;

    a.send(&ClientEvent::ReportUser(drift_proto::ReportUserPayload {
        reported_user_id: "b".to_string(),
        reason: "spam".to_string(),
    }))
    .await
    .unwrap();

    match a.recv().await.unwrap() {
        ServerEvent::ReportSubmitted {
            success, report_id, ..
        } => {
            assert!(success);
            assert!(!report_id.is_empty());
        }
        other => panic!("Expected report-submitted, got {other:?}"),
    }
}

#[tokio::test]
async fn webrtc_frames_are_relayed_with_sender() {
    let server = TestServer::spawn(17718).await.expect("Failed to spawn");
    let (mut a, mut b) = matched_clients(&server, "a", "b").await;

    a.send(&ClientEvent::WebrtcOffer {
        offer: serde_json::json!({"type": "offer", "sdp": "v=0"}),
    })
    .await
    .unwrap();
    match b.recv().await.unwrap() {
        ServerEvent::WebrtcOffer { offer, from } => {
            assert_eq!(from, "a");
            assert_eq!(offer["type"], "offer");
        }
        other => panic!("Expected webrtc-offer, got {other:?}"),
    }

    b.send(&ClientEvent::WebrtcAnswer {
        answer: serde_json::json!({"type": "answer"}),
    })
    .await
    .unwrap();
    match a.recv().await.unwrap() {
        ServerEvent::WebrtcAnswer { from, .. } => assert_eq!(from, "b"),
        other => panic!("Expected webrtc-answer, got {other:?}"),
    }

    // ICE interleaves in any order.
    a.send(&ClientEvent::WebrtcIceCandidate {
        candidate: serde_json::json!({"candidate": "c0"}),
    })
    .await
    .unwrap();
    match b.recv().await.unwrap() {
        ServerEvent::WebrtcIceCandidate { from, .. } => assert_eq!(from, "a"),
        other => panic!("Expected webrtc-ice-candidate, got {other:?}"),
    }
}
