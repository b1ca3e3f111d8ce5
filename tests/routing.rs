//! Integration tests for rooms, broadcast routing, and subscriptions.

mod common;

use common::TestServer;
use std::time::Duration;

const SILENCE: Duration = Duration::from_millis(150);

#[tokio::test]
async fn test_room_broadcast_excludes_sender() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut a = server.login("a").await.expect("login a");
    let mut b = server.login("b").await.expect("login b");
    a.expect_containing("b joined lobby").await.expect("arrival");

    a.send_line("hi there").await.expect("send");

    assert_eq!(b.recv_line().await.expect("broadcast"), "a: hi there");
    // The sender never sees its own message echoed back.
    assert_eq!(a.recv_within(SILENCE).await, None);
}

#[tokio::test]
async fn test_join_moves_user_between_rooms() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut a = server.login("a").await.expect("login a");
    let mut b = server.login("b").await.expect("login b");
    a.expect_containing("b joined lobby").await.expect("arrival");

    a.send_line("/join dev").await.expect("send");
    assert_eq!(a.recv_line().await.expect("confirm"), "🟢 You joined dev");

    // b, still in the lobby, sees the departure announcement.
    assert_eq!(b.recv_line().await.expect("departure"), "🔴 a left lobby");

    assert_eq!(
        server.hub.directory.user_room("a").await.unwrap(),
        Some("dev".to_string())
    );
    assert!(server.hub.directory.room_members("dev").await.unwrap().contains("a"));
    assert!(!server.hub.directory.room_members("lobby").await.unwrap().contains("a"));

    // Rooms no longer overlap: b's chatter does not reach a.
    b.send_line("anyone?").await.expect("send");
    assert_eq!(a.recv_within(SILENCE).await, None);
}

#[tokio::test]
async fn test_leave_returns_to_default_room() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut a = server.login("a").await.expect("login a");

    a.send_line("/join dev").await.expect("send");
    a.expect_containing("You joined dev").await.expect("confirm");

    a.send_line("/leave").await.expect("send");
    assert_eq!(
        a.recv_line().await.expect("confirm"),
        "🟢 You returned to lobby"
    );
    assert_eq!(
        server.hub.directory.user_room("a").await.unwrap(),
        Some("lobby".to_string())
    );
}

#[tokio::test]
async fn test_rooms_lists_member_counts() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut a = server.login("a").await.expect("login a");
    let _b = server.login("b").await.expect("login b");
    a.expect_containing("b joined lobby").await.expect("arrival");

    a.send_line("/join dev").await.expect("send");
    a.expect_containing("You joined dev").await.expect("confirm");

    a.send_line("/rooms").await.expect("send");
    assert_eq!(
        a.recv_line().await.expect("listing"),
        "Rooms: dev(1), lobby(1)"
    );
}

#[tokio::test]
async fn test_subscriber_gets_exactly_one_direct_copy() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut a = server.login("a").await.expect("login a");
    a.send_line("/join dev").await.expect("send");
    a.expect_containing("You joined dev").await.expect("confirm");

    let mut b = server.login("b").await.expect("login b");
    b.send_line("/subscribe a").await.expect("send");
    b.expect_containing("Subscribed to a").await.expect("confirm");

    a.send_line("hello").await.expect("send");

    // b is not in dev: no room broadcast, exactly one subscription copy.
    assert_eq!(b.recv_line().await.expect("direct"), "[Sub] a: hello");
    assert_eq!(b.recv_within(SILENCE).await, None);
    // a receives neither.
    assert_eq!(a.recv_within(SILENCE).await, None);
}

#[tokio::test]
async fn test_subscriber_in_same_room_gets_both_copies() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut a = server.login("a").await.expect("login a");
    a.send_line("/join dev").await.expect("send");
    a.expect_containing("You joined dev").await.expect("confirm");

    let mut b = server.login("b").await.expect("login b");
    b.send_line("/subscribe a").await.expect("send");
    b.expect_containing("Subscribed to a").await.expect("confirm");
    b.send_line("/join dev").await.expect("send");
    b.expect_containing("You joined dev").await.expect("confirm");
    a.expect_containing("b joined dev").await.expect("arrival");

    a.send_line("hello").await.expect("send");

    b.expect_containing("a: hello").await.expect("room copy");
    b.expect_containing("[Sub] a: hello").await.expect("sub copy");
    assert_eq!(a.recv_within(SILENCE).await, None);
}

#[tokio::test]
async fn test_subscribe_rejections_leave_no_state() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut b = server.login("b").await.expect("login b");

    b.send_line("/subscribe b").await.expect("send");
    assert_eq!(
        b.recv_line().await.expect("reply"),
        "🔴 Cannot subscribe to self"
    );

    b.send_line("/subscribe nobody").await.expect("send");
    assert_eq!(
        b.recv_line().await.expect("reply"),
        "🔴 User nobody does not exist"
    );

    assert!(server.hub.directory.subscribers("b").await.unwrap().is_empty());
    assert!(server.hub.directory.subscribers("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unsubscribe_flow() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut a = server.login("a").await.expect("login a");
    let mut b = server.login("b").await.expect("login b");
    a.expect_containing("b joined lobby").await.expect("arrival");

    b.send_line("/subscribe a").await.expect("send");
    b.expect_containing("Subscribed to a").await.expect("confirm");
    b.send_line("/unsubscribe a").await.expect("send");
    assert_eq!(
        b.recv_line().await.expect("reply"),
        "🟢 Unsubscribed from a"
    );
    b.send_line("/unsubscribe a").await.expect("send");
    assert_eq!(
        b.recv_line().await.expect("reply"),
        "🟡 Not subscribed to a"
    );

    // Both still share the lobby: b sees the room copy and nothing more.
    a.send_line("back again").await.expect("send");
    assert_eq!(b.recv_line().await.expect("room copy"), "a: back again");
    assert_eq!(b.recv_within(SILENCE).await, None);
}

#[tokio::test]
async fn test_missing_arguments_yield_usage_lines() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut a = server.login("a").await.expect("login a");

    a.send_line("/join").await.expect("send");
    assert_eq!(a.recv_line().await.expect("reply"), "Usage: /join <room>");

    a.send_line("/subscribe").await.expect("send");
    assert_eq!(
        a.recv_line().await.expect("reply"),
        "Usage: /subscribe <username>"
    );

    a.send_line("/unsubscribe").await.expect("send");
    assert_eq!(
        a.recv_line().await.expect("reply"),
        "Usage: /unsubscribe <username>"
    );

    // Still in the lobby; nothing moved.
    assert_eq!(
        server.hub.directory.user_room("a").await.unwrap(),
        Some("lobby".to_string())
    );
}

#[tokio::test]
async fn test_unknown_slash_command_broadcasts_verbatim() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut a = server.login("a").await.expect("login a");
    let mut b = server.login("b").await.expect("login b");
    a.expect_containing("b joined lobby").await.expect("arrival");

    a.send_line("/dance wildly").await.expect("send");
    assert_eq!(b.recv_line().await.expect("broadcast"), "a: /dance wildly");
}
