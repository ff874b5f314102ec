//! 私信链路的端到端测试
//!
//! 通过真实的 WebSocket 连接和 HTTP 读 API 验证投递、回显、
//! 未读计数和瞬时信号。

mod support;

use domain::UserRole;
use serde_json::json;
use support::{user, TestApp};
use uuid::Uuid;

#[tokio::test]
async fn message_is_delivered_echoed_and_counted() {
    let app = TestApp::spawn().await;
    let alice = user();
    let bob = user();

    let mut ws_alice = app.connect(alice, UserRole::Customer).await;
    let mut ws_bob = app.connect(bob, UserRole::Provider).await;

    ws_alice
        .send(json!({
            "type": "send_message",
            "receiver_id": Uuid::from(bob),
            "body": "hi bob"
        }))
        .await;

    // 发送方收到回显
    let echo = ws_alice.expect_event("message_received").await;
    assert_eq!(echo["message"]["body"], "hi bob");
    let message_id = echo["message"]["id"].as_str().unwrap().to_string();

    // 接收方先收到消息，再收到未读数更新
    let received = ws_bob.expect_event("message_received").await;
    assert_eq!(received["message"]["id"].as_str().unwrap(), message_id);

    let updated = ws_bob.expect_event("conversation_updated").await;
    assert_eq!(updated["partner_id"], json!(Uuid::from(alice)));
    assert_eq!(updated["unread_count"], 1);

    // 历史拉取返回同一条消息（同一个 id），同时把未读清零
    let bob_token = app.token(bob, UserRole::Provider);
    let history = app
        .get_json(
            &format!("/api/v1/conversations/{}/messages", Uuid::from(alice)),
            &bob_token,
        )
        .await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["id"].as_str().unwrap(), message_id);

    let conversations = app.get_json("/api/v1/conversations", &bob_token).await;
    assert_eq!(conversations[0]["unread_count"], 0);
}

#[tokio::test]
async fn offline_receiver_accumulates_unread_until_open() {
    let app = TestApp::spawn().await;
    let alice = user();
    let bob = user();

    let mut ws_alice = app.connect(alice, UserRole::Customer).await;

    // Bob 没有任何连接
    ws_alice
        .send(json!({
            "type": "send_message",
            "receiver_id": Uuid::from(bob),
            "body": "hi"
        }))
        .await;
    ws_alice.expect_event("message_received").await;

    // 消息已落库，未读数为 1
    let bob_token = app.token(bob, UserRole::Provider);
    let conversations = app.get_json("/api/v1/conversations", &bob_token).await;
    assert_eq!(conversations.as_array().unwrap().len(), 1);
    assert_eq!(conversations[0]["partner_id"], json!(Uuid::from(alice)));
    assert_eq!(conversations[0]["unread_count"], 1);
    assert_eq!(conversations[0]["last_message"]["body"], "hi");

    // Bob 之后上线并打开会话，未读归零
    let mut ws_bob = app.connect(bob, UserRole::Provider).await;
    ws_bob
        .send(json!({
            "type": "open_conversation",
            "partner_id": Uuid::from(alice)
        }))
        .await;
    let updated = ws_bob.expect_event("conversation_updated").await;
    assert_eq!(updated["unread_count"], 0);

    let conversations = app.get_json("/api/v1/conversations", &bob_token).await;
    assert_eq!(conversations[0]["unread_count"], 0);
}

#[tokio::test]
async fn active_viewer_is_exempt_from_unread_counting() {
    let app = TestApp::spawn().await;
    let alice = user();
    let bob = user();

    let mut ws_alice = app.connect(alice, UserRole::Customer).await;
    let mut ws_bob = app.connect(bob, UserRole::Provider).await;

    ws_bob
        .send(json!({
            "type": "open_conversation",
            "partner_id": Uuid::from(alice)
        }))
        .await;
    ws_bob.expect_event("conversation_updated").await;

    ws_alice
        .send(json!({
            "type": "send_message",
            "receiver_id": Uuid::from(bob),
            "body": "seen live"
        }))
        .await;
    ws_alice.expect_event("message_received").await;

    ws_bob.expect_event("message_received").await;
    let updated = ws_bob.expect_event("conversation_updated").await;
    assert_eq!(updated["unread_count"], 0);

    let bob_token = app.token(bob, UserRole::Provider);
    let conversations = app.get_json("/api/v1/conversations", &bob_token).await;
    assert_eq!(conversations[0]["unread_count"], 0);
}

#[tokio::test]
async fn echo_reaches_every_device_of_the_sender() {
    let app = TestApp::spawn().await;
    let alice = user();
    let bob = user();

    let mut phone = app.connect(alice, UserRole::Customer).await;
    let mut laptop = app.connect(alice, UserRole::Customer).await;

    phone
        .send(json!({
            "type": "send_message",
            "receiver_id": Uuid::from(bob),
            "body": "from my phone"
        }))
        .await;

    let from_phone = phone.expect_event("message_received").await;
    let from_laptop = laptop.expect_event("message_received").await;
    assert_eq!(from_phone["message"]["id"], from_laptop["message"]["id"]);
}

#[tokio::test]
async fn typing_indicator_is_relayed_without_persistence() {
    let app = TestApp::spawn().await;
    let alice = user();
    let bob = user();

    let mut ws_alice = app.connect(alice, UserRole::Customer).await;
    let mut ws_bob = app.connect(bob, UserRole::Provider).await;

    ws_alice
        .send(json!({
            "type": "typing",
            "receiver_id": Uuid::from(bob)
        }))
        .await;

    let typing = ws_bob.expect_event("typing_indicator").await;
    assert_eq!(typing["sender_id"], json!(Uuid::from(alice)));

    // 信号不落库：双方会话列表都是空的
    let bob_token = app.token(bob, UserRole::Provider);
    let conversations = app.get_json("/api/v1/conversations", &bob_token).await;
    assert!(conversations.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn self_messaging_is_rejected_synchronously() {
    let app = TestApp::spawn().await;
    let alice = user();

    let mut ws_alice = app.connect(alice, UserRole::Customer).await;

    ws_alice
        .send(json!({
            "type": "send_message",
            "receiver_id": Uuid::from(alice),
            "body": "note to self"
        }))
        .await;

    let rejection = ws_alice.expect_event("request_rejected").await;
    assert_eq!(rejection["code"], "validation_failed");

    let token = app.token(alice, UserRole::Customer);
    let conversations = app.get_json("/api/v1/conversations", &token).await;
    assert!(conversations.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_frames_get_a_typed_rejection() {
    let app = TestApp::spawn().await;
    let alice = user();

    let mut ws_alice = app.connect(alice, UserRole::Customer).await;
    ws_alice.send(json!({ "type": "no_such_event" })).await;

    let rejection = ws_alice.expect_event("request_rejected").await;
    assert_eq!(rejection["code"], "malformed_payload");
}

#[tokio::test]
async fn websocket_upgrade_requires_a_valid_token() {
    let app = TestApp::spawn().await;

    let url = format!("ws://{}/api/v1/ws?token=garbage", app.addr);
    assert!(tokio_tungstenite::connect_async(url).await.is_err());
}
