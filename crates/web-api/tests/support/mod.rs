//! 集成测试支撑：在随机端口拉起完整应用（内存仓储），
//! 并提供 WebSocket / HTTP 客户端辅助。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use application::memory::{
    InMemoryConversationRepository, InMemoryMessageRepository, InMemoryTicketRepository,
};
use application::{
    Clock, ConnectionRegistry, ConversationService, EventRelay, SignalRelay, SupportTicketService,
    SystemClock,
};
use domain::{UserId, UserRole};
use web_api::{router, AppState, JwtConfig, JwtService};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE_WINDOW: Duration = Duration::from_millis(300);

pub struct TestApp {
    pub addr: SocketAddr,
    jwt: Arc<JwtService>,
    http: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = Arc::new(ConnectionRegistry::new(clock.clone()));
        let relay = Arc::new(EventRelay::new(registry.clone()));

        let message_repo = Arc::new(InMemoryMessageRepository::new());
        let conversation_repo = Arc::new(InMemoryConversationRepository::new());
        let ticket_repo = Arc::new(InMemoryTicketRepository::new());

        let conversations = Arc::new(ConversationService::new(
            message_repo,
            conversation_repo,
            registry.clone(),
            relay.clone(),
            clock.clone(),
        ));
        let tickets = Arc::new(SupportTicketService::new(
            ticket_repo,
            relay.clone(),
            clock.clone(),
        ));
        let signals = Arc::new(SignalRelay::new(relay.clone()));

        let jwt = Arc::new(JwtService::new(JwtConfig {
            secret: "integration-test-secret".to_string(),
            expiration_hours: 24,
        }));

        let state = AppState::new(registry, relay, conversations, tickets, signals, jwt.clone());
        let app = router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server crashed");
        });

        Self {
            addr,
            jwt,
            http: reqwest::Client::new(),
        }
    }

    pub fn token(&self, user_id: UserId, role: UserRole) -> String {
        self.jwt.issue_token(user_id, role).unwrap()
    }

    /// 建立一条带身份的 WebSocket 连接。
    pub async fn connect(&self, user_id: UserId, role: UserRole) -> WsClient {
        let token = self.token(user_id, role);
        let url = format!("ws://{}/api/v1/ws?token={}", self.addr, token);
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("websocket connect failed");
        WsClient { stream }
    }

    /// 带身份的 GET，返回原始响应。
    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.http
            .get(format!("http://{}{}", self.addr, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("http request failed")
    }

    /// 带身份的 GET，期望 200 并解析 JSON。
    pub async fn get_json(&self, path: &str, token: &str) -> serde_json::Value {
        let response = self.get(path, token).await;
        assert!(
            response.status().is_success(),
            "GET {} failed: {}",
            path,
            response.status()
        );
        response.json().await.expect("invalid json response")
    }
}

pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// 发送一个客户端事件帧。
    pub async fn send(&mut self, payload: serde_json::Value) {
        self.stream
            .send(WsMessage::Text(payload.to_string().into()))
            .await
            .expect("websocket send failed");
    }

    /// 接收下一个服务端事件。
    pub async fn recv_event(&mut self) -> serde_json::Value {
        loop {
            let frame = tokio::time::timeout(EVENT_TIMEOUT, self.stream.next())
                .await
                .expect("timed out waiting for event")
                .expect("websocket closed")
                .expect("websocket error");

            match frame {
                WsMessage::Text(text) => {
                    return serde_json::from_str(text.as_str()).expect("invalid event json");
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    /// 接收下一个事件并断言事件名，返回其 data 部分。
    pub async fn expect_event(&mut self, name: &str) -> serde_json::Value {
        let event = self.recv_event().await;
        assert_eq!(event["event"], name, "unexpected event: {}", event);
        event["data"].clone()
    }

    /// 断言一小段时间内没有任何事件到达。
    pub async fn assert_silent(&mut self) {
        let result = tokio::time::timeout(SILENCE_WINDOW, self.stream.next()).await;
        if let Ok(Some(Ok(WsMessage::Text(text)))) = result {
            panic!("expected silence, got: {}", text);
        }
    }
}

pub fn user() -> UserId {
    UserId::new(Uuid::new_v4())
}
