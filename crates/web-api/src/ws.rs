//! WebSocket 连接处理
//!
//! 每条升级成功的连接：注册进连接注册表、在事件中继上挂发送
//! 端，然后一个任务向下游推事件、当前任务循环处理入站帧。
//! 同步拒绝只回给发起请求的这条连接，绝不广播。

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use application::ApplicationError;
use domain::{Connection, DomainError, RealtimeEvent, TicketId};

use crate::auth::Identity;
use crate::error::ApiError;
use crate::state::AppState;

/// WebSocket 连接查询参数
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// 外部身份服务签发的 access token
    pub token: String,
}

/// 客户端入站事件
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientEvent {
    /// 发送私信
    SendMessage { receiver_id: Uuid, body: String },
    /// 打开会话（未读归零并开始豁免计数）
    OpenConversation { partner_id: Uuid },
    /// 关闭会话
    CloseConversation,
    /// 正在输入
    Typing { receiver_id: Uuid },
    /// 发起客服工单
    CreateTicket,
    /// 认领工单
    ClaimTicket { ticket_id: Uuid },
    /// 工单内留言
    SendSupportMessage { ticket_id: Uuid, body: String },
    /// 关闭工单
    CloseTicket { ticket_id: Uuid },
}

/// 处理 WebSocket 连接升级
pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let identity = state.jwt.verify_token(&query.token)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, identity)))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let connection = state.registry.register(identity.user_id, identity.role).await;
    info!(
        connection_id = %connection.id,
        user_id = %identity.user_id,
        "websocket connection established"
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<RealtimeEvent>();
    state.relay.attach(connection.id, tx).await;

    let (mut sender, mut receiver) = socket.split();

    // 出站事件推送任务
    let send_connection_id = connection.id;
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize outbound event");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
        debug!(connection_id = %send_connection_id, "send task finished");
    });

    // 入站帧处理循环
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => dispatch(&state, &connection, event).await,
                Err(err) => {
                    state
                        .relay
                        .emit_to_connection(
                            connection.id,
                            RealtimeEvent::RequestRejected {
                                code: "malformed_payload".to_string(),
                                message: err.to_string(),
                            },
                        )
                        .await;
                }
            },
            Ok(WsMessage::Close(_)) => {
                debug!(connection_id = %connection.id, "connection closed by client");
                break;
            }
            // Ping/Pong 由协议栈处理
            Ok(_) => {}
            Err(err) => {
                warn!(connection_id = %connection.id, error = %err, "websocket error");
                break;
            }
        }
    }

    // 清理：先脱离中继（之后的 emit 不再投递给它），再注销连接，
    // 最后一条连接断开时顺带清掉活跃会话标记
    state.relay.detach(connection.id).await;
    state.registry.unregister(connection.id).await;
    state.conversations.connection_closed(identity.user_id).await;
    send_task.abort();

    info!(connection_id = %connection.id, user_id = %identity.user_id, "websocket connection cleaned up");
}

async fn dispatch(state: &AppState, connection: &Connection, event: ClientEvent) {
    let user_id = connection.user_id;
    let role = connection.role;

    let result = match event {
        ClientEvent::SendMessage { receiver_id, body } => state
            .conversations
            .send_message(user_id, receiver_id.into(), body)
            .await
            .map(|_| ()),
        ClientEvent::OpenConversation { partner_id } => {
            state
                .conversations
                .open_conversation(user_id, partner_id.into())
                .await
        }
        ClientEvent::CloseConversation => {
            state.conversations.close_conversation(user_id).await;
            Ok(())
        }
        ClientEvent::Typing { receiver_id } => {
            state.signals.typing(user_id, receiver_id.into()).await;
            Ok(())
        }
        ClientEvent::CreateTicket => state
            .tickets
            .create_ticket(user_id, role)
            .await
            .map(|_| ()),
        ClientEvent::ClaimTicket { ticket_id } => {
            let ticket_id = TicketId::from(ticket_id);
            match state.tickets.claim_ticket(ticket_id, user_id, role).await {
                Ok(_) => Ok(()),
                // 认领竞争的输家只收到针对本连接的拒绝事件，
                // 刷新待认领列表后重试别的工单
                Err(ApplicationError::Domain(DomainError::StateConflict { reason })) => {
                    state
                        .relay
                        .emit_to_connection(
                            connection.id,
                            RealtimeEvent::TicketClaimRejected { ticket_id, reason },
                        )
                        .await;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
        ClientEvent::SendSupportMessage { ticket_id, body } => state
            .tickets
            .send_support_message(ticket_id.into(), user_id, role, body)
            .await
            .map(|_| ()),
        ClientEvent::CloseTicket { ticket_id } => state
            .tickets
            .close_ticket(ticket_id.into(), user_id, role)
            .await
            .map(|_| ()),
    };

    if let Err(err) = result {
        state
            .relay
            .emit_to_connection(connection.id, rejection_event(&err))
            .await;
    }
}

/// 把应用层错误转成只发给发起方的同步拒绝事件。
fn rejection_event(err: &ApplicationError) -> RealtimeEvent {
    use domain::RepositoryError;

    let code = match err {
        ApplicationError::Domain(DomainError::Validation { .. }) => "validation_failed",
        ApplicationError::Domain(DomainError::StateConflict { .. }) => "state_conflict",
        ApplicationError::Domain(DomainError::NotFound { .. }) => "not_found",
        ApplicationError::Repository(RepositoryError::NotFound) => "not_found",
        ApplicationError::Repository(RepositoryError::Conflict) => "conflict",
        ApplicationError::Repository(RepositoryError::Storage { .. }) => "storage_unavailable",
        ApplicationError::Authorization => "authorization_failed",
    };

    RealtimeEvent::RequestRejected {
        code: code.to_string(),
        message: err.to_string(),
    }
}
