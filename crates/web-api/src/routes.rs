use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::{ConversationDto, MessageDto, SupportMessageDto, TicketDto};

use crate::{error::ApiError, state::AppState, ws};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/{partner_id}/messages",
            get(conversation_history),
        )
        .route("/tickets/open", get(open_tickets))
        .route("/tickets/{ticket_id}/messages", get(ticket_messages))
        .route("/ws", get(ws::websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 会话列表：每次都返回存储里的权威未读数
async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationDto>>, ApiError> {
    let identity = state.jwt.identity_from_headers(&headers)?;
    let entries = state.conversations.conversations_of(identity.user_id).await?;

    Ok(Json(entries.iter().map(ConversationDto::from).collect()))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
    before: Option<Uuid>,
}

/// 消息历史。按约定，拉取历史就是该会话未读归零的时刻。
async fn conversation_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(partner_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let identity = state.jwt.identity_from_headers(&headers)?;
    let limit = query.limit.unwrap_or(50);

    let messages = state
        .conversations
        .history(
            identity.user_id,
            partner_id.into(),
            limit,
            query.before.map(Into::into),
        )
        .await?;

    Ok(Json(messages.iter().map(MessageDto::from).collect()))
}

/// 待认领工单列表，仅客服可用
async fn open_tickets(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<TicketDto>>, ApiError> {
    let identity = state.jwt.identity_from_headers(&headers)?;
    let tickets = state.tickets.open_tickets(identity.role).await?;

    Ok(Json(tickets.iter().map(TicketDto::from).collect()))
}

/// 工单留言，发起人和客服可见
async fn ticket_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<SupportMessageDto>>, ApiError> {
    let identity = state.jwt.identity_from_headers(&headers)?;
    let messages = state
        .tickets
        .ticket_messages(ticket_id.into(), identity.user_id, identity.role)
        .await?;

    Ok(Json(messages.iter().map(SupportMessageDto::from).collect()))
}
