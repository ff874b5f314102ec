//! Web API 层。
//!
//! 提供 Axum 路由：WebSocket 端点承接入站事件并推送出站事件，
//! HTTP 端点提供权威状态的辅助读取。

mod auth;
mod error;
mod routes;
mod state;
mod ws;

pub use auth::{Identity, JwtService};
pub use config::JwtConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
