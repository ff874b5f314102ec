//! 连接实体定义
//!
//! 一个 Connection 对应一条活跃的传输会话。同一用户允许同时
//! 持有多条连接（多端登录），因此连接标识每次注册都重新生成。

use serde::{Deserialize, Serialize};

use crate::value_objects::{ConnectionId, Timestamp, UserId};

/// 用户角色，由外部身份服务在签发身份时给定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// 消费者
    Customer,
    /// 服务提供者
    Provider,
    /// 平台客服/管理员
    Admin,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Provider => "provider",
            UserRole::Admin => "admin",
        }
    }

    /// 从存储列或 JWT claim 中解析角色。
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "customer" => Some(UserRole::Customer),
            "provider" => Some(UserRole::Provider),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// 一条活跃连接。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// 连接标识，按传输会话唯一
    pub id: ConnectionId,
    /// 持有该连接的用户
    pub user_id: UserId,
    /// 用户角色
    pub role: UserRole,
    /// 建立时间
    pub connected_at: Timestamp,
}

impl Connection {
    /// 建立一条新连接。标识总是新生成的，绝不复用，
    /// 这样第二台设备上线不会顶掉第一台。
    pub fn establish(user_id: UserId, role: UserRole, now: Timestamp) -> Self {
        Self {
            id: ConnectionId::generate(),
            user_id,
            role,
            connected_at: now,
        }
    }
}
