//! 连接注册表
//!
//! 维护用户到活跃连接集合的映射。同一用户允许多条连接并存
//! （多设备、多标签页），注册永远生成新的连接ID，绝不顶掉旧
//! 连接。状态只存在于进程内，重启后清零——客户端重连时会重新
//! 注册，持久数据（消息、工单）都在外部存储里，所以注册表丢
//! 状态不影响正确性。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use domain::{Connection, ConnectionId, UserId, UserRole};

use crate::clock::Clock;

#[derive(Default)]
struct RegistryInner {
    /// 连接存储
    connections: HashMap<ConnectionId, Connection>,
    /// 用户到连接集合的映射
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
    /// 角色到连接集合的映射（用于"所有在线客服"这类投递）
    by_role: HashMap<UserRole, HashSet<ConnectionId>>,
}

/// 进程内连接注册表。
///
/// 三张映射放在同一把锁下，注册/注销对任何并发读者都是原子
/// 的，不会观察到残缺的成员集合。
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
    clock: Arc<dyn Clock>,
}

impl ConnectionRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            clock,
        }
    }

    /// 注册一条新连接，总是返回全新的连接。
    pub async fn register(&self, user_id: UserId, role: UserRole) -> Connection {
        let connection = Connection::establish(user_id, role, self.clock.now());

        let mut inner = self.inner.write().await;
        inner.by_user.entry(user_id).or_default().insert(connection.id);
        inner.by_role.entry(role).or_default().insert(connection.id);
        inner.connections.insert(connection.id, connection.clone());
        drop(inner);

        info!(
            connection_id = %connection.id,
            user_id = %user_id,
            role = role.as_str(),
            "connection registered"
        );
        connection
    }

    /// 注销连接。连接已经不在时是空操作（容忍重复的断开事件）。
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<Connection> {
        let mut inner = self.inner.write().await;
        let connection = inner.connections.remove(&connection_id)?;

        if let Some(set) = inner.by_user.get_mut(&connection.user_id) {
            set.remove(&connection_id);
            if set.is_empty() {
                inner.by_user.remove(&connection.user_id);
            }
        }
        if let Some(set) = inner.by_role.get_mut(&connection.role) {
            set.remove(&connection_id);
            if set.is_empty() {
                inner.by_role.remove(&connection.role);
            }
        }
        drop(inner);

        debug!(connection_id = %connection_id, user_id = %connection.user_id, "connection unregistered");
        Some(connection)
    }

    /// 某个用户当前的全部连接。
    pub async fn connections_of(&self, user_id: UserId) -> Vec<ConnectionId> {
        let inner = self.inner.read().await;
        inner
            .by_user
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 某个角色当前的全部连接。
    pub async fn connections_of_role(&self, role: UserRole) -> Vec<ConnectionId> {
        let inner = self.inner.read().await;
        inner
            .by_role
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 查找连接详情。
    pub async fn get(&self, connection_id: ConnectionId) -> Option<Connection> {
        let inner = self.inner.read().await;
        inner.connections.get(&connection_id).cloned()
    }

    /// 用户当前的连接数。
    pub async fn connection_count(&self, user_id: UserId) -> usize {
        let inner = self.inner.read().await;
        inner.by_user.get(&user_id).map(HashSet::len).unwrap_or(0)
    }
}
