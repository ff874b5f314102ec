//! 事件中继
//!
//! 把一个事件扇出到目标用户（或目标角色）的每一条活跃连接。
//! 投递是尽力而为：写失败的连接直接剔除，不重试——客户端重连
//! 后通过读 API 拉取权威状态。中继从不修改持久状态，只负责
//! 送达。各连接之间没有任何顺序保证。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use domain::{ConnectionId, RealtimeEvent, UserId, UserRole};

use crate::registry::ConnectionRegistry;

/// 每条连接一个无界发送端，由 WebSocket 层在连接建立时挂载。
pub type EventSender = mpsc::UnboundedSender<RealtimeEvent>;

pub struct EventRelay {
    registry: Arc<ConnectionRegistry>,
    senders: RwLock<HashMap<ConnectionId, EventSender>>,
}

impl EventRelay {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            senders: RwLock::new(HashMap::new()),
        }
    }

    /// 挂载一条连接的发送端。
    pub async fn attach(&self, connection_id: ConnectionId, sender: EventSender) {
        let mut senders = self.senders.write().await;
        senders.insert(connection_id, sender);
    }

    /// 卸载发送端。之后的 emit 不会再把该连接当作目标。
    pub async fn detach(&self, connection_id: ConnectionId) {
        let mut senders = self.senders.write().await;
        senders.remove(&connection_id);
    }

    /// 投递事件到目标用户的全部连接，返回成功送达的条数。
    /// 用户没有活跃连接时静默返回 0——消息的持久性由存储负责，
    /// 不是中继的职责。
    pub async fn emit(&self, target: UserId, event: RealtimeEvent) -> usize {
        let targets = self.registry.connections_of(target).await;
        self.deliver(&targets, event).await
    }

    /// 投递事件到某个角色的全部连接。
    pub async fn emit_to_role(&self, role: UserRole, event: RealtimeEvent) -> usize {
        let targets = self.registry.connections_of_role(role).await;
        self.deliver(&targets, event).await
    }

    /// 投递事件到指定的单条连接（同步拒绝只回给发起方时使用）。
    pub async fn emit_to_connection(&self, connection_id: ConnectionId, event: RealtimeEvent) -> bool {
        self.deliver(&[connection_id], event).await == 1
    }

    async fn deliver(&self, targets: &[ConnectionId], event: RealtimeEvent) -> usize {
        if targets.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let senders = self.senders.read().await;
            for id in targets {
                match senders.get(id) {
                    Some(sender) => {
                        if sender.send(event.clone()).is_ok() {
                            delivered += 1;
                        } else {
                            // 接收端已经挂了，之后不再投递
                            dead.push(*id);
                        }
                    }
                    None => {
                        debug!(connection_id = %id, "no sender attached, dropping event");
                    }
                }
            }
        }

        if !dead.is_empty() {
            let mut senders = self.senders.write().await;
            for id in &dead {
                senders.remove(id);
            }
            warn!(count = dead.len(), event = event.event_name(), "pruned dead connections");
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use domain::UserRole;
    use uuid::Uuid;

    fn setup() -> (Arc<ConnectionRegistry>, EventRelay) {
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(SystemClock)));
        let relay = EventRelay::new(registry.clone());
        (registry, relay)
    }

    fn typing_event() -> RealtimeEvent {
        RealtimeEvent::TypingIndicator {
            sender_id: UserId::new(Uuid::new_v4()),
        }
    }

    #[tokio::test]
    async fn emit_reaches_every_connection_of_the_user() {
        let (registry, relay) = setup();
        let user = UserId::new(Uuid::new_v4());

        let conn_a = registry.register(user, UserRole::Customer).await;
        let conn_b = registry.register(user, UserRole::Customer).await;
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        relay.attach(conn_a.id, tx_a).await;
        relay.attach(conn_b.id, tx_b).await;

        let delivered = relay.emit(user, typing_event()).await;

        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn emit_to_offline_user_is_silent_noop() {
        let (_registry, relay) = setup();
        let delivered = relay.emit(UserId::new(Uuid::new_v4()), typing_event()).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn dead_receivers_are_pruned_without_retry() {
        let (registry, relay) = setup();
        let user = UserId::new(Uuid::new_v4());
        let conn = registry.register(user, UserRole::Provider).await;

        let (tx, rx) = mpsc::unbounded_channel();
        relay.attach(conn.id, tx).await;
        drop(rx);

        assert_eq!(relay.emit(user, typing_event()).await, 0);
        // 发送端已被剔除，后续投递不再尝试
        assert_eq!(relay.emit(user, typing_event()).await, 0);
    }

    #[tokio::test]
    async fn detached_connection_receives_nothing_further() {
        let (registry, relay) = setup();
        let user = UserId::new(Uuid::new_v4());
        let conn = registry.register(user, UserRole::Customer).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        relay.attach(conn.id, tx).await;
        relay.detach(conn.id).await;

        relay.emit(user, typing_event()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn role_emit_skips_other_roles() {
        let (registry, relay) = setup();
        let admin = registry
            .register(UserId::new(Uuid::new_v4()), UserRole::Admin)
            .await;
        let customer = registry
            .register(UserId::new(Uuid::new_v4()), UserRole::Customer)
            .await;

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();
        relay.attach(admin.id, tx_a).await;
        relay.attach(customer.id, tx_c).await;

        let delivered = relay.emit_to_role(UserRole::Admin, typing_event()).await;

        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }
}
