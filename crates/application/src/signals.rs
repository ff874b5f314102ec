//! 瞬时信号中继
//!
//! 输入指示等信号不落库、不去重，直接借事件中继尽力投递。
//! 重复或迟到的信号无害：客户端收到后只是重置自己的过期定时器。

use std::sync::Arc;

use domain::{RealtimeEvent, UserId};

use crate::relay::EventRelay;

pub struct SignalRelay {
    relay: Arc<EventRelay>,
}

impl SignalRelay {
    pub fn new(relay: Arc<EventRelay>) -> Self {
        Self { relay }
    }

    /// 把"正在输入"转发给接收方的全部连接，返回送达条数。
    pub async fn typing(&self, sender_id: UserId, receiver_id: UserId) -> usize {
        self.relay
            .emit(receiver_id, RealtimeEvent::TypingIndicator { sender_id })
            .await
    }
}
