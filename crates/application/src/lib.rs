//! 应用层：实时通信核心的用例服务
//!
//! 包含连接注册表、事件中继、会话聚合器、客服工单状态机和
//! 瞬时信号中继，以及供测试和单机部署使用的内存仓储实现。

pub mod clock;
pub mod conversations;
pub mod dto;
pub mod error;
pub mod memory;
pub mod registry;
pub mod relay;
pub mod signals;
pub mod tickets;

pub use clock::{Clock, SystemClock};
pub use conversations::ConversationService;
pub use dto::*;
pub use error::{ApplicationError, ApplicationResult};
pub use registry::ConnectionRegistry;
pub use relay::EventRelay;
pub use signals::SignalRelay;
pub use tickets::SupportTicketService;
