//! 实时通信核心领域模型
//!
//! 包含连接、私信、会话视图、客服工单等核心实体，
//! 以及领域事件和仓储接口定义。

pub mod entities;
pub mod errors;
pub mod events;
pub mod repositories;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use events::*;
pub use repositories::*;
pub use value_objects::*;
