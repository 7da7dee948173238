//! 事件模块
//!
//! - `types.rs`: 固定事件集合、事件载荷与订阅名映射
//! - `notifier.rs`: 发布/订阅注册表

mod notifier;
mod types;

pub use notifier::*;
pub use types::*;
