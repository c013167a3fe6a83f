//! 状态基础设施：响应式属性、一次性完成广播、取消令牌。

pub mod cancel_token;
pub mod done_signal;
pub(crate) mod reactive_core;
pub mod unlock_reactive;
