//! # DoneSignal — 一次性完成广播
//!
//! 基于 [`tokio::sync::watch`] 的单次触发信号：`set` 只生效一次，
//! 任意多个观察方可重复 `wait`，已触发后立即返回。
//! 用于下载响应的终态广播（done）。

use std::sync::Arc;
use tokio::sync::watch;

/// 一次性完成信号。Clone 后共享同一触发状态。
#[derive(Debug, Clone)]
pub struct DoneSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for DoneSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl DoneSignal {
    /// 创建一个未触发的信号。
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// 触发信号；仅第一次调用生效。返回本次调用是否完成了触发。
    pub fn set(&self) -> bool {
        let mut fired = false;
        self.sender.send_if_modified(|v| {
            if !*v {
                *v = true;
                fired = true;
                true
            } else {
                false
            }
        });
        fired
    }

    /// 信号是否已触发（非阻塞）。
    pub fn is_set(&self) -> bool {
        *self.sender.borrow()
    }

    /// 等待信号触发；已触发时立即返回。任意多个观察方可同时等待。
    pub async fn wait(&self) {
        let mut rx = self.sender.subscribe();
        // 自身持有 sender，wait_for 不会因通道关闭出错
        let _ = rx.wait_for(|v| *v).await;
    }
}
