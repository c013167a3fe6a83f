//! # CancelToken — 一次性取消令牌
//!
//! 单次触发、可克隆共享的取消信号；支持父子链接：
//! 子令牌在自身或任一祖先触发时均视为已取消，
//! 子令牌的触发不会影响父令牌。
//!
//! 下载请求、响应与其派生的所有任务共享同一令牌（或其子令牌）。

use std::sync::Arc;
use tokio::sync::watch;

/// 一次性取消令牌。Clone 共享同一触发状态。
#[derive(Debug, Clone)]
pub struct CancelToken {
    fired: Arc<watch::Sender<bool>>,
    parent: Option<Arc<CancelToken>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// 创建一个独立的根令牌。
    pub fn new() -> Self {
        let (fired, _) = watch::channel(false);
        Self {
            fired: Arc::new(fired),
            parent: None,
        }
    }

    /// 派生一个子令牌：父令牌触发时子令牌同样视为已取消，反之不然。
    pub fn child(&self) -> Self {
        let (fired, _) = watch::channel(false);
        Self {
            fired: Arc::new(fired),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// 触发取消；幂等，仅第一次生效。
    pub fn cancel(&self) {
        self.fired.send_if_modified(|v| {
            if !*v {
                *v = true;
                true
            } else {
                false
            }
        });
    }

    /// 自身或任一祖先是否已触发（非阻塞）。
    pub fn is_cancelled(&self) -> bool {
        if *self.fired.borrow() {
            return true;
        }
        let mut cur = self.parent.as_deref();
        while let Some(p) = cur {
            if *p.fired.borrow() {
                return true;
            }
            cur = p.parent.as_deref();
        }
        false
    }

    /// 等待取消触发；自身或任一祖先触发即返回。
    pub async fn cancelled(&self) {
        // 收集自身与所有祖先的接收端，任一触发即返回
        let mut receivers = vec![self.fired.subscribe()];
        let mut cur = self.parent.as_deref();
        while let Some(p) = cur {
            receivers.push(p.fired.subscribe());
            cur = p.parent.as_deref();
        }

        let waits = receivers
            .iter_mut()
            .map(|rx| Box::pin(rx.wait_for(|v| *v)))
            .collect::<Vec<_>>();
        let _ = futures_util::future::select_all(waits).await;
    }
}
