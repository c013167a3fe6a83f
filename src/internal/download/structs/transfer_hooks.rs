//! 钩子容器：按注册顺序依次执行多个钩子。

use crate::internal::download::structs::download_response::DownloadResponse;
use crate::internal::download::traits::hooks::{HookAbort, TransferHook};

/// 钩子容器。每个阶段对所有已注册钩子按添加顺序执行，遇 `Err` 即止。
#[derive(Default)]
pub struct TransferHooksContainer {
    hooks: Vec<Box<dyn TransferHook>>,
}

impl TransferHooksContainer {
    /// 添加一个钩子；可多次调用注册多个。
    pub fn add(&mut self, hook: impl TransferHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub async fn run_before_copy(
        &mut self,
        resp: &DownloadResponse,
    ) -> Result<(), HookAbort> {
        for h in self.hooks.iter_mut() {
            h.before_copy(resp).await?;
        }
        Ok(())
    }

    pub async fn run_after_copy(
        &mut self,
        resp: &DownloadResponse,
    ) -> Result<(), HookAbort> {
        for h in self.hooks.iter_mut() {
            h.after_copy(resp).await?;
        }
        Ok(())
    }
}
