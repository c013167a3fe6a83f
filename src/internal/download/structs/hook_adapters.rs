//! 单阶段钩子适配器：将闭包包装成 [`TransferHook`]，供 `with_xx_hook` 使用。

use async_trait::async_trait;

use crate::internal::download::structs::download_response::DownloadResponse;
use crate::internal::download::traits::hooks::{HookAbort, TransferHook};

/// 仅实现「正文开始前」的钩子适配器。
pub(crate) struct BeforeCopyHookAdapter<F>(pub(crate) F);

#[async_trait]
impl<F> TransferHook for BeforeCopyHookAdapter<F>
where
    F: FnMut(&DownloadResponse) -> Result<(), HookAbort> + Send + Sync + 'static,
{
    async fn before_copy(&mut self, resp: &DownloadResponse) -> Result<(), HookAbort> {
        (self.0)(resp)
    }
}

/// 仅实现「写入完成后」的钩子适配器。
pub(crate) struct AfterCopyHookAdapter<F>(pub(crate) F);

#[async_trait]
impl<F> TransferHook for AfterCopyHookAdapter<F>
where
    F: FnMut(&DownloadResponse) -> Result<(), HookAbort> + Send + Sync + 'static,
{
    async fn after_copy(&mut self, resp: &DownloadResponse) -> Result<(), HookAbort> {
        (self.0)(resp)
    }
}
