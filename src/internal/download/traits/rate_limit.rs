//! 限速器契约：协作式字节配额。

use async_trait::async_trait;

use crate::internal::download::structs::download_error::DownloadError;
use crate::internal::states::cancel_token::CancelToken;

/// 限速器。可被多个请求共享（全局限速），实现必须支持并发 `wait_n`。
///
/// 配额不可部分发放：`wait_n` 要么在 `n` 字节全部获批后返回 `Ok`，
/// 要么在取消令牌触发时返回 [`DownloadError::Cancelled`]。
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// 申请 `n` 字节的配额，必要时等待。
    async fn wait_n(&self, token: &CancelToken, n: usize) -> Result<(), DownloadError>;
}
