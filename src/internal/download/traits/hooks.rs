//! 传输流程钩子：在「正文开始前 / 最后一字节写入后」插入调用方逻辑。
//!
//! 使用方式二选一（可混用）：
//! - **单阶段**：用 `with_before_copy_hook` / `with_after_copy_hook` 传入闭包；
//! - **完整钩子**：实现本 trait，通过请求的 `with_hook` 注册。

use async_trait::async_trait;

use crate::internal::download::structs::download_response::DownloadResponse;

/// 钩子要求中止传输时使用的错误；成为该次传输的终态错误。
#[derive(Debug, Clone)]
pub struct HookAbort;

impl std::fmt::Display for HookAbort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("下载被钩子中止")
    }
}

impl std::error::Error for HookAbort {}

/// 传输钩子。每个钩子的两个阶段在成功路径上各被调用恰好一次：
/// `before_copy` 在正文流开始前，`after_copy` 在最后一字节写入后、校验之前。
#[async_trait]
pub trait TransferHook: Send + Sync {
    /// 正文开始前调用。返回 `Err` 则关闭响应、不读取正文。
    async fn before_copy(&mut self, _resp: &DownloadResponse) -> Result<(), HookAbort> {
        Ok(())
    }

    /// 最后一字节写入后、校验之前调用。返回 `Err` 则跳过校验、以该错误关闭。
    async fn after_copy(&mut self, _resp: &DownloadResponse) -> Result<(), HookAbort> {
        Ok(())
    }
}
