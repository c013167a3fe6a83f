//! 下载客户端：公共入口。
//!
//! - [`DownloadClient::execute`]：响应头就绪即返回句柄，正文后台复制；
//! - [`DownloadClient::execute_batch`] / [`DownloadClient::execute_channel`]：
//!   有界 worker 池批量调度；
//! - [`get`] / [`get_batch`]：使用进程级默认客户端的便捷函数。

mod batch;
pub(crate) mod copy_task;
pub(crate) mod prepare;
pub(crate) mod ranged_transfer;
pub(crate) mod single_transfer;

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio::sync::mpsc;

use crate::internal::client::structs::reqwest_client::ReqwestClient;
use crate::internal::client::traits::http_client::HttpClient;
use crate::internal::download::structs::download_error::DownloadError;
use crate::internal::download::structs::download_request::DownloadRequest;
use crate::internal::download::structs::download_response::DownloadResponse;
use crate::internal::states::cancel_token::CancelToken;

/// 下载客户端。可廉价克隆、在任务间并发使用。
#[derive(Clone)]
pub struct DownloadClient {
    http: Arc<dyn HttpClient>,
}

impl Default for DownloadClient {
    fn default() -> Self {
        Self {
            http: Arc::new(ReqwestClient::default()),
        }
    }
}

impl DownloadClient {
    /// 以任意 [`HttpClient`] 实现构建客户端。
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// 执行一次下载请求。
    ///
    /// 响应头就绪（或更早失败）即返回 [`DownloadResponse`]；正文由
    /// 后台任务复制，观察方通过句柄跟踪进度、等待终态。
    pub async fn execute(&self, request: DownloadRequest) -> DownloadResponse {
        let request = Arc::new(request);
        // 响应令牌：调用方令牌的子级，取消可自上而下传播
        let token = match &request.cancel_token {
            Some(parent) => parent.child(),
            None => CancelToken::new(),
        };
        let resp = DownloadResponse::new(request.clone(), token);

        log::debug!("开始下载: {}", request.url());
        match prepare::prepare(self.http.clone(), &request, &resp).await {
            Ok(Some(plan)) => {
                let http = self.http.clone();
                let background_resp = resp.clone();
                tokio::spawn(async move {
                    copy_task::run(http, request, background_resp, plan).await;
                });
            }
            Ok(None) => {
                // 准备阶段已成功终结（文件已完整），响应已关闭
            }
            Err(e) => resp.close(Some(e)),
        }
        resp
    }
}

/// 进程级默认客户端；仅供便捷入口使用。
static DEFAULT_CLIENT: Lazy<DownloadClient> = Lazy::new(DownloadClient::default);

/// 进程级默认客户端的引用。
pub fn default_client() -> &'static DownloadClient {
    &DEFAULT_CLIENT
}

/// 便捷入口：用默认客户端下载 `url` 到 `save_path`，阻塞直至终态。
///
/// 成功返回响应句柄；失败返回终态错误。
pub async fn get(
    save_path: impl AsRef<Path>,
    url: impl Into<String>,
) -> Result<DownloadResponse, Arc<DownloadError>> {
    let resp = default_client()
        .execute(DownloadRequest::new(save_path, url))
        .await;
    match resp.err().await {
        None => Ok(resp),
        Some(e) => Err(e),
    }
}

/// 便捷入口：把多个 URL 批量下载到已存在的目录 `dst_dir`。
///
/// 立即返回响应通道；目录不存在或不是目录时直接失败。
pub async fn get_batch(
    workers: usize,
    dst_dir: impl AsRef<Path>,
    urls: Vec<String>,
) -> Result<mpsc::Receiver<DownloadResponse>, DownloadError> {
    let dst_dir = dst_dir.as_ref();
    let meta = tokio::fs::metadata(dst_dir).await?;
    if !meta.is_dir() {
        return Err(DownloadError::Io(anyhow::anyhow!(
            "批量下载目标不是目录: {}",
            dst_dir.display()
        )));
    }

    let requests = urls
        .into_iter()
        .map(|url| DownloadRequest::new(dst_dir, url))
        .collect();
    Ok(default_client().execute_batch(workers, requests))
}
