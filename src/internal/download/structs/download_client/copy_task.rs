//! 执行管线后半段（后台任务）：钩子、正文复制、校验、远端时间戳、终态关闭。
//!
//! 顺序保证：`before_copy` 严格先于任何正文写入，正文写完严格先于
//! `after_copy`，`after_copy` 严格先于校验。

use std::sync::Arc;

use crate::internal::client::traits::http_client::HttpClient;
use crate::internal::download::structs::download_client::prepare::TransferPlan;
use crate::internal::download::structs::download_client::ranged_transfer::{
    self, RangedCopyParams,
};
use crate::internal::download::structs::download_client::single_transfer::{
    self, SingleCopyParams,
};
use crate::internal::download::structs::download_error::DownloadError;
use crate::internal::download::structs::download_request::DownloadRequest;
use crate::internal::download::structs::download_response::DownloadResponse;

/// 后台复制入口：执行并以结果关闭响应。
pub(crate) async fn run(
    http: Arc<dyn HttpClient>,
    req: Arc<DownloadRequest>,
    resp: DownloadResponse,
    plan: TransferPlan,
) {
    let result = run_inner(http, &req, &resp, plan).await;
    resp.close(result.err());
}

async fn run_inner(
    http: Arc<dyn HttpClient>,
    req: &Arc<DownloadRequest>,
    resp: &DownloadResponse,
    plan: TransferPlan,
) -> Result<(), DownloadError> {
    let token = resp.token().clone();

    // before_copy 钩子：失败则不读取正文
    req.hooks
        .lock()
        .await
        .run_before_copy(resp)
        .await
        .map_err(|_| DownloadError::HookAbort)?;

    // BPS 采样器：每秒采样一次，终态自动退出
    {
        let sampler = resp.clone();
        tokio::spawn(async move { sampler.run_bps_sampler().await });
    }

    // 正文复制
    match plan {
        TransferPlan::Single {
            mut http_resp,
            file,
        } => {
            single_transfer::copy(SingleCopyParams {
                body: http_resp.take_body(),
                file,
                buffer_size: req.buffer_size,
                limiter: req.rate_limiter.clone(),
                token: token.clone(),
                resp: resp.clone(),
            })
            .await?;
        }
        TransferPlan::Ranged {
            file,
            offset,
            length,
            workers,
        } => {
            ranged_transfer::copy(RangedCopyParams {
                http,
                base: req.http.clone(),
                file: Arc::new(file),
                offset,
                length,
                workers,
                limiter: req.rate_limiter.clone(),
                token: token.clone(),
                resp: resp.clone(),
            })
            .await?;
        }
    }

    // after_copy 钩子：失败则跳过校验
    req.hooks
        .lock()
        .await
        .run_after_copy(resp)
        .await
        .map_err(|_| DownloadError::HookAbort)?;

    // 校验：对最终落盘文件做流式校验
    if let Some(mut checksum) = req.checksum.lock().await.take() {
        let Some(path) = resp.filename() else {
            return Err(DownloadError::NoFilename);
        };
        if let Err(e) = checksum.verify_file(&path, &token).await {
            if e.is_bad_checksum() && checksum.delete_on_mismatch() {
                let _ = tokio::fs::remove_file(&path).await;
            }
            return Err(e);
        }
    }

    // 远端时间戳：尽力而为，失败不影响结果
    if req.use_remote_timestamp {
        if let (Some(path), Some(mtime)) = (resp.filename(), resp.last_modified()) {
            let applied = std::fs::File::options()
                .write(true)
                .open(&path)
                .and_then(|f| f.set_modified(mtime));
            if let Err(e) = applied {
                log::debug!("设置远端时间戳失败: {}", e);
            }
        }
    }

    Ok(())
}
