//! 单流复制循环：读响应体 → 写目标文件，贯穿取消检查点、限速与计数。
//!
//! 每轮迭代：读前查取消 → 读 ≤ 缓冲区字节 → 读写之间查取消 →
//! 写入并核对字节数 → 原子累加计数 → 限速配额。EOF 即成功。

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

use crate::internal::client::structs::http_response::BodyStream;
use crate::internal::download::structs::download_error::DownloadError;
use crate::internal::download::structs::download_response::DownloadResponse;
use crate::internal::download::traits::rate_limit::RateLimiter;
use crate::internal::states::cancel_token::CancelToken;

/// 单流复制参数（形参超过 3 个，用 struct 承载）。
pub(crate) struct SingleCopyParams {
    pub body: BodyStream,
    pub file: tokio::fs::File,
    pub buffer_size: usize,
    pub limiter: Option<Arc<dyn RateLimiter>>,
    pub token: CancelToken,
    pub resp: DownloadResponse,
}

/// 执行单流复制。
pub(crate) async fn copy(params: SingleCopyParams) -> Result<(), DownloadError> {
    let SingleCopyParams {
        body,
        mut file,
        buffer_size,
        limiter,
        token,
        resp,
    } = params;

    let mut reader = StreamReader::new(body.map(|item| item.map_err(std::io::Error::other)));
    let mut buf = vec![0u8; buffer_size.max(1)];

    loop {
        if token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let nr = tokio::select! {
            r = reader.read(&mut buf) => r?,
            _ = token.cancelled() => return Err(DownloadError::Cancelled),
        };
        if nr == 0 {
            break;
        }

        if token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let nw = file.write(&buf[..nr]).await?;
        if nw < nr {
            return Err(DownloadError::ShortWrite);
        }
        resp.add_transferred(nw as u64);

        if let Some(limiter) = &limiter {
            limiter.wait_n(&token, nw).await?;
        }
    }

    file.flush().await?;
    Ok(())
}
