//! 分片并发复制：把 `[offset, length)` 切成若干连续区间，
//! 每片克隆原请求并设置 `Range: bytes=A-B`，流式写入随机访问句柄的
//! 互不重叠偏移；共享原子计数；任一片失败即取消全组。
//!
//! 失败时错误携带 `last_offset_end`——失败前连续完成分片的末尾偏移，
//! 供上层下次续传。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::internal::client::structs::http_request::HttpRequest;
use crate::internal::client::traits::http_client::HttpClient;
use crate::internal::download::structs::download_client::prepare::execute_with_cancel;
use crate::internal::download::structs::download_error::DownloadError;
use crate::internal::download::structs::download_response::DownloadResponse;
use crate::internal::download::traits::rate_limit::RateLimiter;
use crate::internal::states::cancel_token::CancelToken;

/// 分片复制参数（形参超过 3 个，用 struct 承载）。
pub(crate) struct RangedCopyParams {
    pub http: Arc<dyn HttpClient>,
    pub base: HttpRequest,
    pub file: Arc<std::fs::File>,
    pub offset: u64,
    pub length: u64,
    pub workers: usize,
    pub limiter: Option<Arc<dyn RateLimiter>>,
    pub token: CancelToken,
    pub resp: DownloadResponse,
}

/// 单片任务参数。
struct ChunkParams {
    http: Arc<dyn HttpClient>,
    base: HttpRequest,
    file: Arc<std::fs::File>,
    start: u64,
    end: u64,
    limiter: Option<Arc<dyn RateLimiter>>,
    group: CancelToken,
    resp: DownloadResponse,
}

/// 执行分片并发复制。
pub(crate) async fn copy(params: RangedCopyParams) -> Result<(), DownloadError> {
    let RangedCopyParams {
        http,
        base,
        file,
        offset,
        length,
        workers,
        limiter,
        token,
        resp,
    } = params;

    let span = length.saturating_sub(offset);
    if span == 0 {
        return Err(DownloadError::Io(anyhow::anyhow!(
            "分片传输要求已知的非零长度"
        )));
    }
    let workers = workers.max(1);

    // 连续等分，最后一片吸收余数；片长下限 1 字节
    let chunk_size = (span / workers as u64).max(1);
    let mut ranges = Vec::with_capacity(workers);
    let mut start = offset;
    for i in 0..workers {
        if start >= length {
            break;
        }
        let end = if i == workers - 1 {
            length
        } else {
            (start + chunk_size).min(length)
        };
        ranges.push((start, end));
        start = end;
    }

    // 片内失败时取消全组；组令牌为响应令牌的子级
    let group = token.child();
    let completed: Arc<Vec<AtomicU64>> =
        Arc::new((0..ranges.len()).map(|_| AtomicU64::new(0)).collect());

    let mut handles: Vec<JoinHandle<Result<(), DownloadError>>> =
        Vec::with_capacity(ranges.len());
    for (idx, &(start, end)) in ranges.iter().enumerate() {
        let chunk = ChunkParams {
            http: http.clone(),
            base: base.clone(),
            file: file.clone(),
            start,
            end,
            limiter: limiter.clone(),
            group: group.clone(),
            resp: resp.clone(),
        };
        let completed = completed.clone();
        let group = group.clone();
        handles.push(tokio::spawn(async move {
            let result = fetch_chunk(chunk).await;
            match &result {
                Ok(()) => completed[idx].store(end, Ordering::Release),
                Err(_) => group.cancel(),
            }
            result
        }));
    }

    // 失败分片自身的错误优先于被连带取消分片的 Cancelled
    let mut cause: Option<DownloadError> = None;
    let mut cancelled: Option<DownloadError> = None;
    for handle in handles {
        let err = match handle.await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(join_err) => DownloadError::Io(anyhow::Error::new(join_err)),
        };
        if err.is_cancelled() {
            cancelled.get_or_insert(err);
        } else {
            cause.get_or_insert(err);
        }
    }

    if let Some(e) = cause.or(cancelled) {
        // 连续完成前缀的末尾偏移：遇到第一个未完成分片即止
        let mut last_offset_end = offset;
        for c in completed.iter() {
            let end = c.load(Ordering::Acquire);
            if end == 0 {
                break;
            }
            last_offset_end = end;
        }
        return Err(DownloadError::TransferRanges {
            inner: Box::new(e),
            last_offset_end,
        });
    }
    Ok(())
}

/// 拉取并落盘一个分片 `[start, end)`。响应必须是 206。
async fn fetch_chunk(params: ChunkParams) -> Result<(), DownloadError> {
    let ChunkParams {
        http,
        base,
        file,
        start,
        end,
        limiter,
        group,
        resp,
    } = params;

    if group.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }

    let mut request = base.clone();
    request.set_range(start, end);
    let mut hresp = execute_with_cancel(&http, request, &group).await?;
    if hresp.status != 206 {
        return Err(DownloadError::BadStatusCode(hresp.status));
    }

    let mut body = hresp.take_body();
    let mut pos = start;
    loop {
        let item = tokio::select! {
            it = body.next() => it,
            _ = group.cancelled() => return Err(DownloadError::Cancelled),
        };
        let Some(chunk) = item else {
            break;
        };
        let chunk = chunk.map_err(DownloadError::from)?;

        if group.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        write_full_at(&file, &chunk, pos)?;
        resp.add_transferred(chunk.len() as u64);
        pos += chunk.len() as u64;

        if let Some(limiter) = &limiter {
            limiter.wait_n(&group, chunk.len()).await?;
        }
    }
    Ok(())
}

/// 定位写：一次调用必须写完，否则按 `ShortWrite` 终止。
#[cfg(unix)]
fn write_full_at(
    file: &std::fs::File,
    buf: &[u8],
    offset: u64,
) -> Result<(), DownloadError> {
    use std::os::unix::fs::FileExt;
    let n = file.write_at(buf, offset)?;
    if n != buf.len() {
        return Err(DownloadError::ShortWrite);
    }
    Ok(())
}

/// 定位写：一次调用必须写完，否则按 `ShortWrite` 终止。
#[cfg(windows)]
fn write_full_at(
    file: &std::fs::File,
    buf: &[u8],
    offset: u64,
) -> Result<(), DownloadError> {
    use std::os::windows::fs::FileExt;
    let n = file.seek_write(buf, offset)?;
    if n != buf.len() {
        return Err(DownloadError::ShortWrite);
    }
    Ok(())
}
