//! 执行管线前半段：目标 stat、skip 判定、HEAD 试探、大小与文件名核对、
//! 已有文件处置、目录创建、权威 GET、文件打开与定位。
//!
//! HEAD 仅为咨询性：HEAD 失败或非 2xx 一律忽略，以随后的 GET 为准。
//! 引擎发送前克隆 HTTP 请求再设置 `Range`，调用方的请求不被回写。

use std::io::SeekFrom;
use std::sync::Arc;

use tokio::io::AsyncSeekExt;

use crate::internal::client::structs::http_request::HttpRequest;
use crate::internal::client::structs::http_response::HttpResponse;
use crate::internal::client::traits::http_client::HttpClient;
use crate::internal::download::filename::guess_filename;
use crate::internal::download::structs::download_error::DownloadError;
use crate::internal::download::structs::download_request::DownloadRequest;
use crate::internal::download::structs::download_response::DownloadResponse;
use crate::internal::states::cancel_token::CancelToken;

/// 管线产出：交给后台复制任务的计划。
pub(crate) enum TransferPlan {
    /// 单流复制：权威 GET 的响应体 + 已打开定位的目标文件
    Single {
        http_resp: HttpResponse,
        file: tokio::fs::File,
    },
    /// 分片并发复制：随机访问句柄 + 区间 `[offset, length)` + 并发数
    Ranged {
        file: std::fs::File,
        offset: u64,
        length: u64,
        workers: usize,
    },
}

/// 管线内部状态：已有文件长度与写入方式。
#[derive(Default)]
struct PrepareState {
    /// 已解析路径上现存普通文件的长度
    existing_len: Option<u64>,
    /// 以截断方式打开（整文件重下）
    truncate: bool,
    /// 以追加方式打开（续传）
    append: bool,
    /// 续传 Range 起点
    range_from: Option<u64>,
    /// HEAD 响应已成功处理
    head_processed: bool,
}

/// 已有文件处置的调用时机；决定是否允许进入续传分支。
#[derive(Clone, Copy, PartialEq, Eq)]
enum ExistingCheckStage {
    /// HEAD 之前：只凭期望大小判定「已完整 / 过长」，部分文件留待 HEAD 后
    PreHead,
    /// HEAD 之后：完整处置，可进入续传分支
    AfterHead,
    /// GET 之后：正文已在途，部分文件只能截断重写
    AfterGet,
}

/// 发送一次请求，同时监听取消令牌。
pub(crate) async fn execute_with_cancel(
    http: &Arc<dyn HttpClient>,
    request: HttpRequest,
    token: &CancelToken,
) -> Result<HttpResponse, DownloadError> {
    if token.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }
    tokio::select! {
        r = http.execute(request) => r.map_err(DownloadError::from),
        _ = token.cancelled() => Err(DownloadError::Cancelled),
    }
}

/// 执行准备管线。
///
/// - `Ok(Some(plan))`：头部就绪，交由后台任务复制正文；
/// - `Ok(None)`：传输已在准备阶段成功终结（文件已完整），响应已关闭；
/// - `Err(e)`：不可恢复失败，由调用方以该错误关闭响应。
pub(crate) async fn prepare(
    http: Arc<dyn HttpClient>,
    req: &Arc<DownloadRequest>,
    resp: &DownloadResponse,
) -> Result<Option<TransferPlan>, DownloadError> {
    let token = resp.token().clone();
    if token.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }

    let mut st = PrepareState::default();

    // 目标 stat：提示为已存在目录时清空文件名、推断留待响应头
    stat_destination(resp, &mut st).await?;

    // skip_existing / 期望大小已满足：无需任何 HTTP 流量即可终结
    if check_existing(req, resp, &mut st, &token, ExistingCheckStage::PreHead).await? {
        resp.close(None);
        return Ok(None);
    }

    // HEAD 试探。仅当文件名与完整大小均已知且禁用续传时才省略
    let skip_head = resp.filename().is_some() && req.expected_size.is_some() && req.no_resume;
    if !skip_head {
        let head_req = req.http.head_variant();
        match execute_with_cancel(&http, head_req, &token).await {
            Err(DownloadError::Cancelled) => return Err(DownloadError::Cancelled),
            Err(e) => {
                log::debug!("HEAD 试探失败，以 GET 为准: {}", e);
            }
            Ok(hresp) if !hresp.is_success() => {
                log::debug!("HEAD 返回状态码 {}，以 GET 为准", hresp.status);
            }
            Ok(hresp) => {
                read_response(req, resp, &hresp, &mut st).await?;
                st.head_processed = true;
                if check_existing(req, resp, &mut st, &token, ExistingCheckStage::AfterHead)
                    .await?
                {
                    resp.close(None);
                    return Ok(None);
                }
            }
        }
    }

    // 分片并发判定：显式开启、服务器支持 Range、未走续传、大小已知
    if req.range_request_max > 1
        && st.head_processed
        && resp.can_resume()
        && !resp.did_resume()
        && st.range_from.is_none()
    {
        if let Some(size) = resp.size().filter(|&s| s > 0) {
            ensure_parent_dir(req, resp).await?;
            let file = open_destination(resp, true, false).await?;
            let file = file.into_std().await;
            log::debug!(
                "分片并发传输: {} 字节 / {} 路",
                size,
                req.range_request_max
            );
            return Ok(Some(TransferPlan::Ranged {
                file,
                offset: 0,
                length: size,
                workers: req.range_request_max,
            }));
        }
    }

    // 权威 GET（续传时携带 Range）
    let mut get_req = req.http.clone();
    let range_requested = st.range_from.is_some();
    if let Some(from) = st.range_from {
        get_req.set_range_from(from);
        log::debug!("续传: 从偏移 {} 开始", from);
    }
    let mut get_resp = execute_with_cancel(&http, get_req, &token).await?;

    if get_resp.status == 416 {
        return Err(DownloadError::BadLength);
    }
    if range_requested && get_resp.status == 200 {
        // 服务器无视 Range：退回整文件重下
        log::debug!("服务器对 Range 请求返回 200，退回整文件下载");
        st.range_from = None;
        st.append = false;
        st.truncate = true;
        resp.reset_resumed();
    } else if !get_resp.is_success() && !req.ignore_bad_status_codes {
        return Err(DownloadError::BadStatusCode(get_resp.status));
    }

    read_response(req, resp, &get_resp, &mut st).await?;

    if !resp.did_resume()
        && check_existing(req, resp, &mut st, &token, ExistingCheckStage::AfterGet).await?
    {
        resp.close(None);
        return Ok(None);
    }

    // 目录创建与文件打开、定位
    ensure_parent_dir(req, resp).await?;
    let file = open_destination(resp, st.truncate, st.append).await?;

    Ok(Some(TransferPlan::Single {
        http_resp: get_resp,
        file,
    }))
}

/// stat 已解析路径：存在普通文件则记录长度；是目录则清空文件名；
/// 不存在不算错误。
async fn stat_destination(
    resp: &DownloadResponse,
    st: &mut PrepareState,
) -> Result<(), DownloadError> {
    st.existing_len = None;
    let Some(path) = resp.filename() else {
        return Ok(());
    };
    match tokio::fs::metadata(&path).await {
        Ok(meta) => {
            if meta.is_dir() {
                resp.clear_filename();
            } else {
                st.existing_len = Some(meta.len());
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// 处理一次响应头（HEAD 或 GET）：记录 Range 支持、核对大小、
/// 解析文件名并重新 stat、保存响应头快照。
async fn read_response(
    req: &DownloadRequest,
    resp: &DownloadResponse,
    hresp: &HttpResponse,
    st: &mut PrepareState,
) -> Result<(), DownloadError> {
    if hresp.accept_ranges_bytes() {
        resp.mark_can_resume();
    }

    if let Some(cl) = hresp.content_length() {
        if cl > 0 {
            let size = resp.bytes_resumed() + cl;
            if let Some(expected) = req.expected_size {
                if expected != size {
                    return Err(DownloadError::BadLength);
                }
            }
            resp.set_size(size);
        }
    }

    if resp.filename().is_none() {
        let name = guess_filename(req.url(), hresp.content_disposition())?;
        resp.set_filename(req.save_path.join(name));
        stat_destination(resp, st).await?;
    }

    // 后到的响应头覆盖先到的：GET 覆盖 HEAD（GET 为权威）
    resp.set_headers(hresp.headers().clone(), hresp.last_modified());
    Ok(())
}

/// 已有文件处置。返回 `Ok(true)` 表示文件已完整、传输成功终结
/// （调用方负责关闭响应）。
async fn check_existing(
    req: &DownloadRequest,
    resp: &DownloadResponse,
    st: &mut PrepareState,
    token: &CancelToken,
    stage: ExistingCheckStage,
) -> Result<bool, DownloadError> {
    let Some(len) = st.existing_len else {
        return Ok(false);
    };

    // skip_existing：已有文件即终结；声明了校验和时先校验
    if req.skip_existing {
        verify_existing_checksum(req, resp, token).await?;
        resp.mark_resumed(len);
        if resp.size().is_none() {
            resp.set_size(len);
        }
        return Err(DownloadError::FileExists);
    }

    // 期望大小优先，其次取响应头推得的大小
    let size = match req.expected_size.or_else(|| resp.size()) {
        Some(s) if s > 0 => s,
        _ => return Ok(false),
    };

    if size < len {
        // 本地比远端更长：禁用续传时截断重下，否则判为长度错误
        if req.no_resume {
            st.truncate = true;
            st.existing_len = None;
            return Ok(false);
        }
        return Err(DownloadError::BadLength);
    }

    if size == len {
        resp.mark_resumed(len);
        if resp.size().is_none() {
            resp.set_size(len);
        }
        verify_existing_checksum(req, resp, token).await?;
        return Ok(true);
    }

    // 0 < len < size：部分文件
    match stage {
        ExistingCheckStage::PreHead => {
            // 续传与否取决于服务器是否支持 Range，留待 HEAD 之后
        }
        ExistingCheckStage::AfterHead => {
            if !req.no_resume && resp.can_resume() {
                st.range_from = Some(len);
                st.append = true;
                resp.mark_resumed(len);
            } else {
                st.truncate = true;
            }
        }
        ExistingCheckStage::AfterGet => {
            // 正文已是整文件：只能截断重写
            st.truncate = true;
        }
    }
    Ok(false)
}

/// 对已有完整文件执行校验（若声明）；不匹配时按策略删除文件。
async fn verify_existing_checksum(
    req: &DownloadRequest,
    resp: &DownloadResponse,
    token: &CancelToken,
) -> Result<(), DownloadError> {
    let Some(mut checksum) = req.checksum.lock().await.take() else {
        return Ok(());
    };
    let Some(path) = resp.filename() else {
        return Err(DownloadError::NoFilename);
    };
    match checksum.verify_file(&path, token).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if e.is_bad_checksum() && checksum.delete_on_mismatch() {
                let _ = tokio::fs::remove_file(&path).await;
            }
            Err(e)
        }
    }
}

/// 目录创建：父目录缺失且未禁用时递归创建（0755）。
async fn ensure_parent_dir(
    req: &DownloadRequest,
    resp: &DownloadResponse,
) -> Result<(), DownloadError> {
    if req.no_create_directories {
        return Ok(());
    }
    let Some(path) = resp.filename() else {
        return Err(DownloadError::NoFilename);
    };
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    match tokio::fs::metadata(parent).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(DownloadError::Io(anyhow::anyhow!(
            "目标父路径不是目录: {}",
            parent.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let mut builder = tokio::fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(0o755);
            builder.create(parent).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// 按写入方式打开目标文件并定位：续传指向文件末尾，否则指向起点。
async fn open_destination(
    resp: &DownloadResponse,
    truncate: bool,
    append: bool,
) -> Result<tokio::fs::File, DownloadError> {
    let Some(path) = resp.filename() else {
        return Err(DownloadError::NoFilename);
    };

    let mut opts = tokio::fs::OpenOptions::new();
    opts.create(true).write(true);
    if truncate {
        opts.truncate(true);
    }
    if append {
        opts.append(true);
    }
    #[cfg(unix)]
    opts.mode(0o644);

    let mut file = opts.open(&path).await?;
    if append {
        file.seek(SeekFrom::End(0)).await?;
    } else {
        file.seek(SeekFrom::Start(0)).await?;
    }
    Ok(file)
}
