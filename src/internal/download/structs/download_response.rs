//! 下载响应：一次进行中或已完成传输的可观察句柄。
//!
//! 响应在 HTTP 响应头就绪（或更早失败）时返回；正文在后台任务中复制。
//! 所有方法线程安全；句柄可廉价克隆、在任务间共享。
//! 终态由一次性 done 信号广播：done 触发后错误、时间戳与计数全部不再变化。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

use crate::internal::download::structs::bps_gauge::{SmaGauge, DEFAULT_WINDOW};
use crate::internal::download::structs::download_error::DownloadError;
use crate::internal::download::structs::download_request::DownloadRequest;
use crate::internal::states::cancel_token::CancelToken;
use crate::internal::states::done_signal::DoneSignal;
use crate::internal::states::unlock_reactive::UnlockReactiveProperty;

/// 传输进度快照：响应式属性的载荷，供观察方 watch。
#[derive(Debug, Clone, Default)]
pub struct TransferProgress {
    /// 已完成字节数（含续传继承的部分）
    pub bytes_done: u64,
    /// 总大小（字节），未知时为 `None`
    pub total: Option<u64>,
}

impl TransferProgress {
    /// 进度百分比（0～100）；总大小为 0 或未知时返回 `f64::NAN`。
    pub fn pct(&self) -> f64 {
        self.total
            .filter(|&t| t > 0)
            .map(|t| (self.bytes_done as f64 / t as f64) * 100.0)
            .unwrap_or(f64::NAN)
    }
}

/// done 触发后才会再变化的冷字段，集中在一把锁下。
struct ColdState {
    filename: Option<PathBuf>,
    size: Option<u64>,
    headers: Option<HashMap<String, String>>,
    last_modified: Option<SystemTime>,
    end: Option<(Instant, SystemTime)>,
    error: Option<Arc<DownloadError>>,
}

pub(crate) struct ResponseInner {
    request: Arc<DownloadRequest>,
    token: CancelToken,
    start_instant: Instant,
    start_time: SystemTime,
    can_resume: AtomicBool,
    did_resume: AtomicBool,
    bytes_resumed: AtomicU64,
    bytes_transferred: AtomicU64,
    gauge: Mutex<SmaGauge>,
    progress_prop: UnlockReactiveProperty<TransferProgress>,
    done: DoneSignal,
    closing: AtomicBool,
    cold: Mutex<ColdState>,
}

/// 下载响应句柄。
#[derive(Clone)]
pub struct DownloadResponse {
    inner: Arc<ResponseInner>,
}

impl DownloadResponse {
    pub(crate) fn new(request: Arc<DownloadRequest>, token: CancelToken) -> Self {
        let filename = if request.save_path.as_os_str().is_empty() {
            None
        } else {
            Some(request.save_path.clone())
        };
        Self {
            inner: Arc::new(ResponseInner {
                request,
                token,
                start_instant: Instant::now(),
                start_time: SystemTime::now(),
                can_resume: AtomicBool::new(false),
                did_resume: AtomicBool::new(false),
                bytes_resumed: AtomicU64::new(0),
                bytes_transferred: AtomicU64::new(0),
                gauge: Mutex::new(SmaGauge::new(DEFAULT_WINDOW)),
                progress_prop: UnlockReactiveProperty::new(TransferProgress::default()),
                done: DoneSignal::new(),
                closing: AtomicBool::new(false),
                cold: Mutex::new(ColdState {
                    filename,
                    size: None,
                    headers: None,
                    last_modified: None,
                    end: None,
                    error: None,
                }),
            }),
        }
    }

    fn cold(&self) -> MutexGuard<'_, ColdState> {
        self.inner.cold.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn gauge(&self) -> MutexGuard<'_, SmaGauge> {
        self.inner.gauge.lock().unwrap_or_else(|p| p.into_inner())
    }

    // ──────────────────────────── 观察接口 ────────────────────────────

    /// 产生本响应的请求。
    pub fn request(&self) -> &DownloadRequest {
        &self.inner.request
    }

    /// 已解析的目标文件路径；目录提示在文件名解析前为 `None`。
    pub fn filename(&self) -> Option<PathBuf> {
        self.cold().filename.clone()
    }

    /// 预期总大小（字节）；响应头就绪后可用。
    pub fn size(&self) -> Option<u64> {
        self.cold().size
    }

    /// 权威请求（GET 或分片前的 HEAD）的原始响应头（小写键）。
    pub fn headers(&self) -> Option<HashMap<String, String>> {
        self.cold().headers.clone()
    }

    /// 服务器报告的 `Last-Modified`（已解析）。
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.cold().last_modified
    }

    /// 服务器是否声明支持字节范围（`Accept-Ranges: bytes`）。
    pub fn can_resume(&self) -> bool {
        self.inner.can_resume.load(Ordering::Relaxed)
    }

    /// 本次传输是否利用了已存在的部分文件。
    pub fn did_resume(&self) -> bool {
        self.inner.did_resume.load(Ordering::Relaxed)
    }

    /// 从已有文件继承的字节数。
    pub fn bytes_resumed(&self) -> u64 {
        self.inner.bytes_resumed.load(Ordering::Relaxed)
    }

    /// 本次运行实际传输的字节数（不含继承部分）。
    pub fn bytes_transferred(&self) -> u64 {
        self.inner.bytes_transferred.load(Ordering::Relaxed)
    }

    /// 已完成字节数 = 继承 + 本次传输。单调不减。
    pub fn bytes_complete(&self) -> u64 {
        self.bytes_resumed() + self.bytes_transferred()
    }

    /// 完成比例（0.0～1.0）；大小未知时为 0。
    pub fn progress(&self) -> f64 {
        match self.size() {
            Some(size) if size > 0 => self.bytes_complete() as f64 / size as f64,
            _ => 0.0,
        }
    }

    /// 瞬时字节速率（五秒平滑移动平均）。终态后为全程平均速率。
    pub fn bps(&self) -> f64 {
        if self.is_complete() {
            let secs = self.duration().as_secs_f64();
            if secs <= 0.0 {
                return 0.0;
            }
            return self.bytes_transferred() as f64 / secs;
        }
        self.gauge().bps()
    }

    /// 传输时长：进行中为启动至今，终态后为启动到结束。
    pub fn duration(&self) -> Duration {
        match self.cold().end {
            Some((end_instant, _)) => end_instant.duration_since(self.inner.start_instant),
            None => self.inner.start_instant.elapsed(),
        }
    }

    /// 预计完成时间：按当前瞬时速率外推；速率为 0 时为 `None`，
    /// 终态后为实际结束时间。
    pub fn eta(&self) -> Option<SystemTime> {
        if let Some((_, end_time)) = self.cold().end {
            return Some(end_time);
        }
        let size = self.size()?;
        let bps = self.bps();
        if bps <= 0.0 {
            return None;
        }
        let remaining = size.saturating_sub(self.bytes_complete());
        let secs = remaining as f64 / bps;
        Duration::try_from_secs_f64(secs)
            .ok()
            .map(|d| SystemTime::now() + d)
    }

    /// 启动时刻。
    pub fn start_time(&self) -> SystemTime {
        self.inner.start_time
    }

    /// 结束时刻；终态前为 `None`。
    pub fn end_time(&self) -> Option<SystemTime> {
        self.cold().end.map(|(_, t)| t)
    }

    /// 传输是否已达终态（非阻塞）。
    pub fn is_complete(&self) -> bool {
        self.inner.done.is_set()
    }

    /// 阻塞直到终态。任意多个观察方可同时等待。
    pub async fn wait(&self) {
        self.inner.done.wait().await;
    }

    /// 阻塞直到终态并返回终态错误；成功时为 `None`。
    /// 多次调用返回同一值。
    pub async fn err(&self) -> Option<Arc<DownloadError>> {
        self.inner.done.wait().await;
        self.cold().error.clone()
    }

    /// 取消传输：触发取消令牌并等待终态，返回终态错误（通常为 `Cancelled`）。
    pub async fn cancel(&self) -> Option<Arc<DownloadError>> {
        self.inner.token.cancel();
        self.err().await
    }

    /// 可共享的进度属性句柄；`.watch()` 后 `changed().await` 监听推送
    /// （每秒一次采样推送 + 终态一次）。
    pub fn progress_watch(&self) -> UnlockReactiveProperty<TransferProgress> {
        self.inner.progress_prop.clone()
    }

    // ──────────────────────────── 引擎内部 ────────────────────────────

    pub(crate) fn token(&self) -> &CancelToken {
        &self.inner.token
    }

    pub(crate) fn set_filename(&self, path: PathBuf) {
        self.cold().filename = Some(path);
    }

    pub(crate) fn clear_filename(&self) {
        self.cold().filename = None;
    }

    pub(crate) fn set_size(&self, size: u64) {
        self.cold().size = Some(size);
    }

    pub(crate) fn set_headers(
        &self,
        headers: HashMap<String, String>,
        last_modified: Option<SystemTime>,
    ) {
        let mut cold = self.cold();
        cold.headers = Some(headers);
        cold.last_modified = last_modified;
    }

    pub(crate) fn mark_can_resume(&self) {
        self.inner.can_resume.store(true, Ordering::Relaxed);
    }

    pub(crate) fn mark_resumed(&self, bytes: u64) {
        self.inner.did_resume.store(true, Ordering::Relaxed);
        self.inner.bytes_resumed.store(bytes, Ordering::Relaxed);
    }

    pub(crate) fn reset_resumed(&self) {
        self.inner.did_resume.store(false, Ordering::Relaxed);
        self.inner.bytes_resumed.store(0, Ordering::Relaxed);
    }

    pub(crate) fn add_transferred(&self, n: u64) {
        self.inner.bytes_transferred.fetch_add(n, Ordering::Relaxed);
    }

    /// 每秒采样一次 BPS 仪表并推送进度，直至终态。由复制任务 spawn。
    pub(crate) async fn run_bps_sampler(&self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = self.inner.done.wait() => return,
                _ = ticker.tick() => {
                    self.gauge().sample(self.bytes_transferred());
                    let _ = self.inner.progress_prop.update(TransferProgress {
                        bytes_done: self.bytes_complete(),
                        total: self.size(),
                    });
                }
            }
        }
    }

    /// 原子终态转移：记录错误与结束时间、广播 done、触发取消令牌。
    /// 只允许调用一次；重复调用是编程错误。
    pub(crate) fn close(&self, error: Option<DownloadError>) {
        if self.inner.closing.swap(true, Ordering::SeqCst) {
            debug_assert!(false, "响应已关闭");
            return;
        }

        // 先落终态字段，再广播 done：观察方被唤醒后读到的必然是最终值
        {
            let mut cold = self.cold();
            cold.error = error.map(Arc::new);
            cold.end = Some((Instant::now(), SystemTime::now()));
        }

        let _ = self.inner.progress_prop.update(TransferProgress {
            bytes_done: self.bytes_complete(),
            total: self.size(),
        });

        self.inner.done.set();
        // 关闭挂起的子任务（采样器、分片任务等）
        self.inner.token.cancel();
    }
}
