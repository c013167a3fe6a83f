//! 下载请求：一次传输的不可变描述 + 链式配置。
//!
//! 引擎不会回写本结构：发送前克隆其中的 HTTP 请求再设置 `Range` 等头。

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::internal::client::structs::http_request::{HttpMethod, HttpRequest};
use crate::internal::download::structs::checksum::Checksum;
use crate::internal::download::structs::download_response::DownloadResponse;
use crate::internal::download::structs::hook_adapters::{
    AfterCopyHookAdapter, BeforeCopyHookAdapter,
};
use crate::internal::download::structs::transfer_hooks::TransferHooksContainer;
use crate::internal::download::traits::hooks::{HookAbort, TransferHook};
use crate::internal::download::traits::rate_limit::RateLimiter;
use crate::internal::states::cancel_token::CancelToken;

/// 默认传输缓冲区大小（32 KiB）。
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// 一次下载请求。
///
/// 目标提示 `save_path`：具体文件路径按原样使用；已存在的目录则从
/// `Content-Disposition` 或 URL 推断文件名；空路径表示当前目录。
pub struct DownloadRequest {
    pub(crate) http: HttpRequest,
    pub(crate) save_path: PathBuf,
    pub(crate) expected_size: Option<u64>,
    pub(crate) buffer_size: usize,
    pub(crate) checksum: Mutex<Option<Checksum>>,
    pub(crate) skip_existing: bool,
    pub(crate) no_resume: bool,
    pub(crate) no_create_directories: bool,
    pub(crate) use_remote_timestamp: bool,
    pub(crate) ignore_bad_status_codes: bool,
    pub(crate) range_request_max: usize,
    pub(crate) rate_limiter: Option<Arc<dyn RateLimiter>>,
    pub(crate) cancel_token: Option<CancelToken>,
    pub(crate) hooks: Mutex<TransferHooksContainer>,
    pub(crate) label: String,
    pub(crate) tag: Option<Box<dyn Any + Send + Sync>>,
}

impl DownloadRequest {
    /// 创建对 `url` 的 GET 下载请求，目标提示为 `save_path`。
    pub fn new(save_path: impl AsRef<Path>, url: impl Into<String>) -> Self {
        Self {
            http: HttpRequest::get(url),
            save_path: save_path.as_ref().to_path_buf(),
            expected_size: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            checksum: Mutex::new(None),
            skip_existing: false,
            no_resume: false,
            no_create_directories: false,
            use_remote_timestamp: false,
            ignore_bad_status_codes: false,
            range_request_max: 1,
            rate_limiter: None,
            cancel_token: None,
            hooks: Mutex::new(TransferHooksContainer::default()),
            label: String::new(),
            tag: None,
        }
    }

    // ──────────────────────────── 链式配置 ────────────────────────────

    /// 设置一个 HTTP 请求头（透传给传输层）。
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.http.set_header(name, value);
        self
    }

    /// 覆盖 HTTP 方法（默认 GET）。
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.http.method = method;
        self
    }

    /// 设置请求体（对传输层不透明）。
    pub fn body(mut self, body: Bytes) -> Self {
        self.http.body = Some(body);
        self
    }

    /// 声明期望的文件大小（字节）；与服务器报告不符时以 `BadLength` 失败。
    pub fn expect_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    /// 设置传输缓冲区大小；下限 1 字节，默认 32 KiB。
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// 设置校验和声明；传输完成后对落盘文件做流式校验。
    pub fn checksum(mut self, checksum: Checksum) -> Self {
        *self.checksum.get_mut() = Some(checksum);
        self
    }

    /// 目标文件已存在时直接以 `FileExists` 终止，不发起 HTTP 请求
    /// （若同时声明了校验和，先校验已有文件）。
    pub fn skip_existing(mut self) -> Self {
        self.skip_existing = true;
        self
    }

    /// 禁用续传：存在不完整文件时截断重下。
    pub fn no_resume(mut self) -> Self {
        self.no_resume = true;
        self
    }

    /// 不自动创建缺失的父目录。
    pub fn no_create_directories(mut self) -> Self {
        self.no_create_directories = true;
        self
    }

    /// 下载完成后将文件修改时间设为服务器的 `Last-Modified`（尽力而为）。
    pub fn use_remote_timestamp(mut self) -> Self {
        self.use_remote_timestamp = true;
        self
    }

    /// 忽略不可接受的 HTTP 状态码（正常照收响应体）。
    pub fn ignore_bad_status_codes(mut self) -> Self {
        self.ignore_bad_status_codes = true;
        self
    }

    /// 最大分片并发数（≥1）。大于 1 且服务器支持 Range、且非续传时，
    /// 引擎并发发起分片请求。默认 1（关闭分片并行）。
    pub fn range_request_max(mut self, n: usize) -> Self {
        self.range_request_max = n.max(1);
        self
    }

    /// 绑定限速器；多个请求共享同一实例即为全局限速。
    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// 绑定取消令牌；令牌触发时传输以 `Cancelled` 终止。
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// 设置用户标签（仅用于关联展示）。
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// 附加不透明关联数据。
    pub fn with_tag(mut self, tag: impl Any + Send + Sync) -> Self {
        self.tag = Some(Box::new(tag));
        self
    }

    // ──────────────────────────── 钩子注册 ────────────────────────────

    /// 注册「正文开始前」钩子；返回 `Err(HookAbort)` 则中止本次传输。
    pub fn with_before_copy_hook<F>(self, f: F) -> Self
    where
        F: FnMut(&DownloadResponse) -> Result<(), HookAbort> + Send + Sync + 'static,
    {
        self.with_hook(BeforeCopyHookAdapter(f))
    }

    /// 注册「写入完成后」钩子；返回 `Err(HookAbort)` 则跳过校验、以该错误终止。
    pub fn with_after_copy_hook<F>(self, f: F) -> Self
    where
        F: FnMut(&DownloadResponse) -> Result<(), HookAbort> + Send + Sync + 'static,
    {
        self.with_hook(AfterCopyHookAdapter(f))
    }

    /// 注册完整钩子，在传输各阶段插入逻辑。
    pub fn with_hook(mut self, hook: impl TransferHook + 'static) -> Self {
        self.hooks.get_mut().add(hook);
        self
    }

    // ──────────────────────────── 只读访问 ────────────────────────────

    /// 请求的 URL。
    pub fn url(&self) -> &str {
        &self.http.url
    }

    /// 目标提示路径。
    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// 用户标签。
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 不透明关联数据。
    pub fn tag(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.tag.as_deref()
    }
}
