//! 下载相关错误类型：封闭的错误集合，驱动重试 / 跳过 / 失败决策。

use thiserror::Error;

/// 下载错误。除 [`DownloadError::Io`] 外均为引擎自身判定的终态。
#[derive(Debug, Error)]
pub enum DownloadError {
    /// 期望大小与服务器报告不符，或本地已有文件比远端更长
    #[error("内容长度不匹配")]
    BadLength,

    /// 字节传输成功但校验和不匹配
    #[error("校验和不匹配")]
    BadChecksum,

    /// 无法从提示、Content-Disposition 或 URL 推断目标文件名
    #[error("无法确定目标文件名")]
    NoFilename,

    /// skip_existing 命中：目标文件已存在
    #[error("目标文件已存在")]
    FileExists,

    /// 写入端接受的字节数少于请求写入的字节数
    #[error("写入不完整")]
    ShortWrite,

    /// 取消令牌触发
    #[error("传输已取消")]
    Cancelled,

    /// 主请求返回不可接受的 HTTP 状态码
    #[error("服务器返回不可接受的状态码: {0}")]
    BadStatusCode(u16),

    /// 分片传输失败；`last_offset_end` 为失败前连续完成分片的末尾偏移，
    /// 可作为下次续传的起点
    #[error("分片传输失败（可续传偏移 {last_offset_end}）: {inner}")]
    TransferRanges {
        inner: Box<DownloadError>,
        last_offset_end: u64,
    },

    /// 钩子要求中止本次传输
    #[error("下载被钩子中止")]
    HookAbort,

    /// 未归入以上类别的传输层或文件系统错误
    #[error("IO 错误: {0}")]
    Io(anyhow::Error),
}

impl DownloadError {
    /// 是否为「无法确定文件名」。
    pub fn is_no_filename(&self) -> bool {
        matches!(self, DownloadError::NoFilename)
    }

    /// 是否为「内容长度不匹配」。
    pub fn is_bad_length(&self) -> bool {
        matches!(self, DownloadError::BadLength)
    }

    /// 是否为「校验和不匹配」。
    pub fn is_bad_checksum(&self) -> bool {
        matches!(self, DownloadError::BadChecksum)
    }

    /// 是否为「状态码错误」。
    pub fn is_bad_status_code(&self) -> bool {
        matches!(self, DownloadError::BadStatusCode(_))
    }

    /// 是否为「已取消」。
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }

    /// 提取状态码错误中的状态码。
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DownloadError::BadStatusCode(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        DownloadError::Io(anyhow::Error::new(e))
    }
}

impl From<anyhow::Error> for DownloadError {
    fn from(e: anyhow::Error) -> Self {
        DownloadError::Io(e)
    }
}
