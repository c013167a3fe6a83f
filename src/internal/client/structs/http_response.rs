//! 传输中立的 HTTP 响应：状态码、响应头（小写键）与可取走的字节流。

use std::collections::HashMap;
use std::time::SystemTime;

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use std::pin::Pin;

/// 响应体字节流；读取错误以 [`anyhow::Error`] 上抛。
pub type BodyStream = Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send + Sync + 'static>>;

/// 一次 HTTP 响应。响应体只能被取走一次（`take_body`）。
pub struct HttpResponse {
    pub status: u16,
    headers: HashMap<String, String>,
    body: Option<BodyStream>,
}

impl HttpResponse {
    /// 由状态码、响应头（任意大小写键）与响应体构建。
    pub fn new(
        status: u16,
        headers: HashMap<String, String>,
        body: Option<BodyStream>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self {
            status,
            headers,
            body,
        }
    }

    /// 状态码是否为 2xx。
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 读取某响应头（不区分大小写）。
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(&name.as_ref().to_ascii_lowercase())
            .map(String::as_str)
    }

    /// 全部响应头（小写键）。
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// `Content-Length` 头解析后的值。
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// 服务器是否通过 `Accept-Ranges: bytes`（仅识别字面量 `bytes`）声明支持续传。
    pub fn accept_ranges_bytes(&self) -> bool {
        self.header("accept-ranges")
            .map(|v| v.trim() == "bytes")
            .unwrap_or(false)
    }

    /// `Content-Disposition` 头原文。
    pub fn content_disposition(&self) -> Option<&str> {
        self.header("content-disposition")
    }

    /// 解析 `Last-Modified` 头为系统时间。
    pub fn last_modified(&self) -> Option<SystemTime> {
        parse_http_date(self.header("last-modified")?)
    }

    /// 取走响应体；已取走时返回空流。
    pub fn take_body(&mut self) -> BodyStream {
        match self.body.take() {
            Some(b) => b,
            None => Box::pin(stream::empty()),
        }
    }
}

/// 解析 HTTP 日期（IMF-fixdate，即 RFC 2822 的 `GMT` 形式）。
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    chrono::DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(SystemTime::from)
}
