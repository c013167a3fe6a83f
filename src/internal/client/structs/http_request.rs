//! 传输中立的 HTTP 请求描述：方法、URL、头、可选请求体。
//!
//! 引擎在发送前克隆本结构再设置 `Range` 等头，调用方持有的请求不被回写。

use std::collections::HashMap;

use bytes::Bytes;

/// HTTP 方法子集；引擎自身只使用 GET 与 HEAD，其余供调用方透传。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// 标准方法名。
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// 一次 HTTP 请求的完整描述。头名不区分大小写（内部统一小写存储）。
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    headers: HashMap<String, String>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// 创建一个 GET 请求。
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// 以当前请求为模板派生一个同 URL、同头的 HEAD 请求（无请求体）。
    pub fn head_variant(&self) -> Self {
        Self {
            method: HttpMethod::Head,
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: None,
        }
    }

    /// 设置（或覆盖）一个请求头。
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// 是否已设置某请求头（不区分大小写）。
    pub fn has_header(&self, name: impl AsRef<str>) -> bool {
        self.headers
            .contains_key(&name.as_ref().to_ascii_lowercase())
    }

    /// 读取某请求头的值（不区分大小写）。
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(&name.as_ref().to_ascii_lowercase())
            .map(String::as_str)
    }

    /// 全部请求头（小写键）。
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// 设置续传 Range 头：`bytes=<offset>-`。
    pub fn set_range_from(&mut self, offset: u64) {
        self.set_header("range", format!("bytes={}-", offset));
    }

    /// 设置分片 Range 头：`bytes=start-(end-1)`，`end` 为不含上界。
    pub fn set_range(&mut self, start: u64, end: u64) {
        let end_inclusive = end.saturating_sub(1);
        self.set_header("range", format!("bytes={}-{}", start, end_inclusive));
    }
}
