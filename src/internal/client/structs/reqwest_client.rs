//! 基于 reqwest 的默认 [`HttpClient`] 实现。
//!
//! 重定向、代理、TLS 等策略均由内部的 [`reqwest::Client`] 配置决定；
//! 引擎只要求「发送请求、流式读响应体」。

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::TryStreamExt;

use crate::internal::client::structs::http_request::{HttpMethod, HttpRequest};
use crate::internal::client::structs::http_response::HttpResponse;
use crate::internal::client::traits::http_client::HttpClient;

/// 默认 User-Agent。
pub const DEFAULT_USER_AGENT: &str = concat!("http_dl/", env!("CARGO_PKG_VERSION"));

/// reqwest 实现的 HTTP 客户端。
///
/// 请求未显式携带 `User-Agent` 时自动补上 `user_agent`（若配置）。
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
    user_agent: Option<String>,
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self {
            inner: reqwest::Client::new(),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        }
    }
}

impl ReqwestClient {
    /// 使用外部构建好的 [`reqwest::Client`]（自定义超时、代理等）。
    pub fn new(inner: reqwest::Client) -> Self {
        Self {
            inner,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        }
    }

    /// 覆盖默认 User-Agent；传 `None` 则不自动补头。
    pub fn user_agent(mut self, ua: Option<String>) -> Self {
        self.user_agent = ua;
        self
    }

    fn method_of(m: HttpMethod) -> reqwest::Method {
        match m {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        let mut builder = self
            .inner
            .request(Self::method_of(request.method), &request.url);

        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if !request.has_header("user-agent") {
            if let Some(ua) = &self.user_agent {
                builder = builder.header(reqwest::header::USER_AGENT, ua);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in resp.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_string(), v.to_string());
            }
        }

        let body = Box::pin(resp.bytes_stream().map_err(anyhow::Error::from));
        Ok(HttpResponse::new(status, headers, Some(body)))
    }
}
