//! HTTP 传输抽象：引擎只依赖本 trait，不关心底层实现（reqwest、测试桩等）。
//!
//! 实现方负责重定向、代理、TLS、超时等传输层策略；
//! 引擎只消费「状态码 + 响应头 + 字节流」。

use async_trait::async_trait;

use crate::internal::client::structs::http_request::HttpRequest;
use crate::internal::client::structs::http_response::HttpResponse;

/// 抽象 HTTP 客户端。实现必须可在多任务间并发使用。
///
/// 传输层错误以 [`anyhow::Error`] 形式上抛，由下载引擎统一归类。
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// 发送一次请求，返回状态码、响应头与可流式读取的响应体。
    ///
    /// 响应体的读取同样可能产生传输层错误（连接中断等），
    /// 通过流的 `Item = anyhow::Result<Bytes>` 上抛。
    async fn execute(&self, request: HttpRequest) -> anyhow::Result<HttpResponse>;
}
