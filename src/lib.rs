//! # http_dl
//!
//! 可靠的 HTTP 文件下载引擎：断点续传、校验和验证、限速、
//! 分片并发与批量调度。
//!
//! 目标提示为已存在目录（或空路径=当前目录）时，文件名由服务器的
//! `Content-Disposition` 或 URL 路径最后一段推断。目标文件已存在时
//! 视为此前（可能未完成的）下载：服务器支持 Range 则从文件末尾续传，
//! 不支持则整文件重传；已完整则直接成功返回。
//!
//! ```rust,no_run
//! # async fn demo() {
//! let resp = http_dl::get("./out.bin", "https://example.com/big.bin")
//!     .await
//!     .unwrap();
//! println!("已保存到 {:?}", resp.filename());
//! # }
//! ```

/// 内部导出的模块
mod internal;

#[cfg(test)]
mod tests;

/// 导出核心入口
pub use internal::download::structs::download_client::{
    default_client, get, get_batch, DownloadClient,
};

/// HTTP 传输抽象：自定义传输实现（代理、超时、测试桩）时使用
pub mod client {
    use crate::internal;
    pub use internal::client::structs::http_request::{HttpMethod, HttpRequest};
    pub use internal::client::structs::http_response::{
        parse_http_date, BodyStream, HttpResponse,
    };
    pub use internal::client::structs::reqwest_client::{ReqwestClient, DEFAULT_USER_AGENT};
    pub use internal::client::traits::http_client::HttpClient;
}

/// 下载领域类型：请求、响应、错误、校验和、限速器与钩子
pub mod download {
    use crate::internal;
    pub use internal::download::structs::checksum::Checksum;
    pub use internal::download::structs::download_error::DownloadError;
    pub use internal::download::structs::download_request::{
        DownloadRequest, DEFAULT_BUFFER_SIZE,
    };
    pub use internal::download::structs::download_response::{
        DownloadResponse, TransferProgress,
    };
    pub use internal::download::structs::token_bucket::TokenBucketLimiter;
    pub use internal::download::traits::hooks::{HookAbort, TransferHook};
    pub use internal::download::traits::rate_limit::RateLimiter;
}

/// 状态基础设施：响应式属性、取消令牌、完成信号
pub mod states {
    pub mod unlock_reactive {
        use crate::internal;
        pub use internal::states::unlock_reactive::*;
    }

    pub mod cancel_token {
        use crate::internal;
        pub use internal::states::cancel_token::*;
    }

    pub mod done_signal {
        use crate::internal;
        pub use internal::states::done_signal::*;
    }
}
