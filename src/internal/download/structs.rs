pub mod bps_gauge;
pub mod checksum;
pub mod download_client;
pub mod download_error;
pub mod download_request;
pub mod download_response;
pub mod hook_adapters;
pub mod token_bucket;
pub mod transfer_hooks;

// 重导出公共类型
pub use checksum::Checksum;
pub use download_client::DownloadClient;
pub use download_error::DownloadError;
pub use download_request::{DownloadRequest, DEFAULT_BUFFER_SIZE};
pub use download_response::{DownloadResponse, TransferProgress};
pub use token_bucket::TokenBucketLimiter;
pub use transfer_hooks::TransferHooksContainer;
