pub mod http_request;
pub mod http_response;
pub mod reqwest_client;

// 重导出公共类型
pub use http_request::{HttpMethod, HttpRequest};
pub use http_response::{parse_http_date, BodyStream, HttpResponse};
pub use reqwest_client::{ReqwestClient, DEFAULT_USER_AGENT};
