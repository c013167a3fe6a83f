//! 内部模块划分：HTTP 传输层、下载引擎、状态基础设施。

pub mod client;
pub mod download;
pub mod states;
