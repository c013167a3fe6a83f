//! 校验和声明：可插拔的流式摘要对象 + 期望值 + 不匹配时是否删除文件。
//!
//! 校验在最终落盘文件上执行（而非传输中的字节流），续传场景下
//! 已有前缀同样参与哈希，亦可发现磁盘层面的损坏。

use std::path::Path;

use digest::DynDigest;
use md5::Md5;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::internal::download::structs::download_error::DownloadError;
use crate::internal::states::cancel_token::CancelToken;

/// 校验缓冲区大小。
const HASH_BUF_SIZE: usize = 32 * 1024;

/// 一次下载的校验和声明。
///
/// 摘要对象在校验期间被独占使用，不得与其它并发请求共享。
pub struct Checksum {
    hasher: Box<dyn DynDigest + Send>,
    expected: Vec<u8>,
    delete_on_mismatch: bool,
}

impl Checksum {
    /// 使用任意流式摘要对象构建。
    pub fn new(
        hasher: Box<dyn DynDigest + Send>,
        expected: Vec<u8>,
        delete_on_mismatch: bool,
    ) -> Self {
        Self {
            hasher,
            expected,
            delete_on_mismatch,
        }
    }

    /// SHA-256 校验。
    pub fn sha256(expected: Vec<u8>, delete_on_mismatch: bool) -> Self {
        Self::new(Box::new(Sha256::new()), expected, delete_on_mismatch)
    }

    /// MD5 校验。
    pub fn md5(expected: Vec<u8>, delete_on_mismatch: bool) -> Self {
        Self::new(Box::new(Md5::new()), expected, delete_on_mismatch)
    }

    /// 不匹配时是否删除文件。
    pub fn delete_on_mismatch(&self) -> bool {
        self.delete_on_mismatch
    }

    /// 流式读取 `path` 喂入摘要并与期望值比较。
    ///
    /// 不匹配返回 [`DownloadError::BadChecksum`]（文件删除由调用方按策略执行）；
    /// 读取途中响应取消令牌。
    pub(crate) async fn verify_file(
        &mut self,
        path: &Path,
        token: &CancelToken,
    ) -> Result<(), DownloadError> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut buf = vec![0u8; HASH_BUF_SIZE];
        loop {
            if token.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            self.hasher.update(&buf[..n]);
        }

        let sum = self.hasher.finalize_reset();
        if sum.as_ref() != self.expected.as_slice() {
            return Err(DownloadError::BadChecksum);
        }
        Ok(())
    }
}
