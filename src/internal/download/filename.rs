//! 目标文件名推断：`Content-Disposition` 的 `filename` 参数优先，
//! 其次取 URL 路径的最后一个非空段。
//!
//! URL 段不做标准解析以外的百分号解码；路径以 `/` 结尾时
//! 不采用 URL 命名。两者皆不可用时返回 `NoFilename`。

use crate::internal::download::structs::download_error::DownloadError;

/// 从 `Content-Disposition` 头值中提取 `filename` 参数。
///
/// 支持带引号与不带引号两种形式：
/// `attachment; filename="bar.bin"` / `attachment;filename=bar.bin`。
pub(crate) fn content_disposition_filename(value: &str) -> Option<String> {
    for part in value.split(';').skip(1) {
        let part = part.trim();
        let (key, val) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            continue;
        }
        let val = val.trim();
        let val = val
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(val);
        if val.is_empty() {
            return None;
        }
        return Some(val.to_string());
    }
    None
}

/// 为一次响应推断文件名（不含目录部分）。
pub(crate) fn guess_filename(
    url: &str,
    content_disposition: Option<&str>,
) -> Result<String, DownloadError> {
    if let Some(cd) = content_disposition {
        if let Some(name) = content_disposition_filename(cd) {
            return Ok(name);
        }
    }

    let parsed = url::Url::parse(url).map_err(|e| DownloadError::Io(anyhow::Error::new(e)))?;
    let path = parsed.path();
    if !path.is_empty() && !path.ends_with('/') {
        if let Some(segment) = path.rsplit('/').next() {
            if !segment.is_empty() {
                return Ok(segment.to_string());
            }
        }
    }

    Err(DownloadError::NoFilename)
}
