//! 分片并发传输测试：多路 Range 成功路径、失败时的可续传偏移。

use std::sync::Arc;

use crate::download::{DownloadError, DownloadRequest};
use crate::tests::{
    pattern_bytes, sha256_hex, ScriptedRangeClient, TestServer, TestServerOptions,
};
use crate::DownloadClient;

#[tokio::test]
async fn ranged_transfer_end_to_end() {
    let total = 300 * 1024;
    let server = TestServer::start(TestServerOptions {
        content_length: total,
        accept_ranges: true,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("f");

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(&dst, server.url("/f")).range_request_max(4))
        .await;
    assert!(resp.err().await.is_none(), "分片下载应成功");

    assert_eq!(resp.bytes_complete(), total as u64);
    let data = std::fs::read(&dst).unwrap();
    assert_eq!(data.len(), total);
    assert_eq!(
        sha256_hex(&data),
        sha256_hex(&pattern_bytes(0, total)),
        "分片拼接内容应与整体一致"
    );

    assert_eq!(server.head_calls(), 1);
    assert_eq!(server.get_calls(), 4, "应发起 4 个分片 GET，且无整文件 GET");
}

#[tokio::test]
async fn default_range_max_stays_single_stream() {
    let server = TestServer::start(TestServerOptions {
        content_length: 64 * 1024,
        accept_ranges: true,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(dir.path().join("f"), server.url("/f")))
        .await;
    assert!(resp.err().await.is_none());
    assert_eq!(server.get_calls(), 1, "默认 range_request_max=1 应走单流");
}

#[tokio::test]
async fn chunk_failure_reports_last_offset_end() {
    // 1000 字节、5 路：分片 [0,200) [200,400) [400,600) [600,800) [800,1000)。
    // 第 3 片（起点 400）在前两片完整落盘后失败 → 可续传偏移 = 400。
    let total = 1000;
    let stub = Arc::new(ScriptedRangeClient::new(
        total,
        Some(400),
        vec![0, 200],
    ));
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("f");

    let client = DownloadClient::new(stub);
    let resp = client
        .execute(DownloadRequest::new(&dst, "http://stub.local/f").range_request_max(5))
        .await;
    let err = resp.err().await.expect("分片失败应以错误终止");

    match &*err {
        DownloadError::TransferRanges {
            inner,
            last_offset_end,
        } => {
            assert_eq!(
                *last_offset_end, 400,
                "可续传偏移应为失败前连续完成分片的末尾"
            );
            assert!(
                !matches!(**inner, DownloadError::Cancelled),
                "内部错误应为分片自身的失败原因"
            );
        }
        other => panic!("预期 TransferRanges，得到 {}", other),
    }
}

#[tokio::test]
async fn ranged_skipped_when_server_lacks_ranges() {
    let server = TestServer::start(TestServerOptions {
        content_length: 32 * 1024,
        accept_ranges: false,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("f");

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(&dst, server.url("/f")).range_request_max(8))
        .await;
    assert!(resp.err().await.is_none());
    assert_eq!(server.get_calls(), 1, "服务器不支持 Range 时应退回单流");
    assert_eq!(std::fs::read(&dst).unwrap(), pattern_bytes(0, 32 * 1024));
}
