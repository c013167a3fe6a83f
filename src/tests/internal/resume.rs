//! 断点续传测试：部分文件续传、已完整幂等、skip_existing、
//! 本地过长、no_resume 截断与分段下载等价性。

use crate::download::DownloadRequest;
use crate::tests::{
    pattern_bytes, sha256_hex, TestServer, TestServerOptions, MIB, PATTERN_1MIB_SHA256,
};
use crate::DownloadClient;

/// 带 Range 支持的 1 MiB 服务器。
async fn ranged_server(content_length: usize) -> TestServer {
    TestServer::start(TestServerOptions {
        content_length,
        accept_ranges: true,
        ..Default::default()
    })
    .await
}

#[tokio::test]
async fn resume_from_partial_file() {
    let server = ranged_server(MIB).await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("x");

    // 预置前 512 KiB
    std::fs::write(&dst, pattern_bytes(0, 512 * 1024)).unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(&dst, server.url("/f")))
        .await;
    assert!(resp.err().await.is_none());

    assert!(resp.did_resume(), "应走续传");
    assert_eq!(resp.bytes_resumed(), 524_288);
    assert_eq!(resp.bytes_transferred(), 524_288, "本次只应传输后半段");
    assert_eq!(resp.bytes_complete(), MIB as u64);

    let data = std::fs::read(&dst).unwrap();
    assert_eq!(sha256_hex(&data), PATTERN_1MIB_SHA256, "拼接后内容应完整");
}

#[tokio::test]
async fn second_run_is_idempotent_without_body_traffic() {
    let server = ranged_server(64 * 1024).await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("f");
    let client = DownloadClient::default();

    let first = client
        .execute(DownloadRequest::new(&dst, server.url("/f")))
        .await;
    assert!(first.err().await.is_none());
    let gets_after_first = server.get_calls();

    let second = client
        .execute(DownloadRequest::new(&dst, server.url("/f")))
        .await;
    assert!(second.err().await.is_none());

    assert!(second.did_resume());
    assert_eq!(second.bytes_resumed(), 64 * 1024);
    assert_eq!(second.bytes_transferred(), 0);
    assert_eq!(
        server.get_calls(),
        gets_after_first,
        "第二次运行不应产生正文流量"
    );
}

#[tokio::test]
async fn skip_existing_short_circuits() {
    let server = ranged_server(64 * 1024).await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("f");
    std::fs::write(&dst, b"whatever").unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(&dst, server.url("/f")).skip_existing())
        .await;
    let err = resp.err().await.expect("应以 FileExists 终止");
    assert!(
        matches!(*err, crate::download::DownloadError::FileExists),
        "skip_existing 命中应返回 FileExists"
    );
    assert!(resp.did_resume());
    assert_eq!(server.head_calls(), 0, "不应发起任何 HTTP 请求");
    assert_eq!(server.get_calls(), 0);
}

#[tokio::test]
async fn longer_local_file_is_bad_length() {
    let server = ranged_server(1000).await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("f");
    std::fs::write(&dst, pattern_bytes(0, 2000)).unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(&dst, server.url("/f")))
        .await;
    let err = resp.err().await.expect("应失败");
    assert!(err.is_bad_length(), "本地文件比远端长应报 BadLength");
}

#[tokio::test]
async fn no_resume_truncates_longer_local_file() {
    let server = ranged_server(1000).await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("f");
    std::fs::write(&dst, vec![0xEE; 2000]).unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(&dst, server.url("/f")).no_resume())
        .await;
    assert!(resp.err().await.is_none(), "no_resume 应截断重下");

    assert!(!resp.did_resume());
    assert_eq!(resp.bytes_resumed(), 0);
    let data = std::fs::read(&dst).unwrap();
    assert_eq!(data, pattern_bytes(0, 1000), "文件应为全新内容");
}

#[tokio::test]
async fn partial_without_range_support_is_refetched() {
    let server = TestServer::start(TestServerOptions {
        content_length: 4096,
        accept_ranges: false,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("f");
    std::fs::write(&dst, vec![0xEE; 1024]).unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(&dst, server.url("/f")))
        .await;
    assert!(resp.err().await.is_none());

    assert!(!resp.did_resume(), "服务器不支持 Range 时不应续传");
    assert_eq!(std::fs::read(&dst).unwrap(), pattern_bytes(0, 4096));
}

#[tokio::test]
async fn segmented_downloads_equal_single_transfer() {
    // 每轮服务器多暴露 128 KiB：8 轮后文件应与一次性下载完全一致
    let server = ranged_server(128 * 1024).await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("f");
    let client = DownloadClient::default();

    for i in 0..8 {
        server.set_content_length((i + 1) * 128 * 1024);
        let resp = client
            .execute(DownloadRequest::new(&dst, server.url("/f")))
            .await;
        assert!(
            resp.err().await.is_none(),
            "第 {} 段下载应成功",
            i + 1
        );
        if i > 0 {
            assert!(resp.did_resume(), "第 {} 段应为续传", i + 1);
        }
        assert_eq!(resp.bytes_complete(), ((i + 1) * 128 * 1024) as u64);
    }

    let data = std::fs::read(&dst).unwrap();
    assert_eq!(data.len(), MIB);
    assert_eq!(
        sha256_hex(&data),
        PATTERN_1MIB_SHA256,
        "分段下载结果应与一次性下载一致"
    );
}
