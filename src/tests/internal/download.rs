//! 下载器端到端测试：基本 GET、文件名解析、状态码策略、进度与钩子、
//! 取消与远端时间戳。全部针对本地 Range 感知测试服务器。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::client::parse_http_date;
use crate::download::{DownloadRequest, TokenBucketLimiter};
use crate::states::cancel_token::CancelToken;
use crate::tests::{
    pattern_bytes, sha256_hex, TestServer, TestServerOptions, MIB, PATTERN_1MIB_SHA256,
};
use crate::DownloadClient;

#[tokio::test]
async fn basic_get_1mib() {
    let server = TestServer::start(TestServerOptions {
        content_length: MIB,
        accept_ranges: true,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("out");

    let resp = crate::get(&dst, server.url("/data.bin")).await.unwrap();

    assert!(resp.is_complete());
    assert_eq!(resp.size(), Some(MIB as u64));
    assert_eq!(resp.bytes_complete(), MIB as u64, "完成字节数应等于总大小");
    assert!((resp.progress() - 1.0).abs() < f64::EPSILON);
    assert!(!resp.did_resume());

    let data = std::fs::read(&dst).unwrap();
    assert_eq!(data.len(), MIB);
    assert_eq!(sha256_hex(&data), PATTERN_1MIB_SHA256, "内容校验和应匹配");

    // err 幂等：多次调用返回同一结果
    assert!(resp.err().await.is_none());
    assert!(resp.err().await.is_none());
    assert!(resp.end_time().is_some());
}

#[tokio::test]
async fn filename_from_content_disposition() {
    let server = TestServer::start(TestServerOptions {
        content_length: 4096,
        attachment_filename: Some("bar.bin".to_string()),
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(dir.path(), server.url("/foo?x")))
        .await;
    assert!(resp.err().await.is_none());

    let expected = dir.path().join("bar.bin");
    assert_eq!(resp.filename(), Some(expected.clone()), "应采用响应头中的文件名");
    assert!(expected.exists());
}

#[tokio::test]
async fn filename_from_url_segment() {
    let server = TestServer::start(TestServerOptions {
        content_length: 1024,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(dir.path(), server.url("/pkg.tar.gz")))
        .await;
    assert!(resp.err().await.is_none());
    assert_eq!(resp.filename(), Some(dir.path().join("pkg.tar.gz")));
}

#[tokio::test]
async fn no_filename_when_nothing_to_derive() {
    let server = TestServer::start(TestServerOptions {
        content_length: 1024,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(dir.path(), server.url("/")))
        .await;
    let err = resp.err().await.expect("应失败");
    assert!(err.is_no_filename(), "空路径且无响应头命名应报 NoFilename");
}

#[tokio::test]
async fn expected_size_mismatch_fails_at_head() {
    let server = TestServer::start(TestServerOptions {
        content_length: 1000,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(
            DownloadRequest::new(dir.path().join("out"), server.url("/f"))
                .expect_size(1001),
        )
        .await;
    let err = resp.err().await.expect("应失败");
    assert!(err.is_bad_length(), "期望大小不符应报 BadLength");
    assert_eq!(server.get_calls(), 0, "应在 HEAD 阶段失败，不应发起 GET");
}

#[tokio::test]
async fn bad_status_code_is_terminal() {
    let server = TestServer::start(TestServerOptions {
        content_length: 1024,
        status_override: Some(503),
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(dir.path().join("out"), server.url("/f")))
        .await;
    let err = resp.err().await.expect("应失败");
    assert_eq!(err.status_code(), Some(503));
}

#[tokio::test]
async fn ignore_bad_status_codes_downloads_body() {
    let server = TestServer::start(TestServerOptions {
        content_length: 2048,
        status_override: Some(404),
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("out");

    let client = DownloadClient::default();
    let resp = client
        .execute(
            DownloadRequest::new(&dst, server.url("/f")).ignore_bad_status_codes(),
        )
        .await;
    assert!(resp.err().await.is_none(), "忽略状态码时应正常收取正文");
    assert_eq!(std::fs::read(&dst).unwrap(), pattern_bytes(0, 2048));
}

#[tokio::test]
async fn response_exposes_raw_headers() {
    let server = TestServer::start(TestServerOptions {
        content_length: 512,
        accept_ranges: true,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(dir.path().join("out"), server.url("/f")))
        .await;
    assert!(resp.err().await.is_none());

    let headers = resp.headers().expect("应保存权威响应头");
    assert_eq!(headers.get("accept-ranges").map(String::as_str), Some("bytes"));
    assert!(resp.can_resume());
}

#[tokio::test]
async fn progress_pushes_are_monotonic() {
    // 128 KiB/s 限速 256 KiB 文件：约 1～2 秒，可观察到多次进度推送
    let server = TestServer::start(TestServerOptions {
        content_length: 256 * 1024,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("out");

    let limiter = Arc::new(TokenBucketLimiter::new(128 * 1024));
    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(&dst, server.url("/f")).rate_limiter(limiter))
        .await;

    let progress = resp.progress_watch();
    let collected: Arc<std::sync::Mutex<Vec<u64>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let collected_clone = Arc::clone(&collected);
    let watch_handle = tokio::spawn(async move {
        let mut watcher = progress.watch();
        while let Ok(p) = watcher.changed().await {
            collected_clone.lock().unwrap().push(p.bytes_done);
        }
    });

    assert!(resp.err().await.is_none());
    watch_handle.abort();
    let _ = watch_handle.await;

    let values = collected.lock().unwrap();
    assert!(!values.is_empty(), "至少应有一次进度推送");
    let mut prev = 0u64;
    for &v in values.iter() {
        assert!(v >= prev, "bytes_done 应单调不减");
        prev = v;
    }
    assert_eq!(resp.bytes_complete(), 256 * 1024);
}

#[tokio::test]
async fn hooks_run_in_order() {
    let server = TestServer::start(TestServerOptions {
        content_length: 8192,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("out");

    let bytes_at_before = Arc::new(AtomicU64::new(u64::MAX));
    let bytes_at_after = Arc::new(AtomicU64::new(0));
    let before_clone = Arc::clone(&bytes_at_before);
    let after_clone = Arc::clone(&bytes_at_after);

    let client = DownloadClient::default();
    let resp = client
        .execute(
            DownloadRequest::new(&dst, server.url("/f"))
                .with_before_copy_hook(move |r| {
                    before_clone.store(r.bytes_complete(), Ordering::SeqCst);
                    Ok(())
                })
                .with_after_copy_hook(move |r| {
                    after_clone.store(r.bytes_complete(), Ordering::SeqCst);
                    Ok(())
                }),
        )
        .await;
    assert!(resp.err().await.is_none());

    assert_eq!(
        bytes_at_before.load(Ordering::SeqCst),
        0,
        "before_copy 应先于任何正文写入"
    );
    assert_eq!(
        bytes_at_after.load(Ordering::SeqCst),
        8192,
        "after_copy 应在最后一字节写入后"
    );
}

#[tokio::test]
async fn before_copy_abort_skips_body() {
    let server = TestServer::start(TestServerOptions {
        content_length: 8192,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("out");

    let client = DownloadClient::default();
    let resp = client
        .execute(
            DownloadRequest::new(&dst, server.url("/f"))
                .with_before_copy_hook(|_| Err(crate::download::HookAbort)),
        )
        .await;
    let err = resp.err().await.expect("钩子中止应成为终态错误");
    assert!(matches!(*err, crate::download::DownloadError::HookAbort));
    assert_eq!(resp.bytes_transferred(), 0, "中止后不应读取正文");
}

#[tokio::test]
async fn cancel_via_request_token() {
    let server = TestServer::start(TestServerOptions {
        content_length: MIB,
        delay: Some(Duration::from_secs(10)),
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();

    let token = CancelToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let client = DownloadClient::default();
    let resp = client
        .execute(
            DownloadRequest::new(dir.path().join("out"), server.url("/f"))
                .cancel_token(token),
        )
        .await;
    let err = resp.err().await.expect("应以取消终止");
    assert!(err.is_cancelled(), "终态错误应为 Cancelled，得到 {}", err);
}

#[tokio::test]
async fn remote_timestamp_applied() {
    let lm = "Fri, 25 Jul 2025 10:30:00 GMT";
    let server = TestServer::start(TestServerOptions {
        content_length: 1024,
        last_modified: Some(lm.to_string()),
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("out");

    let client = DownloadClient::default();
    let resp = client
        .execute(DownloadRequest::new(&dst, server.url("/f")).use_remote_timestamp())
        .await;
    assert!(resp.err().await.is_none());

    let expected = parse_http_date(lm).unwrap();
    let mtime = std::fs::metadata(&dst).unwrap().modified().unwrap();
    let drift = mtime
        .duration_since(expected)
        .unwrap_or_else(|e| e.duration());
    assert!(drift < Duration::from_secs(1), "文件修改时间应为远端时间戳");
}
