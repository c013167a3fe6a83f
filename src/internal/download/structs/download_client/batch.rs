//! 批量调度：有界 worker 池消费请求通道，响应按开始顺序推入输出通道。
//!
//! 每个 worker 取到请求后立即执行并推送响应句柄，随后等待该响应的
//! done 再取下一个——背压与「活动中的传输」挂钩，而非排队数。
//! 输出通道在所有 worker 退出（即所有响应 done）后才关闭。

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::internal::download::structs::download_client::DownloadClient;
use crate::internal::download::structs::download_request::DownloadRequest;
use crate::internal::download::structs::download_response::DownloadResponse;

impl DownloadClient {
    /// 以 `workers` 路并发执行全部请求，立即返回响应通道。
    ///
    /// `workers < 1` 时每个请求一个 worker（全部并发）。
    /// 两个通道容量均为请求数；输出通道在所有响应到达终态后关闭。
    pub fn execute_batch(
        &self,
        workers: usize,
        requests: Vec<DownloadRequest>,
    ) -> mpsc::Receiver<DownloadResponse> {
        let count = requests.len();
        let capacity = count.max(1);
        let workers = if workers < 1 { capacity } else { workers };

        let (req_tx, req_rx) = mpsc::channel::<DownloadRequest>(capacity);
        let (resp_tx, resp_rx) = mpsc::channel::<DownloadResponse>(capacity);

        let shared_rx = Arc::new(Mutex::new(req_rx));
        let mut worker_handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let client = self.clone();
            let rx = shared_rx.clone();
            let tx = resp_tx.clone();
            worker_handles.push(tokio::spawn(async move {
                client.run_worker(rx, tx).await;
            }));
        }
        drop(resp_tx);

        tokio::spawn(async move {
            for request in requests {
                if req_tx.send(request).await.is_err() {
                    break;
                }
            }
            drop(req_tx);

            // 等全部 worker 退出；其持有的发送端随之释放，输出通道关闭
            for handle in worker_handles {
                let _ = handle.await;
            }
        });

        resp_rx
    }

    /// 通道驱动变体：逐个消费调用方提供的请求通道，响应写入调用方
    /// 提供的输出通道。通道的关闭由调用方管理；接收端迟缓会使本
    /// 调用停顿（刻意设计）。
    pub async fn execute_channel(
        &self,
        mut requests: mpsc::Receiver<DownloadRequest>,
        responses: mpsc::Sender<DownloadResponse>,
    ) {
        while let Some(request) = requests.recv().await {
            let resp = self.execute(request).await;
            if responses.send(resp.clone()).await.is_err() {
                log::debug!("批量响应接收端已关闭");
            }
            resp.wait().await;
        }
    }

    async fn run_worker(
        self,
        rx: Arc<Mutex<mpsc::Receiver<DownloadRequest>>>,
        tx: mpsc::Sender<DownloadResponse>,
    ) {
        loop {
            // 取下一个请求；锁仅覆盖出队本身
            let request = { rx.lock().await.recv().await };
            let Some(request) = request else {
                break;
            };

            let resp = self.execute(request).await;
            if tx.send(resp.clone()).await.is_err() {
                log::debug!("批量响应接收端已关闭");
            }
            // 等待当前响应终态后再取下一个请求
            resp.wait().await;
        }
    }
}
