//! 令牌桶限速器：按字节发放配额，可在多个请求间共享。

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::internal::download::structs::download_error::DownloadError;
use crate::internal::download::traits::rate_limit::RateLimiter;
use crate::internal::states::cancel_token::CancelToken;

/// 令牌桶限速器。速率为 0 表示不限速。
pub struct TokenBucketLimiter {
    state: Mutex<TokenBucket>,
}

/// 桶的内部状态。
struct TokenBucket {
    /// 桶容量（字节），决定突发上限
    capacity: u64,
    /// 当前可用令牌（字节）
    tokens: u64,
    /// 补充速率（字节/秒）
    rate: u64,
    /// 上次补充时刻
    last_refill: Instant,
}

impl TokenBucketLimiter {
    /// 创建限速器；容量取速率本身（突发 ≤ 1 秒配额）。
    pub fn new(rate_bytes_per_sec: u64) -> Self {
        let capacity = if rate_bytes_per_sec == 0 {
            u64::MAX
        } else {
            rate_bytes_per_sec
        };

        Self {
            state: Mutex::new(TokenBucket {
                capacity,
                tokens: capacity,
                rate: rate_bytes_per_sec,
                last_refill: Instant::now(),
            }),
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn wait_n(&self, token: &CancelToken, n: usize) -> Result<(), DownloadError> {
        if n == 0 {
            return Ok(());
        }

        loop {
            if token.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            let wait = {
                let mut bucket = self.state.lock().await;
                bucket.refill();

                if bucket.rate == 0 {
                    return Ok(());
                }

                // 申请量超过桶容量时按容量封顶，否则永远无法满足
                let amount = (n as u64).min(bucket.capacity);
                if bucket.tokens >= amount {
                    bucket.tokens -= amount;
                    return Ok(());
                }

                let needed = amount - bucket.tokens;
                Duration::from_secs_f64(needed as f64 / bucket.rate as f64)
            };

            // 等待期间不持有锁；取消令牌触发即返回
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = token.cancelled() => return Err(DownloadError::Cancelled),
            }
        }
    }
}

impl TokenBucket {
    /// 按流逝时间向桶中补充令牌。
    fn refill(&mut self) {
        if self.rate == 0 {
            self.tokens = self.capacity;
            return;
        }

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        let to_add = (elapsed.as_secs_f64() * self.rate as f64) as u64;

        if to_add > 0 {
            self.tokens = (self.tokens + to_add).min(self.capacity);
            self.last_refill = now;
        }
    }
}
