//! BPS 仪表：固定窗口移动平均。
//!
//! 采样任务每秒记录一次累计传输字节数，窗口长度 6 个采样，
//! 即五秒平滑的瞬时速率。

use std::collections::VecDeque;
use std::time::Instant;

/// 默认采样窗口长度（6 个采样 → 五秒平滑）。
pub(crate) const DEFAULT_WINDOW: usize = 6;

/// 固定窗口移动平均 BPS 仪表。
pub(crate) struct SmaGauge {
    samples: VecDeque<(Instant, u64)>,
    window: usize,
}

impl SmaGauge {
    pub(crate) fn new(window: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(window.max(2)),
            window: window.max(2),
        }
    }

    /// 记录一次累计字节数采样。
    pub(crate) fn sample(&mut self, total: u64) {
        self.samples.push_back((Instant::now(), total));
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }
    }

    /// 窗口内的平均字节速率；不足两个采样时为 0。
    pub(crate) fn bps(&self) -> f64 {
        let (first, last) = match (self.samples.front(), self.samples.back()) {
            (Some(f), Some(l)) if f.0 < l.0 => (f, l),
            _ => return 0.0,
        };
        let secs = last.0.duration_since(first.0).as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        last.1.saturating_sub(first.1) as f64 / secs
    }
}
