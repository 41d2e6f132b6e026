//! 日志初始化与限流

use std::time::{Duration, Instant};

use tracing_subscriber::filter::LevelFilter;

/// 日志级别: verbose 时输出 INFO 以上, 否则完全静默
///
/// 静默时启动失败仍由 main 直接打印到控制台。
pub fn max_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::OFF
    }
}

/// 安装全局 tracing 订阅者
pub fn init(verbose: bool) {
    // 测试或重复调用时已经装过订阅者, 忽略即可
    let _ = tracing_subscriber::fmt()
        .with_max_level(max_level(verbose))
        .with_target(false)
        .try_init();
}

/// 日志限流: 同一类日志在 `interval` 内只放行一条, 其余计数
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last: Option<Instant>,
    suppressed: u64,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            suppressed: 0,
        }
    }

    /// 放行时返回 Some(此前被吞掉的条数)
    pub fn check(&mut self, now: Instant) -> Option<u64> {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => {
                self.suppressed += 1;
                None
            }
            _ => {
                self.last = Some(now);
                Some(std::mem::take(&mut self.suppressed))
            }
        }
    }
}

/// 截断过长的错误信息 (按字符, 避免切断 UTF-8)
pub fn truncate_message(msg: &str, max_chars: usize) -> String {
    match msg.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &msg[..idx]),
        None => msg.to_string(),
    }
}
