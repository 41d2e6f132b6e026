//! 采集循环 (CaptureLoop)
//! 职责: 抓屏 → RGB 转换 → 人物检测 → 投递检测批次到渲染线程
//!
//! 状态机: Idle → Running → Stopping → Stopped
//! 取消方式: 每次迭代检查一次 RunningFlag, 不打断进行中的推理

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use super::detector::Detector;
use super::types::{DetectionBatch, DETECT_CLASSES};
use crate::error::{CaptureError, FrameError};
use crate::input::{to_rgb, FrameSource};
use crate::logging::{truncate_message, RateLimiter};

/// 错误信息最多保留的字符数
const MAX_ERROR_CHARS: usize = 100;

/// 循环参数
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub conf_threshold: f32,
    pub classes: Vec<usize>,
    /// 跳帧步长, 1 = 每帧都处理
    pub frame_skip: u64,
    /// 每隔多少帧回收一次内存, 0 = 关闭
    pub reclaim_every: u64,
    pub status_interval: Duration,
    pub error_interval: Duration,
    /// 单帧失败后的退避
    pub backoff: Duration,
    /// 跳过的帧小睡一下, 降低 CPU 占用
    pub skip_nap: Duration,
    /// 连续失败上限, 0 = 不限
    pub max_consecutive_failures: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            conf_threshold: 0.3,
            classes: DETECT_CLASSES.to_vec(),
            frame_skip: 1,
            reclaim_every: 30,
            status_interval: Duration::from_secs(5),
            error_interval: Duration::from_secs(1),
            backoff: Duration::from_millis(100),
            skip_nap: Duration::from_millis(10),
            max_consecutive_failures: 100,
        }
    }
}

/// 运行标志, 控制器写、采集线程读
#[derive(Debug, Clone, Default)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LoopState::Idle,
            1 => LoopState::Running,
            2 => LoopState::Stopping,
            _ => LoopState::Stopped,
        }
    }
}

/// 循环状态的共享句柄, 其他线程可以在循环运行时读取
#[derive(Debug, Clone, Default)]
pub struct LoopStatus(Arc<AtomicU8>);

impl LoopStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> LoopState {
        LoopState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: LoopState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// 周期状态行: 累计帧数 + 最近一帧的人数
pub fn status_line(frames: u64, detections: usize) -> String {
    format!("[状态更新] 已处理 {} 帧, 检测到 {} 个人物", frames, detections)
}

/// 循环结束原因
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// 运行标志被清除
    Stopped,
    /// 连续失败次数达到上限
    TooManyFailures(u32),
    /// 渲染端已关闭
    QueueClosed,
    /// 抓帧器初始化失败
    SetupFailed(String),
}

impl LoopExit {
    pub fn is_failure(&self) -> bool {
        !matches!(self, LoopExit::Stopped)
    }
}

/// 循环退出时的统计
#[derive(Debug, Clone, PartialEq)]
pub struct LoopReport {
    pub frames: u64,
    pub processed: u64,
    pub failures: u64,
    pub reclaims: u64,
    pub dropped_batches: u64,
    pub last_detections: usize,
    pub exit: LoopExit,
}

impl LoopReport {
    fn setup_failed(err: &CaptureError) -> Self {
        Self {
            frames: 0,
            processed: 0,
            failures: 0,
            reclaims: 0,
            dropped_batches: 0,
            last_detections: 0,
            exit: LoopExit::SetupFailed(err.to_string()),
        }
    }
}

/// 检测批次队列 (有界, 投递不阻塞)
///
/// 队列满说明渲染线程暂时没跟上, 本批直接丢弃; 渲染线程每帧只取最新一批。
#[derive(Debug, Clone)]
pub struct DetectionQueue {
    tx: Sender<DetectionBatch>,
}

impl DetectionQueue {
    pub fn bounded(capacity: usize) -> (Self, Receiver<DetectionBatch>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Ok(true) 已投递, Ok(false) 队列满被丢弃
    pub fn submit(&self, batch: DetectionBatch) -> Result<bool, FrameError> {
        match self.tx.try_send(batch) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(FrameError::QueueClosed),
        }
    }
}

/// 取出队列里现有的全部批次, 只返回最新的一批
pub fn drain_latest(rx: &Receiver<DetectionBatch>) -> Option<DetectionBatch> {
    rx.try_iter().last()
}

pub struct CaptureLoop<S: FrameSource, D: Detector> {
    source: S,
    detector: D,
    queue: DetectionQueue,
    running: RunningFlag,
    config: LoopConfig,
    status: LoopStatus,
    frame_count: u64,
}

impl<S: FrameSource, D: Detector> CaptureLoop<S, D> {
    pub fn new(
        source: S,
        detector: D,
        queue: DetectionQueue,
        running: RunningFlag,
        config: LoopConfig,
    ) -> Self {
        Self {
            source,
            detector,
            queue,
            running,
            config,
            status: LoopStatus::new(),
            frame_count: 0,
        }
    }

    /// 使用外部提供的状态句柄 (用于在其他线程观察)
    pub fn with_status(mut self, status: LoopStatus) -> Self {
        status.set(LoopState::Idle);
        self.status = status;
        self
    }

    pub fn state(&self) -> LoopState {
        self.status.get()
    }

    pub fn status(&self) -> LoopStatus {
        self.status.clone()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// 运行直到运行标志被清除; 单帧错误只记录并跳过
    pub fn run(&mut self) -> LoopReport {
        self.status.set(LoopState::Running);
        let frame_skip = self.config.frame_skip.max(1);

        let monitor = self.source.monitor();
        info!("开始屏幕监控: {}x{}", monitor.width, monitor.height);
        info!("使用设备: {}", self.detector.device());
        info!(
            "每{}秒输出一次状态信息",
            self.config.status_interval.as_secs_f32()
        );

        let mut errors = RateLimiter::new(self.config.error_interval);
        let mut last_status = Instant::now();
        let mut consecutive = 0u32;
        let mut processed = 0u64;
        let mut failures = 0u64;
        let mut reclaims = 0u64;
        let mut dropped = 0u64;
        let mut last_detections = 0usize;

        let exit = loop {
            if !self.running.is_running() {
                self.status.set(LoopState::Stopping);
                break LoopExit::Stopped;
            }

            self.frame_count += 1;
            if self.frame_count % frame_skip != 0 {
                thread::sleep(self.config.skip_nap);
                continue;
            }

            match self.process_frame() {
                Ok((count, delivered)) => {
                    consecutive = 0;
                    processed += 1;
                    last_detections = count;
                    if !delivered {
                        dropped += 1;
                        debug!("检测队列已满, 丢弃第 {} 帧结果", self.frame_count);
                    }

                    let now = Instant::now();
                    if now.duration_since(last_status) >= self.config.status_interval {
                        info!("{}", status_line(self.frame_count, count));
                        last_status = now;
                    }

                    if self.config.reclaim_every > 0
                        && self.frame_count % self.config.reclaim_every == 0
                    {
                        crate::reclaim_memory();
                        reclaims += 1;
                    }
                }
                Err(e) if e.is_terminal() => {
                    self.status.set(LoopState::Stopping);
                    warn!("⚠️ {}, 采集循环退出", e);
                    break LoopExit::QueueClosed;
                }
                Err(e) => {
                    failures += 1;
                    consecutive += 1;
                    if let Some(suppressed) = errors.check(Instant::now()) {
                        let msg = truncate_message(&e.to_string(), MAX_ERROR_CHARS);
                        if suppressed > 0 {
                            warn!("处理错误: {} (另有 {} 条被省略)", msg, suppressed);
                        } else {
                            warn!("处理错误: {}", msg);
                        }
                    }

                    let limit = self.config.max_consecutive_failures;
                    if limit > 0 && consecutive >= limit {
                        self.status.set(LoopState::Stopping);
                        error!("❌ 连续 {} 帧处理失败, 停止采集", consecutive);
                        break LoopExit::TooManyFailures(consecutive);
                    }
                    thread::sleep(self.config.backoff);
                }
            }
        };

        let report = LoopReport {
            frames: self.frame_count,
            processed,
            failures,
            reclaims,
            dropped_batches: dropped,
            last_detections,
            exit,
        };
        self.status.set(LoopState::Stopped);
        report
    }

    /// 单帧处理, 返回 (检测数量, 是否投递成功)
    fn process_frame(&mut self) -> Result<(usize, bool), FrameError> {
        let frame = self.source.capture().map_err(FrameError::Capture)?;
        let rgb = to_rgb(&frame).map_err(FrameError::Convert)?;
        drop(frame);

        let detections =
            self.detector
                .detect(&rgb, self.config.conf_threshold, &self.config.classes)?;
        let count = detections.len();

        let delivered = self.queue.submit(DetectionBatch {
            frame_id: self.frame_count,
            detections,
        })?;
        Ok((count, delivered))
    }
}

/// 在独立线程里启动采集循环
///
/// 抓帧器在线程内创建; 循环状态写入 `status`, 结束后把统计交给 `on_exit`。
pub fn spawn_capture_loop<S, D, F, E>(
    make_source: F,
    detector: D,
    queue: DetectionQueue,
    running: RunningFlag,
    config: LoopConfig,
    status: LoopStatus,
    on_exit: E,
) -> std::io::Result<JoinHandle<()>>
where
    S: FrameSource + 'static,
    D: Detector + 'static,
    F: FnOnce() -> Result<S, CaptureError> + Send + 'static,
    E: FnOnce(LoopReport) + Send + 'static,
{
    thread::Builder::new()
        .name("capture-loop".to_string())
        .spawn(move || {
            let report = match make_source() {
                Ok(source) => CaptureLoop::new(source, detector, queue, running, config)
                    .with_status(status)
                    .run(),
                Err(e) => {
                    // 没有进入 Running, 直接收尾
                    status.set(LoopState::Stopping);
                    error!("屏幕捕获错误: {}", e);
                    let report = LoopReport::setup_failed(&e);
                    status.set(LoopState::Stopped);
                    report
                }
            };
            info!(
                "🔚 采集循环结束: {:?} (共 {} 帧, 成功 {} 帧, 失败 {} 帧)",
                report.exit, report.frames, report.processed, report.failures
            );
            on_exit(report);
        })
}
