//! 生命周期控制 (AppController)
//!
//! 共享状态都放在 `AppContext` 里, 由信号处理器、工作线程和事件循环各持一份 `Arc`。
//! 停止路径只有一条: `AppContext::stop`, 可从任意线程重复调用。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info, warn};

use crate::detection::{
    drain_latest, spawn_capture_loop, DetectionBatch, DetectionQueue, Detector, LoopConfig,
    LoopReport, LoopState, LoopStatus, RunningFlag,
};
use crate::error::{CaptureError, StartupError};
use crate::input::{FrameSource, MonitorInfo};
use crate::renderer::{OverlayRenderer, WindowBackend};

/// 信号到达后等待事件循环关窗的时间
const SIGNAL_UI_GRACE: Duration = Duration::from_millis(500);

/// 一次 stop 调用的结果
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// 工作线程在超时内退出
    Joined(LoopReport),
    /// 超时, 工作线程被放弃 (进程退出时随之结束)
    TimedOut,
    /// 工作线程没有留下统计就退出了
    WorkerGone,
    /// 从未启动过工作线程
    NoWorker,
    /// 之前已经停止过
    AlreadyStopped,
}

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<LoopReport>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// 应用上下文: 运行标志、停止状态、工作线程句柄
pub struct AppContext {
    running: RunningFlag,
    loop_status: LoopStatus,
    stop_requested: AtomicBool,
    stopped: AtomicBool,
    worker: Mutex<Option<Worker>>,
    ui_closed: Mutex<bool>,
    ui_closed_cv: Condvar,
    join_timeout: Duration,
}

impl AppContext {
    pub fn new(join_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            running: RunningFlag::new(),
            loop_status: LoopStatus::new(),
            stop_requested: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            worker: Mutex::new(None),
            ui_closed: Mutex::new(false),
            ui_closed_cv: Condvar::new(),
            join_timeout,
        })
    }

    pub fn running(&self) -> &RunningFlag {
        &self.running
    }

    /// 采集循环当前状态
    pub fn loop_state(&self) -> LoopState {
        self.loop_status.get()
    }

    /// 只发出停止请求, 不等待; 工作线程和事件循环各自在下次检查时退出
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.running.stop();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn attach_worker(&self, handle: JoinHandle<()>, done: Receiver<LoopReport>) {
        *lock(&self.worker) = Some(Worker { handle, done });
    }

    /// 清除运行标志并在超时内等待工作线程; 第二次起直接返回 AlreadyStopped
    pub fn stop(&self) -> StopOutcome {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return StopOutcome::AlreadyStopped;
        }
        self.request_stop();

        let Some(worker) = lock(&self.worker).take() else {
            return StopOutcome::NoWorker;
        };

        match worker.done.recv_timeout(self.join_timeout) {
            Ok(report) => {
                if worker.handle.join().is_err() {
                    warn!("采集线程退出时发生 panic");
                }
                StopOutcome::Joined(report)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "⚠️ 采集线程未在 {:?} 内退出, 放弃等待",
                    self.join_timeout
                );
                StopOutcome::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
                StopOutcome::WorkerGone
            }
        }
    }

    pub fn mark_ui_closed(&self) {
        *lock(&self.ui_closed) = true;
        self.ui_closed_cv.notify_all();
    }

    pub fn ui_closed(&self) -> bool {
        *lock(&self.ui_closed)
    }

    /// 等待事件循环关窗, 返回是否已关
    pub fn wait_ui_closed(&self, timeout: Duration) -> bool {
        let guard = lock(&self.ui_closed);
        let (guard, _) = self
            .ui_closed_cv
            .wait_timeout_while(guard, timeout, |closed| !*closed)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

/// Ctrl+C / SIGTERM: 停止检测, 给事件循环一点时间关窗, 然后退出进程
pub fn install_signal_handler(ctx: Arc<AppContext>) -> Result<(), StartupError> {
    ctrlc::set_handler(move || {
        println!("\n收到退出信号，正在停止检测...");
        let outcome = ctx.stop();
        debug!("信号停止: {:?}", outcome);
        if !ctx.wait_ui_closed(SIGNAL_UI_GRACE) {
            debug!("事件循环未及时关窗");
        }
        std::process::exit(0);
    })
    .map_err(|e| StartupError::Signal(e.to_string()))
}

/// 事件循环一侧的控制器: 持有渲染器与检测结果接收端
pub struct AppController<B: WindowBackend> {
    ctx: Arc<AppContext>,
    renderer: OverlayRenderer<B>,
    batches: Option<Receiver<DetectionBatch>>,
    last_frame: Option<u64>,
}

impl<B: WindowBackend> AppController<B> {
    pub fn new(ctx: Arc<AppContext>, backend: B) -> Self {
        Self {
            ctx,
            renderer: OverlayRenderer::new(backend),
            batches: None,
            last_frame: None,
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    pub fn renderer(&self) -> &OverlayRenderer<B> {
        &self.renderer
    }

    /// 最近一次画出的帧号
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// 创建叠加层窗口并启动采集线程
    pub fn start<S, D, F>(
        &mut self,
        monitor: &MonitorInfo,
        make_source: F,
        detector: D,
        config: LoopConfig,
        queue_capacity: usize,
    ) -> Result<(), StartupError>
    where
        S: FrameSource + 'static,
        D: Detector + 'static,
        F: FnOnce() -> Result<S, CaptureError> + Send + 'static,
    {
        if self.ctx.stop_requested() {
            debug!("启动前已收到停止请求");
            return Ok(());
        }

        self.renderer.create(monitor)?;

        let (queue, rx) = DetectionQueue::bounded(queue_capacity);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let ctx = self.ctx.clone();
        let on_exit = move |report: LoopReport| {
            // 采集线程自己放弃时, 整个程序一起停
            if report.exit.is_failure() {
                ctx.request_stop();
            }
            let _ = done_tx.send(report);
        };

        self.ctx.running().start();
        match spawn_capture_loop(
            make_source,
            detector,
            queue,
            self.ctx.running().clone(),
            config,
            self.ctx.loop_status.clone(),
            on_exit,
        ) {
            Ok(handle) => {
                self.ctx.attach_worker(handle, done_rx);
                self.batches = Some(rx);
                // 启动过程中到达的停止请求
                if self.ctx.stop_requested() {
                    self.ctx.running().stop();
                }
                Ok(())
            }
            Err(e) => {
                self.ctx.running().stop();
                self.renderer.destroy();
                Err(StartupError::Thread(e.to_string()))
            }
        }
    }

    /// 事件循环每帧调用一次; 返回 false 表示应当退出循环
    pub fn tick(&mut self) -> bool {
        if self.ctx.stop_requested() {
            return false;
        }
        if !self.renderer.is_alive() {
            self.ctx.request_stop();
            return false;
        }

        let events = self.renderer.poll_events();
        if events.wants_stop() {
            info!("收到窗口退出事件: {:?}", events);
            self.ctx.request_stop();
            return false;
        }

        match self.batches.as_ref().and_then(drain_latest) {
            Some(batch) => {
                self.last_frame = Some(batch.frame_id);
                self.renderer.render(&batch.detections);
            }
            None => self.renderer.refresh(),
        }
        true
    }

    /// 停止采集、销毁窗口; 可重复调用
    pub fn stop(&mut self) -> StopOutcome {
        let outcome = self.ctx.stop();
        self.renderer.destroy();
        self.batches = None;
        self.ctx.mark_ui_closed();

        match &outcome {
            StopOutcome::Joined(report) => info!(
                "检测已停止: {:?}, 共 {} 帧, 丢弃 {} 批结果",
                report.exit, report.frames, report.dropped_batches
            ),
            other => debug!("检测已停止: {:?}", other),
        }
        outcome
    }
}
