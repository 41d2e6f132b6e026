//! 测试用假组件: 抓帧器、检测器、窗口系统
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::{Rgba, RgbImage, RgbaImage};
use screen_person_rs::detection::{Detection, Detector, LoopConfig, RunningFlag};
use screen_person_rs::error::{CaptureError, InferenceError, RenderError};
use screen_person_rs::input::{FrameSource, MonitorInfo};
use screen_person_rs::renderer::{OverlayWindow, Scene, WindowBackend, WindowEvents};

pub fn monitor() -> MonitorInfo {
    MonitorInfo {
        name: "fake".into(),
        x: 0,
        y: 0,
        width: 1280,
        height: 720,
    }
}

/// 测试用循环参数: 不睡眠, 不回收
pub fn fast_config() -> LoopConfig {
    LoopConfig {
        reclaim_every: 0,
        status_interval: Duration::from_secs(3600),
        backoff: Duration::from_millis(1),
        skip_nap: Duration::ZERO,
        ..LoopConfig::default()
    }
}

/// 轮询等待条件成立
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

// ========== 抓帧器 ==========

#[derive(Clone, Default)]
pub struct FakeSource {
    pub calls: Arc<AtomicU64>,
    /// 第 n 次抓帧失败 (从 1 开始)
    pub fail_on: Vec<u64>,
    pub always_fail: bool,
    /// 抓满 n 次后清除运行标志
    pub stop_after: Option<(u64, RunningFlag)>,
}

impl FakeSource {
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// 带上显示器信息的抓帧器
pub struct BoundSource {
    pub fake: FakeSource,
    pub monitor: MonitorInfo,
}

impl FakeSource {
    pub fn bind(self) -> BoundSource {
        BoundSource {
            fake: self,
            monitor: monitor(),
        }
    }
}

impl FrameSource for BoundSource {
    fn monitor(&self) -> &MonitorInfo {
        &self.monitor
    }

    fn capture(&mut self) -> Result<RgbaImage, CaptureError> {
        let n = self.fake.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, flag)) = &self.fake.stop_after {
            if n >= *limit {
                flag.stop();
            }
        }
        if self.fake.always_fail || self.fake.fail_on.contains(&n) {
            return Err(CaptureError::Backend(format!("injected failure #{}", n)));
        }
        Ok(RgbaImage::from_pixel(64, 48, Rgba([0, 0, 0, 255])))
    }
}

// ========== 检测器 ==========

#[derive(Clone, Default)]
pub struct FakeDetector {
    pub calls: Arc<AtomicU64>,
    pub detections: Vec<Detection>,
    /// 奇数次调用失败
    pub fail_odd: bool,
    pub delay: Duration,
}

impl FakeDetector {
    pub fn returning(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for FakeDetector {
    fn detect(
        &mut self,
        _image: &RgbImage,
        conf_threshold: f32,
        classes: &[usize],
    ) -> Result<Vec<Detection>, InferenceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.fail_odd && n % 2 == 1 {
            return Err(InferenceError::Backend("injected".into()));
        }
        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= conf_threshold && classes.contains(&d.class_id))
            .cloned()
            .collect())
    }

    fn device(&self) -> &str {
        "fake"
    }
}

// ========== 窗口系统 ==========

#[derive(Debug, Default)]
pub struct WindowLog {
    pub opened: usize,
    pub closed: usize,
    pub presents: usize,
    pub last_scene: Option<Scene>,
    pub escape: bool,
    pub close_requested: bool,
    pub fail_present: bool,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub log: Rc<RefCell<WindowLog>>,
}

pub struct FakeWindow {
    log: Rc<RefCell<WindowLog>>,
    closed: bool,
}

impl WindowBackend for FakeBackend {
    type Window = FakeWindow;

    fn open(&mut self, _monitor: &MonitorInfo) -> Result<FakeWindow, RenderError> {
        self.log.borrow_mut().opened += 1;
        Ok(FakeWindow {
            log: self.log.clone(),
            closed: false,
        })
    }
}

impl OverlayWindow for FakeWindow {
    fn present(&mut self, scene: &Scene) -> Result<(), RenderError> {
        let mut log = self.log.borrow_mut();
        if self.closed || log.fail_present {
            return Err(RenderError::WindowClosed);
        }
        log.presents += 1;
        log.last_scene = Some(scene.clone());
        Ok(())
    }

    fn poll_events(&mut self) -> WindowEvents {
        let log = self.log.borrow();
        WindowEvents {
            escape: log.escape,
            close_requested: log.close_requested,
        }
    }

    fn close(&mut self) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::WindowClosed);
        }
        self.closed = true;
        self.log.borrow_mut().closed += 1;
        Ok(())
    }
}
