//! 叠加层渲染器 (OverlayRenderer)
//!
//! 持有唯一的叠加层窗口; 所有调用都必须在事件循环所在线程。

use tracing::{debug, info};

use super::scene::Scene;
use crate::detection::Detection;
use crate::error::RenderError;
use crate::input::MonitorInfo;

/// 一次事件轮询得到的窗口事件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowEvents {
    pub escape: bool,
    pub close_requested: bool,
}

impl WindowEvents {
    pub fn wants_stop(&self) -> bool {
        self.escape || self.close_requested
    }
}

/// 已打开的叠加层窗口
pub trait OverlayWindow {
    /// 用画面覆盖窗口内容
    fn present(&mut self, scene: &Scene) -> Result<(), RenderError>;

    fn poll_events(&mut self) -> WindowEvents;

    fn close(&mut self) -> Result<(), RenderError>;
}

/// 窗口系统: 按显示器几何创建置顶、无边框、透明色窗口
pub trait WindowBackend {
    type Window: OverlayWindow;

    fn open(&mut self, monitor: &MonitorInfo) -> Result<Self::Window, RenderError>;
}

pub struct OverlayRenderer<B: WindowBackend> {
    backend: B,
    window: Option<B::Window>,
    scene: Scene,
}

impl<B: WindowBackend> OverlayRenderer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            window: None,
            scene: Scene::new(),
        }
    }

    /// 创建窗口; 已有窗口时先销毁, 保证同时只有一个
    pub fn create(&mut self, monitor: &MonitorInfo) -> Result<(), RenderError> {
        if self.window.is_some() {
            self.destroy();
        }
        let window = self.backend.open(monitor)?;
        info!(
            "🪟 叠加层窗口: {}x{} @ ({}, {})",
            monitor.width, monitor.height, monitor.x, monitor.y
        );
        self.window = Some(window);
        self.scene.clear();
        Ok(())
    }

    /// 清除旧内容并画出本帧检测结果; 窗口不在时什么也不做
    pub fn render(&mut self, detections: &[Detection]) {
        if self.window.is_none() {
            return;
        }
        self.scene.compose(detections);
        self.refresh();
    }

    /// 重画当前画面 (立即模式工具包每帧都要画)
    pub fn refresh(&mut self) {
        let result = match self.window.as_mut() {
            Some(window) => window.present(&self.scene),
            None => return,
        };
        if let Err(e) = result {
            // 窗口可能已被销毁
            debug!("渲染失败, 窗口失效: {}", e);
            self.window = None;
        }
    }

    pub fn poll_events(&mut self) -> WindowEvents {
        self.window
            .as_mut()
            .map(|w| w.poll_events())
            .unwrap_or_default()
    }

    /// 销毁窗口, 可重复调用
    pub fn destroy(&mut self) {
        if let Some(mut window) = self.window.take() {
            if let Err(e) = window.close() {
                // 窗口可能已经关闭
                debug!("关闭窗口: {}", e);
            }
        }
        self.scene.clear();
    }

    pub fn is_alive(&self) -> bool {
        self.window.is_some()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingBackend {
        opened: usize,
    }

    struct FlakyWindow {
        presents_left: usize,
    }

    impl OverlayWindow for FlakyWindow {
        fn present(&mut self, _scene: &Scene) -> Result<(), RenderError> {
            if self.presents_left == 0 {
                return Err(RenderError::WindowClosed);
            }
            self.presents_left -= 1;
            Ok(())
        }

        fn poll_events(&mut self) -> WindowEvents {
            WindowEvents::default()
        }

        fn close(&mut self) -> Result<(), RenderError> {
            Err(RenderError::WindowClosed)
        }
    }

    impl WindowBackend for CountingBackend {
        type Window = FlakyWindow;

        fn open(&mut self, _monitor: &MonitorInfo) -> Result<FlakyWindow, RenderError> {
            self.opened += 1;
            Ok(FlakyWindow { presents_left: 1 })
        }
    }

    fn monitor() -> MonitorInfo {
        MonitorInfo {
            name: "test".into(),
            x: 0,
            y: 0,
            width: 800,
            height: 600,
        }
    }

    #[test]
    fn render_without_window_is_noop() {
        let mut r = OverlayRenderer::new(CountingBackend::default());
        r.render(&[Detection::person(1, 1, 5, 5, 0.9)]);
        assert!(r.scene().is_empty());
        assert!(!r.is_alive());
    }

    #[test]
    fn dead_window_is_dropped_and_later_renders_noop() {
        let mut r = OverlayRenderer::new(CountingBackend::default());
        r.create(&monitor()).unwrap();
        r.render(&[Detection::person(1, 1, 5, 5, 0.9)]);
        assert!(r.is_alive());
        // 第二次 present 失败, 窗口失效
        r.render(&[Detection::person(1, 1, 5, 5, 0.9)]);
        assert!(!r.is_alive());
        r.render(&[]);
        assert!(!r.is_alive());
        // 失败的 close 也被吞掉
        r.destroy();
        assert_eq!(r.backend().opened, 1);
    }
}
