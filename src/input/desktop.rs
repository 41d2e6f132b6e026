//! 桌面捕获模块
//!
//! 抓取主显示器画面 (xcap, Windows / macOS / Linux)

use image::RgbaImage;
use tracing::info;
use xcap::Monitor;

use super::{FrameSource, MonitorInfo};
use crate::error::CaptureError;

fn find_primary() -> Result<Monitor, CaptureError> {
    let monitors = Monitor::all().map_err(|e| CaptureError::Backend(e.to_string()))?;
    monitors
        .into_iter()
        .find(|m| m.is_primary())
        .ok_or(CaptureError::NoPrimaryMonitor)
}

fn describe(monitor: &Monitor) -> MonitorInfo {
    MonitorInfo {
        name: monitor.name().to_string(),
        x: monitor.x(),
        y: monitor.y(),
        width: monitor.width(),
        height: monitor.height(),
    }
}

/// 读取主显示器几何信息 (启动时调用一次)
pub fn primary_monitor() -> Result<MonitorInfo, CaptureError> {
    find_primary().map(|m| describe(&m))
}

/// 主显示器抓帧器
pub struct DesktopSource {
    monitor: Monitor,
    info: MonitorInfo,
}

impl DesktopSource {
    /// 打开主显示器; 需要在使用它的线程里创建
    pub fn open_primary() -> Result<Self, CaptureError> {
        let monitor = find_primary()?;
        let info = describe(&monitor);
        info!(
            "🖥️ 屏幕捕获: {} {}x{} @ ({}, {})",
            info.name, info.width, info.height, info.x, info.y
        );
        Ok(Self { monitor, info })
    }
}

impl FrameSource for DesktopSource {
    fn monitor(&self) -> &MonitorInfo {
        &self.info
    }

    fn capture(&mut self) -> Result<RgbaImage, CaptureError> {
        let shot = self
            .monitor
            .capture_image()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;

        // 重新装入本 crate 的 image 类型, 与 xcap 内部 image 版本解耦
        let (width, height) = (shot.width(), shot.height());
        RgbaImage::from_raw(width, height, shot.into_raw())
            .ok_or(CaptureError::EmptyFrame { width, height })
    }
}
