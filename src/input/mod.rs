/// 屏幕输入系统 (Screen Input System)
///
/// - FrameSource:   抓帧接口, 每次调用返回一张 RGBA 截图
/// - DesktopSource: 主显示器抓取 (xcap)
/// - to_rgb:        RGBA → RGB 颜色转换 (检测器输入格式)
pub mod desktop;

pub use desktop::{primary_monitor, DesktopSource};

use image::{RgbImage, RgbaImage};

use crate::error::CaptureError;

/// 显示器几何信息, 启动时读取一次, 之后不变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// 抓帧接口
pub trait FrameSource {
    fn monitor(&self) -> &MonitorInfo;

    fn capture(&mut self) -> Result<RgbaImage, CaptureError>;
}

/// RGBA → RGB, 丢弃 alpha 通道
pub fn to_rgb(frame: &RgbaImage) -> Result<RgbImage, CaptureError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(CaptureError::EmptyFrame { width, height });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in frame.as_raw().chunks_exact(4) {
        rgb.extend_from_slice(&chunk[..3]);
    }
    RgbImage::from_raw(width, height, rgb).ok_or(CaptureError::EmptyFrame { width, height })
}
