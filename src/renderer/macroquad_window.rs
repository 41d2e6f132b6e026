//! macroquad 叠加层窗口
//!
//! macroquad 是立即模式: 每帧在 `next_frame().await` 之前重画整个画面。
//! 窗口由 `Window::from_config` 创建, 这里只负责铺满显示器、套样式、绘制。

use macroquad::miniquad::conf::{Conf, Platform};
use macroquad::prelude::*;
use tracing::debug;

use super::overlay::{OverlayWindow, WindowBackend, WindowEvents};
use super::scene::{Primitive, Rgba, Scene, KEY_COLOR, LABEL_OUTLINE};
use crate::error::RenderError;
use crate::input::MonitorInfo;

pub const WINDOW_TITLE: &str = "Person Detection Overlay";

/// 窗口配置: 尺寸与显示器一致, 帧缓冲带 alpha
pub fn window_conf(monitor: &MonitorInfo) -> Conf {
    Conf {
        window_title: WINDOW_TITLE.to_owned(),
        window_width: monitor.width as i32,
        window_height: monitor.height as i32,
        high_dpi: false,
        fullscreen: false,
        window_resizable: false,
        platform: Platform {
            framebuffer_alpha: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn color(c: Rgba) -> Color {
    Color::from_rgba(c.0, c.1, c.2, c.3)
}

pub struct MacroquadBackend {
    title: String,
}

impl MacroquadBackend {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Default for MacroquadBackend {
    fn default() -> Self {
        Self::new(WINDOW_TITLE)
    }
}

impl WindowBackend for MacroquadBackend {
    type Window = MacroquadWindow;

    fn open(&mut self, monitor: &MonitorInfo) -> Result<MacroquadWindow, RenderError> {
        request_new_screen_size(monitor.width as f32, monitor.height as f32);
        // 关闭按钮只发事件, 由控制器统一停止
        prevent_quit();

        #[cfg(windows)]
        let native = Some(super::win32::NativeOverlay::attach(
            &self.title,
            monitor,
            KEY_COLOR,
        )?);
        #[cfg(not(windows))]
        {
            tracing::warn!(
                "当前平台不支持置顶和鼠标穿透, 窗口 {} 只使用透明帧缓冲, 检测框会随窗口位置偏移",
                self.title
            );
        }

        Ok(MacroquadWindow {
            closed: false,
            #[cfg(windows)]
            native,
        })
    }
}

pub struct MacroquadWindow {
    closed: bool,
    #[cfg(windows)]
    native: Option<super::win32::NativeOverlay>,
}

impl OverlayWindow for MacroquadWindow {
    fn present(&mut self, scene: &Scene) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::WindowClosed);
        }

        clear_background(color(KEY_COLOR));
        for p in scene.primitives() {
            match p {
                Primitive::BoxOutline {
                    x1,
                    y1,
                    x2,
                    y2,
                    thickness,
                    color: c,
                } => {
                    draw_rectangle_lines(*x1, *y1, x2 - x1, y2 - y1, *thickness, color(*c));
                }
                Primitive::LabelBackground {
                    x1,
                    y1,
                    x2,
                    y2,
                    fill,
                    outline,
                } => {
                    draw_rectangle(*x1, *y1, x2 - x1, y2 - y1, color(*fill));
                    draw_rectangle_lines(*x1, *y1, x2 - x1, y2 - y1, LABEL_OUTLINE, color(*outline));
                }
                Primitive::Label {
                    x,
                    baseline,
                    text,
                    size,
                    color: c,
                } => {
                    draw_text(text, *x, *baseline, *size, color(*c));
                }
            }
        }
        Ok(())
    }

    fn poll_events(&mut self) -> WindowEvents {
        if self.closed {
            return WindowEvents::default();
        }
        WindowEvents {
            escape: is_key_pressed(KeyCode::Escape),
            close_requested: is_quit_requested(),
        }
    }

    fn close(&mut self) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::WindowClosed);
        }
        self.closed = true;
        // 再画一帧透明色, 事件循环退出前不留残影
        clear_background(color(KEY_COLOR));
        #[cfg(windows)]
        if let Some(native) = self.native.take() {
            native.hide();
        }
        debug!("叠加层窗口已关闭");
        Ok(())
    }
}
