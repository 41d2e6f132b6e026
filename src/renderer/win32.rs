//! Windows 原生窗口样式: 无边框、置顶、鼠标穿透、透明色抠图

use tracing::debug;
use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HWND};
use windows::Win32::UI::WindowsAndMessaging::{
    FindWindowW, GetWindowLongW, SetLayeredWindowAttributes, SetWindowLongW, SetWindowPos,
    ShowWindow, GWL_EXSTYLE, GWL_STYLE, HWND_TOPMOST, LWA_COLORKEY, SWP_SHOWWINDOW, SW_HIDE,
    WS_EX_LAYERED, WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP, WS_VISIBLE,
};

use super::scene::Rgba;
use crate::error::RenderError;
use crate::input::MonitorInfo;

/// 已套上叠加层样式的原生窗口
pub struct NativeOverlay {
    hwnd: HWND,
}

impl NativeOverlay {
    /// 按标题找到窗口, 铺满显示器并设置样式
    pub fn attach(title: &str, monitor: &MonitorInfo, key: Rgba) -> Result<Self, RenderError> {
        let hwnd = unsafe { FindWindowW(PCWSTR::null(), &HSTRING::from(title)) }
            .map_err(|e| RenderError::Toolkit(format!("找不到窗口 {}: {}", title, e)))?;

        unsafe {
            SetWindowLongW(hwnd, GWL_STYLE, (WS_POPUP.0 | WS_VISIBLE.0) as i32);

            let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE) as u32
                | WS_EX_LAYERED.0
                | WS_EX_TRANSPARENT.0
                | WS_EX_TOPMOST.0
                | WS_EX_TOOLWINDOW.0;
            SetWindowLongW(hwnd, GWL_EXSTYLE, ex_style as i32);

            // COLORREF 为 0x00BBGGRR
            let colorref = COLORREF(key.0 as u32 | (key.1 as u32) << 8 | (key.2 as u32) << 16);
            SetLayeredWindowAttributes(hwnd, colorref, 0, LWA_COLORKEY)
                .map_err(|e| RenderError::Toolkit(e.to_string()))?;

            SetWindowPos(
                hwnd,
                HWND_TOPMOST,
                monitor.x,
                monitor.y,
                monitor.width as i32,
                monitor.height as i32,
                SWP_SHOWWINDOW,
            )
            .map_err(|e| RenderError::Toolkit(e.to_string()))?;
        }

        debug!("叠加层样式已应用: {:?}", hwnd);
        Ok(Self { hwnd })
    }

    pub fn hide(&self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_HIDE);
        }
    }
}
