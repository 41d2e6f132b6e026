/// 渲染系统 (Rendering System)
///
/// 只在事件循环线程 (主线程) 上使用
/// - Scene:           检测框 + 标签的显示列表
/// - OverlayRenderer: 持有叠加层窗口, 负责创建 / 绘制 / 销毁
/// - MacroquadBackend: macroquad 窗口 (Windows 上额外套原生样式)
pub mod macroquad_window;
pub mod overlay;
pub mod scene;
#[cfg(windows)]
pub mod win32;

pub use macroquad_window::{window_conf, MacroquadBackend, MacroquadWindow, WINDOW_TITLE};
pub use overlay::{OverlayRenderer, OverlayWindow, WindowBackend, WindowEvents};
pub use scene::{Primitive, Rgba, Scene};
