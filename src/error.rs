//! 错误类型 (Error taxonomy)
//!
//! - StartupError:   启动阶段致命错误,直接退出
//! - CaptureError:   屏幕抓取失败,跳过本帧
//! - InferenceError: 推理失败,跳过本帧
//! - RenderError:    窗口已销毁,渲染器吞掉并失效窗口引用
//! - FrameError:     单次循环各阶段错误的汇总

use std::path::PathBuf;
use thiserror::Error;

/// 启动错误 (致命)
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("模型文件 {} 不存在", .0.display())]
    ModelNotFound(PathBuf),

    #[error("无效配置: {field} = {value}")]
    InvalidConfig { field: &'static str, value: String },

    #[error("未找到主显示器")]
    NoPrimaryMonitor,

    #[error("屏幕捕获初始化失败: {0}")]
    Capture(#[from] CaptureError),

    #[error("推理后端初始化失败: {0}")]
    Backend(String),

    #[error("叠加层窗口创建失败: {0}")]
    Window(#[from] RenderError),

    #[error("工作线程启动失败: {0}")]
    Thread(String),

    #[error("信号处理器安装失败: {0}")]
    Signal(String),
}

/// 屏幕捕获错误 (可恢复)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("屏幕抓取失败: {0}")]
    Backend(String),

    #[error("空帧或尺寸不一致: {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },

    #[error("未找到主显示器")]
    NoPrimaryMonitor,
}

/// 推理错误 (跳过本帧)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("输入图像异常: {width}x{height}")]
    MalformedImage { width: u32, height: u32 },

    #[error("预处理失败: {0}")]
    Preprocess(String),

    #[error("推理后端错误: {0}")]
    Backend(String),

    #[error("模型输出格式异常: {0}")]
    UnexpectedOutput(String),
}

/// 渲染错误 (渲染器内部吞掉)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("窗口已关闭")]
    WindowClosed,

    #[error("窗口系统错误: {0}")]
    Toolkit(String),
}

/// 单次循环的阶段错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("捕获: {0}")]
    Capture(CaptureError),

    #[error("颜色转换: {0}")]
    Convert(CaptureError),

    #[error("推理: {0}")]
    Inference(#[from] InferenceError),

    #[error("检测队列已关闭")]
    QueueClosed,
}

impl FrameError {
    /// 是否需要立即结束循环 (渲染端已经不在了)
    pub fn is_terminal(&self) -> bool {
        matches!(self, FrameError::QueueClosed)
    }
}
