//! 运行参数 (Args)
//!
//! 所有参数都有默认值,不带任何参数运行即为标准行为。

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::detection::LoopConfig;
use crate::error::StartupError;
use crate::OrtEP;

/// 推理设备选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceChoice {
    /// 有 CUDA 就用 CUDA,否则 CPU
    Auto,
    Cuda,
    Trt,
    Cpu,
}

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "屏幕人物检测叠加层",
    long_about = "屏幕人物检测叠加层: 抓取主显示器, 用 YOLOv8 检测人物, 在透明置顶窗口上画框。\n\n\
平台限制: 只有 Windows 上窗口是无边框、置顶、鼠标穿透并对齐到显示器原点的。\
其他平台只有透明帧缓冲, 窗口带边框且位置由窗口管理器决定, 检测框会随窗口位置偏移。\n\
按 Ctrl+C 或 Esc 键停止检测 (鼠标穿透时窗口拿不到焦点, 以 Ctrl+C 为准)。"
)]
pub struct Args {
    /// ONNX 模型路径
    #[arg(long, default_value = "models/yolov8x.onnx")]
    pub model: PathBuf,

    /// 置信度阈值
    #[arg(long, default_value_t = 0.3)]
    pub conf: f32,

    /// NMS IoU 阈值
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// 模型输入尺寸 (正方形)
    #[arg(long, default_value_t = 640)]
    pub inf_size: u32,

    /// 推理设备
    #[arg(long, value_enum, default_value_t = DeviceChoice::Auto)]
    pub device: DeviceChoice,

    /// 加速卡编号
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// 跳帧步长 (1 = 每帧都处理)
    #[arg(long, default_value_t = 1)]
    pub frame_skip: u64,

    /// 每隔多少帧回收一次内存 (0 = 不回收)
    #[arg(long, default_value_t = 30)]
    pub reclaim_every: u64,

    /// 状态输出间隔 (秒)
    #[arg(long, default_value_t = 5)]
    pub status_interval: u64,

    /// 错误日志最小间隔 (毫秒)
    #[arg(long = "error-interval-ms", default_value_t = 1000)]
    pub error_interval_ms: u64,

    /// 单帧失败后的退避时间 (毫秒)
    #[arg(long = "backoff-ms", default_value_t = 100)]
    pub backoff_ms: u64,

    /// 连续失败多少次后放弃 (0 = 永不放弃)
    #[arg(long, default_value_t = 100)]
    pub max_failures: u32,

    /// 退出时等待工作线程的最长时间 (毫秒)
    #[arg(long = "join-timeout-ms", default_value_t = 1000)]
    pub join_timeout_ms: u64,

    /// 检测结果队列容量
    #[arg(long, default_value_t = 2)]
    pub queue: usize,

    /// 输出详细信息
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self::parse_from(["screen-person"])
    }
}

impl Args {
    /// 参数检查,模型文件不存在时快速失败
    pub fn validate(&self) -> Result<(), StartupError> {
        if !(0.0..=1.0).contains(&self.conf) {
            return Err(StartupError::InvalidConfig {
                field: "conf",
                value: self.conf.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.iou) {
            return Err(StartupError::InvalidConfig {
                field: "iou",
                value: self.iou.to_string(),
            });
        }
        if self.frame_skip == 0 {
            return Err(StartupError::InvalidConfig {
                field: "frame_skip",
                value: "0".to_string(),
            });
        }
        if self.inf_size == 0 || self.inf_size % 32 != 0 {
            return Err(StartupError::InvalidConfig {
                field: "inf_size",
                value: self.inf_size.to_string(),
            });
        }
        if self.queue == 0 {
            return Err(StartupError::InvalidConfig {
                field: "queue",
                value: "0".to_string(),
            });
        }
        if !self.model.exists() {
            return Err(StartupError::ModelNotFound(self.model.clone()));
        }
        Ok(())
    }

    pub fn execution_provider(&self) -> OrtEP {
        match self.device {
            DeviceChoice::Auto => OrtEP::Auto(self.device_id),
            DeviceChoice::Cuda => OrtEP::CUDA(self.device_id),
            DeviceChoice::Trt => OrtEP::Trt(self.device_id),
            DeviceChoice::Cpu => OrtEP::CPU,
        }
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            conf_threshold: self.conf,
            frame_skip: self.frame_skip,
            reclaim_every: self.reclaim_every,
            status_interval: Duration::from_secs(self.status_interval),
            error_interval: Duration::from_millis(self.error_interval_ms),
            backoff: Duration::from_millis(self.backoff_ms),
            max_consecutive_failures: self.max_failures,
            ..LoopConfig::default()
        }
    }
}
