/// 检测系统 (Detection System)
///
/// 独立工作线程,负责屏幕分析
/// - Detector:    目标检测 (只保留人)
/// - CaptureLoop: 抓屏 → 检测 → 投递到渲染线程
pub mod capture_loop;
pub mod detector;
pub mod types;

pub use capture_loop::{
    drain_latest, spawn_capture_loop, status_line, CaptureLoop, DetectionQueue, LoopConfig,
    LoopExit, LoopReport, LoopState, LoopStatus, RunningFlag,
};
pub use detector::{Detector, PersonDetector};
pub use types::{class_name, Detection, DetectionBatch, DETECT_CLASSES, PERSON_CLASS_ID};
