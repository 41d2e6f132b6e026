#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod app; // 生命周期控制 (启动 / 停止 / 信号)
pub mod config; // 运行参数
pub mod detection; // 检测系统 (检测器 + 采集循环)
pub mod error; // 错误类型
pub mod input; // 屏幕输入
pub mod logging; // 日志初始化
pub mod models; // 模型接口与具体实现
pub mod renderer; // 透明置顶叠加层

pub mod ort_backend;

pub use crate::config::Args;
pub use crate::models::{Bbox, DetectFilter, DetectionResult, Model, YOLOv8};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};

/// 贪心 NMS: 按置信度从高到低保留, 与已保留框 IoU 超过阈值的丢弃
pub fn non_max_suppression(xs: &mut Vec<Bbox>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 请求一次内存回收 (归还 mimalloc 缓存的空闲页)
pub fn reclaim_memory() {
    // SAFETY: mi_collect 只整理分配器内部的空闲链表, 没有前置条件
    unsafe { libmimalloc_sys::mi_collect(false) };
}
