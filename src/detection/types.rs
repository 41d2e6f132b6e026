/// 检测系统数据结构定义

use crate::models::Bbox;

// ========== 公共常量 ==========

/// COCO 类别: 0 = person
pub const PERSON_CLASS_ID: usize = 0;

/// 只检测人
pub const DETECT_CLASSES: &[usize] = &[PERSON_CLASS_ID];

/// 类别显示名称
pub fn class_name(class_id: usize) -> &'static str {
    match class_id {
        PERSON_CLASS_ID => "Person",
        _ => "Object",
    }
}

// ========== 数据结构 ==========

/// 检测框 (屏幕像素坐标), 每帧生成, 渲染后即丢弃
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    /// 人物检测框
    pub fn person(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id: PERSON_CLASS_ID,
        }
    }

    /// 标签文本: 类别名 + 两位小数置信度
    pub fn label(&self) -> String {
        format!("{}: {:.2}", class_name(self.class_id), self.confidence)
    }
}

impl From<&Bbox> for Detection {
    // 与整型转换一致, 向零截断
    fn from(b: &Bbox) -> Self {
        Self {
            x1: b.xmin() as i32,
            y1: b.ymin() as i32,
            x2: b.xmax() as i32,
            y2: b.ymax() as i32,
            confidence: b.confidence(),
            class_id: b.id(),
        }
    }
}

/// 检测批次 (采集线程 → 渲染线程)
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DetectionBatch {
    pub frame_id: u64,
    pub detections: Vec<Detection>,
}
