//! 叠加层画面 (保留模式显示列表)
//!
//! 每次 render 清空后按检测结果重建, 不会累积旧框。

use crate::detection::Detection;

/// RGBA 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

pub const BOX_COLOR: Rgba = Rgba(255, 0, 0, 255);
pub const LABEL_COLOR: Rgba = Rgba(255, 0, 0, 255);
pub const LABEL_FILL: Rgba = Rgba(255, 255, 255, 255);
/// 透明色: 这个颜色的像素被窗口系统抠掉 (品红, 透明 alpha)
pub const KEY_COLOR: Rgba = Rgba(255, 0, 255, 0);

pub const BOX_THICKNESS: f32 = 3.0;
pub const LABEL_OUTLINE: f32 = 1.0;
pub const LABEL_FONT_SIZE: f32 = 20.0;

// 标签底板相对框左上角的位置
const PLATE_LEFT: f32 = 2.0;
const PLATE_TOP: f32 = 25.0;
const PLATE_BOTTOM: f32 = 5.0;
const PLATE_MIN_WIDTH: f32 = 122.0;
const TEXT_BASELINE: f32 = 10.0;
// 估算字符宽度, 保证底板能盖住文字
const CHAR_WIDTH: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// 检测框 (只画边)
    BoxOutline {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        thickness: f32,
        color: Rgba,
    },
    /// 标签底板 (填充 + 描边)
    LabelBackground {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        fill: Rgba,
        outline: Rgba,
    },
    /// 标签文字, `baseline` 为基线 y
    Label {
        x: f32,
        baseline: f32,
        text: String,
        size: f32,
        color: Rgba,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    primitives: Vec<Primitive>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.primitives.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// 画出的检测框数量
    pub fn box_count(&self) -> usize {
        self.primitives
            .iter()
            .filter(|p| matches!(p, Primitive::BoxOutline { .. }))
            .count()
    }

    /// 检测框坐标 (x1, y1, x2, y2)
    pub fn boxes(&self) -> impl Iterator<Item = (f32, f32, f32, f32)> + '_ {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::BoxOutline { x1, y1, x2, y2, .. } => Some((*x1, *y1, *x2, *y2)),
            _ => None,
        })
    }

    /// 标签文字
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Label { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    /// 清空并按检测结果重建
    pub fn compose(&mut self, detections: &[Detection]) {
        self.clear();
        for d in detections {
            self.push_detection(d);
        }
    }

    fn push_detection(&mut self, d: &Detection) {
        let (x1, y1, x2, y2) = (d.x1 as f32, d.y1 as f32, d.x2 as f32, d.y2 as f32);
        self.primitives.push(Primitive::BoxOutline {
            x1,
            y1,
            x2,
            y2,
            thickness: BOX_THICKNESS,
            color: BOX_COLOR,
        });

        let text = d.label();
        let plate_width = (text.chars().count() as f32 * CHAR_WIDTH + 8.0).max(PLATE_MIN_WIDTH);

        // 框贴着屏幕顶边时, 标签放到框内
        let (plate_top, plate_bottom, baseline) = if y1 >= PLATE_TOP {
            (y1 - PLATE_TOP, y1 - PLATE_BOTTOM, y1 - TEXT_BASELINE)
        } else {
            (
                y1 + PLATE_BOTTOM,
                y1 + PLATE_TOP,
                y1 + PLATE_TOP - TEXT_BASELINE + PLATE_BOTTOM,
            )
        };

        self.primitives.push(Primitive::LabelBackground {
            x1: x1 - PLATE_LEFT,
            y1: plate_top,
            x2: x1 - PLATE_LEFT + plate_width,
            y2: plate_bottom,
            fill: LABEL_FILL,
            outline: BOX_COLOR,
        });
        self.primitives.push(Primitive::Label {
            x: x1,
            baseline,
            text,
            size: LABEL_FONT_SIZE,
            color: LABEL_COLOR,
        });
    }
}
