// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 模型统一接口与实现
///
/// ## Model Trait
/// 统一的模型接口,定义标准流程: preprocess → run → postprocess
///
/// ```text
/// 屏幕截图(RGB) → preprocess → NCHW张量
///          ↓
///     推理引擎 run
///          ↓
///     原始输出 → postprocess(阈值 + 类别过滤 + NMS) → 检测结果
/// ```
use anyhow::Result;
use image::RgbImage;
use ndarray::{Array, Array4, IxDyn};

/// 单张图片的检测结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionResult {
    pub bboxes: Vec<Bbox>,
}

impl DetectionResult {
    pub fn new(bboxes: Vec<Bbox>) -> Self {
        Self { bboxes }
    }

    pub fn bboxes(&self) -> &[Bbox] {
        &self.bboxes
    }
}

/// 后处理过滤条件 (每次调用传入)
#[derive(Debug, Clone, PartialEq)]
pub struct DetectFilter {
    pub conf: f32,
    pub iou: f32,
    /// 允许的类别; 为空表示不过滤
    pub classes: Vec<usize>,
}

impl DetectFilter {
    pub fn allows(&self, class_id: usize) -> bool {
        self.classes.is_empty() || self.classes.contains(&class_id)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around an object
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    id: usize,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, id: usize, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            id,
            confidence,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        self.intersection_area(another) / union
    }
}

/// 统一的深度学习模型接口
pub trait Model: Send {
    /// 预处理: 图片 → NCHW 张量
    fn preprocess(&mut self, images: &[RgbImage]) -> Result<Array4<f32>>;

    /// 推理: 执行模型前向传播
    fn run(&mut self, xs: Array4<f32>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 后处理: 原始输出 → 检测结果
    ///
    /// # Arguments
    /// * `xs` - 模型原始输出
    /// * `xs0` - 原始图片(用于坐标还原)
    /// * `filter` - 置信度 / IoU / 类别过滤
    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[RgbImage],
        filter: &DetectFilter,
    ) -> Result<Vec<DetectionResult>>;

    /// 完整的推理流程: preprocess → run → postprocess
    fn forward(&mut self, images: &[RgbImage], filter: &DetectFilter) -> Result<Vec<DetectionResult>> {
        let xs = self.preprocess(images)?;
        let ys = self.run(xs, false)?;
        self.postprocess(ys, images, filter)
    }

    /// 执行设备名称
    fn device(&self) -> &'static str;

    /// 打印模型信息
    fn summary(&self);
}

pub mod yolov8; // YOLOv8 检测模型

pub use yolov8::{decode_predictions, YOLOv8};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = Bbox::new(10., 10., 40., 80., 0, 0.9);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = Bbox::new(0., 0., 10., 10., 0, 0.9);
        let b = Bbox::new(100., 100., 10., 10., 0, 0.8);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn empty_class_filter_allows_everything() {
        let f = DetectFilter {
            conf: 0.3,
            iou: 0.45,
            classes: vec![],
        };
        assert!(f.allows(0));
        assert!(f.allows(56));
        let f = DetectFilter {
            classes: vec![0],
            ..f
        };
        assert!(f.allows(0));
        assert!(!f.allows(56));
    }
}
