//! 检测器 (Detector)
//! 职责: RGB 截图 → YOLO 检测 → 人物检测框

use image::RgbImage;

use super::types::Detection;
use crate::error::InferenceError;
use crate::models::{DetectFilter, Model};

/// 检测接口: 给定图像、置信度阈值和类别过滤, 返回检测框
pub trait Detector: Send {
    fn detect(
        &mut self,
        image: &RgbImage,
        conf_threshold: f32,
        classes: &[usize],
    ) -> Result<Vec<Detection>, InferenceError>;

    /// 执行设备 (cuda / cpu ...)
    fn device(&self) -> &str;
}

/// 基于 `Model` 的检测器
pub struct PersonDetector<M: Model> {
    model: M,
    iou: f32,
}

impl<M: Model> PersonDetector<M> {
    pub fn new(model: M, iou: f32) -> Self {
        Self { model, iou }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: Model> Detector for PersonDetector<M> {
    fn detect(
        &mut self,
        image: &RgbImage,
        conf_threshold: f32,
        classes: &[usize],
    ) -> Result<Vec<Detection>, InferenceError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || image.as_raw().len() != (width * height * 3) as usize {
            return Err(InferenceError::MalformedImage { width, height });
        }

        let filter = DetectFilter {
            conf: conf_threshold,
            iou: self.iou,
            classes: classes.to_vec(),
        };
        let results = self
            .model
            .forward(std::slice::from_ref(image), &filter)
            .map_err(|e| InferenceError::Backend(format!("{:#}", e)))?;

        Ok(results
            .iter()
            .flat_map(|r| r.bboxes())
            .map(Detection::from)
            .collect())
    }

    fn device(&self) -> &str {
        self.model.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bbox, DetectionResult};
    use anyhow::Result;
    use ndarray::{Array, Array4, IxDyn};

    /// 固定输出的假模型, 在后处理里按 filter 过滤
    struct FixedModel {
        boxes: Vec<Bbox>,
    }

    impl Model for FixedModel {
        fn preprocess(&mut self, images: &[RgbImage]) -> Result<Array4<f32>> {
            Ok(Array4::zeros((images.len(), 3, 1, 1)))
        }

        fn run(&mut self, _xs: Array4<f32>, _profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
            Ok(vec![])
        }

        fn postprocess(
            &self,
            _xs: Vec<Array<f32, IxDyn>>,
            _xs0: &[RgbImage],
            filter: &crate::models::DetectFilter,
        ) -> Result<Vec<DetectionResult>> {
            let kept = self
                .boxes
                .iter()
                .filter(|b| b.confidence() >= filter.conf && filter.allows(b.id()))
                .cloned()
                .collect();
            Ok(vec![DetectionResult::new(kept)])
        }

        fn device(&self) -> &'static str {
            "cpu"
        }

        fn summary(&self) {}
    }

    #[test]
    fn converts_model_boxes_to_detections() {
        let model = FixedModel {
            boxes: vec![
                Bbox::new(10., 10., 40., 80., 0, 0.87),
                Bbox::new(100., 100., 10., 10., 56, 0.99),
            ],
        };
        let mut det = PersonDetector::new(model, 0.45);
        let img = RgbImage::new(64, 64);
        let out = det.detect(&img, 0.3, &[0]).unwrap();
        assert_eq!(out, vec![Detection::person(10, 10, 50, 90, 0.87)]);
        assert_eq!(det.device(), "cpu");
    }

    #[test]
    fn empty_image_is_malformed() {
        let mut det = PersonDetector::new(FixedModel { boxes: vec![] }, 0.45);
        let img = RgbImage::new(0, 0);
        assert_eq!(
            det.detect(&img, 0.3, &[0]),
            Err(InferenceError::MalformedImage {
                width: 0,
                height: 0
            })
        );
    }
}
