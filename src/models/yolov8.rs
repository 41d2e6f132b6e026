// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型实现
// 包含: 模型加载、预处理(letterbox)、推理、后处理(阈值 + 类别过滤 + NMS)

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, bail, Result};
use fast_image_resize as fr;
use image::RgbImage;
use ndarray::{Array, Array4, Ix3, IxDyn};
use tracing::{debug, info};

use super::{Bbox, DetectFilter, DetectionResult, Model};
use crate::{non_max_suppression, OrtBackend, OrtConfig, OrtEP};

const CXYWH_OFFSET: usize = 4;
const PAD_VALUE: f32 = 114.0 / 255.0;

/// YOLOv8 构建参数
#[derive(Debug, Clone)]
pub struct YOLOv8Config {
    pub model: PathBuf,
    pub ep: OrtEP,
    pub inf_size: u32,
    pub profile: bool,
}

/// YOLOv8 完整模型结构
pub struct YOLOv8 {
    engine: OrtBackend,
    height: u32,
    width: u32,
    profile: bool,
}

impl YOLOv8 {
    /// 从配置创建 YOLOv8 模型
    pub fn new(config: YOLOv8Config) -> Result<Self> {
        let engine = OrtBackend::build(OrtConfig {
            f: config.model,
            ep: config.ep,
            image_size: (config.inf_size, config.inf_size),
            intra_threads: 4,
        })?;
        let (height, width) = (engine.height(), engine.width());
        Ok(Self {
            engine,
            height,
            width,
            profile: config.profile,
        })
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}

/// 等比缩放到目标尺寸内, 返回 (比例, 新宽, 新高)
pub fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// 解码 YOLOv8 检测头输出 `(batch, 4 + nc, anchors)`
///
/// 坐标还原到原图 (letterbox 左上对齐), 置信度低于 `filter.conf` 或类别
/// 不在 `filter.classes` 内的框直接丢弃, 然后做 NMS。
pub fn decode_predictions(
    preds: &Array<f32, IxDyn>,
    originals: &[(u32, u32)],
    input_size: (u32, u32),
    filter: &DetectFilter,
) -> Result<Vec<DetectionResult>> {
    let preds = preds
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|e| anyhow!("输出维度不是3维: {}", e))?;
    let (batch, channels, anchors) = preds.dim();
    if channels <= CXYWH_OFFSET {
        bail!("输出通道数 {} 过少", channels);
    }
    if batch < originals.len() {
        bail!("输出批次 {} 小于输入图片数 {}", batch, originals.len());
    }
    let nc = channels - CXYWH_OFFSET;

    let mut ys = Vec::with_capacity(originals.len());
    for (idx, &(w0, h0)) in originals.iter().enumerate() {
        let (w0, h0) = (w0 as f32, h0 as f32);
        let ratio = (input_size.0 as f32 / w0).min(input_size.1 as f32 / h0);

        let mut data: Vec<Bbox> = Vec::new();
        for a in 0..anchors {
            let (id, confidence) = (0..nc)
                .map(|c| (c, preds[[idx, CXYWH_OFFSET + c, a]]))
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
                .unwrap_or((0, 0.0));

            if confidence < filter.conf || !filter.allows(id) {
                continue;
            }

            let cx = preds[[idx, 0, a]] / ratio;
            let cy = preds[[idx, 1, a]] / ratio;
            let w = preds[[idx, 2, a]] / ratio;
            let h = preds[[idx, 3, a]] / ratio;
            let x1 = (cx - w / 2.).clamp(0.0, w0);
            let y1 = (cy - h / 2.).clamp(0.0, h0);
            let x2 = (cx + w / 2.).clamp(0.0, w0);
            let y2 = (cy + h / 2.).clamp(0.0, h0);
            if x2 <= x1 || y2 <= y1 {
                continue;
            }
            data.push(Bbox::new(x1, y1, x2 - x1, y2 - y1, id, confidence));
        }

        non_max_suppression(&mut data, filter.iou);
        ys.push(DetectionResult::new(data));
    }
    Ok(ys)
}

impl Model for YOLOv8 {
    fn preprocess(&mut self, images: &[RgbImage]) -> Result<Array4<f32>> {
        let (w1, h1) = (self.width as usize, self.height as usize);
        let mut ys = Array4::from_elem((images.len(), 3, h1, w1), PAD_VALUE);
        let mut resizer = fr::Resizer::new();

        for (idx, img) in images.iter().enumerate() {
            let (w0, h0) = img.dimensions();
            if w0 == 0 || h0 == 0 {
                bail!("空图像 {}x{}", w0, h0);
            }
            let (_, w_new, h_new) =
                scale_wh(w0 as f32, h0 as f32, self.width as f32, self.height as f32);
            let (w_new, h_new) = ((w_new as u32).max(1), (h_new as u32).max(1));

            let src = fr::images::ImageRef::new(w0, h0, img.as_raw(), fr::PixelType::U8x3)?;
            let mut dst = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x3);
            resizer.resize(
                &src,
                &mut dst,
                &fr::ResizeOptions::new()
                    .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
            )?;

            let w_new = w_new as usize;
            for (i, rgb) in dst.buffer().chunks_exact(3).enumerate() {
                let (y, x) = (i / w_new, i % w_new);
                ys[[idx, 0, y, x]] = rgb[0] as f32 / 255.0;
                ys[[idx, 1, y, x]] = rgb[1] as f32 / 255.0;
                ys[[idx, 2, y, x]] = rgb[2] as f32 / 255.0;
            }
        }
        Ok(ys)
    }

    fn run(&mut self, xs: Array4<f32>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        self.engine.run(xs, profile || self.profile)
    }

    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[RgbImage],
        filter: &DetectFilter,
    ) -> Result<Vec<DetectionResult>> {
        let preds = xs.first().ok_or_else(|| anyhow!("模型没有输出"))?;
        let originals: Vec<(u32, u32)> = xs0.iter().map(|x| x.dimensions()).collect();
        decode_predictions(preds, &originals, (self.width, self.height), filter)
    }

    fn forward(&mut self, images: &[RgbImage], filter: &DetectFilter) -> Result<Vec<DetectionResult>> {
        let t_pre = Instant::now();
        let xs = self.preprocess(images)?;
        let t_run = Instant::now();
        let ys = self.run(xs, false)?;
        let t_post = Instant::now();
        let ys = self.postprocess(ys, images, filter)?;
        if self.profile {
            debug!(
                "[Model] 预处理 {:?} | 推理 {:?} | 后处理 {:?}",
                t_run - t_pre,
                t_post - t_run,
                t_post.elapsed()
            );
        }
        Ok(ys)
    }

    fn device(&self) -> &'static str {
        self.engine.ep().name()
    }

    fn summary(&self) {
        info!(
            "\nSummary:\n> Task: Detect\n> EP: {:?}\n> Input: {}x{}",
            self.engine.ep(),
            self.width,
            self.height
        );
    }
}
