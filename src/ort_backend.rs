// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理引擎封装
// 负责: 会话创建、执行设备选择、张量输入输出转换

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Result};
use ndarray::{Array, Array4, IxDyn};
use ort::execution_providers::{
    CUDAExecutionProvider, ExecutionProvider, ExecutionProviderDispatch,
    TensorRTExecutionProvider,
};
use ort::inputs;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::{debug, info, warn};

/// 执行设备 (Execution Provider)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    /// 自动: CUDA 可用则用 CUDA,否则 CPU
    Auto(i32),
    CPU,
    CUDA(i32),
    Trt(i32),
}

impl OrtEP {
    pub fn name(&self) -> &'static str {
        match self {
            OrtEP::Auto(_) => "auto",
            OrtEP::CPU => "cpu",
            OrtEP::CUDA(_) => "cuda",
            OrtEP::Trt(_) => "tensorrt",
        }
    }
}

/// 引擎构建参数
#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: PathBuf,
    pub ep: OrtEP,
    /// (height, width)
    pub image_size: (u32, u32),
    pub intra_threads: usize,
}

pub struct OrtBackend {
    session: Session,
    input_name: String,
    ep: OrtEP,
    height: u32,
    width: u32,
}

fn ort_err<E: std::fmt::Display>(what: &'static str) -> impl FnOnce(E) -> anyhow::Error {
    move |e| anyhow!("{}: {}", what, e)
}

impl OrtBackend {
    /// 创建会话,执行设备只在这里选择一次
    pub fn build(config: OrtConfig) -> Result<Self> {
        let builder = Session::builder()
            .map_err(ort_err("创建 SessionBuilder 失败"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort_err("设置优化级别失败"))?
            .with_intra_threads(config.intra_threads)
            .map_err(ort_err("设置线程数失败"))?;

        let mut chosen = OrtEP::CPU;
        let mut session = None;

        if let Some((dispatch, ep)) = Self::accelerator(config.ep) {
            match builder.clone().with_execution_providers([dispatch]) {
                Ok(accel) => match accel.commit_from_file(&config.f) {
                    Ok(s) => {
                        chosen = ep;
                        session = Some(s);
                    }
                    Err(e) => warn!("⚠️ {} 加载模型失败, 回退到 CPU: {}", ep.name(), e),
                },
                Err(e) => warn!("⚠️ {} 注册失败, 回退到 CPU: {}", ep.name(), e),
            }
        }

        let session = match session {
            Some(s) => s,
            None => builder
                .commit_from_file(&config.f)
                .map_err(ort_err("CPU 加载模型失败"))?,
        };

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| anyhow!("模型没有输入节点"))?;

        info!("✅ 推理引擎就绪: {} (输入 {})", chosen.name(), input_name);

        Ok(Self {
            session,
            input_name,
            ep: chosen,
            height: config.image_size.0,
            width: config.image_size.1,
        })
    }

    /// 解析需要尝试的加速设备, CPU 返回 None
    fn accelerator(ep: OrtEP) -> Option<(ExecutionProviderDispatch, OrtEP)> {
        match ep {
            OrtEP::CPU => None,
            OrtEP::CUDA(id) => Some((
                CUDAExecutionProvider::default()
                    .with_device_id(id)
                    .build()
                    .error_on_failure(),
                OrtEP::CUDA(id),
            )),
            OrtEP::Trt(id) => Some((
                TensorRTExecutionProvider::default()
                    .with_device_id(id)
                    .build()
                    .error_on_failure(),
                OrtEP::Trt(id),
            )),
            OrtEP::Auto(id) => {
                let cuda = CUDAExecutionProvider::default().with_device_id(id);
                match cuda.is_available() {
                    Ok(true) => Some((cuda.build().error_on_failure(), OrtEP::CUDA(id))),
                    Ok(false) => {
                        info!("CUDA 不可用, 使用 CPU");
                        None
                    }
                    Err(e) => {
                        warn!("⚠️ 检查 CUDA 失败, 使用 CPU: {}", e);
                        None
                    }
                }
            }
        }
    }

    /// 前向推理: NCHW 张量 → 全部输出
    pub fn run(&mut self, xs: Array4<f32>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let t = Instant::now();
        let (n, c, h, w) = xs.dim();
        let (data, _offset) = xs.into_raw_vec_and_offset();
        let tensor = Tensor::from_array(([n, c, h, w], data)).map_err(ort_err("创建输入张量失败"))?;

        let outputs = self
            .session
            .run(inputs![self.input_name.as_str() => tensor])
            .map_err(ort_err("推理失败"))?;

        let mut ys = Vec::new();
        for value in outputs.values() {
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(ort_err("提取输出张量失败"))?;
            let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            ys.push(Array::from_shape_vec(IxDyn(&dims), data.to_vec())?);
        }

        if profile {
            debug!("[Model Inference]: {:?}", t.elapsed());
        }
        Ok(ys)
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}
