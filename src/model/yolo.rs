// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/model/yolo.rs - 基于 ONNX Runtime 的 YOLO 检测器
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use ndarray::Array4;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::{Tensor, ValueType};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Rgb,
  input::{CodecError, TransientImage},
  model::{
    DetectionBox, DetectionConfig, DetectionResult, Detector,
    postprocess::{self, DecodeError, Letterbox},
  },
};

const ONNX_NUM_INPUTS: usize = 1;
const DEFAULT_INTRA_THREADS: usize = 4;

#[derive(Error, Debug)]
pub enum OnnxDetectorError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("输入图像错误: {0}")]
  InputError(#[from] CodecError),
  #[error("模型输出解析错误: {0}")]
  DecodeError(#[from] DecodeError),
  #[error("张量形状错误: {0}")]
  ShapeError(#[from] ndarray::ShapeError),
  #[error("推理会话锁已中毒")]
  SessionPoisoned,
}

pub struct OnnxDetectorBuilder {
  model_path: PathBuf,
  intra_threads: usize,
}

impl FromUrlWithScheme for OnnxDetectorBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxDetectorBuilder {
  type Error = OnnxDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxDetectorError::ModelPathError(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }
    if url.path().is_empty() {
      return Err(OnnxDetectorError::ModelPathError("模型路径为空".to_string()));
    }

    let path = urlencoding::decode(url.path())
      .map_err(|e| OnnxDetectorError::ModelPathError(format!("模型路径解码失败: {}", e)))?;

    Ok(OnnxDetectorBuilder {
      model_path: PathBuf::from(path.as_ref()),
      intra_threads: DEFAULT_INTRA_THREADS,
    })
  }
}

impl OnnxDetectorBuilder {
  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn intra_threads(mut self, intra_threads: usize) -> Self {
    self.intra_threads = intra_threads.max(1);
    self
  }

  pub fn build(self) -> Result<OnnxDetector, OnnxDetectorError> {
    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .with_intra_threads(self.intra_threads)?
      .commit_from_file(&self.model_path)?;

    if session.inputs.len() != ONNX_NUM_INPUTS || session.outputs.is_empty() {
      return Err(OnnxDetectorError::ModelInvalid(format!(
        "预期 {} 个输入与至少 1 个输出, 实际为 {} 个输入, {} 个输出",
        ONNX_NUM_INPUTS,
        session.inputs.len(),
        session.outputs.len()
      )));
    }

    let input_name = session.inputs[0].name.to_string();
    let output_name = session.outputs[0].name.to_string();

    // 固定尺寸导出的模型在此记录输入边长, 动态尺寸记为 None
    let input_size = match &session.inputs[0].input_type {
      ValueType::Tensor { shape, .. } => {
        let dims: Vec<i64> = shape.to_vec();
        debug!("模型输入 {}: {:?}", input_name, dims);
        match dims.as_slice() {
          [_, 3, h, w] if *h > 0 && h == w => Some(*h as u32),
          [_, 3, h, w] if *h <= 0 || *w <= 0 => None,
          _ => {
            return Err(OnnxDetectorError::ModelInvalid(format!(
              "预期输入形状为 [N, 3, S, S], 实际为 {:?}",
              dims
            )));
          }
        }
      }
      other => {
        return Err(OnnxDetectorError::ModelInvalid(format!(
          "预期张量输入, 实际为 {:?}",
          other
        )));
      }
    };

    info!(
      "模型加载完成: 输入 {}, 输出 {}, 输入尺寸 {:?}",
      input_name, output_name, input_size
    );

    Ok(OnnxDetector {
      session: Mutex::new(session),
      input_name,
      output_name,
      input_size,
    })
  }
}

/// ONNX YOLO 检测器，按 Ultralytics 的 predict 约定处理输入与输出
pub struct OnnxDetector {
  session: Mutex<Session>,
  input_name: String,
  output_name: String,
  input_size: Option<u32>,
}

impl OnnxDetector {
  fn run(&self, input: Array4<f32>) -> Result<(Vec<usize>, Vec<f32>), OnnxDetectorError> {
    let input = Tensor::from_array(input)?;
    let mut session = self
      .session
      .lock()
      .map_err(|_| OnnxDetectorError::SessionPoisoned)?;

    let outputs = session.run(ort::inputs![self.input_name.as_str() => input])?;
    let output = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;

    Ok((output.shape().to_vec(), output.iter().copied().collect()))
  }
}

impl Detector for OnnxDetector {
  type Error = OnnxDetectorError;

  fn predict(&self, path: &Path, config: &DetectionConfig) -> Result<DetectionResult, Self::Error> {
    if let Some(size) = self.input_size
      && size != config.imgsz
    {
      return Err(OnnxDetectorError::ModelInvalid(format!(
        "模型输入尺寸为 {}, 配置的推理尺寸为 {}",
        size, config.imgsz
      )));
    }

    // 检测器读入 BGR, 送入模型前转回 RGB
    let frame = TransientImage::load(path)?.convert::<Rgb>();
    let letterbox = Letterbox::new(frame.width(), frame.height(), config.imgsz);
    let size = config.imgsz as usize;
    let input = Array4::from_shape_vec((1, 3, size, size), letterbox.tensor(&frame))?;

    let now = Instant::now();
    let (shape, data) = self.run(input)?;
    debug!("推理完成，耗时: {:.2?}, 输出形状: {:?}", now.elapsed(), shape);

    let candidates = postprocess::decode(&shape, &data, config.conf)?;
    let kept = postprocess::nms(candidates, config.iou, config.max_det);

    Ok(
      kept
        .iter()
        .map(|c| DetectionBox::from_xyxy(letterbox.restore(c.bbox)))
        .collect(),
    )
  }
}
