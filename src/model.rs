// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/model.rs - 检测器接口与检测结果
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

use std::path::Path;

use thiserror::Error;

pub const DEFAULT_IMGSZ: u32 = 1280;
pub const DEFAULT_CONF: f32 = 0.2;
pub const DEFAULT_MAX_DET: usize = 5000;
pub const DEFAULT_IOU: f32 = 0.7;
pub const DEFAULT_SHRINK_RATIO: f64 = 0.6;

const IMGSZ_STRIDE: u32 = 32;

/// 基于文件路径输入的目标检测器
pub trait Detector {
  type Error: std::error::Error + Send + Sync + 'static;

  fn predict(&self, path: &Path, config: &DetectionConfig) -> Result<DetectionResult, Self::Error>;
}

/// 像素坐标的轴对齐框，(x1, y1) 为左上角，(x2, y2) 为右下角
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DetectionBox {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

impl DetectionBox {
  pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 浮点 xyxy 坐标向零截断
  pub fn from_xyxy(bbox: [f32; 4]) -> Self {
    Self {
      x1: bbox[0] as i32,
      y1: bbox[1] as i32,
      x2: bbox[2] as i32,
      y2: bbox[3] as i32,
    }
  }

  pub fn width(&self) -> i32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> i32 {
    self.y2 - self.y1
  }
}

/// 检测结果，数量即框序列的长度
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionResult {
  boxes: Box<[DetectionBox]>,
}

impl DetectionResult {
  pub fn boxes(&self) -> &[DetectionBox] {
    &self.boxes
  }

  pub fn count(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &DetectionBox> {
    self.boxes.iter()
  }
}

impl From<Vec<DetectionBox>> for DetectionResult {
  fn from(boxes: Vec<DetectionBox>) -> Self {
    Self {
      boxes: boxes.into_boxed_slice(),
    }
  }
}

impl FromIterator<DetectionBox> for DetectionResult {
  fn from_iter<I: IntoIterator<Item = DetectionBox>>(iter: I) -> Self {
    iter.into_iter().collect::<Vec<_>>().into()
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("推理尺寸必须为 {stride} 的正整数倍, 实际为 {imgsz}")]
  InvalidImageSize { imgsz: u32, stride: u32 },
  #[error("置信度阈值必须在 [0, 1) 内, 实际为 {0}")]
  InvalidConfidence(f32),
  #[error("NMS IOU 阈值必须在 (0, 1] 内, 实际为 {0}")]
  InvalidIou(f32),
  #[error("最大检测数量必须大于 0")]
  ZeroMaxDetections,
  #[error("缩框比例必须在 (0, 1] 内, 实际为 {0}")]
  InvalidShrinkRatio(f64),
}

/// 进程级检测参数，启动后只读
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
  /// 推理分辨率
  pub imgsz: u32,
  /// 置信度阈值
  pub conf: f32,
  /// 最大检测数量
  pub max_det: usize,
  /// NMS IOU 阈值
  pub iou: f32,
  /// 显示用缩框比例
  pub shrink_ratio: f64,
}

impl Default for DetectionConfig {
  fn default() -> Self {
    Self {
      imgsz: DEFAULT_IMGSZ,
      conf: DEFAULT_CONF,
      max_det: DEFAULT_MAX_DET,
      iou: DEFAULT_IOU,
      shrink_ratio: DEFAULT_SHRINK_RATIO,
    }
  }
}

impl DetectionConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.imgsz == 0 || self.imgsz % IMGSZ_STRIDE != 0 {
      return Err(ConfigError::InvalidImageSize {
        imgsz: self.imgsz,
        stride: IMGSZ_STRIDE,
      });
    }
    if !(0.0..1.0).contains(&self.conf) {
      return Err(ConfigError::InvalidConfidence(self.conf));
    }
    if !(self.iou > 0.0 && self.iou <= 1.0) {
      return Err(ConfigError::InvalidIou(self.iou));
    }
    if self.max_det == 0 {
      return Err(ConfigError::ZeroMaxDetections);
    }
    if !(self.shrink_ratio > 0.0 && self.shrink_ratio <= 1.0) {
      return Err(ConfigError::InvalidShrinkRatio(self.shrink_ratio));
    }
    Ok(())
  }
}

pub mod postprocess;

#[cfg(feature = "model_onnx")]
mod yolo;
#[cfg(feature = "model_onnx")]
pub use self::yolo::{OnnxDetector, OnnxDetectorBuilder, OnnxDetectorError};
