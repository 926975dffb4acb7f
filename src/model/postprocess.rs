// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/model/postprocess.rs - YOLO 前处理与后处理
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

use image::imageops::{self, FilterType};
use thiserror::Error;
use tracing::debug;

use crate::frame::{Frame, Rgb};

/// 填充区域灰度值
pub const LETTERBOX_FILL: u8 = 114;
/// 送入 NMS 的候选框上限
const MAX_NMS_CANDIDATES: usize = 30000;
const BOX_CHANNELS: usize = 4;

/// 等比缩放并居中填充到正方形画布的几何参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub size: u32,
  pub gain: f32,
  pub resized_width: u32,
  pub resized_height: u32,
  pub pad_x: u32,
  pub pad_y: u32,
  pub source_width: u32,
  pub source_height: u32,
}

impl Letterbox {
  pub fn new(source_width: u32, source_height: u32, size: u32) -> Self {
    let gain = (size as f32 / source_height as f32).min(size as f32 / source_width as f32);
    let resized_width = ((source_width as f32 * gain).round() as u32).clamp(1, size);
    let resized_height = ((source_height as f32 * gain).round() as u32).clamp(1, size);
    let pad_x = ((size - resized_width) as f32 / 2.0 - 0.1).round().max(0.0) as u32;
    let pad_y = ((size - resized_height) as f32 / 2.0 - 0.1).round().max(0.0) as u32;

    Self {
      size,
      gain,
      resized_width,
      resized_height,
      pad_x,
      pad_y,
      source_width,
      source_height,
    }
  }

  /// 生成 NCHW 排列、归一化到 [0, 1] 的输入张量数据
  pub fn tensor(&self, frame: &Frame<Rgb>) -> Vec<f32> {
    let resized = imageops::resize(
      &frame.to_rgb_image(),
      self.resized_width,
      self.resized_height,
      FilterType::Triangle,
    );

    let size = self.size as usize;
    let plane = size * size;
    let mut data = vec![LETTERBOX_FILL as f32 / 255.0; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
      let idx = (y + self.pad_y) as usize * size + (x + self.pad_x) as usize;
      for c in 0..3 {
        data[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }

    data
  }

  /// 将模型坐标映射回原图像素坐标并裁剪到图像范围
  pub fn restore(&self, bbox: [f32; 4]) -> [f32; 4] {
    let (w, h) = (self.source_width as f32, self.source_height as f32);
    let (px, py) = (self.pad_x as f32, self.pad_y as f32);
    [
      ((bbox[0] - px) / self.gain).clamp(0.0, w),
      ((bbox[1] - py) / self.gain).clamp(0.0, h),
      ((bbox[2] - px) / self.gain).clamp(0.0, w),
      ((bbox[3] - py) / self.gain).clamp(0.0, h),
    ]
  }
}

/// 解码后的候选框，坐标为模型输入空间的 xyxy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub bbox: [f32; 4],
  pub score: f32,
  pub class_id: usize,
}

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
  #[error("模型输出形状不符合 [1, 4 + 类别数, 候选数]: {0:?}")]
  UnexpectedShape(Vec<usize>),
  #[error("模型输出长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 解码 `[1, 4 + nc, n]` 输出，保留最高类别分数严格大于 `conf` 的候选
pub fn decode(shape: &[usize], data: &[f32], conf: f32) -> Result<Vec<Candidate>, DecodeError> {
  let &[batch, channels, anchors] = shape else {
    return Err(DecodeError::UnexpectedShape(shape.to_vec()));
  };
  if batch != 1 || channels <= BOX_CHANNELS {
    return Err(DecodeError::UnexpectedShape(shape.to_vec()));
  }
  let expected = channels * anchors;
  if data.len() != expected {
    return Err(DecodeError::LengthMismatch {
      expected,
      actual: data.len(),
    });
  }

  let at = |c: usize, i: usize| data[c * anchors + i];
  let mut candidates = Vec::new();

  for i in 0..anchors {
    let (class_id, score) = (BOX_CHANNELS..channels)
      .map(|c| (c - BOX_CHANNELS, at(c, i)))
      .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    if score <= conf {
      continue;
    }

    let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
    candidates.push(Candidate {
      bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
      score,
      class_id,
    });
  }

  debug!("候选框数量: {} / {}", candidates.len(), anchors);
  Ok(candidates)
}

pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

/// 按类别的贪心非极大值抑制，结果按分数降序，最多 `max_det` 个
pub fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32, max_det: usize) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
  candidates.truncate(MAX_NMS_CANDIDATES);

  let mut keep = Vec::new();
  let mut suppressed = vec![false; candidates.len()];

  for i in 0..candidates.len() {
    if suppressed[i] {
      continue;
    }
    keep.push(candidates[i]);
    if keep.len() >= max_det {
      break;
    }

    for j in (i + 1)..candidates.len() {
      if !suppressed[j]
        && candidates[j].class_id == candidates[i].class_id
        && iou(&candidates[i].bbox, &candidates[j].bbox) > iou_threshold
      {
        suppressed[j] = true;
      }
    }
  }

  keep
}
