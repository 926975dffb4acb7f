// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// tests/common/mod.rs - 测试用确定性检测器
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

#![allow(dead_code)]

use std::path::Path;

use image::RgbImage;
use whitefly::{
  frame::{Frame, Rgb},
  input::{CodecError, TransientImage},
  model::{DetectionBox, DetectionConfig, DetectionResult, Detector},
  output::{AnnotationStyle, Annotator},
};

/// 从临时文件读回图像，以左上角像素的红色分量作为检测数量，
/// 依次在 40 像素网格中放置 20x20 的框
pub struct MarkerDetector;

impl Detector for MarkerDetector {
  type Error = CodecError;

  fn predict(&self, path: &Path, _: &DetectionConfig) -> Result<DetectionResult, Self::Error> {
    let frame = TransientImage::load(path)?;
    let count = frame.rgb_pixel(0, 0)[0] as i32;
    let per_row = (frame.width() as i32 / 40).max(1);

    Ok(
      (0..count)
        .map(|i| {
          let x = (i % per_row) * 40 + 10;
          let y = (i / per_row) * 40 + 100;
          DetectionBox::new(x, y, x + 20, y + 20)
        })
        .collect(),
    )
  }
}

/// 左上角像素编码了期望数量的黑色图像
pub fn marked_frame(count: u8, width: u32, height: u32) -> Frame<Rgb> {
  let mut image = RgbImage::new(width, height);
  image.put_pixel(0, 0, image::Rgb([count, 0, 0]));
  Frame::from(image)
}

pub fn annotator() -> Annotator<'static> {
  Annotator::new(AnnotationStyle::default()).unwrap()
}
