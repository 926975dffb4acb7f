// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::{
  frame::{self, Frame},
  model::DetectionBox,
};

const DEFAULT_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_THICKNESS: u32 = 2;
const LABEL_COLOR: [u8; 3] = [255, 0, 0];
const LABEL_THICKNESS: u32 = 3;
const LABEL_FONT_SIZE: f32 = 45.0;
const LABEL_ORIGIN: (i32, i32) = (30, 60); // 文本基线左端

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法加载字体: {0}")]
  FontLoadError(#[from] ab_glyph::InvalidFont),
}

/// 绘制参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotationStyle {
  /// 边框颜色 (RGB)
  pub box_color: [u8; 3],
  /// 边框线宽，向框内加粗
  pub box_thickness: u32,
  /// 计数文本颜色 (RGB)
  pub label_color: [u8; 3],
  /// 计数文本笔画宽度
  pub label_thickness: u32,
  /// 计数文本像素高度
  pub label_font_size: f32,
  /// 计数文本基线起点
  pub label_origin: (i32, i32),
}

impl Default for AnnotationStyle {
  fn default() -> Self {
    Self {
      box_color: BOX_COLOR,
      box_thickness: BOX_THICKNESS,
      label_color: LABEL_COLOR,
      label_thickness: LABEL_THICKNESS,
      label_font_size: LABEL_FONT_SIZE,
      label_origin: LABEL_ORIGIN,
    }
  }
}

pub fn total_label(count: usize) -> String {
  format!("Total Whiteflies: {count}")
}

pub struct Annotator<'a> {
  style: AnnotationStyle,
  font: FontRef<'a>,
}

impl Annotator<'static> {
  /// 使用内置字体创建
  pub fn new(style: AnnotationStyle) -> Result<Self, DrawError> {
    let font = FontRef::try_from_slice(DEFAULT_FONT)?;
    Ok(Self { style, font })
  }
}

impl<'a> Annotator<'a> {
  pub fn with_font(style: AnnotationStyle, font: FontRef<'a>) -> Self {
    Self { style, font }
  }

  pub fn style(&self) -> &AnnotationStyle {
    &self.style
  }

  /// 在帧的副本上按顺序绘制所有框，再绘制计数文本
  pub fn annotate(
    &self,
    frame: &Frame<frame::Rgb>,
    boxes: &[DetectionBox],
    count: usize,
  ) -> Frame<frame::Rgb> {
    let mut image = frame.to_rgb_image();
    for bbox in boxes {
      self.draw_box(&mut image, bbox);
    }
    self.draw_label(&mut image, &total_label(count));
    Frame::from(image)
  }

  // 线宽由逐层内缩的空心矩形叠加而成，超出图像的像素直接丢弃
  fn draw_box(&self, image: &mut RgbImage, bbox: &DetectionBox) {
    let color = Rgb(self.style.box_color);
    let (x_min, x_max) = (bbox.x1.min(bbox.x2), bbox.x1.max(bbox.x2));
    let (y_min, y_max) = (bbox.y1.min(bbox.y2), bbox.y1.max(bbox.y2));

    for t in 0..self.style.box_thickness as i32 {
      let (left, right) = (x_min + t, x_max - t);
      let (top, bottom) = (y_min + t, y_max - t);
      if left > right || top > bottom {
        break;
      }

      let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
      draw_hollow_rect_mut(image, rect, color);
    }
  }

  fn draw_label(&self, image: &mut RgbImage, text: &str) {
    let scale = PxScale::from(self.style.label_font_size);
    let ascent = self.font.as_scaled(scale).ascent().round() as i32;
    let (x, baseline) = self.style.label_origin;
    let color = Rgb(self.style.label_color);

    // 横向错位重复绘制以加粗笔画
    for d in 0..self.style.label_thickness.max(1) as i32 {
      draw_text_mut(image, color, x + d, baseline - ascent, scale, &self.font, text);
    }
  }
}
