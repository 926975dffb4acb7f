// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/frame.rs - 带通道顺序标记的 HWC 帧定义
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

use std::marker::PhantomData;

use image::{DynamicImage, ImageBuffer, RgbImage};
use thiserror::Error;

const CHANNELS: usize = 3;

/// 通道顺序标记
pub trait ChannelOrder: Copy + Default + std::fmt::Debug + Send + Sync + 'static {
  const NAME: &'static str;
  /// 按本顺序存储的第 i 个通道在 RGB 中的下标
  const RGB_INDEX: [usize; CHANNELS];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bgr;

impl ChannelOrder for Rgb {
  const NAME: &'static str = "RGB";
  const RGB_INDEX: [usize; CHANNELS] = [0, 1, 2];
}

impl ChannelOrder for Bgr {
  const NAME: &'static str = "BGR";
  const RGB_INDEX: [usize; CHANNELS] = [2, 1, 0];
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  SizeMismatch { expected: usize, actual: usize },
}

/// 8 位三通道 HWC 帧，通道顺序由类型参数 `C` 决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<C: ChannelOrder> {
  width: u32,
  height: u32,
  data: Box<[u8]>,
  _order: PhantomData<C>,
}

impl<C: ChannelOrder> Frame<C> {
  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::SizeMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
      _order: PhantomData,
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    CHANNELS
  }

  pub fn order(&self) -> &'static str {
    C::NAME
  }

  pub fn as_raw(&self) -> &[u8] {
    &self.data
  }

  /// 按存储顺序返回像素
  pub fn pixel(&self, x: u32, y: u32) -> [u8; CHANNELS] {
    let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  /// 以 RGB 顺序返回像素
  pub fn rgb_pixel(&self, x: u32, y: u32) -> [u8; CHANNELS] {
    to_rgb::<C>(self.pixel(x, y))
  }

  /// 重排通道顺序，返回新帧
  pub fn convert<D: ChannelOrder>(&self) -> Frame<D> {
    let mut data = vec![0u8; self.data.len()];
    for (src, dst) in self
      .data
      .chunks_exact(CHANNELS)
      .zip(data.chunks_exact_mut(CHANNELS))
    {
      let rgb = to_rgb::<C>([src[0], src[1], src[2]]);
      for (i, &rgb_idx) in D::RGB_INDEX.iter().enumerate() {
        dst[i] = rgb[rgb_idx];
      }
    }

    Frame {
      width: self.width,
      height: self.height,
      data: data.into_boxed_slice(),
      _order: PhantomData,
    }
  }

  /// 转为真正 RGB 排列的 `RgbImage`，供编码器与绘图使用
  pub fn to_rgb_image(&self) -> RgbImage {
    ImageBuffer::from_fn(self.width, self.height, |x, y| {
      image::Rgb(self.rgb_pixel(x, y))
    })
  }
}

impl Frame<Rgb> {
  /// 将任意解码结果（灰度、RGBA、16 位等）统一为 8 位 RGB
  pub fn from_dynamic(image: &DynamicImage) -> Self {
    Self::from(image.to_rgb8())
  }
}

impl From<RgbImage> for Frame<Rgb> {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      data: image.into_raw().into_boxed_slice(),
      _order: PhantomData,
    }
  }
}

fn to_rgb<C: ChannelOrder>(pixel: [u8; CHANNELS]) -> [u8; CHANNELS] {
  let mut rgb = [0u8; CHANNELS];
  for (i, &rgb_idx) in C::RGB_INDEX.iter().enumerate() {
    rgb[rgb_idx] = pixel[i];
  }
  rgb
}
