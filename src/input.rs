// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/input.rs - 图像解码与检测器临时输入文件
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

use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use image::{DynamicImage, ImageFormat, ImageReader};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::frame::{Bgr, Frame, Rgb};

const TRANSIENT_PREFIX: &str = "whitefly-";
const TRANSIENT_SUFFIX: &str = ".png";

#[derive(Error, Debug)]
pub enum CodecError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像编解码错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 从内存字节解码图像，格式由内容猜测
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
  let image = ImageReader::new(Cursor::new(bytes))
    .with_guessed_format()?
    .decode()?;
  debug!(
    "解码上传图像: {}x{} {:?}",
    image.width(),
    image.height(),
    image.color()
  );
  Ok(image)
}

/// 读取图像文件并统一为 RGB 帧
pub fn read_image_file(path: &Path) -> Result<Frame<Rgb>, CodecError> {
  let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
  Ok(Frame::from_dynamic(&image))
}

/// 检测器的临时输入文件
///
/// 每个请求独占一个随机命名的文件，守卫析构时删除文件，
/// 无论请求成功还是出错。
#[derive(Debug)]
pub struct TransientImage {
  file: NamedTempFile,
}

impl TransientImage {
  /// 将 BGR 帧以无损 PNG 写入 `dir` 下的新临时文件
  pub fn store(frame: &Frame<Bgr>, dir: &Path) -> Result<Self, CodecError> {
    let mut file = tempfile::Builder::new()
      .prefix(TRANSIENT_PREFIX)
      .suffix(TRANSIENT_SUFFIX)
      .tempfile_in(dir)?;

    {
      let mut writer = BufWriter::new(file.as_file_mut());
      frame
        .to_rgb_image()
        .write_to(&mut writer, ImageFormat::Png)?;
      writer.flush()?;
    }

    debug!(
      "写入临时输入文件: {} ({}x{})",
      file.path().display(),
      frame.width(),
      frame.height()
    );

    Ok(Self { file })
  }

  pub fn path(&self) -> &Path {
    self.file.path()
  }

  /// 按检测器约定以 BGR 顺序读回临时文件
  pub fn load(path: &Path) -> Result<Frame<Bgr>, CodecError> {
    Ok(read_image_file(path)?.convert())
  }
}
