// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/output.rs - 输出定义
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

use std::io::Cursor;
use std::path::Path;

use image::ImageFormat;
use tracing::info;

use crate::frame::{ChannelOrder, Frame};
use crate::input::CodecError;

pub mod draw;
pub mod shrink;

pub use self::draw::{AnnotationStyle, Annotator, DrawError};
pub use self::shrink::{shrink_all, shrink_box};

/// 编码为 PNG 字节
pub fn encode_png<C: ChannelOrder>(frame: &Frame<C>) -> Result<Vec<u8>, CodecError> {
  let mut buffer = Cursor::new(Vec::new());
  frame.to_rgb_image().write_to(&mut buffer, ImageFormat::Png)?;
  Ok(buffer.into_inner())
}

/// 保存到文件，格式由扩展名决定，必要时创建父目录
pub fn save_image_file<C: ChannelOrder>(frame: &Frame<C>, path: &Path) -> Result<(), CodecError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }

  frame.to_rgb_image().save(path)?;
  info!("保存图像到文件: {}", path.display());
  Ok(())
}
