// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/args.rs - 检测参数配置
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

use std::path::PathBuf;

use clap::Args;

use crate::model::{
  ConfigError, DEFAULT_CONF, DEFAULT_IMGSZ, DEFAULT_IOU, DEFAULT_MAX_DET, DEFAULT_SHRINK_RATIO,
  DetectionConfig,
};

/// 各程序共用的检测参数
#[derive(Args, Debug, Clone)]
pub struct DetectionArgs {
  /// 推理分辨率（32 的倍数）
  #[arg(long, default_value_t = DEFAULT_IMGSZ, value_name = "PIXELS")]
  pub imgsz: u32,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONF, value_name = "THRESHOLD")]
  pub conf: f32,

  /// 最大检测数量
  #[arg(long, default_value_t = DEFAULT_MAX_DET, value_name = "COUNT")]
  pub max_det: usize,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_IOU, value_name = "THRESHOLD")]
  pub iou: f32,

  /// 显示用缩框比例 (0.0 - 1.0]
  #[arg(long, default_value_t = DEFAULT_SHRINK_RATIO, value_name = "RATIO")]
  pub shrink_ratio: f64,

  /// 临时输入文件目录，默认为系统临时目录
  #[arg(long, value_name = "DIR")]
  pub temp_dir: Option<PathBuf>,

  /// ONNX Runtime 算子内线程数
  #[arg(long, default_value = "4", value_name = "COUNT")]
  pub intra_threads: usize,
}

impl DetectionArgs {
  /// 校验并生成检测配置
  pub fn detection_config(&self) -> Result<DetectionConfig, ConfigError> {
    let config = DetectionConfig {
      imgsz: self.imgsz,
      conf: self.conf,
      max_det: self.max_det,
      iou: self.iou,
      shrink_ratio: self.shrink_ratio,
    };
    config.validate()?;
    Ok(config)
  }

  pub fn transient_dir(&self) -> PathBuf {
    self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
  }
}
