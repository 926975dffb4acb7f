// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/bin/whitefly_oneshot.rs - 单张图像检测
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use whitefly::{
  FromUrl,
  args::DetectionArgs,
  input::read_image_file,
  model::OnnxDetectorBuilder,
  output::{AnnotationStyle, Annotator, save_image_file},
  task::DetectTask,
};

/// Whitefly 单张图像检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型路径，例如 onnx:///models/best.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像
  #[arg(long, value_name = "SOURCE")]
  pub input: PathBuf,
  /// 标注结果输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,

  #[command(flatten)]
  pub detection: DetectionArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = args.detection.detection_config()?;

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input.display());
  info!("输出路径: {}", args.output.display());

  let detector = OnnxDetectorBuilder::from_url(&args.model)?
    .intra_threads(args.detection.intra_threads)
    .build()?;
  let task = DetectTask::new(
    detector,
    config,
    Annotator::new(AnnotationStyle::default())?,
    args.detection.transient_dir(),
  );

  let frame = read_image_file(&args.input)?;
  let output = task.process_frame(&frame)?;
  save_image_file(&output.image, &args.output)?;

  println!("{}", output.text);
  Ok(())
}
