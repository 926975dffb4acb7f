// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/bin/whitefly_server.rs - 网页检测服务
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

use std::net::SocketAddr;
use std::sync::Arc;
use std::{thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use tokio::sync::Notify;
use tracing::{info, warn};
use url::Url;

use whitefly::{
  FromUrl,
  args::DetectionArgs,
  model::OnnxDetectorBuilder,
  output::{AnnotationStyle, Annotator},
  server,
  task::DetectTask,
};

/// Whitefly 网页检测服务参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型路径，例如 onnx:///models/best.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 监听地址
  #[arg(long, default_value = "127.0.0.1:7860", value_name = "ADDR")]
  pub bind: SocketAddr,

  /// 上传大小上限 (字节)
  #[arg(long, default_value_t = server::DEFAULT_UPLOAD_LIMIT, value_name = "BYTES")]
  pub upload_limit: usize,

  #[command(flatten)]
  pub detection: DetectionArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = args.detection.detection_config()?;

  info!("模型文件路径: {}", args.model);
  info!("检测参数: {:?}", config);

  let detector = OnnxDetectorBuilder::from_url(&args.model)?
    .intra_threads(args.detection.intra_threads)
    .build()?;
  let annotator = Annotator::new(AnnotationStyle::default())?;
  let task = Arc::new(DetectTask::new(
    detector,
    config,
    annotator,
    args.detection.transient_dir(),
  ));

  let stop = Arc::new(Notify::new());
  let notify = stop.clone();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    notify.notify_one();
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  let listener = tokio::net::TcpListener::bind(args.bind).await?;
  let app = server::router(task, args.upload_limit);
  server::serve(listener, app, async move { stop.notified().await }).await?;

  Ok(())
}
