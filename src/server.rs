// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/server.rs - 网页上传表单与检测接口
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

use std::future::Future;
use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, Multipart, State},
  http::StatusCode,
  response::{Html, IntoResponse, Response},
  routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::{input::decode_image, model::Detector, output::encode_png, task::DetectTask};

/// 默认上传大小上限 (32 MiB)
pub const DEFAULT_UPLOAD_LIMIT: usize = 32 * 1024 * 1024;
pub const IMAGE_FIELD: &str = "image";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Whitefly Detection</title>
  <style>
    body { font-family: sans-serif; max-width: 960px; margin: 0 auto; padding: 20px; }
    form { background: #f5f5f5; padding: 16px; border-radius: 4px; }
    img { max-width: 100%; margin-top: 16px; }
    #count { font-size: 1.2em; margin-top: 12px; }
  </style>
</head>
<body>
  <h1>Whitefly Detection</h1>
  <p>Upload any leaf image to detect and count whiteflies with indexed bounding boxes.</p>
  <form id="upload">
    <label for="image">Upload Leaf Image</label>
    <input type="file" id="image" name="image" accept="image/*" required>
    <button type="submit">Submit</button>
  </form>
  <div id="count"></div>
  <img id="result" alt="Detection Result" hidden>
  <script>
    const form = document.getElementById("upload");
    form.addEventListener("submit", async (event) => {
      event.preventDefault();
      const count = document.getElementById("count");
      const result = document.getElementById("result");
      count.textContent = "Running...";
      const response = await fetch("/api/detect", { method: "POST", body: new FormData(form) });
      const body = await response.json();
      if (!response.ok) {
        count.textContent = "Error: " + body.error;
        result.hidden = true;
        return;
      }
      count.textContent = body.text;
      result.src = "data:image/png;base64," + body.image;
      result.hidden = false;
    });
  </script>
</body>
</html>
"#;

/// 检测接口响应
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
  pub count: usize,
  pub text: String,
  /// Base64 编码的 PNG
  pub image: String,
}

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("请求格式错误: {0}")]
  BadRequest(String),
  #[error("检测失败: {0}")]
  DetectFailed(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

impl IntoResponse for ServerError {
  fn into_response(self) -> Response {
    let status = match &self {
      ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      error!("{}", self);
    } else {
      warn!("{}", self);
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

pub fn router<D>(task: Arc<DetectTask<'static, D>>, upload_limit: usize) -> Router
where
  D: Detector + Send + Sync + 'static,
{
  Router::new()
    .route("/", get(index))
    .route("/healthz", get(healthz))
    .route("/api/detect", post(detect::<D>))
    .layer(DefaultBodyLimit::max(upload_limit))
    .with_state(task)
}

/// 运行服务直到 `shutdown` 完成，已接收的请求会处理完毕
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), ServerError>
where
  F: Future<Output = ()> + Send + 'static,
{
  info!("服务已启动: http://{}", listener.local_addr()?);
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown)
    .await?;
  info!("服务已停止");
  Ok(())
}

async fn index() -> Html<&'static str> {
  Html(INDEX_HTML)
}

async fn healthz() -> &'static str {
  "ok"
}

async fn detect<D>(
  State(task): State<Arc<DetectTask<'static, D>>>,
  mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ServerError>
where
  D: Detector + Send + Sync + 'static,
{
  let bytes = read_image_field(&mut multipart).await?;
  debug!("收到上传图像: {} 字节", bytes.len());

  // 解码与推理均为同步阻塞调用，放到阻塞线程池执行
  let (output, png) = tokio::task::spawn_blocking(move || {
    let image = decode_image(&bytes).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let output = task
      .process(&image)
      .map_err(|e| ServerError::DetectFailed(e.to_string()))?;
    let png = encode_png(&output.image).map_err(|e| ServerError::DetectFailed(e.to_string()))?;
    Ok::<_, ServerError>((output, png))
  })
  .await
  .map_err(|e| ServerError::DetectFailed(e.to_string()))??;

  Ok(Json(DetectResponse {
    count: output.count,
    text: output.text,
    image: B64.encode(png),
  }))
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Vec<u8>, ServerError> {
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ServerError::BadRequest(e.body_text()))?
  {
    if field.name() != Some(IMAGE_FIELD) {
      continue;
    }
    let bytes = field
      .bytes()
      .await
      .map_err(|e| ServerError::BadRequest(e.body_text()))?;
    if bytes.is_empty() {
      return Err(ServerError::BadRequest("上传图像为空".to_string()));
    }
    return Ok(bytes.to_vec());
  }

  Err(ServerError::BadRequest(format!(
    "缺少表单字段 '{}'",
    IMAGE_FIELD
  )))
}
