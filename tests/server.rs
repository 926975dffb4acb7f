// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// tests/server.rs - 网页接口集成测试
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

#![cfg(feature = "web_ui")]

mod common;

use std::sync::Arc;

use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use tower::ServiceExt;
use whitefly::{
  frame::Frame,
  input::decode_image,
  model::DetectionConfig,
  output::encode_png,
  server::{DetectResponse, router},
  task::DetectTask,
};

use common::{MarkerDetector, annotator, marked_frame};

const BOUNDARY: &str = "whitefly-test-boundary";

fn app(dir: &std::path::Path) -> Router {
  let task = DetectTask::new(MarkerDetector, DetectionConfig::default(), annotator(), dir);
  router(Arc::new(task), 1024 * 1024)
}

fn multipart(field: &str, payload: &[u8]) -> Request<Body> {
  let mut body = Vec::new();
  body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
  body.extend_from_slice(
    format!(
      "Content-Disposition: form-data; name=\"{field}\"; filename=\"leaf.png\"\r\n\
       Content-Type: image/png\r\n\r\n"
    )
    .as_bytes(),
  );
  body.extend_from_slice(payload);
  body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

  Request::builder()
    .method("POST")
    .uri("/api/detect")
    .header(
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={BOUNDARY}"),
    )
    .body(Body::from(body))
    .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn index_serves_upload_form() {
  let dir = tempfile::tempdir().unwrap();
  let response = app(dir.path())
    .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::OK);
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let html = String::from_utf8(bytes.to_vec()).unwrap();
  assert!(html.contains("Whitefly Detection"));
  assert!(html.contains("/api/detect"));
}

#[tokio::test]
async fn healthz_reports_ok() {
  let dir = tempfile::tempdir().unwrap();
  let response = app(dir.path())
    .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn detect_returns_count_and_annotated_image() {
  let dir = tempfile::tempdir().unwrap();
  let png = encode_png(&marked_frame(4, 320, 240)).unwrap();

  let response = app(dir.path())
    .oneshot(multipart("image", &png))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let body: DetectResponse = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(body.count, 4);
  assert_eq!(body.text, "Detected Whiteflies: 4");

  let annotated = Frame::from_dynamic(&decode_image(&B64.decode(body.image).unwrap()).unwrap());
  assert_eq!((annotated.width(), annotated.height()), (320, 240));
  assert_eq!(annotated.pixel(14, 104), [255, 0, 0]);
}

#[tokio::test]
async fn missing_image_field_is_a_bad_request() {
  let dir = tempfile::tempdir().unwrap();
  let response = app(dir.path())
    .oneshot(multipart("photo", b"irrelevant"))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  let body = body_json(response).await;
  assert!(body["error"].as_str().unwrap().contains("image"));
}

#[tokio::test]
async fn undecodable_upload_is_a_bad_request() {
  let dir = tempfile::tempdir().unwrap();
  let response = app(dir.path())
    .oneshot(multipart("image", b"not a picture at all"))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  assert!(body_json(response).await.get("error").is_some());
}

#[tokio::test]
async fn storage_failure_is_an_internal_error() {
  let dir = tempfile::tempdir().unwrap();
  let png = encode_png(&marked_frame(1, 64, 64)).unwrap();

  let response = app(&dir.path().join("gone"))
    .oneshot(multipart("image", &png))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  assert!(body_json(response).await.get("error").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn truncated_upload_is_rejected_before_detection() {
  let dir = tempfile::tempdir().unwrap();
  let png = encode_png(&marked_frame(3, 256, 256)).unwrap();

  let response = app(dir.path())
    .oneshot(multipart("image", &png[..png.len() / 2]))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  assert!(body_json(response).await["error"].as_str().is_some());
  assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
