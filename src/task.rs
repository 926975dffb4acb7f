// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/task.rs - 单张图像检测任务
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

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::DynamicImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  frame::{Bgr, Frame, Rgb},
  input::{CodecError, TransientImage},
  model::{DetectionConfig, Detector},
  output::{Annotator, shrink_all},
};

pub fn count_text(count: usize) -> String {
  format!("Detected Whiteflies: {count}")
}

#[derive(Error, Debug)]
pub enum TaskError<E: std::error::Error + 'static> {
  #[error("临时输入文件错误: {0}")]
  StorageError(#[from] CodecError),
  #[error("检测器错误: {0}")]
  DetectorError(#[source] E),
}

/// 一次检测的输出
#[derive(Debug, Clone)]
pub struct DetectOutput {
  /// 标注后的图像
  pub image: Frame<Rgb>,
  /// 检测数量
  pub count: usize,
  /// 展示文本
  pub text: String,
}

/// 检测流水线：暂存 → 检测 → 缩框 → 标注
pub struct DetectTask<'a, D> {
  detector: D,
  config: DetectionConfig,
  annotator: Annotator<'a>,
  transient_dir: PathBuf,
}

impl<'a, D: Detector> DetectTask<'a, D> {
  pub fn new(
    detector: D,
    config: DetectionConfig,
    annotator: Annotator<'a>,
    transient_dir: impl Into<PathBuf>,
  ) -> Self {
    Self {
      detector,
      config,
      annotator,
      transient_dir: transient_dir.into(),
    }
  }

  pub fn config(&self) -> &DetectionConfig {
    &self.config
  }

  pub fn transient_dir(&self) -> &Path {
    &self.transient_dir
  }

  /// 处理任意通道布局的解码图像
  pub fn process(&self, image: &DynamicImage) -> Result<DetectOutput, TaskError<D::Error>> {
    self.process_frame(&Frame::from_dynamic(image))
  }

  pub fn process_frame(&self, frame: &Frame<Rgb>) -> Result<DetectOutput, TaskError<D::Error>> {
    let now = Instant::now();

    let transient = TransientImage::store(&frame.convert::<Bgr>(), &self.transient_dir)?;
    let result = self
      .detector
      .predict(transient.path(), &self.config)
      .map_err(TaskError::DetectorError)?;
    drop(transient);
    let elapsed_detect = now.elapsed();

    let count = result.count();
    let shrunk = shrink_all(result.iter(), self.config.shrink_ratio);
    debug!("缩框完成: {} 个, 比例 {}", shrunk.len(), self.config.shrink_ratio);

    let image = self.annotator.annotate(frame, &shrunk, count);
    info!(
      "检测到 {} 个粉虱 ({}x{}), 耗时: {:.2?} / {:.2?}",
      count,
      frame.width(),
      frame.height(),
      elapsed_detect,
      now.elapsed()
    );

    Ok(DetectOutput {
      image,
      count,
      text: count_text(count),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{DetectionBox, DetectionResult};
  use crate::output::AnnotationStyle;
  use std::sync::Mutex;

  #[derive(Debug, Error)]
  #[error("模型不可用")]
  struct Unavailable;

  /// 记录收到的路径并返回固定结果
  struct Recording {
    boxes: Vec<DetectionBox>,
    seen: Mutex<Vec<PathBuf>>,
  }

  impl Detector for Recording {
    type Error = Unavailable;

    fn predict(&self, path: &Path, _: &DetectionConfig) -> Result<DetectionResult, Self::Error> {
      assert!(path.exists(), "detector must see a written file");
      self.seen.lock().unwrap().push(path.to_path_buf());
      Ok(self.boxes.clone().into())
    }
  }

  struct Failing;

  impl Detector for Failing {
    type Error = Unavailable;

    fn predict(&self, _: &Path, _: &DetectionConfig) -> Result<DetectionResult, Self::Error> {
      Err(Unavailable)
    }
  }

  fn annotator() -> Annotator<'static> {
    Annotator::new(AnnotationStyle::default()).unwrap()
  }

  fn frame() -> Frame<Rgb> {
    Frame::from(image::RgbImage::new(256, 256))
  }

  #[test]
  fn count_text_format() {
    assert_eq!(count_text(0), "Detected Whiteflies: 0");
    assert_eq!(count_text(12), "Detected Whiteflies: 12");
  }

  #[test]
  fn reports_detector_count_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Recording {
      boxes: vec![
        DetectionBox::new(100, 100, 200, 200),
        DetectionBox::new(10, 150, 60, 250),
      ],
      seen: Mutex::new(Vec::new()),
    };
    let task = DetectTask::new(detector, DetectionConfig::default(), annotator(), dir.path());

    let output = task.process_frame(&frame()).unwrap();
    assert_eq!(output.count, 2);
    assert_eq!(output.text, "Detected Whiteflies: 2");
    // 缩框后 (120, 120, 180, 180) 的左上角被描红
    assert_eq!(output.image.pixel(120, 120), [255, 0, 0]);
    assert_eq!(output.image.pixel(100, 100), [0, 0, 0]);

    let seen = task.detector.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with(dir.path()));
    assert!(!seen[0].exists());
  }

  #[test]
  fn detector_failure_propagates_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let task = DetectTask::new(Failing, DetectionConfig::default(), annotator(), dir.path());

    let err = task.process_frame(&frame()).unwrap_err();
    assert!(matches!(err, TaskError::DetectorError(Unavailable)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
  }

  #[test]
  fn unwritable_storage_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let task = DetectTask::new(
      Failing,
      DetectionConfig::default(),
      annotator(),
      dir.path().join("missing"),
    );
    assert!(matches!(
      task.process_frame(&frame()),
      Err(TaskError::StorageError(_))
    ));
  }
}
