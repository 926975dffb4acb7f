// 该文件是 Whitefly （粉虱计数） 项目的一部分。
// src/output/shrink.rs - 显示用缩框
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

use crate::model::DetectionBox;

/// 以原框中心为中心，按 `ratio` 缩放宽高
///
/// 中心与半宽均为向下取整的整数除法，缩放后的宽高向零截断。
/// 不校验倒置的框，倒置输入原样参与计算。
pub fn shrink_box(bbox: &DetectionBox, ratio: f64) -> DetectionBox {
  let w = bbox.width();
  let h = bbox.height();

  let cx = bbox.x1 + w.div_euclid(2);
  let cy = bbox.y1 + h.div_euclid(2);

  let half_w = ((w as f64 * ratio) as i32).div_euclid(2);
  let half_h = ((h as f64 * ratio) as i32).div_euclid(2);

  DetectionBox::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
}

/// 保持顺序缩放所有框
pub fn shrink_all<'a, I>(boxes: I, ratio: f64) -> Vec<DetectionBox>
where
  I: IntoIterator<Item = &'a DetectionBox>,
{
  boxes.into_iter().map(|b| shrink_box(b, ratio)).collect()
}
