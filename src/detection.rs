// 该文件是 Haiyan （海眼） 项目的一部分。
// src/detection.rs - 检测结果定义
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

use serde::{Deserialize, Serialize};

use crate::{
  geometry::{self, PixelBox, Point},
  tensor::Candidate,
};

/// 单个检测目标，每帧重新构造
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub class_id: i64,
  pub class_name: String,
  pub confidence: f32,
  #[serde(rename = "box")]
  pub bbox: PixelBox,
  pub center: Point,
}

impl Detection {
  pub fn from_candidate(candidate: &Candidate<'_>, width: u32, height: u32) -> Self {
    let (bbox, center) = geometry::resolve(&candidate.bbox, width, height);
    Self {
      class_id: candidate.class_id,
      class_name: candidate.label.name.clone(),
      confidence: candidate.confidence,
      bbox,
      center,
    }
  }
}

/// 选择结果：单目标模式至多一个，多目标模式为按类别截断后的集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Selection<T> {
  Single { detection: Option<T> },
  Multi { detections: Vec<T> },
}

pub type SelectionResult = Selection<Detection>;

impl<T> Selection<T> {
  pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Selection<U> {
    match self {
      Selection::Single { detection } => Selection::Single {
        detection: detection.map(f),
      },
      Selection::Multi { detections } => Selection::Multi {
        detections: detections.into_iter().map(&mut f).collect(),
      },
    }
  }

  pub fn as_slice(&self) -> &[T] {
    match self {
      Selection::Single { detection } => detection.as_slice(),
      Selection::Multi { detections } => detections,
    }
  }

  pub fn len(&self) -> usize {
    self.as_slice().len()
  }

  pub fn is_empty(&self) -> bool {
    self.as_slice().is_empty()
  }
}
