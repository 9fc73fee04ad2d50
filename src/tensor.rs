// 该文件是 Haiyan （海眼） 项目的一部分。
// src/tensor.rs - 检测张量解码
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

use std::path::Path;

use ndarray::{ArrayD, ArrayView2, ArrayViewD, Axis, Ix4, IxDyn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{LabelCatalog, LabelEntry};

/// 每一行的字段数：(_, class_id, confidence, x1, y1, x2, y2)
pub const DETECTION_ROW_WIDTH: usize = 7;
const DETECTION_RANK: usize = 4;

const CLASS_ID_COLUMN: usize = 1;
const CONFIDENCE_COLUMN: usize = 2;
const BBOX_COLUMN: usize = 3;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("检测张量维度错误: 期望 4 维, 实际 {0} 维")]
  RankMismatch(usize),
  #[error("检测张量形状错误: 期望 [1, 1, N, 7], 实际 {0:?}")]
  ShapeMismatch(Vec<usize>),
  #[error("张量数据长度与形状不符: {0}")]
  LayoutError(#[from] ndarray::ShapeError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("张量文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

/// 推理输出的只读视图，形状为 `[1, 1, N, 7]`
#[derive(Debug, Clone)]
pub struct RawDetectionTensor<'a> {
  rows: ArrayView2<'a, f32>,
}

impl<'a> TryFrom<ArrayViewD<'a, f32>> for RawDetectionTensor<'a> {
  type Error = DecodeError;

  fn try_from(view: ArrayViewD<'a, f32>) -> Result<Self, Self::Error> {
    if view.ndim() != DETECTION_RANK {
      return Err(DecodeError::RankMismatch(view.ndim()));
    }

    let shape = view.shape();
    if shape[0] != 1 || shape[1] != 1 || shape[3] != DETECTION_ROW_WIDTH {
      return Err(DecodeError::ShapeMismatch(shape.to_vec()));
    }

    let rows = view
      .into_dimensionality::<Ix4>()?
      .index_axis_move(Axis(0), 0)
      .index_axis_move(Axis(0), 0);
    Ok(Self { rows })
  }
}

impl<'a> RawDetectionTensor<'a> {
  pub fn from_slice(shape: &[usize], data: &'a [f32]) -> Result<Self, DecodeError> {
    let view = ArrayViewD::from_shape(IxDyn(shape), data)?;
    Self::try_from(view)
  }

  pub fn rows(&self) -> usize {
    self.rows.nrows()
  }
}

/// 解码后尚未换算到像素坐标的候选目标
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'c> {
  pub class_id: i64,
  pub label: &'c LabelEntry,
  pub confidence: f32,
  /// 归一化坐标 [x1, y1, x2, y2]
  pub bbox: [f32; 4],
}

/// 按行序解码张量，类别编号无法在目录中找到的行会被丢弃
pub fn decode<'c>(tensor: &RawDetectionTensor<'_>, catalog: &'c LabelCatalog) -> Vec<Candidate<'c>> {
  let mut candidates = Vec::with_capacity(tensor.rows());

  for (row_idx, row) in tensor.rows.rows().into_iter().enumerate() {
    let raw_class = row[CLASS_ID_COLUMN];
    let label = if raw_class.is_finite() {
      let class_id = raw_class.trunc() as i64;
      catalog.entry(class_id).map(|label| (class_id, label))
    } else {
      None
    };

    let Some((class_id, label)) = label else {
      warn!("第 {} 行类别编号 {} 不在标签目录中，已丢弃", row_idx, raw_class);
      continue;
    };

    candidates.push(Candidate {
      class_id,
      label,
      confidence: row[CONFIDENCE_COLUMN],
      bbox: [
        row[BBOX_COLUMN],
        row[BBOX_COLUMN + 1],
        row[BBOX_COLUMN + 2],
        row[BBOX_COLUMN + 3],
      ],
    });
  }

  debug!("解码 {} 行, 保留 {} 个候选", tensor.rows(), candidates.len());
  candidates
}

/// 张量落盘格式：`{ "shape": [...], "data": [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorFile {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

impl TensorFile {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
  }

  pub fn into_array(self) -> Result<ArrayD<f32>, DecodeError> {
    Ok(ArrayD::from_shape_vec(IxDyn(&self.shape), self.data)?)
  }
}
