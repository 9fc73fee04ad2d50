// 该文件是 Haiyan （海眼） 项目的一部分。
// src/pipeline.rs - 检测结果处理流水线
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

use image::RgbImage;
use ndarray::ArrayViewD;
use thiserror::Error;
use tracing::debug;

use crate::{
  config::{PipelineConfig, SelectionMode},
  detection::{Detection, Selection, SelectionResult},
  draw::{Draw, DrawStyle},
  filter::filter_by_confidence,
  frame::{FromRgbImage, ToRgbImage},
  select::{best_of_class, group_and_cap},
  tensor::{DecodeError, RawDetectionTensor, decode},
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("检测张量解码错误: {0}")]
  DecodeError(#[from] DecodeError),
}

/// 同一帧的选择结果与标注图像
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
  pub selection: SelectionResult,
  pub annotated: RgbImage,
}

/// 解码 → 过滤 → 选择 → 坐标换算 → 标注，每次调用互不影响
#[derive(Clone)]
pub struct DetectionPipeline {
  config: PipelineConfig,
  draw: Draw,
  style: DrawStyle,
}

impl DetectionPipeline {
  pub fn new(config: PipelineConfig) -> Self {
    let style = DrawStyle::for_mode(config.mode(), 0);
    Self {
      config,
      draw: Draw::default(),
      style,
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  /// 多目标模式下伪随机颜色的种子
  pub fn with_color_seed(mut self, seed: u64) -> Self {
    self.style = DrawStyle::for_mode(self.config.mode(), seed);
    self
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn style(&self) -> &DrawStyle {
    &self.style
  }

  /// 不绘制图像，只计算选择结果
  pub fn select(
    &self,
    tensor: ArrayViewD<'_, f32>,
    width: u32,
    height: u32,
  ) -> Result<SelectionResult, PipelineError> {
    let tensor = RawDetectionTensor::try_from(tensor)?;
    let catalog = self.config.catalog();

    let candidates = decode(&tensor, catalog);
    let candidates = filter_by_confidence(candidates, self.config.confidence_threshold());

    let selection = match self.config.mode() {
      SelectionMode::Single { target_class_id } => Selection::Single {
        detection: best_of_class(candidates, *target_class_id),
      },
      SelectionMode::Multi { cap_policy } => Selection::Multi {
        detections: group_and_cap(candidates, *cap_policy),
      },
    };

    let selection = selection.map(|candidate| Detection::from_candidate(&candidate, width, height));
    debug!("选择结果: {} 个目标", selection.len());
    Ok(selection)
  }

  pub fn process<F: ToRgbImage>(
    &self,
    frame: &F,
    tensor: ArrayViewD<'_, f32>,
  ) -> Result<PipelineOutput, PipelineError> {
    let now = std::time::Instant::now();
    let mut annotated = frame.to_rgb_image();
    let (width, height) = annotated.dimensions();

    let selection = self.select(tensor, width, height)?;
    self
      .draw
      .draw_detections_on_image(&mut annotated, selection.as_slice(), &self.style);

    debug!("帧处理完成，耗时: {:.2?}", now.elapsed());
    Ok(PipelineOutput {
      selection,
      annotated,
    })
  }

  /// 以调用方的帧格式（如相机总线上的 bgr8）返回标注帧
  pub fn process_frame<F: ToRgbImage + FromRgbImage>(
    &self,
    frame: &F,
    tensor: ArrayViewD<'_, f32>,
  ) -> Result<(SelectionResult, F), PipelineError> {
    let PipelineOutput {
      selection,
      annotated,
    } = self.process(frame, tensor)?;
    Ok((selection, F::from_rgb_image(&annotated)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    catalog::{LabelCatalog, LabelEntry},
    geometry::PixelBox,
    select::CapPolicy,
  };
  use ndarray::{ArrayD, IxDyn};

  fn catalog() -> LabelCatalog {
    LabelCatalog::new(vec![LabelEntry::new("gate", 1), LabelEntry::new("flare", 2)]).unwrap()
  }

  fn tensor(rows: &[[f32; 7]]) -> ArrayD<f32> {
    let data: Vec<f32> = rows.iter().flatten().copied().collect();
    ArrayD::from_shape_vec(IxDyn(&[1, 1, rows.len(), 7]), data).unwrap()
  }

  #[test]
  fn single_target_returns_none_when_absent() {
    let config = PipelineConfig::builder()
      .catalog(catalog())
      .single_target(1)
      .build()
      .unwrap();
    let pipeline = DetectionPipeline::new(config);
    let rows = tensor(&[[0.0, 2.0, 0.9, 0.1, 0.1, 0.2, 0.2]]);

    let selection = pipeline.select(rows.view(), 100, 100).unwrap();
    assert_eq!(selection, Selection::Single { detection: None });
  }

  #[test]
  fn multi_target_respects_caps_and_threshold() {
    let config = PipelineConfig::builder()
      .catalog(catalog())
      .confidence_threshold(0.5)
      .multi_target(CapPolicy::DecodeOrder)
      .build()
      .unwrap();
    let pipeline = DetectionPipeline::new(config);
    let rows = tensor(&[
      [0.0, 1.0, 0.6, 0.0, 0.0, 0.1, 0.1],
      [0.0, 1.0, 0.9, 0.2, 0.2, 0.3, 0.3],
      [0.0, 2.0, 0.5, 0.4, 0.4, 0.5, 0.5],
      [0.0, 2.0, 0.49, 0.6, 0.6, 0.7, 0.7],
      [0.0, 2.0, 0.8, 0.8, 0.8, 0.9, 0.9],
    ]);

    let selection = pipeline.select(rows.view(), 10, 10).unwrap();
    let summary: Vec<(&str, i32)> = selection
      .as_slice()
      .iter()
      .map(|d| (d.class_name.as_str(), d.bbox.x_start))
      .collect();
    assert_eq!(summary, vec![("flare", 4), ("flare", 8), ("gate", 0)]);
  }

  #[test]
  fn process_annotates_a_copy() {
    let config = PipelineConfig::builder()
      .catalog(catalog())
      .single_target_name("gate")
      .build()
      .unwrap();
    let pipeline = DetectionPipeline::new(config);
    let frame = RgbImage::new(100, 100);
    let rows = tensor(&[[0.0, 1.0, 0.95, 0.1, 0.2, 0.9, 0.8]]);

    let output = pipeline.process(&frame, rows.view()).unwrap();
    let Selection::Single {
      detection: Some(detection),
    } = &output.selection
    else {
      panic!("gate should be present");
    };
    assert_eq!(
      detection.bbox,
      PixelBox {
        x_start: 10,
        y_start: 20,
        x_end: 90,
        y_end: 80
      }
    );
    assert_ne!(output.annotated, frame);
    assert!(frame.pixels().all(|p| p.0 == [0, 0, 0]));
  }

  #[test]
  fn malformed_tensor_is_an_error() {
    let config = PipelineConfig::builder().catalog(catalog()).build().unwrap();
    let pipeline = DetectionPipeline::new(config);
    let bad = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 7]));

    let result = pipeline.process(&RgbImage::new(4, 4), bad.view());
    assert!(matches!(
      result,
      Err(PipelineError::DecodeError(DecodeError::RankMismatch(3)))
    ));
  }
}
