// 该文件是 Haiyan （海眼） 项目的一部分。
// src/config.rs - 流水线配置
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

use thiserror::Error;
use tracing::{error, info};

use crate::{
  catalog::{CatalogError, LabelCatalog},
  select::CapPolicy,
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("置信度阈值必须在 [0, 1] 内: {0}")]
  ThresholdOutOfRange(f32),
  #[error("缺少标签目录")]
  MissingCatalog,
  #[error("目标类别编号不在标签目录中: {0}")]
  UnknownTargetClass(i64),
  #[error("目标类别名称不在标签目录中: {0}")]
  UnknownTargetName(String),
  #[error("标签目录错误: {0}")]
  CatalogError(#[from] CatalogError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
  /// 只寻找一个指定类别中置信度最高的目标
  Single { target_class_id: i64 },
  /// 所有类别，按类别最大数量截断
  Multi { cap_policy: CapPolicy },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
  Id(i64),
  Name(String),
}

/// 已校验的流水线配置
#[derive(Debug, Clone)]
pub struct PipelineConfig {
  confidence_threshold: f32,
  mode: SelectionMode,
  catalog: LabelCatalog,
}

impl PipelineConfig {
  pub fn builder() -> PipelineConfigBuilder {
    PipelineConfigBuilder::default()
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  pub fn mode(&self) -> &SelectionMode {
    &self.mode
  }

  pub fn catalog(&self) -> &LabelCatalog {
    &self.catalog
  }
}

pub struct PipelineConfigBuilder {
  confidence_threshold: f32,
  catalog: Option<LabelCatalog>,
  target: Option<Target>,
  cap_policy: CapPolicy,
}

impl Default for PipelineConfigBuilder {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      catalog: None,
      target: None,
      cap_policy: CapPolicy::default(),
    }
  }
}

impl PipelineConfigBuilder {
  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn catalog(mut self, catalog: LabelCatalog) -> Self {
    self.catalog = Some(catalog);
    self
  }

  /// 单目标模式，按类别编号指定目标
  pub fn single_target(mut self, class_id: i64) -> Self {
    self.target = Some(Target::Id(class_id));
    self
  }

  /// 单目标模式，按类别名称指定目标
  pub fn single_target_name(mut self, name: impl Into<String>) -> Self {
    self.target = Some(Target::Name(name.into()));
    self
  }

  /// 多目标模式（默认）
  pub fn multi_target(mut self, cap_policy: CapPolicy) -> Self {
    self.target = None;
    self.cap_policy = cap_policy;
    self
  }

  pub fn build(self) -> Result<PipelineConfig, ConfigError> {
    let threshold = self.confidence_threshold;
    if !(0.0..=1.0).contains(&threshold) {
      error!("置信度阈值无效: {}", threshold);
      return Err(ConfigError::ThresholdOutOfRange(threshold));
    }

    let catalog = self.catalog.ok_or(ConfigError::MissingCatalog)?;

    let mode = match self.target {
      Some(Target::Id(class_id)) => {
        if catalog.entry(class_id).is_none() {
          return Err(ConfigError::UnknownTargetClass(class_id));
        }
        SelectionMode::Single {
          target_class_id: class_id,
        }
      }
      Some(Target::Name(name)) => {
        let target_class_id = catalog
          .class_id_of(&name)
          .ok_or(ConfigError::UnknownTargetName(name))?;
        SelectionMode::Single { target_class_id }
      }
      None => SelectionMode::Multi {
        cap_policy: self.cap_policy,
      },
    };

    info!("流水线配置: 阈值 {}, 模式 {:?}", threshold, mode);
    Ok(PipelineConfig {
      confidence_threshold: threshold,
      mode,
      catalog,
    })
  }
}
