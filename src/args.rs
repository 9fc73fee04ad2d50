// 该文件是 Haiyan （海眼） 项目的一部分。
// src/args.rs - 流水线命令行参数
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

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::{
  catalog::LabelCatalog,
  config::{DEFAULT_CONFIDENCE_THRESHOLD, PipelineConfig},
  draw::Draw,
  pipeline::DetectionPipeline,
  select::CapPolicy,
};

/// 各个可执行程序共用的流水线参数
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 类别目录 JSON 文件
  #[arg(long, value_name = "FILE")]
  pub labels: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 单目标模式的目标类别（编号或名称），不指定时为多目标模式
  #[arg(long, value_name = "CLASS")]
  pub target: Option<String>,

  /// 多目标模式下超出数量上限时保留哪些检测
  #[arg(long, value_enum, default_value_t = CapPolicy::DecodeOrder)]
  pub cap_policy: CapPolicy,

  /// 标签字体文件 (TTF/OTF)，不指定时使用内置字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,

  /// 多目标模式配色种子
  #[arg(long, default_value_t = 0, value_name = "SEED")]
  pub seed: u64,
}

impl PipelineArgs {
  pub fn build_config(&self) -> anyhow::Result<PipelineConfig> {
    let catalog = LabelCatalog::from_path(&self.labels)
      .with_context(|| format!("无法读取类别目录 {}", self.labels.display()))?;
    info!("类别目录: {} 个类别", catalog.len());

    let builder = PipelineConfig::builder()
      .confidence_threshold(self.confidence)
      .catalog(catalog);
    let builder = match self.target.as_deref() {
      Some(target) => match target.parse::<i64>() {
        Ok(class_id) => builder.single_target(class_id),
        Err(_) => builder.single_target_name(target),
      },
      None => builder.multi_target(self.cap_policy),
    };
    Ok(builder.build()?)
  }

  pub fn build_pipeline(&self) -> anyhow::Result<DetectionPipeline> {
    let draw = match &self.font {
      Some(path) => {
        Draw::from_font_file(path).with_context(|| format!("无法加载字体 {}", path.display()))?
      }
      None => Draw::default(),
    };

    Ok(
      DetectionPipeline::new(self.build_config()?)
        .with_draw(draw)
        .with_color_seed(self.seed),
    )
  }
}
