// 该文件是 Haiyan （海眼） 项目的一部分。
// src/output/log_output.rs - 日志输出
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
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::Selection,
  output::{DetectionReport, Render},
  pipeline::PipelineOutput,
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 只把检测结果写入日志，不保存图像
///
/// `log://<topic>?json` 以 JSON 报告的形式输出整帧结果。
pub struct LogOutput {
  topic: String,
  json: bool,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch);
    }

    let topic = url.host_str().unwrap_or("detections").to_string();
    let json = url.query_pairs().any(|(k, _)| k == "json");
    Ok(LogOutput { topic, json })
  }
}

impl Render for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, output: &PipelineOutput) -> Result<(), Self::Error> {
    if self.json {
      info!("[{}] {}", self.topic, DetectionReport::new(output).to_json()?);
      return Ok(());
    }

    if let Selection::Single { detection: None } = output.selection {
      info!("[{}] 本帧未发现目标", self.topic);
    }
    for det in output.selection.as_slice() {
      info!(
        "[{}] {}: {:.2}% at ({}, {}, {}, {}), 中心 ({}, {})",
        self.topic,
        det.class_name,
        det.confidence * 100.0,
        det.bbox.x_start,
        det.bbox.y_start,
        det.bbox.x_end,
        det.bbox.y_end,
        det.center.x,
        det.center.y
      );
    }
    Ok(())
  }
}
