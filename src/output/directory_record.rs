// 该文件是 Haiyan （海眼） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{DetectionReport, Render},
  pipeline::PipelineOutput,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 按日期分目录记录每一帧的标注图像与检测报告
///
/// `folder:///path?always` 时没有检测结果的帧也会记录。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    Ok(DirectoryRecordOutput::new(uri.path(), always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, always: bool) -> Self {
    Self {
      directory: directory.into(),
      frame_counter: AtomicU16::new(0),
      always,
    }
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, output: &PipelineOutput) -> Result<(), Self::Error> {
    if !self.always && output.selection.is_empty() {
      return Ok(());
    }

    let path = self.frame_path(Utc::now())?;
    output.annotated.save(&path)?;
    std::fs::write(
      path.with_extension("json"),
      DetectionReport::new(output).to_json()?,
    )?;
    debug!("记录帧: {}", path.display());
    Ok(())
  }
}
