// 该文件是 Haiyan （海眼） 项目的一部分。
// src/output.rs - 输出定义
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

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, detection::SelectionResult, pipeline::PipelineOutput,
};

/// 发布一帧的选择结果与标注图像
pub trait Render: Sized {
  type Error;
  fn render_result(&self, output: &PipelineOutput) -> Result<(), Self::Error>;
}

/// 随图像一起落盘的 JSON 报告
#[derive(Debug, Serialize)]
pub struct DetectionReport<'a> {
  pub timestamp: String,
  pub width: u32,
  pub height: u32,
  pub result: &'a SelectionResult,
}

impl<'a> DetectionReport<'a> {
  pub fn new(output: &'a PipelineOutput) -> Self {
    let (width, height) = output.annotated.dimensions();
    Self {
      timestamp: chrono::Utc::now().to_rfc3339(),
      width,
      height,
      result: &output.selection,
    }
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(self)
  }
}

mod log_output;
pub use self::log_output::{LogOutput, LogOutputError};

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("日志输出错误: {0}")]
  LogOutputError(#[from] LogOutputError),
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  LogOutput(LogOutput),
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogOutput::SCHEME => Ok(OutputWrapper::LogOutput(LogOutput::from_url(url)?)),
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, output: &PipelineOutput) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::LogOutput(inner) => inner.render_result(output).map_err(OutputError::from),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(inner) => {
        inner.render_result(output).map_err(OutputError::from)
      }
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(inner) => {
        inner.render_result(output).map_err(OutputError::from)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::Selection;
  use image::RgbImage;

  #[test]
  fn report_carries_frame_size_and_result() {
    let output = PipelineOutput {
      selection: Selection::Single { detection: None },
      annotated: RgbImage::new(32, 16),
    };
    let json: serde_json::Value =
      serde_json::from_str(&DetectionReport::new(&output).to_json().unwrap()).unwrap();
    assert_eq!(json["width"], 32);
    assert_eq!(json["height"], 16);
    assert_eq!(json["result"]["mode"], "single");
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://camera/stream").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(scheme)) if scheme == "rtsp"
    ));
  }

  #[test]
  fn log_scheme_is_dispatched() {
    let url = Url::parse("log://detections").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::LogOutput(_))
    ));
  }
}
