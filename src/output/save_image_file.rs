// 该文件是 Haiyan （海眼） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{DetectionReport, Render},
  pipeline::PipelineOutput,
};

/// 保存标注图像，并在同名 `.json` 文件中写入检测报告
pub struct SaveImageFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(uri.path()),
    })
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Render for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, output: &PipelineOutput) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    output.annotated.save(&self.path)?;
    let report = DetectionReport::new(output).to_json()?;
    std::fs::write(self.path.with_extension("json"), report)?;

    info!("保存图像到文件: {}", self.path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::Selection;
  use image::RgbImage;

  #[test]
  fn writes_image_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("frame.png");
    let output = SaveImageFileOutput::new(&path);

    let result = PipelineOutput {
      selection: Selection::Multi { detections: vec![] },
      annotated: RgbImage::new(8, 8),
    };
    output.render_result(&result).unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (8, 8));
    let report: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(path.with_extension("json")).unwrap()).unwrap();
    assert_eq!(report["result"]["mode"], "multi");
  }

  #[test]
  fn path_comes_from_url() {
    let output = SaveImageFileOutput::from_url(&Url::parse("image:///tmp/out/gate.png").unwrap()).unwrap();
    assert_eq!(output.path(), Path::new("/tmp/out/gate.png"));
  }
}
