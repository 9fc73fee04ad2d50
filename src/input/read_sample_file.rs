// 该文件是 Haiyan （海眼） 项目的一部分。
// src/input/read_sample_file.rs - 图像与张量文件输入
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

use std::{
  collections::VecDeque,
  path::{Path, PathBuf},
};

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::Sample,
  tensor::{DecodeError, TensorFile},
};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];
const TENSOR_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum SampleFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Tensor loading error: {0}")]
  TensorLoadError(#[from] DecodeError),
  #[error("No samples found in {0}")]
  Empty(String),
}

/// 从磁盘读取 (图像, 张量) 样本
///
/// `sample:///frame.png[?tensor=/frame.json]` 读取单个样本；
/// `sample:///dir` 按文件名顺序读取目录中所有带同名 `.json` 张量的图像。
pub struct SampleFileInput {
  pending: VecDeque<(PathBuf, PathBuf)>,
}

impl FromUrlWithScheme for SampleFileInput {
  const SCHEME: &'static str = "sample";
}

impl FromUrl for SampleFileInput {
  type Error = SampleFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(SampleFileInputError::SchemaMismatch);
    }

    let path = PathBuf::from(url.path());
    if path.is_dir() {
      return Self::from_directory(&path);
    }

    let tensor = url
      .query_pairs()
      .find(|(k, _)| k == "tensor")
      .map(|(_, v)| PathBuf::from(v.into_owned()))
      .unwrap_or_else(|| path.with_extension(TENSOR_EXTENSION));
    Ok(Self::single(path, tensor))
  }
}

impl SampleFileInput {
  pub fn single(image: impl Into<PathBuf>, tensor: impl Into<PathBuf>) -> Self {
    Self {
      pending: VecDeque::from([(image.into(), tensor.into())]),
    }
  }

  pub fn from_directory(directory: &Path) -> Result<Self, SampleFileInputError> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
      if is_image && path.with_extension(TENSOR_EXTENSION).is_file() {
        images.push(path);
      }
    }

    if images.is_empty() {
      return Err(SampleFileInputError::Empty(directory.display().to_string()));
    }

    images.sort();
    info!("在 {} 中找到 {} 个样本", directory.display(), images.len());
    let pending = images
      .into_iter()
      .map(|image| {
        let tensor = image.with_extension(TENSOR_EXTENSION);
        (image, tensor)
      })
      .collect();
    Ok(Self { pending })
  }

  pub fn remaining(&self) -> usize {
    self.pending.len()
  }

  fn load(image: &Path, tensor: &Path) -> Result<Sample, SampleFileInputError> {
    let frame = ImageReader::open(image)?.decode()?.to_rgb8();
    let tensor = TensorFile::from_path(tensor)?.into_array()?;
    let name = image
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_default();
    Ok(Sample {
      name,
      frame,
      tensor,
    })
  }
}

impl Iterator for SampleFileInput {
  type Item = Sample;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some((image, tensor)) = self.pending.pop_front() {
      match Self::load(&image, &tensor) {
        Ok(sample) => return Some(sample),
        Err(e) => error!("读取样本 {} 失败，已跳过: {}", image.display(), e),
      }
    }
    None
  }
}
