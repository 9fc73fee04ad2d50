// 该文件是 Haiyan （海眼） 项目的一部分。
// src/input.rs - 帧与检测张量输入
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
use ndarray::ArrayD;
use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme};

/// 一帧图像以及外部推理对其给出的原始检测张量
#[derive(Debug, Clone)]
pub struct Sample {
  pub name: String,
  pub frame: RgbImage,
  pub tensor: ArrayD<f32>,
}

mod read_sample_file;
pub use self::read_sample_file::{SampleFileInput, SampleFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("样本文件输入错误: {0}")]
  SampleFileInputError(#[from] SampleFileInputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  ReadSampleFile(SampleFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() == SampleFileInput::SCHEME {
      let input = SampleFileInput::from_url(url)?;
      return Ok(InputWrapper::ReadSampleFile(input));
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Iterator for InputWrapper {
  type Item = Sample;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadSampleFile(input) => input.next(),
    }
  }
}
