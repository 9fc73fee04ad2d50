// 该文件是 Haiyan （海眼） 项目的一部分。
// src/frame.rs - 相机帧定义
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

use image::{ImageBuffer, Rgb, RgbImage};
use thiserror::Error;

const BGR_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 产生一份新的 RGB 图像，调用方拥有其所有权
pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

pub trait FromRgbImage {
  fn from_rgb_image(image: &RgbImage) -> Self;
}

impl ToRgbImage for RgbImage {
  fn to_rgb_image(&self) -> RgbImage {
    self.clone()
  }
}

impl FromRgbImage for RgbImage {
  fn from_rgb_image(image: &RgbImage) -> Self {
    image.clone()
  }
}

/// 相机总线上的 bgr8 紧凑帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bgr8Frame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl Bgr8Frame {
  pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = (width as usize)
      .checked_mul(height as usize)
      .and_then(|pixels| pixels.checked_mul(BGR_CHANNELS));
    match expected {
      Some(expected) if expected == data.len() => {}
      expected => {
        return Err(FrameError::LengthMismatch {
          expected: expected.unwrap_or(usize::MAX),
          actual: data.len(),
        });
      }
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }
}

impl ToRgbImage for Bgr8Frame {
  fn to_rgb_image(&self) -> RgbImage {
    let width = self.width as usize;
    ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let idx = (y as usize * width + x as usize) * BGR_CHANNELS;
      Rgb([self.data[idx + 2], self.data[idx + 1], self.data[idx]])
    })
  }
}

impl FromRgbImage for Bgr8Frame {
  fn from_rgb_image(image: &RgbImage) -> Self {
    let data = image
      .pixels()
      .flat_map(|Rgb([r, g, b])| [*b, *g, *r])
      .collect::<Vec<u8>>();

    Self {
      width: image.width(),
      height: image.height(),
      data: data.into_boxed_slice(),
    }
  }
}
