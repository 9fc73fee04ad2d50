// 该文件是 Haiyan （海眼） 项目的一部分。
// src/geometry.rs - 像素坐标换算
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

use serde::{Deserialize, Serialize};

/// 像素坐标的边界框，允许退化（end < start）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBox {
  pub x_start: i32,
  pub y_start: i32,
  pub x_end: i32,
  pub y_end: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
  pub x: i32,
  pub y: i32,
}

impl PixelBox {
  /// `start + (end - start) / 2`，整数除法向零截断
  pub fn center(&self) -> Point {
    Point {
      x: half_way(self.x_start, self.x_end),
      y: half_way(self.y_start, self.y_end),
    }
  }
}

fn half_way(start: i32, end: i32) -> i32 {
  let (start, end) = (start as i64, end as i64);
  // 结果总落在 start 与 end 之间，不会溢出
  (start + (end - start) / 2) as i32
}

fn to_pixel(normalized: f32, extent: u32) -> i32 {
  (normalized * extent as f32) as i32
}

/// 将归一化的 [x1, y1, x2, y2] 换算为像素框与中心点
pub fn resolve(bbox: &[f32; 4], width: u32, height: u32) -> (PixelBox, Point) {
  let pixel_box = PixelBox {
    x_start: to_pixel(bbox[0], width),
    y_start: to_pixel(bbox[1], height),
    x_end: to_pixel(bbox[2], width),
    y_end: to_pixel(bbox[3], height),
  };
  (pixel_box, pixel_box.center())
}
