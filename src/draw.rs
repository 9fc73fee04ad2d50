// 该文件是 Haiyan （海眼） 项目的一部分。
// src/draw.rs - 检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use rand::{Rng, SeedableRng, rngs::StdRng};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::SelectionMode,
  detection::Detection,
  frame::ToRgbImage,
  geometry::{PixelBox, Point},
};

/// 单目标模式的“目标存在”高亮色
pub const PRESENT_COLOR: [u8; 3] = [47, 255, 173];

const SINGLE_TARGET_THICKNESS: u32 = 4;
const MULTI_TARGET_THICKNESS: u32 = 1;
const SINGLE_TARGET_PRECISION: usize = 4;
const MULTI_TARGET_PRECISION: usize = 2;

const MARKER_HALF_SIZE: i32 = 5;
// 框顶距画面顶部不足该距离时，标签改画在框内
const LABEL_TOP_MARGIN: i32 = 15;
const LABEL_FONT_SIZE: f32 = 14.0;

static EMBEDDED_FONT: &[u8] = include_bytes!("../assets/font.ttf");

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 颜色方案
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
  Fixed([u8; 3]),
  /// 由种子决定的伪随机颜色，同一种子与序号总是同一颜色
  Seeded(u64),
}

impl Palette {
  /// 按检测序号依次给出颜色
  pub fn colors(&self) -> Colors {
    match *self {
      Palette::Fixed(color) => Colors::Fixed(Rgb(color)),
      Palette::Seeded(seed) => Colors::Seeded(StdRng::seed_from_u64(seed)),
    }
  }
}

#[derive(Debug, Clone)]
pub enum Colors {
  Fixed(Rgb<u8>),
  Seeded(StdRng),
}

impl Iterator for Colors {
  type Item = Rgb<u8>;

  fn next(&mut self) -> Option<Self::Item> {
    let color = match self {
      Colors::Fixed(color) => *color,
      Colors::Seeded(rng) => hsv_to_rgb(rng.gen_range(0.0..360.0), 0.8, 0.95),
    };
    Some(color)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawStyle {
  pub palette: Palette,
  pub thickness: u32,
  /// 标签中置信度的小数位数
  pub precision: usize,
}

impl DrawStyle {
  pub fn single_target() -> Self {
    Self {
      palette: Palette::Fixed(PRESENT_COLOR),
      thickness: SINGLE_TARGET_THICKNESS,
      precision: SINGLE_TARGET_PRECISION,
    }
  }

  pub fn multi_target(seed: u64) -> Self {
    Self {
      palette: Palette::Seeded(seed),
      thickness: MULTI_TARGET_THICKNESS,
      precision: MULTI_TARGET_PRECISION,
    }
  }

  pub fn for_mode(mode: &SelectionMode, seed: u64) -> Self {
    match mode {
      SelectionMode::Single { .. } => Self::single_target(),
      SelectionMode::Multi { .. } => Self::multi_target(seed),
    }
  }
}

/// 标注器：在帧的副本上绘制边框、中心标记与标签
#[derive(Clone)]
pub struct Draw {
  font: FontArc,
  font_scale: PxScale,
}

impl Default for Draw {
  fn default() -> Self {
    let font = FontArc::try_from_slice(EMBEDDED_FONT).expect("无法加载嵌入的字体文件");
    Self::with_font(font)
  }
}

impl Draw {
  pub fn with_font(font: FontArc) -> Self {
    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }

  pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    info!("加载字体文件: {}", path.display());
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    Ok(Self::with_font(font))
  }

  /// 返回新的标注图像，输入帧保持不变
  pub fn annotate<F: ToRgbImage>(
    &self,
    frame: &F,
    detections: &[Detection],
    style: &DrawStyle,
  ) -> RgbImage {
    let mut image = frame.to_rgb_image();
    self.draw_detections_on_image(&mut image, detections, style);
    image
  }

  pub fn draw_detections_on_image(
    &self,
    image: &mut RgbImage,
    detections: &[Detection],
    style: &DrawStyle,
  ) {
    for (detection, color) in detections.iter().zip(style.palette.colors()) {
      draw_box(image, &detection.bbox, color, style.thickness);
      draw_marker(image, &detection.center, color);
      self.draw_label(image, detection, color, style);
    }
    debug!("绘制 {} 个检测目标", detections.len());
  }

  fn draw_label(&self, image: &mut RgbImage, detection: &Detection, color: Rgb<u8>, style: &DrawStyle) {
    let label = format!(
      "{}: {:.*}",
      detection.class_name, style.precision, detection.confidence
    );
    let (x, y) = label_origin(&detection.bbox, style.thickness);
    let x = clamp_to_extent(x, image.width());
    let y = clamp_to_extent(y, image.height());
    draw_text_mut(image, color, x, y, self.font_scale, &self.font, &label);
  }
}

/// 标签左上角位置：默认在框上方，贴近画面顶部时改到框顶边下方
pub fn label_origin(bbox: &PixelBox, thickness: u32) -> (i32, i32) {
  let y = if bbox.y_start < LABEL_TOP_MARGIN {
    bbox.y_start.saturating_add(thickness as i32 + 1)
  } else {
    bbox.y_start - LABEL_TOP_MARGIN
  };
  (bbox.x_start, y)
}

fn clamp_to_extent(value: i32, extent: u32) -> i32 {
  value.clamp(-1, extent as i32)
}

fn draw_box(image: &mut RgbImage, bbox: &PixelBox, color: Rgb<u8>, thickness: u32) {
  let (w, h) = (image.width(), image.height());
  let (xa, xb) = (clamp_to_extent(bbox.x_start, w), clamp_to_extent(bbox.x_end, w));
  let (ya, yb) = (clamp_to_extent(bbox.y_start, h), clamp_to_extent(bbox.y_end, h));
  let (left, right) = (xa.min(xb), xa.max(xb));
  let (top, bottom) = (ya.min(yb), ya.max(yb));

  // 向内加粗
  for t in 0..thickness as i32 {
    let (l, r, tp, b) = (left + t, right - t, top + t, bottom - t);
    if l > r || tp > b {
      break;
    }
    let rect = Rect::at(l, tp).of_size((r - l + 1) as u32, (b - tp + 1) as u32);
    draw_hollow_rect_mut(image, rect, color);
  }
}

fn draw_marker(image: &mut RgbImage, center: &Point, color: Rgb<u8>) {
  let (w, h) = (image.width() as i32, image.height() as i32);
  if center.x < -MARKER_HALF_SIZE
    || center.y < -MARKER_HALF_SIZE
    || center.x > w.saturating_add(MARKER_HALF_SIZE)
    || center.y > h.saturating_add(MARKER_HALF_SIZE)
  {
    return;
  }

  let (cx, cy, d) = (center.x as f32, center.y as f32, MARKER_HALF_SIZE as f32);
  draw_line_segment_mut(image, (cx - d, cy - d), (cx + d, cy + d), color);
  draw_line_segment_mut(image, (cx + d, cy - d), (cx - d, cy + d), color);
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;

  const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

  fn detection(bbox: PixelBox) -> Detection {
    Detection {
      class_id: 1,
      class_name: "gate".to_string(),
      confidence: 0.95,
      bbox,
      center: bbox.center(),
    }
  }

  fn gate_box() -> PixelBox {
    PixelBox {
      x_start: 10,
      y_start: 20,
      x_end: 90,
      y_end: 80,
    }
  }

  #[test]
  fn draws_thick_box_and_marker_in_present_color() {
    let frame = RgbImage::new(100, 100);
    let image = Draw::default().annotate(&frame, &[detection(gate_box())], &DrawStyle::single_target());
    let present = Rgb(PRESENT_COLOR);

    assert_eq!(image.get_pixel(10, 50), &present);
    assert_eq!(image.get_pixel(13, 50), &present);
    assert_eq!(image.get_pixel(14, 50), &BLACK);
    assert_eq!(image.get_pixel(90, 50), &present);
    assert_eq!(image.get_pixel(50, 50), &present);
    assert_eq!(image.get_pixel(52, 48), &present);
    assert_eq!(image.get_pixel(50, 40), &BLACK);
  }

  #[test]
  fn input_frame_is_untouched() {
    let frame = RgbImage::new(64, 64);
    let detections = [detection(PixelBox {
      x_start: 4,
      y_start: 4,
      x_end: 40,
      y_end: 40,
    })];
    let image = Draw::default().annotate(&frame, &detections, &DrawStyle::multi_target(7));
    assert!(frame.pixels().all(|p| *p == BLACK));
    assert_ne!(image, frame);
  }

  #[test]
  fn annotation_is_reproducible() {
    let mut frame = RgbImage::new(80, 60);
    for (x, y, pixel) in frame.enumerate_pixels_mut() {
      *pixel = Rgb([x as u8, y as u8, 128]);
    }
    let detections = vec![
      detection(PixelBox {
        x_start: 5,
        y_start: 5,
        x_end: 30,
        y_end: 30,
      }),
      detection(PixelBox {
        x_start: 40,
        y_start: 10,
        x_end: 70,
        y_end: 50,
      }),
    ];
    let style = DrawStyle::multi_target(42);
    let draw = Draw::default();

    let first = draw.annotate(&frame.clone(), &detections, &style);
    let second = draw.annotate(&frame.clone(), &detections, &style);
    assert_eq!(first, second);
  }

  #[test]
  fn seeded_palette_is_stable_and_varied() {
    let first: Vec<Rgb<u8>> = Palette::Seeded(3).colors().take(4).collect();
    let again: Vec<Rgb<u8>> = Palette::Seeded(3).colors().take(4).collect();
    assert_eq!(first, again);
    assert_ne!(first[0], first[1]);
    assert_ne!(first, Palette::Seeded(4).colors().take(4).collect::<Vec<_>>());
    assert_eq!(Palette::Fixed([1, 2, 3]).colors().nth(9), Some(Rgb([1, 2, 3])));
  }

  #[test]
  fn odd_boxes_do_not_panic() {
    let frame = RgbImage::new(32, 24);
    let boxes = [
      PixelBox {
        x_start: 20,
        y_start: 20,
        x_end: 5,
        y_end: 5,
      },
      PixelBox {
        x_start: -500,
        y_start: -500,
        x_end: 5000,
        y_end: 5000,
      },
      PixelBox {
        x_start: i32::MIN,
        y_start: i32::MIN,
        x_end: i32::MAX,
        y_end: i32::MAX,
      },
      // 最后绘制，避免被其它标签覆盖
      PixelBox {
        x_start: 7,
        y_start: 7,
        x_end: 7,
        y_end: 7,
      },
    ];
    let detections: Vec<Detection> = boxes.into_iter().map(detection).collect();
    let image = Draw::default().annotate(&frame, &detections, &DrawStyle::single_target());
    assert_eq!(image.dimensions(), (32, 24));
    assert_eq!(image.get_pixel(7, 7), &Rgb(PRESENT_COLOR));
  }

  fn lit_pixels(image: &RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> usize {
    ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
      .filter(|&(x, y)| *image.get_pixel(x, y) != BLACK)
      .count()
  }

  #[test]
  fn label_is_drawn_above_the_box() {
    let frame = RgbImage::new(200, 200);
    let bbox = PixelBox {
      x_start: 20,
      y_start: 100,
      x_end: 180,
      y_end: 180,
    };
    let image = Draw::default().annotate(&frame, &[detection(bbox)], &DrawStyle::single_target());

    assert!(lit_pixels(&image, 0..200, 80..100) > 0);
    assert_eq!(lit_pixels(&image, 0..200, 0..80), 0);
  }

  #[test]
  fn label_is_drawn_inside_box_near_frame_top() {
    let frame = RgbImage::new(200, 200);
    let bbox = PixelBox {
      x_start: 20,
      y_start: 5,
      x_end: 180,
      y_end: 150,
    };
    let image = Draw::default().annotate(&frame, &[detection(bbox)], &DrawStyle::single_target());

    // 框内、顶边下方
    assert!(lit_pixels(&image, 24..176, 10..30) > 0);
    assert_eq!(lit_pixels(&image, 0..200, 0..5), 0);
  }

  #[test]
  fn font_file_errors_are_reported() {
    assert!(matches!(
      Draw::from_font_file("/nonexistent/font.ttf"),
      Err(DrawError::IoError(_))
    ));

    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"not a font").unwrap();
    assert!(matches!(
      Draw::from_font_file(file.path()),
      Err(DrawError::InvalidFont(_))
    ));
  }

  #[test]
  fn label_moves_below_top_edge_near_frame_top() {
    let mut bbox = gate_box();
    assert_eq!(label_origin(&bbox, 1), (10, 5));

    bbox.y_start = 14;
    assert_eq!(label_origin(&bbox, 1), (10, 16));
    assert_eq!(label_origin(&bbox, 4), (10, 19));
  }

  #[test]
  fn style_follows_mode() {
    let single = DrawStyle::for_mode(&SelectionMode::Single { target_class_id: 1 }, 0);
    assert_eq!(single, DrawStyle::single_target());

    let multi = DrawStyle::for_mode(
      &SelectionMode::Multi {
        cap_policy: Default::default(),
      },
      9,
    );
    assert_eq!(multi.palette, Palette::Seeded(9));
    assert_eq!(multi.thickness, 1);
  }
}
