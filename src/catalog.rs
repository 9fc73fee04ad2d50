// 该文件是 Haiyan （海眼） 项目的一部分。
// src/catalog.rs - 类别标签目录
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

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// 背景类别编号，永远不会映射到目录条目
pub const BACKGROUND_CLASS_ID: i64 = 0;

#[derive(Error, Debug)]
pub enum CatalogError {
  #[error("标签目录为空")]
  Empty,
  #[error("第 {0} 个标签名称为空")]
  EmptyName(usize),
  #[error("标签名称重复: {0}")]
  DuplicateName(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

/// 单个类别：名称以及每帧允许保留的最大数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry {
  pub name: String,
  #[serde(rename = "maxCount", alias = "max_count", alias = "count")]
  pub max_count: usize,
}

impl LabelEntry {
  pub fn new(name: impl Into<String>, max_count: usize) -> Self {
    Self {
      name: name.into(),
      max_count,
    }
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
  Wrapped { labels: Vec<LabelEntry> },
  Bare(Vec<LabelEntry>),
}

/// 有序的标签目录，加载后只读
///
/// 张量中的类别编号 `k`（`k >= 1`）对应第 `k - 1` 个条目，`0` 为背景。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCatalog {
  entries: Box<[LabelEntry]>,
}

impl LabelCatalog {
  pub fn new(entries: Vec<LabelEntry>) -> Result<Self, CatalogError> {
    if entries.is_empty() {
      return Err(CatalogError::Empty);
    }

    let mut seen = HashSet::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
      if entry.name.trim().is_empty() {
        return Err(CatalogError::EmptyName(idx));
      }
      if !seen.insert(entry.name.as_str()) {
        return Err(CatalogError::DuplicateName(entry.name.clone()));
      }
    }

    debug!("标签目录包含 {} 个类别", entries.len());
    Ok(Self {
      entries: entries.into_boxed_slice(),
    })
  }

  pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
    let entries = match serde_json::from_str::<CatalogFile>(text)? {
      CatalogFile::Wrapped { labels } => labels,
      CatalogFile::Bare(labels) => labels,
    };
    Self::new(entries)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  /// 按张量类别编号查找条目
  pub fn entry(&self, class_id: i64) -> Option<&LabelEntry> {
    if class_id <= BACKGROUND_CLASS_ID {
      return None;
    }
    usize::try_from(class_id - 1)
      .ok()
      .and_then(|idx| self.entries.get(idx))
  }

  pub fn class_id_of(&self, name: &str) -> Option<i64> {
    self
      .entries
      .iter()
      .position(|entry| entry.name == name)
      .map(|idx| idx as i64 + 1)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (i64, &LabelEntry)> {
    self
      .entries
      .iter()
      .enumerate()
      .map(|(idx, entry)| (idx as i64 + 1, entry))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn catalog() -> LabelCatalog {
    LabelCatalog::new(vec![
      LabelEntry::new("gate", 1),
      LabelEntry::new("flare", 3),
      LabelEntry::new("bucket", 0),
    ])
    .unwrap()
  }

  #[test]
  fn class_ids_are_one_based() {
    let catalog = catalog();
    assert_eq!(catalog.entry(1).unwrap().name, "gate");
    assert_eq!(catalog.entry(3).unwrap().name, "bucket");
    assert!(catalog.entry(BACKGROUND_CLASS_ID).is_none());
    assert!(catalog.entry(4).is_none());
    assert!(catalog.entry(-2).is_none());
  }

  #[test]
  fn class_id_lookup_by_name() {
    let catalog = catalog();
    assert_eq!(catalog.class_id_of("flare"), Some(2));
    assert_eq!(catalog.class_id_of("mat"), None);
    let ids: Vec<i64> = catalog.iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
  }

  #[test]
  fn rejects_empty_catalog() {
    assert!(matches!(LabelCatalog::new(vec![]), Err(CatalogError::Empty)));
  }

  #[test]
  fn rejects_duplicate_and_blank_names() {
    let dup = LabelCatalog::new(vec![LabelEntry::new("gate", 1), LabelEntry::new("gate", 2)]);
    assert!(matches!(dup, Err(CatalogError::DuplicateName(name)) if name == "gate"));

    let blank = LabelCatalog::new(vec![LabelEntry::new("gate", 1), LabelEntry::new(" ", 2)]);
    assert!(matches!(blank, Err(CatalogError::EmptyName(1))));
  }

  #[test]
  fn parses_wrapped_labels_with_count_key() {
    let text = r#"{"labels": [{"name": "gate", "count": 1}, {"name": "flare", "count": 2}]}"#;
    let catalog = LabelCatalog::from_json_str(text).unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.entry(2), Some(&LabelEntry::new("flare", 2)));
  }

  #[test]
  fn parses_bare_array_with_max_count_key() {
    let text = r#"[{"name": "gate", "maxCount": 4}, {"name": "drum", "max_count": 0}]"#;
    let catalog = LabelCatalog::from_json_str(text).unwrap();
    assert_eq!(catalog.entry(1).unwrap().max_count, 4);
    assert_eq!(catalog.entry(2).unwrap().max_count, 0);
  }

  #[test]
  fn malformed_json_is_an_error() {
    assert!(matches!(
      LabelCatalog::from_json_str("{\"labels\": 3}"),
      Err(CatalogError::ParseError(_))
    ));
  }
}
