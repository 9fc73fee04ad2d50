// 该文件是 Haiyan （海眼） 项目的一部分。
// src/select.rs - 检测目标选择策略
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

use std::collections::BTreeMap;

use clap::ValueEnum;
use tracing::debug;

use crate::{catalog::LabelEntry, tensor::Candidate};

/// 多目标模式下按类别截断时保留哪些目标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CapPolicy {
  /// 保留解码顺序中最先出现的 N 个
  #[default]
  DecodeOrder,
  /// 保留置信度最高的 N 个，同分时按解码顺序
  Confidence,
}

/// 单目标：返回目标类别中置信度最高的候选，同分时先出现者胜出
pub fn best_of_class<'c>(
  candidates: impl IntoIterator<Item = Candidate<'c>>,
  target_class_id: i64,
) -> Option<Candidate<'c>> {
  let mut best: Option<Candidate<'c>> = None;
  for candidate in candidates {
    if candidate.class_id != target_class_id {
      continue;
    }
    if best
      .as_ref()
      .is_none_or(|current| candidate.confidence > current.confidence)
    {
      best = Some(candidate);
    }
  }
  best
}

/// 多目标：按类别名分组，每组截断到该类别的最大数量后拼接
///
/// 输出按类别名排序，组内保持解码顺序（`CapPolicy::Confidence` 时按置信度降序）。
pub fn group_and_cap<'c>(candidates: Vec<Candidate<'c>>, policy: CapPolicy) -> Vec<Candidate<'c>> {
  let mut groups: BTreeMap<&'c str, Vec<Candidate<'c>>> = BTreeMap::new();
  for candidate in candidates {
    let label: &'c LabelEntry = candidate.label;
    groups.entry(label.name.as_str()).or_default().push(candidate);
  }

  let mut selected = Vec::new();
  for (name, mut group) in groups {
    if policy == CapPolicy::Confidence {
      group.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    }
    let cap = group.first().map_or(0, |c| c.label.max_count);
    if group.len() > cap {
      debug!("类别 {} 有 {} 个目标, 截断为 {}", name, group.len(), cap);
      group.truncate(cap);
    }
    selected.append(&mut group);
  }
  selected
}
