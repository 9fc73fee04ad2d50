// 该文件是 Haiyan （海眼） 项目的一部分。
// src/task.rs - 任务调度
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
  sync::{
    Arc, Condvar, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
    mpsc,
  },
  thread,
  time::Duration,
};

use tracing::{error, info, warn};

use crate::{input::Sample, output::Render, pipeline::DetectionPipeline};

pub trait Task<I, O>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: &DetectionPipeline, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一个样本，任何错误都直接返回
pub struct OneShotTask;

impl<RE, I, O> Task<I, O> for OneShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Sample>,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, pipeline: &DetectionPipeline, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let sample = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧 {} 获取成功，开始处理...", sample.name);
    let now = std::time::Instant::now();
    let result = pipeline.process(&sample.frame, sample.tensor.view())?;
    let elapsed = now.elapsed();
    info!("处理完成，{} 个目标，耗时: {:.2?}", result.selection.len(), elapsed);
    output.render_result(&result)?;
    info!("发布完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// Ctrl-C 时置位的停止标志，每个进程只能注册一次处理函数
fn install_interrupt_flag() -> mpsc::Receiver<()> {
  let (tx, rx) = mpsc::channel();
  let result = ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  });
  if let Err(e) = result {
    warn!("无法设置 Ctrl-C 处理函数: {}", e);
  }
  rx
}

/// 逐个处理所有样本；单帧张量错误只记录日志，输出错误终止任务
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<RE, I, O> Task<I, O> for ContinuousTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Sample>,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: &DetectionPipeline, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let rx = install_interrupt_flag();

    let mut frame_index = 0;
    for sample in input {
      frame_index += 1;
      info!("处理第 {} 帧图像 ({})", frame_index, sample.name);
      process_and_publish(pipeline, &output, &sample)?;

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

fn process_and_publish<O, RE>(
  pipeline: &DetectionPipeline,
  output: &O,
  sample: &Sample,
) -> Result<(), anyhow::Error>
where
  RE: std::error::Error + Sync + Send + 'static,
  O: Render<Error = RE>,
{
  let now = std::time::Instant::now();
  match pipeline.process(&sample.frame, sample.tensor.view()) {
    Ok(result) => {
      let elapsed_a = now.elapsed();
      output.render_result(&result)?;
      info!(
        "{} 个目标，耗时: {:.2?} / {:.2?}",
        result.selection.len(),
        elapsed_a,
        now.elapsed()
      );
    }
    Err(e) => error!("帧 {} 处理失败，已跳过: {}", sample.name, e),
  }
  Ok(())
}

/// 深度为 1 的帧槽：新帧覆盖尚未取走的旧帧
pub struct LatestFrameSlot<T> {
  state: Mutex<SlotState<T>>,
  ready: Condvar,
}

struct SlotState<T> {
  item: Option<T>,
  closed: bool,
  dropped: u64,
}

impl<T> Default for LatestFrameSlot<T> {
  fn default() -> Self {
    Self {
      state: Mutex::new(SlotState {
        item: None,
        closed: false,
        dropped: 0,
      }),
      ready: Condvar::new(),
    }
  }
}

impl<T> LatestFrameSlot<T> {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// 放入新帧，返回是否覆盖了旧帧
  pub fn put(&self, item: T) -> bool {
    let mut state = self.lock();
    let replaced = state.item.replace(item).is_some();
    if replaced {
      state.dropped += 1;
    }
    drop(state);
    self.ready.notify_one();
    replaced
  }

  /// 阻塞直到有帧可取；槽关闭且为空时返回 `None`
  pub fn take(&self) -> Option<T> {
    let mut state = self.lock();
    loop {
      if let Some(item) = state.item.take() {
        return Some(item);
      }
      if state.closed {
        return None;
      }
      state = self
        .ready
        .wait(state)
        .unwrap_or_else(PoisonError::into_inner);
    }
  }

  pub fn close(&self) {
    self.lock().closed = true;
    self.ready.notify_all();
  }

  pub fn dropped(&self) -> u64 {
    self.lock().dropped
  }
}

/// 实时任务：读取线程不停产生帧，处理端总是拿最新的一帧，同一时刻只处理一帧
#[derive(Default, Debug)]
pub struct RealtimeTask {
  frame_number: Option<usize>,
}

impl RealtimeTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<RE, I, O> Task<I, O> for RealtimeTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Sample> + Send + 'static,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: &DetectionPipeline, output: O) -> Result<(), Self::Error> {
    info!("开始实时任务...");
    let rx = install_interrupt_flag();
    let slot = Arc::new(LatestFrameSlot::new());
    let stopped = Arc::new(AtomicBool::new(false));

    let producer = {
      let slot = Arc::clone(&slot);
      let stopped = Arc::clone(&stopped);
      thread::spawn(move || {
        for sample in input {
          if stopped.load(Ordering::Relaxed) {
            break;
          }
          slot.put(sample);
        }
        slot.close();
      })
    };

    let mut frame_index = 0;
    let mut result = Ok(());
    while let Some(sample) = slot.take() {
      frame_index += 1;
      info!("处理第 {} 帧图像 ({})", frame_index, sample.name);
      if let Err(e) = process_and_publish(pipeline, &output, &sample) {
        result = Err(e);
        break;
      }

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    stopped.store(true, Ordering::Relaxed);
    slot.close();
    if producer.join().is_err() {
      error!("读取线程异常退出");
    }

    warn!("丢弃过期帧 {} 个", slot.dropped());
    info!("任务完成，退出");
    result
  }
}
