//! 观察者通知
//!
//! 状态变化和分段更新先进入无界通道，再由独立的分发任务按 FIFO 顺序交给观察者，
//! 观察者回调永远不会在训练队列中执行。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::splits::{Split, SplitSummary};
use crate::state::WorkoutState;

/// 追踪器事件
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// 状态已变化
    StateChanged(WorkoutState),
    /// 分段列表已更新；`is_final` 表示训练结束时的最后一次更新
    SplitsUpdated {
        splits: Vec<Split>,
        /// 最近一个分段的汇总，只有起始分段时为 `None`
        summary: Option<SplitSummary>,
        is_final: bool,
    },
}

/// 训练观察者
///
/// 每个追踪器最多一个
pub trait WorkoutObserver: Send + Sync {
    fn on_state_changed(&self, state: WorkoutState);

    fn on_splits_updated(&self, splits: &[Split], summary: Option<&SplitSummary>, is_final: bool);
}

/// 事件发送器
///
/// 没有观察者时发射的事件直接丢弃
#[derive(Clone, Default)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<TrackerEvent>>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<TrackerEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// 不发送任何事件
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: TrackerEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::debug!("Event dispatcher gone, event dropped");
            }
        }
    }
}

/// 启动事件分发任务
///
/// 所有 [`EventSender`] 被丢弃后任务结束
pub fn spawn_dispatcher(observer: Arc<dyn WorkoutObserver>) -> (EventSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<TrackerEvent>();

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                TrackerEvent::StateChanged(state) => observer.on_state_changed(state),
                TrackerEvent::SplitsUpdated {
                    splits,
                    summary,
                    is_final,
                } => observer.on_splits_updated(&splits, summary.as_ref(), is_final),
            }
        }
        tracing::debug!("Event dispatcher stopped");
    });

    (EventSender::new(tx), handle)
}

/// 把事件转发到通道的观察者
///
/// 适合在异步代码中等待通知
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<TrackerEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TrackerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl WorkoutObserver for ChannelObserver {
    fn on_state_changed(&self, state: WorkoutState) {
        let _ = self.tx.send(TrackerEvent::StateChanged(state));
    }

    fn on_splits_updated(&self, splits: &[Split], summary: Option<&SplitSummary>, is_final: bool) {
        let _ = self.tx.send(TrackerEvent::SplitsUpdated {
            splits: splits.to_vec(),
            summary: summary.copied(),
            is_final,
        });
    }
}
