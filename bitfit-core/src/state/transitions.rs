//! 状态转换与事件发射模块
//!
//! 提供状态转换的高级封装，包括：
//! - 状态转换的统一接口
//! - 状态变更事件发射到观察者
//! - 可序列化的状态变更载荷

use std::sync::Arc;

use serde::Serialize;

use super::{StateManager, WorkoutState};
use crate::session::{EventSender, TrackerEvent};

/// 状态变更事件载荷
///
/// 用于发送到界面层的状态变更通知
#[derive(Debug, Clone, Serialize)]
pub struct StateChangeEvent {
    /// 状态名称
    pub state: String,
    /// 是否尚未开始
    pub is_before: bool,
    /// 是否在等待 GPS
    pub is_waiting: bool,
    /// 是否正在记录
    pub is_started: bool,
    /// 是否已结束（成功或失败）
    pub is_terminal: bool,
    /// 是否失败
    pub is_failed: bool,
}

impl From<&WorkoutState> for StateChangeEvent {
    fn from(state: &WorkoutState) -> Self {
        Self {
            state: state.name().to_string(),
            is_before: state.is_before(),
            is_waiting: state.is_waiting(),
            is_started: state.is_started(),
            is_terminal: state.is_terminal(),
            is_failed: state.is_failed(),
        }
    }
}

/// 状态转换上下文
///
/// 提供状态转换的便捷方法，自动处理事件发射。
/// 只在训练队列内使用。
pub struct StateTransitionContext {
    state_manager: Arc<StateManager>,
    events: EventSender,
}

impl StateTransitionContext {
    /// 创建状态转换上下文
    pub fn new(state_manager: Arc<StateManager>, events: EventSender) -> Self {
        Self {
            state_manager,
            events,
        }
    }

    /// 获取当前状态
    pub fn current(&self) -> WorkoutState {
        self.state_manager.current()
    }

    /// 开始训练，等待定位数据
    ///
    /// 从 Before 转换到 WaitingForLocationStream
    pub fn begin_waiting(&self) -> Result<(), TransitionError> {
        self.transition_with_event(WorkoutState::WaitingForLocationStream)
    }

    /// 应用一次样本处理产生的状态变化
    ///
    /// 按顺序逐个转换，每一步都发射事件
    pub fn advance(&self, states: &[WorkoutState]) -> Result<(), TransitionError> {
        for state in states {
            self.transition_with_event(*state)?;
        }
        Ok(())
    }

    /// 正常结束
    ///
    /// 从等待状态或 Started 转换到 Stopped
    pub fn finish(&self) -> Result<(), TransitionError> {
        self.transition_with_event(WorkoutState::Stopped)
    }

    /// 训练失败
    ///
    /// 转换到 Failed 状态
    pub fn fail(&self) -> Result<(), TransitionError> {
        self.transition_with_event(WorkoutState::Failed)
    }

    /// 重置为初始状态
    ///
    /// 仅允许从终止状态重置；已经是 Before 时不做任何事
    pub fn reset(&self) -> Result<(), TransitionError> {
        let current = self.current();
        if current.is_before() {
            return Ok(());
        }
        if current.is_terminal() {
            self.transition_with_event(WorkoutState::Before)
        } else {
            Err(TransitionError::InvalidState {
                current: current.name().to_string(),
                action: "reset".to_string(),
            })
        }
    }

    /// 发射事件（不涉及状态转换）
    pub fn emit(&self, event: TrackerEvent) {
        self.events.emit(event);
    }

    /// 执行状态转换并发射事件
    fn transition_with_event(&self, new_state: WorkoutState) -> Result<(), TransitionError> {
        self.state_manager
            .transition(new_state)
            .map_err(|e| TransitionError::TransitionFailed(e.to_string()))?;

        tracing::info!(state = %new_state.name(), "Workout state changed");
        self.events.emit(TrackerEvent::StateChanged(new_state));
        Ok(())
    }
}

/// 状态转换错误
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum TransitionError {
    /// 状态转换失败
    #[error("State transition failed: {0}")]
    TransitionFailed(String),

    /// 无效状态
    #[error("Invalid state for action '{action}': current state is {current}")]
    InvalidState { current: String, action: String },
}
