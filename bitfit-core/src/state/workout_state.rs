use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use super::error::{StateError, StateResult};

/// 训练主状态
///
/// 表示一次训练从创建到结束的生命周期
///
/// ```text
/// Before -> WaitingForLocationStream -> WaitingForGpsAccuracy -> Started -> Stopped
///                     |                          |                  |
///                     +------------> Stopped <---+                  +----> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkoutState {
    /// 初始状态，尚未开始
    #[default]
    Before,

    /// 已订阅定位，等待第一批定位数据
    WaitingForLocationStream,

    /// 已收到定位数据，等待 GPS 精度达标
    WaitingForGpsAccuracy,

    /// 已锁定 GPS，正在记录
    Started,

    /// 暂停（保留状态，正常流程不会进入）
    Paused,

    /// 已正常结束
    Stopped,

    /// 记录后端出错，训练失败
    Failed,
}

impl WorkoutState {
    /// 检查是否为初始状态
    pub fn is_before(&self) -> bool {
        matches!(self, Self::Before)
    }

    /// 检查是否在等待 GPS（两个等待阶段之一）
    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            Self::WaitingForLocationStream | Self::WaitingForGpsAccuracy
        )
    }

    /// 检查是否正在记录
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }

    /// 检查是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// 检查是否为失败状态
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// 获取状态名称（用于日志和调试）
    pub fn name(&self) -> &'static str {
        match self {
            Self::Before => "Before",
            Self::WaitingForLocationStream => "WaitingForLocationStream",
            Self::WaitingForGpsAccuracy => "WaitingForGpsAccuracy",
            Self::Started => "Started",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
            Self::Failed => "Failed",
        }
    }

    /// 验证状态转换是否合法
    ///
    /// 根据状态机图定义的转换规则进行验证
    pub fn can_transition_to(&self, to: WorkoutState) -> bool {
        use WorkoutState::*;

        match (self, to) {
            // 开始训练
            (Before, WaitingForLocationStream) => true,

            // 收到定位流但精度不足
            (WaitingForLocationStream, WaitingForGpsAccuracy) => true,

            // GPS 锁定（同一批数据中可能跳过精度等待阶段）
            (WaitingForLocationStream, Started) => true,
            (WaitingForGpsAccuracy, Started) => true,

            // 未锁定 GPS 时停止，没有需要保存的数据
            (WaitingForLocationStream, Stopped) => true,
            (WaitingForGpsAccuracy, Stopped) => true,

            // 正常结束
            (Started, Stopped) => true,

            // 任何非终止状态都可以失败
            (from, Failed) => !from.is_terminal() && !from.is_before(),

            // 终止状态可以显式重置
            (Stopped, Before) | (Failed, Before) => true,

            // Paused 是保留状态，其他转换不合法
            _ => false,
        }
    }
}

/// 状态管理器
///
/// 保存对外发布的训练状态。只有训练队列会写入，其他线程无锁读取。
pub struct StateManager {
    /// 当前状态（使用 ArcSwap 实现无锁读取）
    state: ArcSwap<WorkoutState>,
}

impl StateManager {
    /// 创建新的状态管理器
    ///
    /// # Examples
    ///
    /// ```
    /// use bitfit_lib::state::StateManager;
    ///
    /// let manager = StateManager::new();
    /// assert!(manager.current().is_before());
    /// ```
    pub fn new() -> Self {
        Self {
            state: ArcSwap::new(Arc::new(WorkoutState::Before)),
        }
    }

    /// 获取当前状态
    ///
    /// 此方法是无锁的，可以在任何线程安全地调用
    pub fn current(&self) -> WorkoutState {
        **self.state.load()
    }

    /// 转换到新状态
    ///
    /// 验证状态转换的合法性，如果合法则更新状态
    ///
    /// # Errors
    ///
    /// 如果状态转换不合法，返回 [`StateError::InvalidTransition`]
    ///
    /// # Examples
    ///
    /// ```
    /// use bitfit_lib::state::{StateManager, WorkoutState};
    ///
    /// let manager = StateManager::new();
    ///
    /// // 合法转换
    /// assert!(manager.transition(WorkoutState::WaitingForLocationStream).is_ok());
    ///
    /// // 非法转换
    /// assert!(manager.transition(WorkoutState::Before).is_err());
    /// ```
    pub fn transition(&self, new_state: WorkoutState) -> StateResult<()> {
        let current = self.current();

        if !current.can_transition_to(new_state) {
            return Err(StateError::InvalidTransition {
                from: current,
                to: new_state,
            });
        }

        self.state.store(Arc::new(new_state));
        Ok(())
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
