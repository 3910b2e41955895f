use super::finalize::FinalizationError;
use crate::state::TransitionError;

/// 追踪器错误
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum TrackerError {
    /// 训练队列已关闭
    #[error("Workout queue closed")]
    QueueClosed,

    /// 结束训练时后端出错，训练已转为 Failed
    #[error(transparent)]
    Finalization(#[from] FinalizationError),

    /// 训练进行中，不能重置
    #[error("Cannot reset while a workout is active (state: {0})")]
    SessionActive(String),

    /// 配置不合法
    #[error("Invalid tracker config: {0}")]
    InvalidConfig(String),

    /// 状态转换失败
    #[error("State error: {0}")]
    State(#[from] TransitionError),
}

/// 追踪器结果类型
pub type TrackerResult<T> = Result<T, TrackerError>;
