//! 全局错误处理模块
//!
//! 提供统一的应用错误类型和用户友好的错误消息
//!
//! # 功能
//!
//! - 统一的 `AppError` 类型，聚合所有模块错误
//! - 用户友好的错误消息
//! - 错误代码用于界面层处理
//! - 错误恢复建议
//!
//! # 使用示例
//!
//! ```
//! use bitfit_lib::session::TrackerError;
//! use bitfit_lib::utils::error::{AppError, ErrorCode};
//!
//! let err = AppError::from(TrackerError::QueueClosed);
//! assert_eq!(err.code(), ErrorCode::TrackerQueueClosed);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{FinalizationError, TrackerError};
use crate::sink::SinkError;
use crate::state::{ConfigError, StateError};

/// 应用错误类型
///
/// 聚合所有模块的错误类型，提供统一的错误处理接口
#[derive(Error, Debug)]
pub enum AppError {
    /// 追踪器错误
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// 记录后端错误
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// 结束提交错误
    #[error("Finalization error: {0}")]
    Finalization(#[from] FinalizationError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 状态错误
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误代码
///
/// 用于界面层识别和处理特定错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 追踪器错误 (1xxx)
    /// 训练队列已关闭
    TrackerQueueClosed,
    /// 训练仍在进行
    TrackerSessionActive,
    /// 追踪器配置无效
    TrackerInvalidConfig,

    // 记录后端错误 (2xxx)
    /// 后端报告错误
    SinkBackendFailed,
    /// 后端操作未成功
    SinkRejected,
    /// 没有生成训练记录
    SinkMissingWorkout,
    /// 没有生成路线记录
    SinkMissingRoute,
    /// 结束提交失败
    FinalizationFailed,

    // 配置错误 (4xxx)
    /// 配置加载失败
    ConfigLoadFailed,
    /// 配置无效
    ConfigInvalid,

    // 状态错误 (5xxx)
    /// 非法状态转换
    InvalidStateTransition,

    // 通用错误 (9xxx)
    /// 内部错误
    InternalError,
}

/// 错误上下文信息
///
/// 提供用户友好的错误信息和恢复建议
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// 错误代码
    pub code: ErrorCode,
    /// 用户友好的错误消息
    pub message: String,
    /// 详细错误信息（用于日志）
    pub detail: Option<String>,
    /// 恢复建议
    pub recovery_hint: Option<String>,
    /// 是否可恢复
    pub recoverable: bool,
}

impl ErrorContext {
    /// 创建新的错误上下文
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            recovery_hint: None,
            recoverable: true,
        }
    }

    /// 设置详细信息
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 设置恢复建议
    pub fn with_recovery_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }

    /// 标记为不可恢复
    pub fn not_recoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }
}

fn sink_code(err: &SinkError) -> ErrorCode {
    match err {
        SinkError::Backend { .. } => ErrorCode::SinkBackendFailed,
        SinkError::Rejected(_) => ErrorCode::SinkRejected,
        SinkError::MissingWorkout => ErrorCode::SinkMissingWorkout,
        SinkError::MissingRoute => ErrorCode::SinkMissingRoute,
    }
}

impl AppError {
    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            // 追踪器错误
            AppError::Tracker(TrackerError::QueueClosed) => ErrorCode::TrackerQueueClosed,
            AppError::Tracker(TrackerError::SessionActive(_)) => ErrorCode::TrackerSessionActive,
            AppError::Tracker(TrackerError::InvalidConfig(_)) => ErrorCode::TrackerInvalidConfig,
            AppError::Tracker(TrackerError::Finalization(_)) => ErrorCode::FinalizationFailed,
            AppError::Tracker(TrackerError::State(_)) => ErrorCode::InvalidStateTransition,

            // 记录后端错误
            AppError::Sink(err) => sink_code(err),
            AppError::Finalization(_) => ErrorCode::FinalizationFailed,

            // 配置错误
            AppError::Config(ConfigError::Io(_)) => ErrorCode::ConfigLoadFailed,
            AppError::Config(_) => ErrorCode::ConfigInvalid,

            // 状态错误
            AppError::State(_) => ErrorCode::InvalidStateTransition,

            // 通用错误
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// 获取用户友好的错误消息
    ///
    /// 返回适合直接显示给用户的错误消息
    pub fn user_message(&self) -> String {
        match self {
            AppError::Tracker(TrackerError::QueueClosed) => "训练追踪已停止运行".to_string(),
            AppError::Tracker(TrackerError::SessionActive(_)) => {
                "训练仍在进行，请先结束当前训练".to_string()
            }
            AppError::Tracker(TrackerError::InvalidConfig(_)) => "追踪设置无效".to_string(),
            AppError::Tracker(TrackerError::Finalization(_)) | AppError::Finalization(_) => {
                "训练保存失败".to_string()
            }
            AppError::Tracker(TrackerError::State(_)) | AppError::State(_) => {
                "训练状态异常".to_string()
            }

            AppError::Sink(SinkError::MissingWorkout) | AppError::Sink(SinkError::MissingRoute) => {
                "健康数据没有生成训练记录".to_string()
            }
            AppError::Sink(_) => "无法写入健康数据".to_string(),

            AppError::Config(ConfigError::Io(_)) => "无法读取配置文件".to_string(),
            AppError::Config(ConfigError::Json(_)) => "配置文件格式错误".to_string(),
            AppError::Config(_) => "配置错误".to_string(),

            AppError::Internal(msg) => format!("内部错误: {}", msg),
        }
    }

    /// 获取完整的错误上下文
    pub fn context(&self) -> ErrorContext {
        let code = self.code();
        let message = self.user_message();

        let mut ctx = ErrorContext::new(code, message).with_detail(self.to_string());

        // 添加恢复建议
        ctx.recovery_hint = self.recovery_hint();

        // 某些错误不可恢复
        if !self.is_recoverable() {
            ctx = ctx.not_recoverable();
        }

        ctx
    }

    /// 获取恢复建议
    pub fn recovery_hint(&self) -> Option<String> {
        match self {
            AppError::Tracker(TrackerError::Finalization(_)) | AppError::Finalization(_) => {
                Some("本次训练无法保存，请关闭后重新开始".to_string())
            }
            AppError::Tracker(TrackerError::SessionActive(_)) => {
                Some("结束当前训练后再重置".to_string())
            }
            AppError::Sink(_) => Some("请检查健康数据的写入权限".to_string()),
            _ => None,
        }
    }

    /// 检查错误是否可恢复
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AppError::Config(_) | AppError::Internal(_) | AppError::Tracker(TrackerError::QueueClosed)
        )
    }

    /// 检查是否是结束提交失败
    pub fn is_finalization_failure(&self) -> bool {
        matches!(
            self,
            AppError::Finalization(_) | AppError::Tracker(TrackerError::Finalization(_))
        )
    }
}

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 将任意错误转换为内部错误
impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
