//! 状态管理模块
//!
//! 提供训练状态机的状态定义、状态转换校验和配置管理
//!
//! # 模块结构
//!
//! - `workout_state` - 训练状态定义和状态管理器
//! - `error` - 状态相关错误类型
//! - `transitions` - 状态转换上下文和状态变更事件
//! - `config` - 追踪器配置的加载、保存和全局访问

pub mod config;
mod error;
mod transitions;
mod workout_state;

pub use config::{ConfigError, ConfigManager, ConfigResult, FilterThresholds, GlobalConfig, TrackerConfig};
pub use error::{StateError, StateResult};
pub use transitions::{StateChangeEvent, StateTransitionContext, TransitionError};
pub use workout_state::{StateManager, WorkoutState};
