//! 追踪器配置模块
//!
//! 提供追踪器配置的加载、保存和管理功能
//!
//! 配置只在训练开始时读取一次，训练过程中修改不会影响当前会话。
//!
//! # 使用示例
//!
//! ```no_run
//! use bitfit_lib::activity::DistanceUnit;
//! use bitfit_lib::state::{ConfigManager, TrackerConfig};
//!
//! // 加载配置
//! let mut config = ConfigManager::load("bitfit.json")?;
//!
//! // 修改配置
//! config.distance_unit = DistanceUnit::Kilometers;
//!
//! // 保存配置
//! ConfigManager::save("bitfit.json", &config)?;
//! # Ok::<(), bitfit_lib::state::ConfigError>(())
//! ```

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::activity::DistanceUnit;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 配置值不合法
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 配置结果类型
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 追踪器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// 分段距离单位
    pub distance_unit: DistanceUnit,
    /// 定位过滤阈值
    pub thresholds: FilterThresholds,
    /// 训练队列命令通道容量
    pub command_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            distance_unit: DistanceUnit::default(),
            thresholds: FilterThresholds::default(),
            command_capacity: 64,
        }
    }
}

impl TrackerConfig {
    /// 使用指定单位创建配置
    pub fn with_unit(distance_unit: DistanceUnit) -> Self {
        Self {
            distance_unit,
            ..Self::default()
        }
    }

    /// 当前单位对应的分段距离（米）
    pub fn split_distance_meters(&self) -> f64 {
        self.distance_unit.split_distance_meters()
    }

    /// 校验配置
    ///
    /// # Errors
    ///
    /// 阈值非正数、速度窗口小于 2 或通道容量为 0 时返回 [`ConfigError::Invalid`]
    pub fn validate(&self) -> ConfigResult<()> {
        self.thresholds.validate()?;
        if self.command_capacity == 0 {
            return Err(ConfigError::Invalid(
                "command_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// 定位过滤阈值
///
/// 默认值均为 10（米或米/秒）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterThresholds {
    /// 等待 GPS 阶段判定为跳点的距离（米）
    pub jump_distance_meters: f64,
    /// 可接受的最大水平精度（米）
    pub accuracy_meters: f64,
    /// 速度窗口中相邻样本允许的最大速度（米/秒）
    pub max_plausible_speed_mps: f64,
    /// 峰值速度滑动窗口大小
    pub peak_speed_window: usize,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            jump_distance_meters: 10.0,
            accuracy_meters: 10.0,
            max_plausible_speed_mps: 10.0,
            peak_speed_window: 5,
        }
    }
}

impl FilterThresholds {
    fn validate(&self) -> ConfigResult<()> {
        let positive = [
            ("jump_distance_meters", self.jump_distance_meters),
            ("accuracy_meters", self.accuracy_meters),
            ("max_plausible_speed_mps", self.max_plausible_speed_mps),
        ];
        for (name, value) in positive {
            // NaN 也不合法
            if !(value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.peak_speed_window < 2 {
            return Err(ConfigError::Invalid(format!(
                "peak_speed_window must hold at least 2 samples, got {}",
                self.peak_speed_window
            )));
        }
        Ok(())
    }
}

/// 配置管理器
///
/// 提供配置的加载、保存和管理功能
pub struct ConfigManager;

impl ConfigManager {
    /// 加载配置
    ///
    /// 从配置文件加载配置，如果文件不存在则返回默认配置
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<TrackerConfig> {
        let path = path.as_ref();

        tracing::debug!(path = %path.display(), "Loading config");

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: TrackerConfig = serde_json::from_str(&content)?;
            config.validate()?;
            tracing::info!(path = %path.display(), "Config loaded successfully");
            Ok(config)
        } else {
            tracing::info!("Config file not found, using defaults");
            Ok(TrackerConfig::default())
        }
    }

    /// 保存配置
    ///
    /// 将配置保存到配置文件，必要时创建父目录
    pub fn save(path: impl AsRef<Path>, config: &TrackerConfig) -> ConfigResult<()> {
        let path = path.as_ref();
        config.validate()?;

        tracing::debug!(path = %path.display(), "Saving config");

        // 确保目录存在
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(path, content)?;

        tracing::info!(path = %path.display(), "Config saved successfully");
        Ok(())
    }

    /// 删除配置文件
    pub fn delete(path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
            tracing::info!(path = %path.display(), "Config deleted");
        }
        Ok(())
    }

    /// 重置为默认配置
    pub fn reset(path: impl AsRef<Path>) -> ConfigResult<TrackerConfig> {
        let config = TrackerConfig::default();
        Self::save(path, &config)?;
        tracing::info!("Config reset to defaults");
        Ok(config)
    }
}

/// 全局配置状态
///
/// 使用 ArcSwap 实现无锁读取
pub struct GlobalConfig {
    config: ArcSwap<TrackerConfig>,
}

impl GlobalConfig {
    /// 创建新的全局配置
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config: ArcSwap::new(Arc::new(config)),
        }
    }

    /// 获取当前配置
    pub fn get(&self) -> Arc<TrackerConfig> {
        self.config.load_full()
    }

    /// 更新配置
    pub fn update(&self, config: TrackerConfig) {
        self.config.store(Arc::new(config));
    }

    /// 获取分段距离单位
    pub fn distance_unit(&self) -> DistanceUnit {
        self.config.load().distance_unit
    }

    /// 更新分段距离单位
    pub fn set_distance_unit(&self, unit: DistanceUnit) {
        let mut config = (*self.config.load_full()).clone();
        config.distance_unit = unit;
        self.config.store(Arc::new(config));
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
