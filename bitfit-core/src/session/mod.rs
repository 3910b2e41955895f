//! 训练会话模块
//!
//! 负责 GPS 训练的完整生命周期：
//!
//! - 等待 GPS 锁定，过滤跳点和低精度定位
//! - 累计距离、记录分段、估算峰值速度
//! - 驱动记录后端的开始、写入和结束提交
//! - 通知观察者状态和分段变化
//!
//! # 使用示例
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bitfit_lib::activity::ActivityType;
//! use bitfit_lib::location::ManualLocationSource;
//! use bitfit_lib::session::WorkoutTracker;
//! use bitfit_lib::sink::InMemorySink;
//! use bitfit_lib::state::TrackerConfig;
//!
//! # async fn run() -> Result<(), bitfit_lib::session::TrackerError> {
//! let tracker = WorkoutTracker::new(TrackerConfig::default())?;
//! let source = ManualLocationSource::shared();
//!
//! tracker
//!     .start(ActivityType::Running, source.clone(), Arc::new(InMemorySink::new()))
//!     .await?;
//!
//! // 平台代码通过 source.push(...) 投递定位数据
//!
//! tracker.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # 状态流程
//!
//! ```text
//! 1. start()
//!    └── State: Before -> WaitingForLocationStream
//!
//! 2. 收到精度不足的定位
//!    └── State: WaitingForLocationStream -> WaitingForGpsAccuracy
//!
//! 3. 精度达标（GPS 锁定）
//!    └── State: -> Started
//!    └── 记录零距离分段，后端开始采集
//!
//! 4. stop()
//!    └── 追加最后分段，执行提交流水线
//!    └── State: Started -> Stopped | Failed
//! ```

mod error;
mod finalize;
mod observer;
mod recorder;
mod speed;
mod splits;
mod tracker;
mod workout;

pub use error::{TrackerError, TrackerResult};
pub use finalize::{finalize, FinalizationError, FinalizationStage, SavedWorkout};
pub use observer::{spawn_dispatcher, ChannelObserver, EventSender, TrackerEvent, WorkoutObserver};
pub use speed::PeakSpeedWindow;
pub use splits::{Split, SplitLog, SplitSummary};
pub use tracker::{on_workout_queue, LocationSubscriber, WorkoutTracker};
pub use workout::{FinalSummary, LocationOutcome, SessionHandles, WorkoutSession, WorkoutSnapshot};
