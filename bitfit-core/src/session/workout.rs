//! 训练会话聚合
//!
//! [`WorkoutSession`] 持有一次训练的全部可变数据，只在训练队列中被修改。
//! 它不直接调用记录后端，而是返回 [`LocationOutcome`]，由追踪器决定如何发布与转发。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use super::speed::PeakSpeedWindow;
use super::splits::{Split, SplitLog};
use crate::activity::{ActivityType, DistanceSample, WorkoutConfiguration, WorkoutMetadata};
use crate::location::LocationSample;
use crate::sink::{RecordingSink, RouteBuilder, WorkoutBuilder};
use crate::state::{FilterThresholds, TrackerConfig, WorkoutState};

/// 一次训练打开的记录句柄
///
/// 训练构建器和路线构建器总是成对存在
#[derive(Clone)]
pub struct SessionHandles {
    pub workout: Arc<dyn WorkoutBuilder>,
    pub route: Arc<dyn RouteBuilder>,
}

impl SessionHandles {
    /// 在记录后端上打开新的训练和路线
    pub fn open(sink: &dyn RecordingSink, activity_type: ActivityType) -> Self {
        Self {
            workout: sink.new_workout_builder(WorkoutConfiguration::outdoor(activity_type)),
            route: sink.new_route_builder(),
        }
    }
}

/// 处理一批定位数据的结果
#[derive(Debug, Default)]
pub struct LocationOutcome {
    /// 按顺序发生的状态转换
    pub transitions: Vec<WorkoutState>,
    /// GPS 锁定时需要开始记录的时间
    pub begin_collection: Option<DateTime<Utc>>,
    /// 需要写入路线的定位点
    pub route_points: Vec<LocationSample>,
    /// 新增的分段
    pub new_splits: Vec<Split>,
}

/// 结束训练时提交给记录后端的数据
#[derive(Debug, Clone, PartialEq)]
pub struct FinalSummary {
    pub end: DateTime<Utc>,
    pub final_split: Split,
    pub metadata: WorkoutMetadata,
    pub distance_sample: DistanceSample,
}

/// 训练数据快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutSnapshot {
    pub state: WorkoutState,
    pub activity_type: Option<ActivityType>,
    pub distance_meters: f64,
    pub current_speed_mps: f64,
    pub peak_speed_mps: f64,
    /// GPS 锁定的时间
    pub start_date: Option<DateTime<Utc>>,
    pub splits: Vec<Split>,
    /// 是否有打开的记录会话
    pub is_running: bool,
}

impl WorkoutSnapshot {
    /// 没有任何训练数据时的快照
    pub fn idle(state: WorkoutState) -> Self {
        Self {
            state,
            activity_type: None,
            distance_meters: 0.0,
            current_speed_mps: 0.0,
            peak_speed_mps: 0.0,
            start_date: None,
            splits: Vec::new(),
            is_running: false,
        }
    }
}

/// 训练会话
pub struct WorkoutSession {
    activity_type: ActivityType,
    split_distance_meters: f64,
    thresholds: FilterThresholds,
    state: WorkoutState,
    distance_meters: f64,
    /// 等待阶段作为跳点参考，锁定后作为距离增量的起点
    last_location: Option<LocationSample>,
    speed: PeakSpeedWindow,
    splits: SplitLog,
    start_date: Option<DateTime<Utc>>,
    handles: SessionHandles,
}

impl WorkoutSession {
    /// 创建新会话，初始状态为 WaitingForLocationStream
    ///
    /// 分段距离在此时从配置读取，之后不再变化
    pub fn new(activity_type: ActivityType, config: &TrackerConfig, handles: SessionHandles) -> Self {
        let thresholds = config.thresholds;
        Self {
            activity_type,
            split_distance_meters: config.split_distance_meters(),
            thresholds,
            state: WorkoutState::WaitingForLocationStream,
            distance_meters: 0.0,
            last_location: None,
            speed: PeakSpeedWindow::new(
                thresholds.peak_speed_window,
                thresholds.max_plausible_speed_mps,
            ),
            splits: SplitLog::new(),
            start_date: None,
            handles,
        }
    }

    pub fn state(&self) -> WorkoutState {
        self.state
    }

    pub fn activity_type(&self) -> ActivityType {
        self.activity_type
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn split_distance_meters(&self) -> f64 {
        self.split_distance_meters
    }

    pub fn splits(&self) -> &[Split] {
        self.splits.as_slice()
    }

    pub fn peak_speed(&self) -> f64 {
        self.speed.peak_speed()
    }

    pub fn current_speed(&self) -> f64 {
        self.speed.current_speed()
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    pub fn handles(&self) -> &SessionHandles {
        &self.handles
    }

    /// 处理一批定位数据
    ///
    /// `now` 是 GPS 锁定时记录的开始时间
    pub fn process_locations(
        &mut self,
        batch: Vec<LocationSample>,
        now: DateTime<Utc>,
    ) -> LocationOutcome {
        let mut outcome = LocationOutcome::default();
        let received = batch.len();

        let mut admitted = if self.state.is_waiting() {
            self.acquire_gps(batch, now, &mut outcome)
        } else {
            batch
        };

        // 精度过滤在任何状态下都生效
        admitted.retain(|sample| self.accepts_accuracy(sample.horizontal_accuracy));

        if self.state.is_started() {
            self.accumulate(&admitted, &mut outcome);
            outcome.route_points = admitted;
        }

        trace!(
            received,
            admitted = outcome.route_points.len(),
            distance = self.distance_meters,
            state = %self.state.name(),
            "Location batch processed"
        );
        outcome
    }

    /// 等待 GPS 阶段的过滤
    ///
    /// 没有参考点时采用第一个样本作为参考并丢弃；距参考点过远的样本成为新参考并丢弃。
    /// 其余样本按精度判断是否锁定。
    fn acquire_gps(
        &mut self,
        batch: Vec<LocationSample>,
        now: DateTime<Utc>,
        outcome: &mut LocationOutcome,
    ) -> Vec<LocationSample> {
        let mut remaining = Vec::new();

        for sample in batch {
            let Some(reference) = &self.last_location else {
                self.last_location = Some(sample);
                continue;
            };

            let jump = sample.distance_to(reference);
            if jump > self.thresholds.jump_distance_meters {
                debug!(jump, "GPS jump while waiting, new reference adopted");
                self.last_location = Some(sample);
                continue;
            }

            if self.state.is_started() {
                // 同一批中已经锁定
                remaining.push(sample);
            } else if self.signals_lock(sample.horizontal_accuracy) {
                self.lock_gps(now, outcome);
                remaining.push(sample);
            } else if self.state == WorkoutState::WaitingForLocationStream {
                self.set_state(WorkoutState::WaitingForGpsAccuracy, outcome);
            }
        }

        remaining
    }

    fn lock_gps(&mut self, now: DateTime<Utc>, outcome: &mut LocationOutcome) {
        debug!(activity = %self.activity_type.identifier(), "GPS lock acquired");
        self.set_state(WorkoutState::Started, outcome);
        self.start_date = Some(now);
        outcome.new_splits.push(self.splits.record(now, 0.0));
        outcome.begin_collection = Some(now);
    }

    fn accumulate(&mut self, admitted: &[LocationSample], outcome: &mut LocationOutcome) {
        for sample in admitted {
            if let Some(last) = &self.last_location {
                self.distance_meters += sample.distance_to(last);

                if self
                    .splits
                    .crosses_next(self.distance_meters, self.split_distance_meters)
                {
                    match self.splits.record_crossing(sample.timestamp, self.distance_meters) {
                        Some(split) => {
                            debug!(distance = split.distance_meters, count = self.splits.len(), "Split recorded");
                            outcome.new_splits.push(split);
                        }
                        None => trace!(timestamp = %sample.timestamp, "Fix not later than last split, split deferred"),
                    }
                }
            }
            self.last_location = Some(sample.clone());
            self.speed.push(sample.clone());
        }
    }

    fn set_state(&mut self, state: WorkoutState, outcome: &mut LocationOutcome) {
        self.state = state;
        outcome.transitions.push(state);
    }

    /// 精度截断为整数后在阈值内视为锁定
    fn signals_lock(&self, accuracy: f64) -> bool {
        accuracy >= 0.0 && accuracy.trunc() <= self.thresholds.accuracy_meters
    }

    /// 负数或 NaN 精度表示无效定位
    fn accepts_accuracy(&self, accuracy: f64) -> bool {
        accuracy >= 0.0 && accuracy <= self.thresholds.accuracy_meters
    }

    /// 计算结束训练需要提交的数据，并追加最后一个分段
    ///
    /// 尚未锁定 GPS 时返回 `None`，没有需要保存的数据
    pub fn finish(&mut self, end: DateTime<Utc>) -> Option<FinalSummary> {
        let start = self.start_date?;

        let final_split = self.splits.record(end, self.distance_meters);
        let elapsed = (end - start).num_milliseconds() as f64 / 1000.0;
        let average_speed = if elapsed > 0.0 {
            self.distance_meters / elapsed
        } else {
            0.0
        };

        Some(FinalSummary {
            end,
            final_split,
            metadata: WorkoutMetadata {
                maximum_speed: self.speed.peak_speed(),
                average_speed,
            },
            distance_sample: DistanceSample {
                distance_type: self.activity_type.distance_type(),
                meters: self.distance_meters,
                start,
                end,
            },
        })
    }

    /// 当前数据快照
    pub fn snapshot(&self, state: WorkoutState, is_running: bool) -> WorkoutSnapshot {
        WorkoutSnapshot {
            state,
            activity_type: Some(self.activity_type),
            distance_meters: self.distance_meters,
            current_speed_mps: self.speed.current_speed(),
            peak_speed_mps: self.speed.peak_speed(),
            start_date: self.start_date,
            splits: self.splits.to_vec(),
            is_running,
        }
    }
}
