//! 结束训练时的提交流水线
//!
//! 严格按顺序执行：附加元数据 -> 添加距离样本 -> 结束采集 -> 完成训练与路线。
//! 任一阶段失败都会中止剩余阶段。

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use super::workout::{FinalSummary, SessionHandles};
use crate::sink::{RouteHandle, SinkError, WorkoutHandle};

/// 提交流水线的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FinalizationStage {
    /// 1. 附加峰值速度和平均速度
    AttachMetadata,
    /// 2. 添加总距离样本
    AddDistance,
    /// 3. 结束采集窗口
    EndCollection,
    /// 4a. 完成训练
    FinishWorkout,
    /// 4b. 完成路线
    FinishRoute,
}

impl FinalizationStage {
    /// 所有阶段，按执行顺序
    pub const ORDER: [FinalizationStage; 5] = [
        Self::AttachMetadata,
        Self::AddDistance,
        Self::EndCollection,
        Self::FinishWorkout,
        Self::FinishRoute,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AttachMetadata => "attach_metadata",
            Self::AddDistance => "add_distance",
            Self::EndCollection => "end_collection",
            Self::FinishWorkout => "finish_workout",
            Self::FinishRoute => "finish_route",
        }
    }
}

impl fmt::Display for FinalizationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 提交流水线错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Finalization failed at {stage}: {source}")]
pub struct FinalizationError {
    pub stage: FinalizationStage,
    #[source]
    pub source: SinkError,
}

impl FinalizationError {
    fn at(stage: FinalizationStage) -> impl FnOnce(SinkError) -> Self {
        move |source| Self { stage, source }
    }
}

/// 成功保存的训练
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedWorkout {
    pub workout: WorkoutHandle,
    pub route: RouteHandle,
}

/// 执行提交流水线
///
/// 在训练队列之外运行，结果需要重新进入队列后才能修改会话状态
pub async fn finalize(
    handles: SessionHandles,
    summary: FinalSummary,
) -> Result<SavedWorkout, FinalizationError> {
    use FinalizationStage::*;

    debug!(
        distance = summary.distance_sample.meters,
        peak_speed = summary.metadata.maximum_speed,
        average_speed = summary.metadata.average_speed,
        "Finalizing workout"
    );

    handles
        .workout
        .add_metadata(summary.metadata)
        .await
        .map_err(FinalizationError::at(AttachMetadata))?;

    handles
        .workout
        .add_samples(vec![summary.distance_sample])
        .await
        .map_err(FinalizationError::at(AddDistance))?;

    handles
        .workout
        .end_collection(summary.end)
        .await
        .map_err(FinalizationError::at(EndCollection))?;

    let workout = handles
        .workout
        .finish_workout()
        .await
        .map_err(FinalizationError::at(FinishWorkout))?
        .ok_or(FinalizationError {
            stage: FinishWorkout,
            source: SinkError::MissingWorkout,
        })?;

    let route = handles
        .route
        .finish_route(workout.clone(), None)
        .await
        .map_err(FinalizationError::at(FinishRoute))?
        .ok_or(FinalizationError {
            stage: FinishRoute,
            source: SinkError::MissingRoute,
        })?;

    info!(workout_id = workout.id, route_id = route.id, "Workout saved");
    Ok(SavedWorkout { workout, route })
}
