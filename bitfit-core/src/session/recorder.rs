//! 记录后端写入任务
//!
//! 每个训练会话对应一个写入任务，按提交顺序依次执行所有后端调用，
//! 保证开始采集、路线写入和结束提交之间的先后关系。
//! 任务在训练队列之外运行，结果通过命令通道重新进入队列。

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::finalize::{finalize, FinalizationError, SavedWorkout};
use super::workout::{FinalSummary, SessionHandles};
use crate::location::LocationSample;
use crate::sink::SinkError;

/// 写入任务
#[derive(Debug)]
pub enum RecorderJob {
    /// GPS 锁定后开始采集
    BeginCollection(DateTime<Utc>),
    /// 写入路线点（失败只记录日志）
    InsertRoute(Vec<LocationSample>),
    /// 执行提交流水线
    Finalize(FinalSummary),
}

/// 需要回到训练队列处理的结果
#[derive(Debug)]
pub enum RecorderReport {
    BeginCollectionFailed {
        generation: u64,
        error: SinkError,
    },
    Finalized {
        generation: u64,
        result: Result<SavedWorkout, FinalizationError>,
    },
}

/// 写入任务句柄
pub struct Recorder {
    jobs: mpsc::UnboundedSender<RecorderJob>,
}

impl Recorder {
    /// 启动写入任务
    ///
    /// `reports` 使用弱引用，写入任务不会让训练队列保持存活
    pub fn spawn<C>(generation: u64, handles: SessionHandles, reports: mpsc::WeakSender<C>) -> Self
    where
        C: From<RecorderReport> + Send + 'static,
    {
        let (jobs, mut rx) = mpsc::unbounded_channel::<RecorderJob>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let report = match job {
                    RecorderJob::BeginCollection(start) => {
                        match handles.workout.begin_collection(start).await {
                            Ok(()) => {
                                debug!(generation, "Collection begun");
                                None
                            }
                            Err(error) => {
                                warn!(generation, error = %error, "Failed to begin collection");
                                Some(RecorderReport::BeginCollectionFailed { generation, error })
                            }
                        }
                    }
                    RecorderJob::InsertRoute(points) => {
                        let count = points.len();
                        if let Err(e) = handles.route.insert_route_data(points).await {
                            warn!(generation, points = count, error = %e, "Failed to insert route data");
                        }
                        None
                    }
                    RecorderJob::Finalize(summary) => {
                        let result = finalize(handles.clone(), summary).await;
                        Some(RecorderReport::Finalized { generation, result })
                    }
                };

                if let Some(report) = report {
                    let Some(reports) = reports.upgrade() else {
                        debug!(generation, "Workout queue gone, report dropped");
                        break;
                    };
                    if reports.send(C::from(report)).await.is_err() {
                        break;
                    }
                }
            }
            debug!(generation, "Recorder stopped");
        });

        Self { jobs }
    }

    /// 提交任务
    pub fn submit(&self, job: RecorderJob) {
        if self.jobs.send(job).is_err() {
            warn!("Recorder stopped, job dropped");
        }
    }
}
