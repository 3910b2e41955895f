//! 训练追踪器
//!
//! 训练队列是一个独立的 tokio 任务，独占当前的 [`WorkoutSession`]，
//! 按 FIFO 顺序处理命令。`start`/`stop` 各自把一个命令交给队列并等待回复，
//! 定位源的订阅和启停都在队列之外完成。

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, trace, warn};

use super::error::{TrackerError, TrackerResult};
use super::finalize::{FinalizationError, SavedWorkout};
use super::observer::{spawn_dispatcher, EventSender, TrackerEvent, WorkoutObserver};
use super::recorder::{Recorder, RecorderJob, RecorderReport};
use super::splits::SplitSummary;
use super::workout::{SessionHandles, WorkoutSession, WorkoutSnapshot};
use crate::activity::ActivityType;
use crate::location::{LocationSample, LocationSource};
use crate::sink::{RecordingSink, SinkError};
use crate::state::{StateManager, StateTransitionContext, TrackerConfig, WorkoutState};

tokio::task_local! {
    static WORKOUT_QUEUE: ();
}

/// 当前是否在训练队列中执行
pub fn on_workout_queue() -> bool {
    WORKOUT_QUEUE.try_with(|_| ()).is_ok()
}

/// 追踪器命令
enum TrackerCommand {
    Start {
        activity: ActivityType,
        source: Arc<dyn LocationSource>,
        sink: Arc<dyn RecordingSink>,
        /// 成功时返回会话代号，失败时返回当前状态
        response: oneshot::Sender<Result<u64, WorkoutState>>,
    },
    Locations {
        generation: u64,
        batch: Vec<LocationSample>,
    },
    Stop {
        response: oneshot::Sender<TrackerResult<()>>,
    },
    Snapshot {
        response: oneshot::Sender<WorkoutSnapshot>,
    },
    Reset {
        response: oneshot::Sender<TrackerResult<()>>,
    },
    Recorder(RecorderReport),
}

impl From<RecorderReport> for TrackerCommand {
    fn from(report: RecorderReport) -> Self {
        Self::Recorder(report)
    }
}

/// 交给定位源的订阅者
///
/// 每批定位数据都会带上会话代号进入训练队列，旧会话的数据会被丢弃
pub struct LocationSubscriber {
    generation: u64,
    commands: mpsc::Sender<TrackerCommand>,
}

impl LocationSubscriber {
    /// 所属会话代号
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 投递一批定位数据，队列满时等待
    ///
    /// 队列已关闭时返回 `false`
    pub async fn deliver(&self, batch: Vec<LocationSample>) -> bool {
        self.commands
            .send(TrackerCommand::Locations {
                generation: self.generation,
                batch,
            })
            .await
            .is_ok()
    }

    /// 非阻塞投递，供同步回调使用
    ///
    /// 队列满时丢弃这批数据并返回 `false`
    pub fn try_deliver(&self, batch: Vec<LocationSample>) -> bool {
        match self.commands.try_send(TrackerCommand::Locations {
            generation: self.generation,
            batch,
        }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(generation = self.generation, "Workout queue full, location batch dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// 训练追踪器
///
/// 可以在多个任务之间共享；所有会话数据只在训练队列中修改。
pub struct WorkoutTracker {
    /// 命令发送器
    commands: mpsc::Sender<TrackerCommand>,
    /// 对外发布的状态
    state_manager: Arc<StateManager>,
    /// 当前订阅的定位源
    source: Mutex<Option<Arc<dyn LocationSource>>>,
}

impl WorkoutTracker {
    /// 创建没有观察者的追踪器
    ///
    /// 必须在 tokio 运行时中调用
    pub fn new(config: TrackerConfig) -> TrackerResult<Self> {
        Self::spawn(config, EventSender::disabled())
    }

    /// 创建带观察者的追踪器
    pub fn with_observer(
        config: TrackerConfig,
        observer: Arc<dyn WorkoutObserver>,
    ) -> TrackerResult<Self> {
        let (events, _dispatcher) = spawn_dispatcher(observer);
        Self::spawn(config, events)
    }

    fn spawn(config: TrackerConfig, events: EventSender) -> TrackerResult<Self> {
        config
            .validate()
            .map_err(|e| TrackerError::InvalidConfig(e.to_string()))?;

        let (command_tx, command_rx) = mpsc::channel::<TrackerCommand>(config.command_capacity);
        let state_manager = Arc::new(StateManager::new());

        let queue = WorkoutQueue {
            config,
            ctx: StateTransitionContext::new(Arc::clone(&state_manager), events),
            commands: command_tx.downgrade(),
            active: None,
            last: None,
            generation: 0,
        };
        tokio::spawn(WORKOUT_QUEUE.scope((), queue.run(command_rx)));

        Ok(Self {
            commands: command_tx,
            state_manager,
            source: Mutex::new(None),
        })
    }

    /// 开始训练
    ///
    /// 打开记录会话，转换到 WaitingForLocationStream，然后订阅定位源并开始定位。
    /// 整个过程持有定位源槽位，并发的 `stop` 会等到订阅完成后再取消订阅。
    ///
    /// # Panics
    ///
    /// 状态不是 Before，或者在训练队列中调用
    pub async fn start(
        &self,
        activity: ActivityType,
        source: Arc<dyn LocationSource>,
        sink: Arc<dyn RecordingSink>,
    ) -> TrackerResult<()> {
        assert!(
            !on_workout_queue(),
            "WorkoutTracker::start must not be called from the workout queue"
        );
        let current = self.state();
        assert!(
            current.is_before(),
            "WorkoutTracker::start requires state Before, found {}",
            current.name()
        );

        let mut slot = self.source.lock().await;

        let (response_tx, response_rx) = oneshot::channel();
        self.commands
            .send(TrackerCommand::Start {
                activity,
                source: Arc::clone(&source),
                sink,
                response: response_tx,
            })
            .await
            .map_err(|_| TrackerError::QueueClosed)?;

        let generation = match response_rx.await.map_err(|_| TrackerError::QueueClosed)? {
            Ok(generation) => generation,
            Err(state) => panic!(
                "WorkoutTracker::start requires state Before, found {}",
                state.name()
            ),
        };

        source.subscribe(LocationSubscriber {
            generation,
            commands: self.commands.clone(),
        });
        source.start_updating_location();
        *slot = Some(source);

        Ok(())
    }

    /// 停止训练
    ///
    /// 幂等：没有会话或正在结束时直接返回成功。
    /// 已锁定 GPS 时等待提交流水线完成后才返回。
    ///
    /// # Errors
    ///
    /// 提交流水线失败时返回 [`TrackerError::Finalization`]，此时状态已是 Failed
    ///
    /// # Panics
    ///
    /// 在训练队列中调用
    pub async fn stop(&self) -> TrackerResult<()> {
        assert!(
            !on_workout_queue(),
            "WorkoutTracker::stop must not be called from the workout queue"
        );

        if let Some(source) = self.source.lock().await.take() {
            source.stop_updating_location();
            source.unsubscribe();
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.commands
            .send(TrackerCommand::Stop {
                response: response_tx,
            })
            .await
            .map_err(|_| TrackerError::QueueClosed)?;

        response_rx.await.map_err(|_| TrackerError::QueueClosed)?
    }

    /// 获取当前状态（无锁）
    pub fn state(&self) -> WorkoutState {
        self.state_manager.current()
    }

    /// 获取训练数据快照
    ///
    /// 训练结束后保留最后一次会话的数据，直到 [`WorkoutTracker::reset`]
    pub async fn snapshot(&self) -> TrackerResult<WorkoutSnapshot> {
        let (response_tx, response_rx) = oneshot::channel();
        self.commands
            .send(TrackerCommand::Snapshot {
                response: response_tx,
            })
            .await
            .map_err(|_| TrackerError::QueueClosed)?;

        response_rx.await.map_err(|_| TrackerError::QueueClosed)
    }

    /// 从终止状态重置为 Before，以便开始新的训练
    pub async fn reset(&self) -> TrackerResult<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.commands
            .send(TrackerCommand::Reset {
                response: response_tx,
            })
            .await
            .map_err(|_| TrackerError::QueueClosed)?;

        response_rx.await.map_err(|_| TrackerError::QueueClosed)?
    }

    /// 是否有正在接收数据的记录会话
    pub async fn is_running(&self) -> TrackerResult<bool> {
        Ok(self.snapshot().await?.is_running)
    }
}

/// 训练队列中的会话
struct ActiveSession {
    generation: u64,
    session: WorkoutSession,
    source: Arc<dyn LocationSource>,
    recorder: Recorder,
    /// 正在执行提交流水线
    stopping: bool,
    /// 等待提交结果的 stop 调用
    pending_stop: Option<oneshot::Sender<TrackerResult<()>>>,
}

/// 训练队列
struct WorkoutQueue {
    config: TrackerConfig,
    ctx: StateTransitionContext,
    commands: mpsc::WeakSender<TrackerCommand>,
    active: Option<ActiveSession>,
    /// 最后结束的会话
    last: Option<WorkoutSnapshot>,
    generation: u64,
}

impl WorkoutQueue {
    async fn run(mut self, mut commands: mpsc::Receiver<TrackerCommand>) {
        debug!("Workout queue started");

        while let Some(command) = commands.recv().await {
            match command {
                TrackerCommand::Start {
                    activity,
                    source,
                    sink,
                    response,
                } => {
                    let result = self.handle_start(activity, source, &*sink);
                    let _ = response.send(result);
                }
                TrackerCommand::Locations { generation, batch } => {
                    self.handle_locations(generation, batch)
                }
                TrackerCommand::Stop { response } => self.handle_stop(response),
                TrackerCommand::Snapshot { response } => {
                    let _ = response.send(self.snapshot());
                }
                TrackerCommand::Reset { response } => {
                    let _ = response.send(self.handle_reset());
                }
                TrackerCommand::Recorder(RecorderReport::BeginCollectionFailed {
                    generation,
                    error,
                }) => self.handle_begin_failed(generation, error),
                TrackerCommand::Recorder(RecorderReport::Finalized { generation, result }) => {
                    self.handle_finalized(generation, result)
                }
            }
        }

        debug!("Workout queue stopped");
    }

    fn handle_start(
        &mut self,
        activity: ActivityType,
        source: Arc<dyn LocationSource>,
        sink: &dyn RecordingSink,
    ) -> Result<u64, WorkoutState> {
        let current = self.ctx.current();
        if !current.is_before() || self.active.is_some() {
            return Err(current);
        }
        if let Err(e) = self.ctx.begin_waiting() {
            error!(error = %e, "Failed to enter WaitingForLocationStream");
            return Err(current);
        }

        self.generation += 1;
        let generation = self.generation;
        let handles = SessionHandles::open(sink, activity);
        let session = WorkoutSession::new(activity, &self.config, handles.clone());
        let recorder = Recorder::spawn(generation, handles, self.commands.clone());

        info!(
            generation,
            activity = %activity.identifier(),
            split_distance = session.split_distance_meters(),
            "Workout started, waiting for GPS"
        );

        self.last = None;
        self.active = Some(ActiveSession {
            generation,
            session,
            source,
            recorder,
            stopping: false,
            pending_stop: None,
        });
        Ok(generation)
    }

    fn handle_locations(&mut self, generation: u64, batch: Vec<LocationSample>) {
        let Some(active) = self.active.as_mut() else {
            trace!(len = batch.len(), "No open session, location batch discarded");
            return;
        };
        if active.generation != generation || active.stopping {
            trace!(generation, "Stale location batch discarded");
            return;
        }

        let outcome = active.session.process_locations(batch, Utc::now());

        if let Err(e) = self.ctx.advance(&outcome.transitions) {
            error!(error = %e, "Failed to publish workout state");
        }
        if let Some(start) = outcome.begin_collection {
            active.recorder.submit(RecorderJob::BeginCollection(start));
        }
        if !outcome.route_points.is_empty() {
            active
                .recorder
                .submit(RecorderJob::InsertRoute(outcome.route_points));
        }
        if !outcome.new_splits.is_empty() {
            let splits = active.session.splits();
            self.ctx.emit(TrackerEvent::SplitsUpdated {
                splits: splits.to_vec(),
                summary: SplitSummary::latest(splits, false),
                is_final: false,
            });
        }
    }

    fn handle_stop(&mut self, response: oneshot::Sender<TrackerResult<()>>) {
        let Some(active) = self.active.as_mut() else {
            debug!("Stop requested without an open session");
            let _ = response.send(Ok(()));
            return;
        };
        if active.stopping {
            debug!(generation = active.generation, "Stop already in progress");
            let _ = response.send(Ok(()));
            return;
        }

        match active.session.finish(Utc::now()) {
            Some(summary) => {
                info!(
                    generation = active.generation,
                    distance = summary.distance_sample.meters,
                    splits = active.session.splits().len(),
                    "Stopping workout, finalizing recording"
                );
                let splits = active.session.splits();
                self.ctx.emit(TrackerEvent::SplitsUpdated {
                    splits: splits.to_vec(),
                    summary: SplitSummary::latest(splits, true),
                    is_final: true,
                });
                active.stopping = true;
                active.pending_stop = Some(response);
                active.recorder.submit(RecorderJob::Finalize(summary));
            }
            None => {
                // 尚未锁定 GPS，没有需要保存的数据
                info!(generation = active.generation, "Workout stopped before GPS lock");
                if let Err(e) = self.ctx.finish() {
                    error!(error = %e, "Failed to enter Stopped");
                }
                self.close_session();
                let _ = response.send(Ok(()));
            }
        }
    }

    fn handle_finalized(
        &mut self,
        generation: u64,
        result: Result<SavedWorkout, FinalizationError>,
    ) {
        match &self.active {
            Some(active) if active.generation == generation && active.stopping => {}
            _ => {
                debug!(generation, "Stale finalization report ignored");
                return;
            }
        }

        let reply = match result {
            Ok(saved) => {
                info!(workout_id = saved.workout.id, "Workout stopped");
                if let Err(e) = self.ctx.finish() {
                    error!(error = %e, "Failed to enter Stopped");
                }
                Ok(())
            }
            Err(e) => {
                error!(stage = %e.stage, error = %e.source, "Workout finalization failed");
                if let Err(e) = self.ctx.fail() {
                    error!(error = %e, "Failed to enter Failed");
                }
                Err(TrackerError::Finalization(e))
            }
        };

        if let Some(response) = self.close_session().and_then(|mut a| a.pending_stop.take()) {
            let _ = response.send(reply);
        }
    }

    fn handle_begin_failed(&mut self, generation: u64, error: SinkError) {
        let Some(active) = self.active.as_ref().filter(|a| a.generation == generation) else {
            debug!(generation, "Stale beginCollection failure ignored");
            return;
        };
        if active.stopping {
            warn!(error = %error, "beginCollection failed while stopping");
            return;
        }

        error!(error = %error, "Recording could not begin, workout failed");
        active.source.stop_updating_location();
        if let Err(e) = self.ctx.fail() {
            error!(error = %e, "Failed to enter Failed");
        }
        self.close_session();
    }

    fn handle_reset(&mut self) -> TrackerResult<()> {
        if self.active.is_some() {
            return Err(TrackerError::SessionActive(
                self.ctx.current().name().to_string(),
            ));
        }
        self.ctx.reset()?;
        self.last = None;
        Ok(())
    }

    /// 丢弃当前会话，保留最后的数据快照
    fn close_session(&mut self) -> Option<ActiveSession> {
        let active = self.active.take()?;
        self.last = Some(active.session.snapshot(self.ctx.current(), false));
        Some(active)
    }

    fn snapshot(&self) -> WorkoutSnapshot {
        let state = self.ctx.current();
        match (&self.active, &self.last) {
            (Some(active), _) => active.session.snapshot(state, !active.stopping),
            (None, Some(last)) => WorkoutSnapshot {
                state,
                ..last.clone()
            },
            (None, None) => WorkoutSnapshot::idle(state),
        }
    }
}
