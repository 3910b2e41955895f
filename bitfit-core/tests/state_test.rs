use bitfit_lib::activity::DistanceUnit;
use bitfit_lib::state::{
    ConfigManager, GlobalConfig, StateChangeEvent, StateError, StateManager, TrackerConfig,
    WorkoutState,
};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

#[tokio::test]
async fn test_state_manager_default() {
    let manager = StateManager::default();
    assert!(manager.current().is_before());
}

#[tokio::test]
async fn test_complete_workflow() {
    let manager = StateManager::new();

    // 1. Before -> WaitingForLocationStream
    assert!(manager.transition(WorkoutState::WaitingForLocationStream).is_ok());
    assert!(manager.current().is_waiting());

    // 2. WaitingForLocationStream -> WaitingForGpsAccuracy
    assert!(manager.transition(WorkoutState::WaitingForGpsAccuracy).is_ok());
    assert!(manager.current().is_waiting());

    // 3. WaitingForGpsAccuracy -> Started
    assert!(manager.transition(WorkoutState::Started).is_ok());
    assert!(manager.current().is_started());

    // 4. Started -> Stopped
    assert!(manager.transition(WorkoutState::Stopped).is_ok());
    assert!(manager.current().is_terminal());
    assert!(!manager.current().is_failed());

    // 5. Stopped -> Before
    assert!(manager.transition(WorkoutState::Before).is_ok());
    assert!(manager.current().is_before());
}

#[tokio::test]
async fn test_lock_in_first_batch_skips_accuracy_wait() {
    let manager = StateManager::new();

    manager.transition(WorkoutState::WaitingForLocationStream).unwrap();
    assert!(manager.transition(WorkoutState::Started).is_ok());
}

#[tokio::test]
async fn test_failure_path() {
    let manager = StateManager::new();

    manager.transition(WorkoutState::WaitingForLocationStream).unwrap();
    manager.transition(WorkoutState::Started).unwrap();

    // Started -> Failed
    assert!(manager.transition(WorkoutState::Failed).is_ok());
    assert!(manager.current().is_failed());

    // Failed is terminal: no second failure, no stop
    assert!(manager.transition(WorkoutState::Failed).is_err());
    assert!(manager.transition(WorkoutState::Stopped).is_err());

    // Failed -> Before
    assert!(manager.transition(WorkoutState::Before).is_ok());
}

#[tokio::test]
async fn test_invalid_transition_error() {
    let manager = StateManager::new();
    manager.transition(WorkoutState::WaitingForLocationStream).unwrap();
    manager.transition(WorkoutState::WaitingForGpsAccuracy).unwrap();

    let err = manager
        .transition(WorkoutState::WaitingForLocationStream)
        .unwrap_err();
    assert_eq!(
        err,
        StateError::InvalidTransition {
            from: WorkoutState::WaitingForGpsAccuracy,
            to: WorkoutState::WaitingForLocationStream,
        }
    );
    assert!(err.to_string().contains("WaitingForGpsAccuracy"));

    // 状态保持不变
    assert_eq!(manager.current(), WorkoutState::WaitingForGpsAccuracy);
}

#[tokio::test]
async fn test_concurrent_reads() {
    let manager = Arc::new(StateManager::new());

    let writer = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager.transition(WorkoutState::WaitingForLocationStream).unwrap();
            sleep(Duration::from_millis(5)).await;
            manager.transition(WorkoutState::Started).unwrap();
            sleep(Duration::from_millis(5)).await;
            manager.transition(WorkoutState::Stopped).unwrap();
        })
    };

    let mut readers = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                // 读取到的总是某个完整的状态
                let state = manager.current();
                assert_ne!(state, WorkoutState::Paused);
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(manager.current(), WorkoutState::Stopped);
}

#[test]
fn test_state_change_event_payload() {
    let event = StateChangeEvent::from(&WorkoutState::WaitingForGpsAccuracy);
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["state"], "WaitingForGpsAccuracy");
    assert_eq!(json["is_waiting"], true);
    assert_eq!(json["is_terminal"], false);
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bitfit.json");

    let mut config = TrackerConfig::with_unit(DistanceUnit::Kilometers);
    config.thresholds.accuracy_meters = 20.0;
    ConfigManager::save(&path, &config).unwrap();

    let loaded = ConfigManager::load(&path).unwrap();
    assert_eq!(loaded.distance_unit, DistanceUnit::Kilometers);
    assert_eq!(loaded.thresholds.accuracy_meters, 20.0);
    assert_eq!(loaded.split_distance_meters(), 1000.0);
}

#[test]
fn test_global_config_snapshot_is_stable() {
    let global = GlobalConfig::default();
    let snapshot = global.get();

    global.set_distance_unit(DistanceUnit::Kilometers);

    // 已取出的配置不受后续修改影响
    assert_eq!(snapshot.distance_unit, DistanceUnit::Miles);
    assert_eq!(global.distance_unit(), DistanceUnit::Kilometers);
}
