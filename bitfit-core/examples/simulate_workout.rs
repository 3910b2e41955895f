//! 模拟一次户外跑步
//!
//! 用手动定位源和内存记录后端走完整个训练流程，打印状态变化和分段
//!
//! 运行: cargo run --example simulate_workout

use std::sync::Arc;

use anyhow::Context;
use bitfit_lib::activity::{ActivityType, DistanceUnit};
use bitfit_lib::location::{destination, LocationSample, ManualLocationSource};
use bitfit_lib::session::{ChannelObserver, TrackerEvent, WorkoutTracker};
use bitfit_lib::sink::InMemorySink;
use bitfit_lib::state::{GlobalConfig, StateChangeEvent};
use bitfit_lib::utils::logging::init_logging;
use chrono::{Duration, Utc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    println!("=== 训练模拟 ===\n");

    // 1. 创建追踪器
    println!("1. 创建追踪器");
    println!("{}", "-".repeat(40));

    // 设置页修改的是全局配置，训练开始时取出一份快照
    let settings = GlobalConfig::default();
    settings.set_distance_unit(DistanceUnit::Kilometers);
    let config = (*settings.get()).clone();
    println!("  分段距离: {} 米", config.split_distance_meters());

    let (observer, mut events) = ChannelObserver::new();
    let tracker = WorkoutTracker::with_observer(config, observer).context("创建追踪器失败")?;
    let source = ManualLocationSource::shared();
    let sink = InMemorySink::new();

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                TrackerEvent::StateChanged(state) => {
                    let payload = serde_json::to_string(&StateChangeEvent::from(&state))
                        .unwrap_or_default();
                    println!("  [状态] {}", payload);
                }
                TrackerEvent::SplitsUpdated {
                    splits,
                    summary,
                    is_final,
                } => {
                    println!("  [分段] 共 {} 个 (最终: {})", splits.len(), is_final);
                    if let Some(summary) = summary {
                        println!(
                            "         第 {} 段 {:.0} 秒，{:.2} 米/秒",
                            summary.index, summary.duration_seconds, summary.speed_mps
                        );
                    }
                }
            }
        }
    });
    println!();

    // 2. 开始训练
    println!("2. 开始训练");
    println!("{}", "-".repeat(40));

    tracker
        .start(ActivityType::Running, source.clone(), Arc::new(sink.clone()))
        .await
        .context("开始训练失败")?;
    println!();

    // 3. 投递定位数据：先是精度不足的冷启动，然后以 3.2 米/秒跑 2.2 公里
    println!("3. 投递定位数据");
    println!("{}", "-".repeat(40));

    let t0 = Utc::now();
    let fix = |meters: f64, accuracy: f64, second: i64| {
        let (lat, lon) = destination(31.2304, 121.4737, 45.0, meters);
        LocationSample::new(lat, lon, accuracy, 3.2, t0 + Duration::seconds(second))
    };

    source
        .push(vec![fix(0.0, 65.0, 0), fix(2.0, 40.0, 1)])
        .await;

    let track: Vec<_> = (2..=690).map(|i| fix(i as f64 * 3.2, 6.0, i)).collect();
    for batch in track.chunks(30) {
        source.push(batch.to_vec()).await;
    }

    let snapshot = tracker.snapshot().await?;
    println!(
        "  距离 {:.1} 米，当前速度 {:.2} 米/秒，峰值 {:.2} 米/秒",
        snapshot.distance_meters, snapshot.current_speed_mps, snapshot.peak_speed_mps
    );
    println!();

    // 4. 结束训练
    println!("4. 结束训练");
    println!("{}", "-".repeat(40));

    tracker.stop().await.context("保存训练失败")?;

    for workout in sink.finished_workouts().await {
        println!(
            "  已保存训练 #{}，路线点 {} 个",
            workout.handle.id,
            workout.route_points.len()
        );
    }

    let snapshot = tracker.snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    drop(tracker);
    printer.abort();

    println!("\n=== 模拟完成 ===");
    Ok(())
}
