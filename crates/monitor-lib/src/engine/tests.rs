//! Scenario tests for the polling engine
//!
//! These drive ticks with a scripted observation source, an in-memory store
//! and a manual clock.

use super::*;
use crate::error::MonitorError;
use crate::health::{components, ComponentStatus, HealthRegistry};
use crate::models::{
    Counts, CursorRecord, FittedModel, ModelKind, Sample, Snapshot, StatusEntry,
};
use crate::source::ObservationSource;
use crate::store::{MemoryStore, MonitorStore};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn counts(values: &[(&str, u64)]) -> Counts {
    values.iter().map(|(t, c)| (Target::from(*t), *c)).collect()
}

/// Source returning scripted counts, one entry per call
struct ScriptedSource {
    counts: Mutex<VecDeque<crate::error::Result<Counts>>>,
    log: Mutex<Vec<StatusEntry>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            counts: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    fn push_counts(&self, values: &[(&str, u64)]) {
        self.counts.lock().unwrap().push_back(Ok(counts(values)));
    }

    fn push_failure(&self) {
        self.counts
            .lock()
            .unwrap()
            .push_back(Err(MonitorError::unavailable("connection refused")));
    }

    fn log(&self, ts: DateTime<Utc>, message: &str) {
        self.log.lock().unwrap().push(StatusEntry {
            timestamp: ts,
            message: message.to_string(),
        });
    }
}

#[async_trait]
impl ObservationSource for ScriptedSource {
    async fn current_counts(&self) -> crate::error::Result<Counts> {
        let mut queue = self.counts.lock().unwrap();
        match queue.pop_front() {
            Some(result) => result,
            // The startup probe and exhausted scripts see empty counts
            None => Ok(Counts::new()),
        }
    }

    async fn new_log_entries(&self, since: Cursor) -> crate::error::Result<Vec<StatusEntry>> {
        let mut entries: Vec<StatusEntry> = self
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.timestamp > since.last_ts())
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }
}

/// Store wrapper whose writes can be made to fail per record kind
struct FlakyStore {
    inner: MemoryStore,
    fail_samples: AtomicBool,
    fail_snapshots: AtomicBool,
    fail_cursor: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_samples: AtomicBool::new(false),
            fail_snapshots: AtomicBool::new(false),
            fail_cursor: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl MonitorStore for FlakyStore {
    async fn insert_sample(&self, sample: &Sample) -> crate::error::Result<()> {
        if self.fail_samples.load(Ordering::SeqCst) {
            return Err(MonitorError::store("disk full"));
        }
        self.inner.insert_sample(sample).await
    }

    async fn insert_snapshot(&self, snapshot: &Snapshot) -> crate::error::Result<()> {
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(MonitorError::store("disk full"));
        }
        self.inner.insert_snapshot(snapshot).await
    }

    async fn insert_status(&self, entry: &StatusEntry) -> crate::error::Result<()> {
        self.inner.insert_status(entry).await
    }

    async fn insert_fitted_model(&self, model: &FittedModel) -> crate::error::Result<()> {
        self.inner.insert_fitted_model(model).await
    }

    async fn load_cursor(&self) -> crate::error::Result<Option<CursorRecord>> {
        self.inner.load_cursor().await
    }

    async fn save_cursor(&self, record: &CursorRecord) -> crate::error::Result<()> {
        if self.fail_cursor.load(Ordering::SeqCst) {
            return Err(MonitorError::store("rename failed"));
        }
        self.inner.save_cursor(record).await
    }
}

fn engine(
    source: Arc<ScriptedSource>,
    store: Arc<dyn MonitorStore>,
    clock: Arc<ManualClock>,
    config: EngineConfig,
) -> PollEngine {
    PollEngineBuilder::new()
        .source(source)
        .store(store)
        .clock(clock)
        .config(config)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_first_tick_is_baseline() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());

    let mut ctx = engine.start().await.unwrap();
    clock.advance_secs(5);
    source.push_counts(&[("files", 10), ("chunks", 0), ("candidates", 0), ("clones", 0)]);

    let report = engine.tick(&mut ctx).await.unwrap();

    assert!(report.sample.is_baseline());
    assert!(report.sample.time_per_unit.values().all(Option::is_none));
    assert!(report.sample.rate.values().all(Option::is_none));
    assert!(report.history_appended.is_empty());
    assert!(!report.snapshot_written);
    assert_eq!(store.samples().await.len(), 1);
    assert!(store.snapshots().await.is_empty());
    assert_eq!(ctx.previous.as_ref().unwrap().counts["files"], 10);
}

#[tokio::test]
async fn test_chunks_tick_appends_history_point() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());
    let mut ctx = engine.start().await.unwrap();

    source.push_counts(&[("files", 10), ("chunks", 100), ("candidates", 0), ("clones", 0)]);
    engine.tick(&mut ctx).await.unwrap();

    clock.advance_secs(5);
    source.push_counts(&[("files", 10), ("chunks", 150), ("candidates", 0), ("clones", 0)]);
    let report = engine.tick(&mut ctx).await.unwrap();

    assert_eq!(report.sample.deltas["chunks"], 50);
    assert_eq!(report.sample.time_per_unit["chunks"], Some(0.1));
    assert_eq!(report.sample.rate["chunks"], Some(10.0));
    assert_eq!(report.history_appended, vec![Target::from("chunks")]);
    assert!(report.snapshot_written);

    let history = ctx.histories.get("chunks").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.last().unwrap().count, 150);
    assert_eq!(history.last().unwrap().time_per_unit, 0.1);
    assert_eq!(ctx.histories.len_of("files"), 0);

    let snapshots = store.snapshots().await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].counts["chunks"], 150);
}

#[tokio::test]
async fn test_linear_growth_prefers_linear_model() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());
    let mut ctx = engine.start().await.unwrap();

    source.push_counts(&[("chunks", 0)]);
    engine.tick(&mut ctx).await.unwrap();

    // 100 chunks per tick over (1 + k) seconds: tpu = 0.01 + 0.0001 * count
    let mut last = None;
    for k in 1..=6u64 {
        clock.advance_secs(1 + k as i64);
        source.push_counts(&[("chunks", 100 * k)]);
        last = Some(engine.tick(&mut ctx).await.unwrap());
    }

    let report = last.unwrap();
    assert_eq!(report.models.len(), 1);

    let model = &report.models[0];
    assert_eq!(model.target.as_str(), "chunks");
    assert_eq!(model.n_points, 6);
    assert_eq!(model.preferred, ModelKind::Linear);
    assert!(model.linear.r2.unwrap() > model.exponential.r2.unwrap());
    assert!((model.linear.b.unwrap() - 0.0001).abs() < 1e-9);
    assert!((model.linear.a.unwrap() - 0.01).abs() < 1e-9);
    assert!((model.trend.slope_last_k.unwrap() - 0.0001).abs() < 1e-9);

    let stored = store.models().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], *model);
}

#[tokio::test]
async fn test_no_models_below_min_points() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());
    let mut ctx = engine.start().await.unwrap();

    for k in 0..6u64 {
        clock.advance_secs(5);
        source.push_counts(&[("files", 10 * k)]);
        let report = engine.tick(&mut ctx).await.unwrap();
        assert!(report.models.is_empty());
    }
    assert_eq!(ctx.histories.len_of("files"), 5);
    assert!(store.models().await.is_empty());
}

#[tokio::test]
async fn test_failed_tick_keeps_baseline() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());
    let mut ctx = engine.start().await.unwrap();

    source.push_counts(&[("files", 100)]);
    engine.tick(&mut ctx).await.unwrap();
    let baseline_at = ctx.previous.as_ref().unwrap().at;

    clock.advance_secs(5);
    source.push_failure();
    let err = engine.tick(&mut ctx).await.unwrap_err();
    assert!(matches!(err, MonitorError::Source(_)));
    assert_eq!(ctx.previous.as_ref().unwrap().at, baseline_at);
    assert_eq!(store.samples().await.len(), 1);

    clock.advance_secs(5);
    source.push_counts(&[("files", 200)]);
    let report = engine.tick(&mut ctx).await.unwrap();

    assert_eq!(report.sample.elapsed_seconds, Some(10.0));
    assert_eq!(report.sample.deltas["files"], 100);
    assert_eq!(report.sample.time_per_unit["files"], Some(0.1));
}

#[tokio::test]
async fn test_status_entries_advance_cursor() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());
    let mut ctx = engine.start().await.unwrap();

    source.log(t0() + chrono::Duration::seconds(2), "chunking");
    source.log(t0() + chrono::Duration::seconds(1), "reading files");
    source.push_counts(&[("files", 1)]);

    let report = engine.tick(&mut ctx).await.unwrap();

    assert_eq!(report.status_entries, 2);
    let statuses = store.statuses().await;
    let messages: Vec<&str> = statuses.iter().map(|s| s.message.as_str()).collect();
    assert_eq!(messages, vec!["reading files", "chunking"]);

    let expected = t0() + chrono::Duration::seconds(2);
    assert_eq!(ctx.cursor.last_ts(), expected);
    assert_eq!(store.load_cursor().await.unwrap().unwrap().last_ts, expected);

    // Nothing new: no duplicate emission
    source.push_counts(&[("files", 2)]);
    clock.advance_secs(5);
    let report = engine.tick(&mut ctx).await.unwrap();
    assert_eq!(report.status_entries, 0);
    assert_eq!(store.statuses().await.len(), 2);
}

#[tokio::test]
async fn test_restart_does_not_reemit_processed_entries() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));

    let first_ts = t0() - chrono::Duration::seconds(10);
    let cursor_ts = t0() - chrono::Duration::seconds(5);
    source.log(first_ts, "started");
    source.log(cursor_ts, "files done");

    {
        let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());
        let mut ctx = engine.start().await.unwrap();
        source.push_counts(&[("files", 1)]);
        engine.tick(&mut ctx).await.unwrap();
        assert_eq!(ctx.cursor.last_ts(), cursor_ts);
    }

    source.log(t0() + chrono::Duration::seconds(1), "chunks done");

    let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());
    let mut ctx = engine.start().await.unwrap();
    assert_eq!(ctx.cursor.last_ts(), cursor_ts);
    assert!(ctx.previous.is_none());

    clock.advance_secs(5);
    source.push_counts(&[("files", 5)]);
    let report = engine.tick(&mut ctx).await.unwrap();

    assert_eq!(report.status_entries, 1);
    assert!(report.sample.is_baseline());
    let statuses = store.statuses().await;
    assert_eq!(statuses.len(), 3);
    assert!(statuses[2..].iter().all(|s| s.timestamp > cursor_ts));
}

#[tokio::test]
async fn test_cursor_not_advanced_when_sample_write_fails() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(FlakyStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());
    let mut ctx = engine.start().await.unwrap();

    source.log(t0(), "started");
    source.push_counts(&[("files", 1)]);
    store.fail_samples.store(true, Ordering::SeqCst);

    let err = engine.tick(&mut ctx).await.unwrap_err();
    assert!(matches!(err, MonitorError::Store(_)));
    assert_eq!(ctx.cursor, Cursor::default());
    assert!(store.load_cursor().await.unwrap().is_none());
    assert!(ctx.previous.is_none());

    store.fail_samples.store(false, Ordering::SeqCst);
    source.push_counts(&[("files", 1)]);
    let report = engine.tick(&mut ctx).await.unwrap();
    assert_eq!(report.status_entries, 1);
    assert_eq!(ctx.cursor.last_ts(), t0());
}

#[tokio::test]
async fn test_failed_snapshot_write_does_not_double_count_growth() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(FlakyStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());
    let mut ctx = engine.start().await.unwrap();

    source.push_counts(&[("chunks", 100)]);
    engine.tick(&mut ctx).await.unwrap();

    clock.advance_secs(5);
    source.push_counts(&[("chunks", 150)]);
    store.fail_snapshots.store(true, Ordering::SeqCst);
    assert!(engine.tick(&mut ctx).await.is_err());
    assert_eq!(ctx.previous.as_ref().unwrap().counts["chunks"], 100);

    clock.advance_secs(5);
    source.push_counts(&[("chunks", 200)]);
    store.fail_snapshots.store(false, Ordering::SeqCst);
    engine.tick(&mut ctx).await.unwrap();

    let samples = store.inner.samples().await;
    assert_eq!(samples.len(), 2);
    let total: u64 = samples.iter().map(|s| s.deltas["chunks"]).sum();
    assert_eq!(total, 100);
    assert_eq!(samples[1].elapsed_seconds, Some(10.0));
}

#[tokio::test]
async fn test_failed_cursor_write_still_advances_baseline() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(FlakyStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());
    let mut ctx = engine.start().await.unwrap();

    source.push_counts(&[("chunks", 100)]);
    engine.tick(&mut ctx).await.unwrap();

    source.log(t0() + chrono::Duration::seconds(1), "chunking");
    clock.advance_secs(5);
    source.push_counts(&[("chunks", 150)]);
    store.fail_cursor.store(true, Ordering::SeqCst);

    let err = engine.tick(&mut ctx).await.unwrap_err();
    assert!(matches!(err, MonitorError::Store(_)));
    assert_eq!(ctx.previous.as_ref().unwrap().counts["chunks"], 150);
    assert_eq!(ctx.histories.len_of("chunks"), 1);
    assert_eq!(ctx.cursor, Cursor::default());

    clock.advance_secs(5);
    source.push_counts(&[("chunks", 200)]);
    store.fail_cursor.store(false, Ordering::SeqCst);
    let report = engine.tick(&mut ctx).await.unwrap();

    // Sent again after the failed cursor write
    assert_eq!(report.status_entries, 1);
    assert_eq!(report.sample.deltas["chunks"], 50);
    assert_eq!(ctx.cursor.last_ts(), t0() + chrono::Duration::seconds(1));

    let total: u64 = store
        .inner
        .samples()
        .await
        .iter()
        .map(|s| s.deltas["chunks"])
        .sum();
    assert_eq!(total, 100);
}

#[tokio::test]
async fn test_count_regression_keeps_history_by_default() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = engine(source.clone(), store.clone(), clock.clone(), EngineConfig::default());
    let mut ctx = engine.start().await.unwrap();

    for value in [0u64, 10, 20, 5] {
        clock.advance_secs(5);
        source.push_counts(&[("clones", value)]);
        let report = engine.tick(&mut ctx).await.unwrap();
        assert!(report.sample.deltas.values().all(|d| *d <= 10));
    }
    assert_eq!(ctx.histories.len_of("clones"), 2);
}

#[tokio::test]
async fn test_count_regression_resets_history_when_enabled() {
    let source = Arc::new(ScriptedSource::new());
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let config = EngineConfig {
        reset_history_on_regression: true,
        ..EngineConfig::default()
    };
    let engine = engine(source.clone(), store.clone(), clock.clone(), config);
    let mut ctx = engine.start().await.unwrap();

    for value in [0u64, 10, 20, 5, 15] {
        clock.advance_secs(5);
        source.push_counts(&[("clones", value)]);
        engine.tick(&mut ctx).await.unwrap();
    }

    let history = ctx.histories.get("clones").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.last().unwrap().count, 15);
}

#[tokio::test]
async fn test_startup_fails_when_source_unreachable() {
    let source = Arc::new(ScriptedSource::new());
    source.push_failure();
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = engine(source, store, clock, EngineConfig::default());

    assert!(matches!(
        engine.start().await.unwrap_err(),
        MonitorError::Source(_)
    ));
}

#[tokio::test]
async fn test_builder_requires_source_and_valid_config() {
    let result = PollEngineBuilder::new()
        .store(Arc::new(MemoryStore::new()))
        .build();
    assert!(matches!(result, Err(MonitorError::Config(_))));

    let config = EngineConfig {
        targets: Vec::new(),
        ..EngineConfig::default()
    };
    let result = PollEngineBuilder::new()
        .source(Arc::new(ScriptedSource::new()))
        .store(Arc::new(MemoryStore::new()))
        .config(config)
        .build();
    assert!(matches!(result, Err(MonitorError::Config(_))));
}

#[test]
fn test_engine_config_validation() {
    assert!(EngineConfig::default().validate().is_ok());

    let config = EngineConfig {
        min_points_for_fit: 1,
        ..EngineConfig::default()
    };
    assert!(config.validate().is_err());

    let config = EngineConfig {
        retention: RetentionPolicy::Capped(3),
        ..EngineConfig::default()
    };
    assert!(config.validate().is_err());

    let config = EngineConfig {
        poll_period: std::time::Duration::ZERO,
        ..EngineConfig::default()
    };
    assert!(config.validate().is_err());
}

#[tokio::test]
async fn test_run_loop_reports_health_and_stops_on_shutdown() {
    let source = Arc::new(ScriptedSource::new());
    source.push_failure();
    let store = Arc::new(MemoryStore::new());
    let health = HealthRegistry::new();
    health.register(components::SOURCE).await;

    let config = EngineConfig {
        poll_period: std::time::Duration::from_millis(10),
        ..EngineConfig::default()
    };
    let engine = PollEngineBuilder::new()
        .source(source.clone())
        .store(store.clone())
        .config(config)
        .health(health.clone())
        .build()
        .unwrap();

    let ctx = LoopContext::new(
        Cursor::default(),
        TargetHistories::new(&engine.config().targets, RetentionPolicy::Unbounded),
    );
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let handle = tokio::spawn(engine.run(ctx, shutdown_rx));

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();
    let ctx = handle.await.unwrap();

    // The first tick failed, later ticks succeeded and reset the streak
    assert_eq!(ctx.consecutive_failures, 0);
    assert!(ctx.previous.is_some());
    assert!(!store.samples().await.is_empty());
    assert_eq!(
        health.status_of(components::SOURCE).await,
        Some(ComponentStatus::Healthy)
    );
}

#[tokio::test]
async fn test_non_transient_errors_mark_poller_unhealthy_at_once() {
    let source = Arc::new(ScriptedSource::new());
    for _ in 0..1000 {
        source
            .counts
            .lock()
            .unwrap()
            .push_back(Err(MonitorError::Config("bad target list".into())));
    }
    let health = HealthRegistry::new();
    health.register(components::POLLER).await;

    let config = EngineConfig {
        poll_period: std::time::Duration::from_millis(10),
        max_consecutive_failures: 100,
        ..EngineConfig::default()
    };
    let engine = PollEngineBuilder::new()
        .source(source)
        .store(Arc::new(MemoryStore::new()))
        .config(config)
        .health(health.clone())
        .build()
        .unwrap();

    let ctx = LoopContext::default();
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let handle = tokio::spawn(engine.run(ctx, shutdown_rx));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    shutdown_tx.send(()).unwrap();
    let ctx = handle.await.unwrap();

    assert!(ctx.consecutive_failures > 0);
    assert!(ctx.consecutive_failures < 100);
    assert_eq!(
        health.status_of(components::POLLER).await,
        Some(ComponentStatus::Unhealthy)
    );
}
