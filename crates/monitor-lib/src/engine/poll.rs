//! Polling engine
//!
//! One tick queries the observation source, records the sample and any new
//! status entries, advances the cursor, grows the per-target histories and
//! fits cost models. The loop sleeps for the remainder of the poll period
//! after each tick.

use super::{Clock, EngineConfig, LoopContext, SystemClock};
use crate::delta::{elapsed_seconds, DeltaCalculator};
use crate::error::{MonitorError, Result};
use crate::health::{components, HealthRegistry};
use crate::history::{HistoryPoint, TargetHistories};
use crate::models::{Cursor, CursorRecord, FittedModel, Observation, Sample, Target};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::regression::ModelFitter;
use crate::source::ObservationSource;
use crate::store::MonitorStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

/// What one successful tick produced
#[derive(Debug, Clone)]
pub struct TickReport {
    pub sample: Sample,
    pub snapshot_written: bool,
    pub status_entries: usize,
    /// Targets that received a history point this tick
    pub history_appended: Vec<Target>,
    /// Models persisted this tick
    pub models: Vec<FittedModel>,
}

/// Sampling and regression engine driven by a fixed-period loop
pub struct PollEngine {
    source: Arc<dyn ObservationSource>,
    store: Arc<dyn MonitorStore>,
    clock: Arc<dyn Clock>,
    calculator: DeltaCalculator,
    fitter: ModelFitter,
    config: EngineConfig,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl PollEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load the persisted cursor and make first contact with the source.
    ///
    /// An unreachable source here is returned as an error instead of being
    /// retried, so the operator sees it at startup.
    pub async fn start(&self) -> Result<LoopContext> {
        let cursor = match self.store.load_cursor().await? {
            Some(record) => Cursor(record.last_ts),
            None => Cursor::default(),
        };

        let counts = self.source.current_counts().await?;
        debug!(targets = counts.len(), "Observation source reachable");

        let histories = TargetHistories::new(&self.config.targets, self.config.retention);
        info!(
            last_status_ts = %cursor.last_ts().to_rfc3339(),
            "Resuming status log"
        );

        Ok(LoopContext::new(cursor, histories))
    }

    /// Run one tick against `ctx`.
    ///
    /// The sample write is the commit point. Any error before it leaves
    /// `ctx` untouched. Once the sample is durable the baseline and histories
    /// always advance; a failed cursor write after that only keeps the cursor
    /// where it was, so the status entries are sent again next tick, and the
    /// error is still returned.
    pub async fn tick(&self, ctx: &mut LoopContext) -> Result<TickReport> {
        let counts = self.source.current_counts().await?;
        let entries = self.source.new_log_entries(ctx.cursor).await?;

        let now = self.clock.now();
        let current = Observation::new(now, counts);
        let elapsed = ctx.previous.as_ref().map(|p| elapsed_seconds(p.at, now));
        let outcome = self
            .calculator
            .compute(ctx.previous.as_ref(), &current, elapsed);

        let mut staged = ctx.cursor;
        for entry in &entries {
            self.logger.log_status_update(entry);
            self.store.insert_status(entry).await?;
            staged.advance(entry.timestamp);
        }

        if let Some(snapshot) = &outcome.snapshot {
            self.store.insert_snapshot(snapshot).await?;
            self.metrics.inc_snapshots_written();
        }

        self.store.insert_sample(&outcome.sample).await?;
        self.metrics.record_sample(&outcome.sample);
        self.logger.log_sample(&outcome.sample);

        // Committed: the stored sample and the next delta share this baseline
        ctx.previous = Some(Observation::new(now, outcome.sample.counts.clone()));

        let cursor_saved = if staged != ctx.cursor {
            self.store
                .save_cursor(&CursorRecord::new(staged, self.clock.now()))
                .await
        } else {
            Ok(())
        };

        if self.config.reset_history_on_regression {
            for target in &outcome.regressed {
                let dropped = ctx.histories.len_of(target.as_str());
                if dropped > 0 {
                    ctx.histories.reset(target);
                    self.logger.log_history_reset(target, dropped);
                }
            }
        }

        let mut history_appended = Vec::new();
        for (target, count, time_per_unit) in outcome.produced() {
            let point = HistoryPoint {
                count,
                time_per_unit,
            };
            if ctx.histories.push(target, point) {
                history_appended.push(target.clone());
            }
        }

        let models = self.fit_models(&ctx.histories).await;

        cursor_saved?;
        if staged != ctx.cursor {
            ctx.cursor = staged;
            self.metrics.inc_status_entries(entries.len() as u64);
        }

        Ok(TickReport {
            sample: outcome.sample,
            snapshot_written: outcome.snapshot.is_some(),
            status_entries: entries.len(),
            history_appended,
            models,
        })
    }

    async fn fit_models(&self, histories: &TargetHistories) -> Vec<FittedModel> {
        let mut models = Vec::new();

        for (target, history) in histories.iter() {
            self.metrics.set_history_points(target, history.len());

            let (counts, tpus) = history.series();
            let Some(evaluation) = self.fitter.evaluate(&counts, &tpus) else {
                continue;
            };

            let model = evaluation.into_record(target.clone(), self.clock.now());
            match self.store.insert_fitted_model(&model).await {
                Ok(()) => {
                    self.metrics.record_model(&model);
                    self.logger.log_fitted_model(&model);
                    models.push(model);
                }
                Err(e) => self.logger.log_model_persist_failed(target, &e),
            }
        }

        models
    }

    /// Run ticks until `shutdown` fires, returning the final loop context.
    ///
    /// A tick in flight when the signal arrives runs to completion.
    pub async fn run(
        self,
        mut ctx: LoopContext,
        mut shutdown: broadcast::Receiver<()>,
    ) -> LoopContext {
        info!(
            poll_secs = self.config.poll_period.as_secs_f64(),
            targets = self.config.targets.len(),
            "Starting polling loop"
        );

        loop {
            let started = Instant::now();

            match self.tick(&mut ctx).await {
                Ok(report) => {
                    ctx.consecutive_failures = 0;
                    debug!(
                        status_entries = report.status_entries,
                        history_appended = report.history_appended.len(),
                        models = report.models.len(),
                        "Tick complete"
                    );
                    self.report_healthy().await;
                }
                Err(e) => {
                    ctx.consecutive_failures = ctx.consecutive_failures.saturating_add(1);
                    self.metrics.inc_tick_errors();
                    self.logger.log_tick_failed(&e, ctx.consecutive_failures);
                    self.report_failure(&e, ctx.consecutive_failures).await;
                }
            }

            let elapsed = started.elapsed();
            self.metrics.observe_tick_latency(elapsed.as_secs_f64());

            let delay = self.config.poll_period.saturating_sub(elapsed);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    info!("Shutting down polling loop");
                    break;
                }
            }
        }

        ctx
    }

    async fn report_healthy(&self) {
        if let Some(health) = &self.health {
            health.set_healthy(components::POLLER).await;
            health.set_healthy(components::SOURCE).await;
            health.set_healthy(components::STORE).await;
        }
    }

    async fn report_failure(&self, error: &MonitorError, consecutive: u32) {
        let Some(health) = &self.health else {
            return;
        };
        // Errors that retrying cannot clear escalate immediately
        let consecutive = if error.is_transient() {
            consecutive
        } else {
            self.config.max_consecutive_failures
        };
        let component = match error {
            MonitorError::Source(_) => components::SOURCE,
            MonitorError::Store(_) => components::STORE,
            _ => components::POLLER,
        };
        health
            .report_failure(
                component,
                error.to_string(),
                consecutive,
                self.config.max_consecutive_failures,
            )
            .await;
    }
}

/// Builder for the polling engine
pub struct PollEngineBuilder {
    source: Option<Arc<dyn ObservationSource>>,
    store: Option<Arc<dyn MonitorStore>>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    metrics: Option<MonitorMetrics>,
    logger: Option<StructuredLogger>,
    health: Option<HealthRegistry>,
}

impl PollEngineBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            store: None,
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
            metrics: None,
            logger: None,
            health: None,
        }
    }

    pub fn source(mut self, source: Arc<dyn ObservationSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn store(mut self, store: Arc<dyn MonitorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metrics(mut self, metrics: MonitorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn build(self) -> Result<PollEngine> {
        let source = self
            .source
            .ok_or_else(|| MonitorError::Config("observation source is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| MonitorError::Config("store is required".into()))?;
        self.config.validate()?;

        Ok(PollEngine {
            source,
            store,
            clock: self.clock,
            calculator: DeltaCalculator::new(self.config.targets.clone()),
            fitter: ModelFitter::new(self.config.min_points_for_fit, self.config.trend_window),
            metrics: self.metrics.unwrap_or_default(),
            logger: self
                .logger
                .unwrap_or_else(|| StructuredLogger::new("throughput-monitor")),
            health: self.health,
            config: self.config,
        })
    }
}

impl Default for PollEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
