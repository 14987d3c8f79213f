//! Polling loop and its explicit loop state
//!
//! All mutable state of the loop lives in a [`LoopContext`] that is passed
//! into every tick, so ticks can be driven with scripted observations and a
//! [`ManualClock`] without a running loop.

mod clock;
mod poll;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use poll::{PollEngine, PollEngineBuilder, TickReport};

use crate::error::{MonitorError, Result};
use crate::history::{RetentionPolicy, TargetHistories};
use crate::models::{Cursor, Observation, Target};
use crate::regression::{DEFAULT_MIN_POINTS_FOR_FIT, DEFAULT_TREND_WINDOW};
use std::time::Duration;

/// Targets tracked when none are configured
pub const DEFAULT_TARGETS: &[&str] = &["files", "chunks", "candidates", "clones"];

/// Configuration of the polling engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed set of tracked counters
    pub targets: Vec<Target>,
    /// Period between tick starts (default: 5 seconds)
    pub poll_period: Duration,
    /// History length required before models are fitted (default: 6)
    pub min_points_for_fit: usize,
    /// Trailing window of the trend slope (default: 6)
    pub trend_window: usize,
    /// Per-target history retention (default: unbounded)
    pub retention: RetentionPolicy,
    /// Clear a target's history when its count goes down (default: false)
    pub reset_history_on_regression: bool,
    /// Consecutive failed ticks before the poller reports unhealthy
    pub max_consecutive_failures: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            targets: DEFAULT_TARGETS.iter().copied().map(Target::from).collect(),
            poll_period: Duration::from_secs(5),
            min_points_for_fit: DEFAULT_MIN_POINTS_FOR_FIT,
            trend_window: DEFAULT_TREND_WINDOW,
            retention: RetentionPolicy::Unbounded,
            reset_history_on_regression: false,
            max_consecutive_failures: 5,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(MonitorError::Config("at least one target is required".into()));
        }
        if self.poll_period.is_zero() {
            return Err(MonitorError::Config("poll period must be positive".into()));
        }
        if self.min_points_for_fit < 2 {
            return Err(MonitorError::Config(
                "min_points_for_fit must be at least 2".into(),
            ));
        }
        if self.trend_window < 2 {
            return Err(MonitorError::Config("trend_window must be at least 2".into()));
        }
        if let RetentionPolicy::Capped(cap) = self.retention {
            if cap < self.min_points_for_fit {
                return Err(MonitorError::Config(format!(
                    "history capacity {} is below min_points_for_fit {}",
                    cap, self.min_points_for_fit
                )));
            }
        }
        Ok(())
    }
}

/// Mutable state carried from one tick to the next
#[derive(Debug, Clone, Default)]
pub struct LoopContext {
    /// Last committed observation, the delta baseline of the next tick
    pub previous: Option<Observation>,
    pub histories: TargetHistories,
    /// Position in the status log already processed
    pub cursor: Cursor,
    pub consecutive_failures: u32,
}

impl LoopContext {
    pub fn new(cursor: Cursor, histories: TargetHistories) -> Self {
        Self {
            previous: None,
            histories,
            cursor,
            consecutive_failures: 0,
        }
    }
}
