//! Per-target history of `(accumulated_count, time_per_unit)` points
//!
//! The history is owned by the polling loop and never shared with readers;
//! query endpoints read the durable store instead.

use crate::models::Target;
use std::collections::{BTreeMap, VecDeque};

/// One point of a target's cost curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    /// Count of the target when the point was taken
    pub count: u64,
    /// Seconds per produced unit during the tick
    pub time_per_unit: f64,
}

/// How many points each target's history keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Grow for the lifetime of the process
    #[default]
    Unbounded,
    /// Keep only the most recent N points, evicting the oldest first
    Capped(usize),
}

impl RetentionPolicy {
    /// `0` means unbounded
    pub fn from_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            RetentionPolicy::Unbounded
        } else {
            RetentionPolicy::Capped(capacity)
        }
    }
}

/// Chronological history for one target
#[derive(Debug, Clone, Default)]
pub struct HistoryBuffer {
    points: VecDeque<HistoryPoint>,
    retention: RetentionPolicy,
}

impl HistoryBuffer {
    pub fn new(retention: RetentionPolicy) -> Self {
        let points = match retention {
            RetentionPolicy::Capped(cap) => VecDeque::with_capacity(cap.min(10_000)),
            RetentionPolicy::Unbounded => VecDeque::new(),
        };
        Self { points, retention }
    }

    /// Append a point, evicting the oldest ones beyond the cap
    pub fn push(&mut self, point: HistoryPoint) {
        if let RetentionPolicy::Capped(cap) = self.retention {
            while self.points.len() >= cap.max(1) {
                self.points.pop_front();
            }
        }
        self.points.push_back(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }

    /// Counts and time-per-unit values as parallel series for fitting
    pub fn series(&self) -> (Vec<f64>, Vec<f64>) {
        self.points
            .iter()
            .map(|p| (p.count as f64, p.time_per_unit))
            .unzip()
    }
}

/// History buffers for the fixed set of tracked targets
#[derive(Debug, Clone, Default)]
pub struct TargetHistories {
    buffers: BTreeMap<Target, HistoryBuffer>,
}

impl TargetHistories {
    pub fn new(targets: &[Target], retention: RetentionPolicy) -> Self {
        let buffers = targets
            .iter()
            .map(|t| (t.clone(), HistoryBuffer::new(retention)))
            .collect();
        Self { buffers }
    }

    /// Append to a tracked target; untracked targets are ignored
    pub fn push(&mut self, target: &Target, point: HistoryPoint) -> bool {
        match self.buffers.get_mut(target) {
            Some(buffer) => {
                buffer.push(point);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self, target: &Target) {
        if let Some(buffer) = self.buffers.get_mut(target) {
            buffer.clear();
        }
    }

    pub fn get(&self, target: &str) -> Option<&HistoryBuffer> {
        self.buffers.get(target)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Target, &HistoryBuffer)> {
        self.buffers.iter()
    }

    pub fn len_of(&self, target: &str) -> usize {
        self.get(target).map(HistoryBuffer::len).unwrap_or(0)
    }
}
