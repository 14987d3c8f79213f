//! Delta and rate calculation between consecutive observations

use crate::models::{Counts, Observation, Sample, Snapshot, Target};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Output of comparing two observations
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaOutcome {
    pub sample: Sample,
    /// Present only when some target's count changed
    pub snapshot: Option<Snapshot>,
    /// Targets whose count went down since the previous observation
    pub regressed: Vec<Target>,
}

impl DeltaOutcome {
    /// Targets with a non-null time-per-unit in this sample
    pub fn produced(&self) -> impl Iterator<Item = (&Target, u64, f64)> + '_ {
        self.sample.time_per_unit.iter().filter_map(|(target, tpu)| {
            let tpu = (*tpu)?;
            let count = self.sample.counts.get(target).copied().unwrap_or(0);
            Some((target, count, tpu))
        })
    }
}

/// Seconds between two instants, with sub-second precision
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Computes deltas, time-per-unit and rates for a fixed set of targets
#[derive(Debug, Clone)]
pub struct DeltaCalculator {
    targets: Vec<Target>,
}

impl DeltaCalculator {
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Compare `current` with `previous`.
    ///
    /// Without a previous observation, or with an unknown or non-positive
    /// elapsed time, the result is a baseline sample: zero deltas and null
    /// derived fields.
    pub fn compute(
        &self,
        previous: Option<&Observation>,
        current: &Observation,
        elapsed: Option<f64>,
    ) -> DeltaOutcome {
        match (previous, elapsed) {
            (Some(prev), Some(secs)) if secs > 0.0 => self.compare(prev, current, secs),
            _ => self.baseline(previous, current),
        }
    }

    fn baseline(&self, previous: Option<&Observation>, current: &Observation) -> DeltaOutcome {
        let counts = self.resolve_counts(previous, current);
        let deltas = self.targets.iter().map(|t| (t.clone(), 0)).collect();
        let nulls: BTreeMap<Target, Option<f64>> =
            self.targets.iter().map(|t| (t.clone(), None)).collect();

        DeltaOutcome {
            sample: Sample {
                ts: current.at,
                counts,
                deltas,
                elapsed_seconds: None,
                time_per_unit: nulls.clone(),
                rate: nulls,
            },
            snapshot: None,
            regressed: Vec::new(),
        }
    }

    fn compare(&self, previous: &Observation, current: &Observation, secs: f64) -> DeltaOutcome {
        let counts = self.resolve_counts(Some(previous), current);

        let mut deltas = Counts::new();
        let mut time_per_unit = BTreeMap::new();
        let mut rate = BTreeMap::new();
        let mut regressed = Vec::new();

        for target in &self.targets {
            let now = counts.get(target).copied().unwrap_or(0);
            let before = previous.counts.get(target).copied().unwrap_or(0);
            if now < before {
                regressed.push(target.clone());
            }

            let delta = now.saturating_sub(before);
            let tpu = (delta > 0).then(|| secs / delta as f64);

            deltas.insert(target.clone(), delta);
            time_per_unit.insert(target.clone(), tpu);
            rate.insert(target.clone(), Some(delta as f64 / secs));
        }

        let snapshot = deltas.values().any(|d| *d != 0).then(|| Snapshot {
            ts: current.at,
            counts: counts.clone(),
        });

        DeltaOutcome {
            sample: Sample {
                ts: current.at,
                counts,
                deltas,
                elapsed_seconds: Some(secs),
                time_per_unit,
                rate,
            },
            snapshot,
            regressed,
        }
    }

    /// Counts for every tracked target; a target missing from the current
    /// observation keeps its previous count
    fn resolve_counts(&self, previous: Option<&Observation>, current: &Observation) -> Counts {
        self.targets
            .iter()
            .map(|t| {
                let count = current
                    .counts
                    .get(t)
                    .or_else(|| previous.and_then(|p| p.counts.get(t)))
                    .copied()
                    .unwrap_or(0);
                (t.clone(), count)
            })
            .collect()
    }
}
