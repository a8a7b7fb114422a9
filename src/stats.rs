use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::estimator::SpeedEstimator;

// Fast window: reacts within the last minute or so of reports.
const FAST_CAPACITY: usize = 12;
const FAST_MIN_INTERVAL_SECS: i64 = 5;
// Slow window: covers roughly the last ten minutes.
const SLOW_CAPACITY: usize = 9;
const SLOW_MIN_INTERVAL_SECS: i64 = 60;

/// Last known position of a projector at a given time. Replaced wholesale on
/// every progress report, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimestampedCheckpoint {
    pub checkpoint: i64,
    pub timestamp_utc: DateTime<Utc>,
}

/// Named value attached to a projector; last write per key wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub value: String,
    pub timestamp_utc: DateTime<Utc>,
}

/// One entry in a projector's append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub body: String,
    pub timestamp_utc: DateTime<Utc>,
}

// Checkpoint and both estimator windows live behind one lock so a reader can
// never observe the checkpoint advanced without the windows (or vice versa).
struct Progress {
    last: Option<TimestampedCheckpoint>,
    fast: SpeedEstimator,
    slow: SpeedEstimator,
}

/// Statistics and runtime information about one projector.
///
/// Safe for concurrent use: properties live in a concurrent map, the event log
/// and the progress state each sit behind their own mutex so event-logging
/// traffic never queues behind progress tracking.
pub struct ProjectorStats {
    id: String,
    properties: DashMap<String, Property>,
    events: Mutex<Vec<Event>>,
    progress: Mutex<Progress>,
}

impl ProjectorStats {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: DashMap::new(),
            events: Mutex::new(Vec::new()),
            progress: Mutex::new(Progress {
                last: None,
                fast: SpeedEstimator::new(
                    FAST_CAPACITY,
                    TimeDelta::seconds(FAST_MIN_INTERVAL_SECS),
                ),
                slow: SpeedEstimator::new(
                    SLOW_CAPACITY,
                    TimeDelta::seconds(SLOW_MIN_INTERVAL_SECS),
                ),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Upsert a property; overwriting an existing key is normal.
    pub fn store_property(&self, key: impl Into<String>, value: impl Into<String>, timestamp_utc: DateTime<Utc>) {
        self.properties.insert(
            key.into(),
            Property {
                value: value.into(),
                timestamp_utc,
            },
        );
    }

    /// Snapshot of the properties at the time of calling.
    pub fn get_properties(&self) -> HashMap<String, Property> {
        self.properties
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Append to the event log. Order reflects the order appends completed
    /// under the lock, not necessarily timestamp order.
    pub fn log_event(&self, body: impl Into<String>, timestamp_utc: DateTime<Utc>) {
        recover(self.events.lock()).push(Event {
            body: body.into(),
            timestamp_utc,
        });
    }

    /// Snapshot of the event log at the time of calling.
    pub fn get_events(&self) -> Vec<Event> {
        recover(self.events.lock()).clone()
    }

    /// Report an observed advance. The first report establishes the sampling
    /// baseline on both windows; every report feeds both windows and replaces
    /// the last known checkpoint, all under the progress lock.
    pub fn track_progress(&self, checkpoint: i64, timestamp_utc: DateTime<Utc>) {
        let mut progress = recover(self.progress.lock());
        if !progress.fast.has_baseline() {
            progress.fast.set_baseline(checkpoint, timestamp_utc);
            progress.slow.set_baseline(checkpoint, timestamp_utc);
        }
        progress.fast.record(checkpoint, timestamp_utc);
        progress.slow.record(checkpoint, timestamp_utc);
        progress.last = Some(TimestampedCheckpoint {
            checkpoint,
            timestamp_utc,
        });
    }

    /// Last checkpoint reported via `track_progress`, if any.
    pub fn last_checkpoint(&self) -> Option<TimestampedCheckpoint> {
        recover(self.progress.lock()).last
    }

    /// Estimated time for this projector to reach `target_checkpoint`, based
    /// on a weighted average of its recent throughput, or `None` when there is
    /// not enough information yet.
    ///
    /// The fast window's current rate is folded into the slow window's average
    /// as its newest, heaviest point; when the fast window has no data yet the
    /// slow average stands alone. Truncated to whole seconds.
    pub fn time_to_reach(&self, target_checkpoint: i64) -> Option<TimeDelta> {
        let progress = recover(self.progress.lock());
        let last = progress.last?;
        if target_checkpoint <= last.checkpoint {
            return Some(TimeDelta::zero());
        }

        let fast = progress.fast.weighted_speed();
        let speed = if fast == 0.0 {
            progress.slow.weighted_speed()
        } else {
            progress.slow.weighted_speed_including(fast)
        };
        if speed <= 0.0 {
            return None;
        }

        let seconds = (target_checkpoint - last.checkpoint) as f64 / speed;
        if !seconds.is_finite() || seconds >= i64::MAX as f64 {
            return None;
        }
        TimeDelta::try_seconds(seconds as i64)
    }
}

// A poisoned lock only means another thread panicked mid-append; the
// guarded data is still structurally sound, so keep serving it.
fn recover<'a, T>(result: std::sync::LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|poisoned| poisoned.into_inner())
}
