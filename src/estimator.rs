use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};

/// Recency-weighted throughput estimator.
///
/// Turns a stream of (checkpoint, timestamp) observations into a smoothed
/// checkpoints-per-second figure over a bounded window of samples. Not
/// independently thread-safe; callers serialize access (see `ProjectorStats`'
/// progress lock).
pub struct SpeedEstimator {
    capacity: usize,
    min_interval: TimeDelta,
    // oldest to newest
    samples: VecDeque<f64>,
    baseline: Option<(i64, DateTime<Utc>)>,
}

impl SpeedEstimator {
    pub fn new(capacity: usize, min_interval: TimeDelta) -> Self {
        Self {
            capacity,
            min_interval,
            samples: VecDeque::with_capacity(capacity + 1),
            baseline: None,
        }
    }

    /// Whether `set_baseline` has been called.
    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Establish the starting point for the next sample without recording one.
    /// Intended to be called once, before the first `record`; last call wins.
    pub fn set_baseline(&mut self, checkpoint: i64, timestamp_utc: DateTime<Utc>) {
        self.baseline = Some((checkpoint, timestamp_utc));
    }

    /// Record an observation. Observations closer than `min_interval` to the
    /// previous one are dropped (debounce, not an error); otherwise the speed
    /// since the previous observation becomes the newest sample and the oldest
    /// sample is evicted once the window is full.
    ///
    /// A checkpoint regression produces a negative sample; deltas are not
    /// clamped or rejected here.
    pub fn record(&mut self, checkpoint: i64, timestamp_utc: DateTime<Utc>) {
        let Some((last_checkpoint, last_at)) = self.baseline else {
            return;
        };
        let interval = timestamp_utc - last_at;
        if interval <= self.min_interval {
            return;
        }

        let secs = interval.num_milliseconds() as f64 / 1000.0;
        let delta = (checkpoint - last_checkpoint) as f64;
        self.samples.push_back(delta / secs);
        self.baseline = Some((checkpoint, timestamp_utc));

        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Recency-weighted average speed over the current window, weights
    /// `1, 2, .., n` oldest to newest. Returns `0.0` when there are no
    /// samples; that value is the "no data" sentinel, not a measurement.
    pub fn weighted_speed(&self) -> f64 {
        weighted_average(self.samples.iter().copied())
    }

    /// Weighted average as if `extra` were the newest (heaviest) sample.
    /// Does not mutate the window; used to fold a sibling estimator's current
    /// rate into this one's longer horizon.
    pub fn weighted_speed_including(&self, extra: f64) -> f64 {
        weighted_average(self.samples.iter().copied().chain(std::iter::once(extra)))
    }
}

// Pure weighting over a snapshot; position in the iterator decides the weight.
fn weighted_average(samples: impl Iterator<Item = f64>) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weights = 0.0;
    for (index, sample) in samples.enumerate() {
        let weight = (index + 1) as f64;
        weights += weight;
        weighted_sum += sample * weight;
    }
    if weights == 0.0 {
        0.0
    } else {
        weighted_sum / weights
    }
}
