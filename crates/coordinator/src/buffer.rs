// Loaded-range observation with stall/resume detection

use crate::progress::normalize;
use podium_playback_core::{BufferPolicy, TimeRange};

/// Slack when comparing the playhead or loaded edge against range bounds (seconds)
const EDGE_TOLERANCE_SECS: f64 = 0.05;

/// Observations of an unmoving loaded edge, while stalled within the resume
/// threshold of the end, before that edge is taken as the end of the data
const TAIL_SETTLE_OBSERVATIONS: u32 = 8;

/// Normalized loaded edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferSample {
    /// 0.0 - 1.0; 0 when the duration is unknown
    pub progress: f64,
    /// Loaded edge in seconds
    pub loaded: f64,
}

impl BufferSample {
    pub fn compute(range: TimeRange, duration: Option<f64>) -> Self {
        let loaded = range.end();
        Self {
            progress: normalize(loaded, duration),
            loaded,
        }
    }
}

/// Tracks the loaded range and the current stall episode
#[derive(Debug)]
pub struct BufferObserver {
    policy: BufferPolicy,
    range: Option<TimeRange>,
    stalled: bool,
    last_reported: Option<BufferSample>,
    /// Loaded edge seen at the previous check of this stall episode
    stall_edge: Option<f64>,
    stagnant: u32,
    /// Final loaded edge when it stops short of the container duration
    settled_edge: Option<f64>,
}

impl BufferObserver {
    pub fn new(policy: BufferPolicy) -> Self {
        Self {
            policy,
            range: None,
            stalled: false,
            last_reported: None,
            stall_edge: None,
            stagnant: 0,
            settled_edge: None,
        }
    }

    /// Record a loaded-range update; returns the sample to report, if it moved enough
    pub fn observe(&mut self, range: TimeRange, duration: Option<f64>) -> Option<BufferSample> {
        self.range = Some(range);
        let sample = BufferSample::compute(range, duration);

        let significant = match self.last_reported {
            None => true,
            Some(prev) if prev == sample => false,
            Some(prev) if sample.progress >= 1.0 && prev.progress < 1.0 => true,
            // Without a duration only the raw edge can move
            Some(prev) if sample.progress == 0.0 && prev.progress == 0.0 => {
                sample.loaded != prev.loaded
            }
            Some(prev) => (sample.progress - prev.progress).abs() >= self.policy.min_load_delta,
        };

        if significant {
            self.last_reported = Some(sample);
            Some(sample)
        } else {
            None
        }
    }

    pub fn range(&self) -> Option<TimeRange> {
        self.range
    }

    /// Seconds loaded past the playhead; 0 if the playhead is outside the range
    pub fn buffered_ahead(&self, playhead: f64) -> Option<f64> {
        self.range.map(|range| {
            if playhead >= range.start - EDGE_TOLERANCE_SECS && playhead <= range.end() {
                range.end() - playhead
            } else {
                0.0
            }
        })
    }

    pub fn is_fully_loaded(&self, duration: Option<f64>) -> bool {
        match (self.range, duration) {
            (Some(range), Some(d)) if d.is_finite() && d > 0.0 => {
                let end = range.end();
                end >= d - EDGE_TOLERANCE_SECS
                    || self
                        .settled_edge
                        .map_or(false, |edge| end >= edge - EDGE_TOLERANCE_SECS)
            }
            _ => false,
        }
    }

    /// Enough data to play smoothly. An engine that never reports ranges never blocks.
    pub fn has_enough_to_play(&self, playhead: f64, duration: Option<f64>) -> bool {
        match self.buffered_ahead(playhead) {
            None => true,
            Some(_) if self.is_fully_loaded(duration) => true,
            Some(ahead) => ahead >= self.policy.resume_ahead_secs,
        }
    }

    /// The playhead has caught up with the loaded edge
    pub fn caught_loaded_edge(&self, playhead: f64, duration: Option<f64>) -> bool {
        match self.buffered_ahead(playhead) {
            Some(ahead) => {
                !self.is_fully_loaded(duration) && ahead <= self.policy.stall_ahead_secs
            }
            None => false,
        }
    }

    /// Begin a stall episode; false if one is already running
    pub fn enter_stall(&mut self) -> bool {
        let started = !self.stalled;
        if started {
            self.reset_episode();
        }
        self.stalled = true;
        started
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// End the stall episode if the resume threshold is met.
    /// Returns true exactly once per episode.
    pub fn try_resume(&mut self, playhead: f64, duration: Option<f64>) -> bool {
        if !self.stalled {
            return false;
        }
        if self.has_enough_to_play(playhead, duration) || self.settle_tail(duration) {
            self.reset_episode();
            true
        } else {
            false
        }
    }

    /// Media whose data ends short of the reported duration never reaches the
    /// resume threshold; once the edge stops moving near the end, accept it
    fn settle_tail(&mut self, duration: Option<f64>) -> bool {
        let (edge, d) = match (self.range, duration) {
            (Some(range), Some(d)) if d.is_finite() && d > 0.0 => (range.end(), d),
            _ => return false,
        };

        if self.stall_edge == Some(edge) {
            self.stagnant += 1;
        } else {
            self.stall_edge = Some(edge);
            self.stagnant = 0;
        }

        let near_end = d - edge <= self.policy.resume_ahead_secs;
        if near_end && self.stagnant >= TAIL_SETTLE_OBSERVATIONS {
            log::info!("Loaded edge settled at {:.2}s of {:.2}s", edge, d);
            self.settled_edge = Some(edge);
            true
        } else {
            false
        }
    }

    fn reset_episode(&mut self) {
        self.stalled = false;
        self.stall_edge = None;
        self.stagnant = 0;
    }

    /// Drop the stall episode without resuming (stop, failure)
    pub fn abandon_stall(&mut self) {
        self.reset_episode();
    }

    /// Forget everything about the previous resource
    pub fn clear(&mut self) {
        self.range = None;
        self.last_reported = None;
        self.settled_edge = None;
        self.reset_episode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observer() -> BufferObserver {
        BufferObserver::new(BufferPolicy::default())
    }

    #[test]
    fn test_sample_normalization() {
        let sample = BufferSample::compute(TimeRange::new(0.0, 25.0), Some(100.0));
        assert_eq!(sample.progress, 0.25);
        assert_eq!(sample.loaded, 25.0);
        assert_eq!(BufferSample::compute(TimeRange::new(0.0, 25.0), None).progress, 0.0);
    }

    #[test]
    fn test_observe_debounces_small_moves() {
        let mut obs = BufferObserver::new(BufferPolicy {
            min_load_delta: 0.01,
            ..BufferPolicy::default()
        });
        assert!(obs.observe(TimeRange::new(0.0, 10.0), Some(100.0)).is_some());
        assert!(obs.observe(TimeRange::new(0.0, 10.5), Some(100.0)).is_none());
        assert!(obs.observe(TimeRange::new(0.0, 12.0), Some(100.0)).is_some());
        assert!(obs.observe(TimeRange::new(0.0, 99.99), Some(100.0)).is_some());
        assert!(obs.observe(TimeRange::new(0.0, 100.0), Some(100.0)).is_some());
        assert!(obs.observe(TimeRange::new(0.0, 100.0), Some(100.0)).is_none());
        // Range still tracked even when not reported
        assert_eq!(obs.range().map(|r| r.end()), Some(100.0));
    }

    #[test]
    fn test_observe_without_duration_reports_edge_moves() {
        let mut obs = observer();
        assert!(obs.observe(TimeRange::new(0.0, 4.0), None).is_some());
        assert!(obs.observe(TimeRange::new(0.0, 4.0), None).is_none());
        assert!(obs.observe(TimeRange::new(0.0, 6.0), None).is_some());
    }

    #[test]
    fn test_edge_and_threshold_checks() {
        let mut obs = observer();
        assert!(obs.has_enough_to_play(0.0, Some(100.0)));
        assert!(!obs.caught_loaded_edge(0.0, Some(100.0)));

        obs.observe(TimeRange::new(0.0, 10.0), Some(100.0));
        assert!(obs.has_enough_to_play(5.0, Some(100.0)));
        assert!(!obs.has_enough_to_play(8.0, Some(100.0)));
        assert!(obs.caught_loaded_edge(9.95, Some(100.0)));
        assert!(!obs.caught_loaded_edge(9.0, Some(100.0)));

        // Playhead past the loaded range counts as nothing buffered
        assert_eq!(obs.buffered_ahead(20.0), Some(0.0));
        assert!(obs.caught_loaded_edge(20.0, Some(100.0)));
    }

    #[test]
    fn test_fully_loaded_never_stalls() {
        let mut obs = observer();
        obs.observe(TimeRange::new(0.0, 100.0), Some(100.0));
        assert!(!obs.caught_loaded_edge(99.99, Some(100.0)));
        assert!(obs.has_enough_to_play(99.0, Some(100.0)));
    }

    #[test]
    fn test_resume_fires_once_per_episode() {
        let mut obs = observer();
        obs.observe(TimeRange::new(0.0, 10.0), Some(100.0));
        assert!(obs.enter_stall());
        assert!(!obs.enter_stall());

        assert!(!obs.try_resume(10.0, Some(100.0)));
        obs.observe(TimeRange::new(0.0, 14.0), Some(100.0));
        assert!(obs.try_resume(10.0, Some(100.0)));
        assert!(!obs.try_resume(10.0, Some(100.0)));
        assert!(!obs.is_stalled());
    }

    #[test]
    fn test_unmoving_edge_near_end_settles() {
        let mut obs = observer();
        obs.observe(TimeRange::new(0.0, 99.9), Some(100.0));
        assert!(!obs.is_fully_loaded(Some(100.0)));
        assert!(obs.caught_loaded_edge(99.85, Some(100.0)));
        obs.enter_stall();

        for _ in 0..TAIL_SETTLE_OBSERVATIONS {
            assert!(!obs.try_resume(99.85, Some(100.0)));
        }
        assert!(obs.try_resume(99.85, Some(100.0)));
        assert!(obs.is_fully_loaded(Some(100.0)));
        assert!(!obs.caught_loaded_edge(99.88, Some(100.0)));

        obs.clear();
        obs.observe(TimeRange::new(0.0, 99.9), Some(100.0));
        assert!(!obs.is_fully_loaded(Some(100.0)));
    }

    #[test]
    fn test_unmoving_edge_mid_media_keeps_waiting() {
        let mut obs = observer();
        obs.observe(TimeRange::new(0.0, 40.0), Some(100.0));
        obs.enter_stall();
        for _ in 0..(TAIL_SETTLE_OBSERVATIONS * 4) {
            assert!(!obs.try_resume(39.95, Some(100.0)));
        }
        assert!(obs.is_stalled());
    }

    #[test]
    fn test_clear_and_abandon() {
        let mut obs = observer();
        obs.observe(TimeRange::new(0.0, 10.0), Some(100.0));
        obs.enter_stall();
        obs.abandon_stall();
        assert!(!obs.is_stalled());
        assert!(!obs.try_resume(0.0, Some(100.0)));

        obs.clear();
        assert!(obs.range().is_none());
        assert!(obs.observe(TimeRange::new(0.0, 10.0), Some(100.0)).is_some());
    }
}
