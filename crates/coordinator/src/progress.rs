// Playhead progress sampling

use podium_playback_core::PlaybackState;

/// Normalized playhead position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// 0.0 - 1.0; 0 when the duration is unknown
    pub progress: f64,
    /// Playhead in seconds
    pub elapsed: f64,
}

impl ProgressSample {
    pub fn compute(current_time: f64, duration: Option<f64>) -> Self {
        let elapsed = if current_time.is_finite() {
            current_time.max(0.0)
        } else {
            0.0
        };
        Self {
            progress: normalize(elapsed, duration),
            elapsed,
        }
    }
}

/// `value / duration` clamped to 0 ~ 1; unknown or zero duration gives 0
pub(crate) fn normalize(value: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(d) if d.is_finite() && d > 0.0 => (value / d).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// What the owner knows at tick time
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub state: PlaybackState,
    pub seek_pending: bool,
}

/// Samples the playhead on each tick and suppresses repeats
#[derive(Debug, Default)]
pub struct ProgressObserver {
    last_reported: Option<ProgressSample>,
}

impl ProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample to report for this tick, if any.
    /// Nothing is reported outside Playing/Buffering or while a seek is in flight.
    pub fn on_tick(
        &mut self,
        ctx: TickContext,
        current_time: f64,
        duration: Option<f64>,
    ) -> Option<ProgressSample> {
        if !ctx.state.is_active() || ctx.seek_pending {
            return None;
        }
        self.report(ProgressSample::compute(current_time, duration))
    }

    /// Final sample at end of media
    pub fn finish(&mut self, duration: Option<f64>) -> Option<ProgressSample> {
        let sample = match duration {
            Some(d) if d.is_finite() && d > 0.0 => ProgressSample {
                progress: 1.0,
                elapsed: d,
            },
            _ => return None,
        };
        self.report(sample)
    }

    /// Forget the last report so the next sample always fires
    pub fn reset(&mut self) {
        self.last_reported = None;
    }

    fn report(&mut self, sample: ProgressSample) -> Option<ProgressSample> {
        if self.last_reported == Some(sample) {
            return None;
        }
        self.last_reported = Some(sample);
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing() -> TickContext {
        TickContext {
            state: PlaybackState::Playing,
            seek_pending: false,
        }
    }

    #[test]
    fn test_progress_matches_ratio() {
        for (current, duration) in [(0.0, 100.0), (12.5, 100.0), (99.9, 100.0), (3.0, 7.0)] {
            let sample = ProgressSample::compute(current, Some(duration));
            assert!((sample.progress - current / duration).abs() < 1e-9);
            assert!((0.0..=1.0).contains(&sample.progress));
            assert_eq!(sample.elapsed, current);
        }
    }

    #[test]
    fn test_unknown_or_zero_duration_gives_zero() {
        assert_eq!(ProgressSample::compute(10.0, None).progress, 0.0);
        assert_eq!(ProgressSample::compute(10.0, Some(0.0)).progress, 0.0);
        assert_eq!(ProgressSample::compute(10.0, Some(f64::NAN)).progress, 0.0);
        assert_eq!(ProgressSample::compute(10.0, Some(f64::INFINITY)).progress, 0.0);
    }

    #[test]
    fn test_out_of_range_playhead_is_clamped() {
        assert_eq!(ProgressSample::compute(120.0, Some(100.0)).progress, 1.0);
        let negative = ProgressSample::compute(-3.0, Some(100.0));
        assert_eq!(negative.progress, 0.0);
        assert_eq!(negative.elapsed, 0.0);
    }

    #[test]
    fn test_tick_gating() {
        let mut observer = ProgressObserver::new();

        for state in [
            PlaybackState::Paused,
            PlaybackState::Stopped,
            PlaybackState::ReadyToPlay,
            PlaybackState::Failed,
        ] {
            let ctx = TickContext {
                state,
                seek_pending: false,
            };
            assert!(observer.on_tick(ctx, 5.0, Some(100.0)).is_none());
        }

        let seeking = TickContext {
            state: PlaybackState::Playing,
            seek_pending: true,
        };
        assert!(observer.on_tick(seeking, 5.0, Some(100.0)).is_none());

        let buffering = TickContext {
            state: PlaybackState::Buffering,
            seek_pending: false,
        };
        assert!(observer.on_tick(buffering, 5.0, Some(100.0)).is_some());
    }

    #[test]
    fn test_repeated_samples_are_debounced() {
        let mut observer = ProgressObserver::new();
        assert!(observer.on_tick(playing(), 5.0, Some(100.0)).is_some());
        assert!(observer.on_tick(playing(), 5.0, Some(100.0)).is_none());
        assert!(observer.on_tick(playing(), 5.25, Some(100.0)).is_some());

        observer.reset();
        assert!(observer.on_tick(playing(), 5.25, Some(100.0)).is_some());
    }

    #[test]
    fn test_finish_reports_full_progress() {
        let mut observer = ProgressObserver::new();
        let sample = observer.finish(Some(100.0)).unwrap();
        assert_eq!(sample.progress, 1.0);
        assert_eq!(sample.elapsed, 100.0);
        assert!(observer.finish(None).is_none());
    }
}
