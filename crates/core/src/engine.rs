// Media engine collaborator contract
// The coordinator drives a decode/render engine it does not implement.

use crate::error::{EngineError, Result};
use std::fmt;
use std::sync::Arc;

/// Contiguous range of loaded media, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub duration: f64,
}

impl TimeRange {
    pub fn new(start: f64, duration: f64) -> Self {
        Self {
            start: start.max(0.0),
            duration: duration.max(0.0),
        }
    }

    /// Loaded edge in seconds
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Opaque handle to the engine's renderable output (e.g. a native layer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderOutput(pub u64);

/// Asynchronous notifications from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    /// Resource opened; duration in seconds if known
    Ready { duration: Option<f64> },
    /// Fatal load or decode failure
    Failed(EngineError),
    /// Loaded range grew or moved
    LoadedRange(TimeRange),
    /// Playhead ran out of data
    Stalled,
    /// Playhead reached the end of the media
    Ended,
    /// Seek with sequence number `seq` settled
    SeekFinished { seq: u64, finished: bool },
}

/// Delivers a session-tagged signal to the coordinator's owner thread
pub type SignalForward = Arc<dyn Fn(u64, EngineSignal) + Send + Sync>;

/// Session-tagged signal sender handed to the engine on load.
/// May be cloned and used from any thread.
#[derive(Clone)]
pub struct EngineSink {
    token: u64,
    forward: SignalForward,
}

impl EngineSink {
    pub fn new(token: u64, forward: SignalForward) -> Self {
        Self { token, forward }
    }

    /// Session token this sink is bound to
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn send(&self, signal: EngineSignal) {
        (self.forward)(self.token, signal);
    }

    pub fn ready(&self, duration: Option<f64>) {
        self.send(EngineSignal::Ready { duration });
    }

    pub fn failed(&self, error: EngineError) {
        self.send(EngineSignal::Failed(error));
    }

    pub fn loaded_range(&self, range: TimeRange) {
        self.send(EngineSignal::LoadedRange(range));
    }

    pub fn stalled(&self) {
        self.send(EngineSignal::Stalled);
    }

    pub fn ended(&self) {
        self.send(EngineSignal::Ended);
    }

    pub fn seek_finished(&self, seq: u64, finished: bool) {
        self.send(EngineSignal::SeekFinished { seq, finished });
    }
}

impl fmt::Debug for EngineSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSink").field("token", &self.token).finish()
    }
}

/// Media engine collaborator.
///
/// Commands must return quickly; outcomes of `load` and `seek` are reported
/// later through the [`EngineSink`] given to `load`.
pub trait PlayerEngine: Send {
    /// Begin loading a resource; report readiness or failure via `sink`
    fn load(&mut self, url: &str, sink: EngineSink) -> Result<()>;

    /// Release the current resource; no further signals are expected for it
    fn unload(&mut self);

    /// Playhead in seconds
    fn current_time(&self) -> f64;

    /// Duration in seconds, if known
    fn duration(&self) -> Option<f64>;

    /// Loaded range around the playhead, if the engine reports one
    fn loaded_time_range(&self) -> Option<TimeRange>;

    /// Start or continue playback at `rate`
    fn set_rate(&mut self, rate: f32);

    /// Halt playback, keeping the position
    fn pause(&mut self);

    /// Seek to `target` seconds; acknowledge with `SeekFinished { seq, .. }`
    fn seek(&mut self, target: f64, seq: u64);

    /// Volume (0.0 - 1.0)
    fn set_volume(&mut self, volume: f32);

    /// Renderable output for the display surface, if any
    fn render_output(&self) -> Option<RenderOutput> {
        None
    }
}
