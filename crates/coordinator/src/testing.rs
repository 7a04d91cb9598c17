// Test doubles: a scripted engine, a recording delegate, and a signal queue

use parking_lot::Mutex;
use podium_playback_core::{
    EngineSignal, EngineSink, PlaybackState, PlayerDelegate, PlayerEngine, PlayerError,
    PlayerEvent, PlayerSnapshot, RenderOutput, Result, SignalForward, TimeRange,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load(String),
    Unload,
    SetRate(f32),
    Pause,
    Seek { target: f64, seq: u64 },
    SetVolume(f32),
}

#[derive(Default)]
struct EngineState {
    calls: Vec<EngineCall>,
    current_time: f64,
    duration: Option<f64>,
    loaded: Option<TimeRange>,
    sink: Option<EngineSink>,
    render: Option<RenderOutput>,
    fail_next_load: Option<PlayerError>,
}

/// Engine whose clock and loaded range are set by the test
#[derive(Clone, Default)]
pub struct ManualEngine {
    inner: Arc<Mutex<EngineState>>,
}

impl ManualEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    pub fn seeks(&self) -> Vec<(f64, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Seek { target, seq } => Some((target, seq)),
                _ => None,
            })
            .collect()
    }

    /// Sink of the most recent load
    pub fn sink(&self) -> EngineSink {
        self.try_sink().expect("engine has not been loaded")
    }

    pub fn try_sink(&self) -> Option<EngineSink> {
        self.inner.lock().sink.clone()
    }

    pub fn set_current_time(&self, seconds: f64) {
        self.inner.lock().current_time = seconds;
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        self.inner.lock().duration = duration;
    }

    pub fn set_loaded(&self, range: Option<TimeRange>) {
        self.inner.lock().loaded = range;
    }

    pub fn set_render(&self, render: Option<RenderOutput>) {
        self.inner.lock().render = render;
    }

    pub fn fail_next_load(&self, error: PlayerError) {
        self.inner.lock().fail_next_load = Some(error);
    }
}

impl PlayerEngine for ManualEngine {
    fn load(&mut self, url: &str, sink: EngineSink) -> Result<()> {
        let mut state = self.inner.lock();
        state.calls.push(EngineCall::Load(url.to_string()));
        if let Some(err) = state.fail_next_load.take() {
            return Err(err);
        }
        state.sink = Some(sink);
        Ok(())
    }

    fn unload(&mut self) {
        let mut state = self.inner.lock();
        state.calls.push(EngineCall::Unload);
        state.sink = None;
    }

    fn current_time(&self) -> f64 {
        self.inner.lock().current_time
    }

    fn duration(&self) -> Option<f64> {
        self.inner.lock().duration
    }

    fn loaded_time_range(&self) -> Option<TimeRange> {
        self.inner.lock().loaded
    }

    fn set_rate(&mut self, rate: f32) {
        self.inner.lock().calls.push(EngineCall::SetRate(rate));
    }

    fn pause(&mut self) {
        self.inner.lock().calls.push(EngineCall::Pause);
    }

    fn seek(&mut self, target: f64, seq: u64) {
        self.inner.lock().calls.push(EngineCall::Seek { target, seq });
    }

    fn set_volume(&mut self, volume: f32) {
        self.inner.lock().calls.push(EngineCall::SetVolume(volume));
    }

    fn render_output(&self) -> Option<RenderOutput> {
        self.inner.lock().render
    }
}

/// Delegate that records every notification
#[derive(Clone, Default)]
pub struct RecordingDelegate {
    events: Arc<Mutex<Vec<PlayerEvent>>>,
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn states(&self) -> Vec<PlaybackState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PlayerEvent::StateChanged(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&PlayerEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl PlayerDelegate for RecordingDelegate {
    fn change_player_state(&mut self, state: PlaybackState) {
        self.events.lock().push(PlayerEvent::StateChanged(state));
    }

    fn change_play_progress(&mut self, progress: f64, seconds: f64) {
        self.events
            .lock()
            .push(PlayerEvent::PlayProgress { progress, seconds });
    }

    fn change_load_progress(&mut self, progress: f64, seconds: f64) {
        self.events
            .lock()
            .push(PlayerEvent::LoadProgress { progress, seconds });
    }

    fn did_buffer(&mut self, player: &PlayerSnapshot) {
        self.events.lock().push(PlayerEvent::DidBuffer(player.clone()));
    }

    fn start_player_seek_time(&mut self) {
        self.events.lock().push(PlayerEvent::SeekStarted);
    }

    fn completion_player_seek_time(&mut self) {
        self.events.lock().push(PlayerEvent::SeekCompleted);
    }
}

/// Collects signals sent through engine sinks so a test can pump them
#[derive(Clone, Default)]
pub struct SignalQueue {
    inner: Arc<Mutex<Vec<(u64, EngineSignal)>>>,
}

impl SignalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&self) -> SignalForward {
        let inner = self.inner.clone();
        Arc::new(move |token: u64, signal: EngineSignal| inner.lock().push((token, signal)))
    }

    pub fn drain(&self) -> Vec<(u64, EngineSignal)> {
        std::mem::take(&mut *self.inner.lock())
    }
}

/// Completion flag shared with a seek completion closure
#[derive(Clone, Default)]
pub struct CompletionProbe {
    results: Arc<Mutex<Vec<bool>>>,
}

impl CompletionProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completion(&self) -> Box<dyn FnOnce(bool) + Send> {
        let results = self.results.clone();
        Box::new(move |finished: bool| results.lock().push(finished))
    }

    pub fn results(&self) -> Vec<bool> {
        self.results.lock().clone()
    }
}
