// Playback state machine
// Owns the engine handle, the observers and the listener. Every method runs on
// the owner thread; engine signals reach it already tagged with their session.

use crate::buffer::BufferObserver;
use crate::progress::{ProgressObserver, TickContext};
use crate::seek::{SeekCompletion, SeekCoordinator};
use crate::session::SessionRegistry;
use crate::surface::{PlayerLayerView, RenderSlot};
use podium_playback_core::{
    CoordinatorConfig, EngineSignal, EngineSink, PlaybackState, PlayerDelegate, PlayerEngine,
    PlayerError, Result, SignalForward, SnapshotCell, TimeRange,
};
use std::sync::Arc;

/// Transport commands accepted by the state machine
pub enum Command {
    InitWith(String),
    Play,
    RePlay,
    Pause,
    Stop,
    SeekTo {
        target: f64,
        completion: SeekCompletion,
    },
    SetSeekTime(f64),
    SetVolume(f32),
    SetRate(f32),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::InitWith(_) => "init_with",
            Command::Play => "play",
            Command::RePlay => "replay",
            Command::Pause => "pause",
            Command::Stop => "stop",
            Command::SeekTo { .. } => "seek_to",
            Command::SetSeekTime(_) => "set_seek_time",
            Command::SetVolume(_) => "set_volume",
            Command::SetRate(_) => "set_rate",
        }
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

pub struct PlaybackStateMachine {
    engine: Box<dyn PlayerEngine>,
    delegate: Box<dyn PlayerDelegate>,
    forward: SignalForward,
    state: PlaybackState,
    sessions: SessionRegistry,
    progress: ProgressObserver,
    buffer: BufferObserver,
    seeks: SeekCoordinator,
    /// The user wants playback running (survives Buffering and pre-ready loads)
    play_requested: bool,
    /// Start offset requested before the engine was ready
    pending_start: Option<f64>,
    volume: f32,
    rate: f32,
    snapshot: SnapshotCell,
    surface: RenderSlot,
}

impl PlaybackStateMachine {
    pub fn new(
        engine: Box<dyn PlayerEngine>,
        delegate: Box<dyn PlayerDelegate>,
        config: CoordinatorConfig,
        forward: SignalForward,
    ) -> Self {
        let volume = clamp_volume(config.initial_volume);
        let snapshot = SnapshotCell::new();
        snapshot.update(|s| s.volume = volume);

        Self {
            engine,
            delegate,
            forward,
            state: PlaybackState::Unknown,
            sessions: SessionRegistry::new(),
            progress: ProgressObserver::new(),
            buffer: BufferObserver::new(config.buffer.clone()),
            seeks: SeekCoordinator::new(),
            play_requested: false,
            pending_start: None,
            volume,
            rate: config.playback_rate,
            snapshot,
            surface: RenderSlot::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn snapshot_cell(&self) -> SnapshotCell {
        self.snapshot.clone()
    }

    pub fn layer_view(&self) -> PlayerLayerView {
        self.surface.view()
    }

    pub fn current_token(&self) -> Option<u64> {
        self.sessions.current_token()
    }

    pub fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::InitWith(url) => self.init_with(&url),
            Command::Play => self.play(),
            Command::RePlay => self.replay(),
            Command::Pause => self.pause(),
            Command::Stop => self.stop(),
            Command::SeekTo { target, completion } => self.seek_to(target, completion),
            Command::SetSeekTime(seconds) => {
                self.set_seek_time(seconds);
                Ok(())
            }
            Command::SetVolume(volume) => {
                self.set_volume(volume);
                Ok(())
            }
            Command::SetRate(rate) => self.set_rate(rate),
        }
    }

    // ---------------------------------------------------------------------
    // Transport commands
    // ---------------------------------------------------------------------

    pub fn init_with(&mut self, url: &str) -> Result<()> {
        self.begin_session(url, false)
    }

    /// Reload the last resource as a new session and play it
    pub fn replay(&mut self) -> Result<()> {
        let url = match self.sessions.last_url() {
            Some(url) => url.to_string(),
            None => {
                return Err(PlayerError::InvalidState(
                    "Nothing has been loaded to replay".to_string(),
                ))
            }
        };
        self.pending_start = None;
        self.snapshot.update(|s| s.seek_time = None);
        self.begin_session(&url, true)
    }

    pub fn play(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Unknown => {
                if self.sessions.current().is_none() {
                    return Err(PlayerError::InvalidState("No resource loaded".to_string()));
                }
                log::debug!("play requested before engine is ready");
                self.play_requested = true;
                Ok(())
            }
            PlaybackState::Failed => Err(PlayerError::InvalidState(
                "Cannot play from Failed; load a new resource".to_string(),
            )),
            PlaybackState::Playing | PlaybackState::Buffering => {
                self.play_requested = true;
                Ok(())
            }
            PlaybackState::ReadyToPlay | PlaybackState::Paused => {
                self.start_playback();
                Ok(())
            }
            PlaybackState::Stopped => {
                if self.session_ready() {
                    self.start_playback();
                    Ok(())
                } else {
                    self.replay()
                }
            }
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing | PlaybackState::Buffering => {
                self.engine.pause();
                self.play_requested = false;
                self.transition(PlaybackState::Paused);
                Ok(())
            }
            PlaybackState::Unknown | PlaybackState::ReadyToPlay | PlaybackState::Paused => {
                self.play_requested = false;
                Ok(())
            }
            PlaybackState::Stopped | PlaybackState::Failed => Err(PlayerError::InvalidState(
                format!("Cannot pause from state {:?}", self.state),
            )),
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Failed => Err(PlayerError::InvalidState(
                "Cannot stop from Failed".to_string(),
            )),
            PlaybackState::Stopped => Ok(()),
            PlaybackState::Unknown if self.sessions.current().is_none() => Ok(()),
            _ => {
                self.seeks.cancel(self.delegate.as_mut());
                self.engine.pause();
                self.play_requested = false;
                self.buffer.abandon_stall();
                self.rewind();
                self.transition(PlaybackState::Stopped);
                Ok(())
            }
        }
    }

    /// Seek the current session; the completion always runs exactly once
    /// unless a later seek supersedes it
    pub fn seek_to(&mut self, target: f64, completion: SeekCompletion) -> Result<()> {
        if !self.can_seek() {
            completion(false);
            return Err(PlayerError::Seek(format!(
                "Cannot seek from state {:?}",
                self.state
            )));
        }
        self.issue_seek(target, completion);
        Ok(())
    }

    /// Settable start/seek position; applied once the engine is ready
    pub fn set_seek_time(&mut self, seconds: f64) {
        if self.can_seek() {
            self.issue_seek(seconds, Box::new(|_: bool| {}));
        } else {
            let seconds = if seconds.is_nan() { 0.0 } else { seconds.max(0.0) };
            log::debug!("deferring seek to {:.3}s until ready", seconds);
            self.pending_start = Some(seconds);
            self.snapshot.update(|s| s.seek_time = Some(seconds));
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        let clamped = clamp_volume(volume);
        self.volume = clamped;
        self.engine.set_volume(clamped);
        self.snapshot.update(|s| s.volume = clamped);
        log::debug!("Volume set to {}", clamped);
    }

    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PlayerError::InvalidState(format!(
                "Playback rate must be > 0, got {}",
                rate
            )));
        }
        self.rate = rate;
        if self.state == PlaybackState::Playing {
            self.engine.set_rate(rate);
        }
        Ok(())
    }

    /// Tear down the current session; pending seeks resolve with `false`
    pub fn shutdown(&mut self) {
        self.release_session();
        log::info!("Playback coordinator shut down");
    }

    // ---------------------------------------------------------------------
    // Engine signals and ticks
    // ---------------------------------------------------------------------

    pub fn handle_signal(&mut self, token: u64, signal: EngineSignal) {
        if !self.sessions.is_current(token) {
            log::debug!("dropping {:?} from stale session {}", signal, token);
            return;
        }
        if self.state == PlaybackState::Failed {
            log::debug!("dropping {:?} after failure", signal);
            return;
        }

        match signal {
            EngineSignal::Ready { duration } => self.on_ready(duration),
            EngineSignal::Failed(err) => self.fail(err.into()),
            EngineSignal::LoadedRange(range) => {
                self.observe_range(range);
                self.evaluate_buffer();
            }
            EngineSignal::Stalled => {
                if self.state == PlaybackState::Playing {
                    log::info!("Engine reported stall");
                    self.enter_buffering();
                }
            }
            EngineSignal::Ended => self.on_ended(),
            EngineSignal::SeekFinished { seq, finished } => {
                if let Some(target) = self.seeks.on_finished(seq, finished, self.delegate.as_mut())
                {
                    self.progress.reset();
                    if finished {
                        self.snapshot.update(|s| s.current_time = target);
                    }
                    self.evaluate_buffer();
                }
            }
        }
    }

    /// Periodic observation while Playing or Buffering
    pub fn on_tick(&mut self) {
        if self.sessions.current().is_none() || !self.state.is_active() {
            return;
        }

        self.refresh_duration();
        let playhead = self.engine.current_time();
        let duration = self.duration();
        self.snapshot.update(|s| s.current_time = playhead);

        let ctx = TickContext {
            state: self.state,
            seek_pending: self.seeks.is_pending(),
        };
        if let Some(sample) = self.progress.on_tick(ctx, playhead, duration) {
            self.delegate
                .change_play_progress(sample.progress, sample.elapsed);
        }

        if let Some(range) = self.engine.loaded_time_range() {
            self.observe_range(range);
        }
        self.evaluate_buffer();
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    /// Move to `to`, notifying only on an actual change
    fn transition(&mut self, to: PlaybackState) -> bool {
        let from = self.state;
        if from == to {
            return false;
        }
        if let Err(err) = PlaybackState::validate_transition(from, to) {
            log::warn!("{}", err);
            return false;
        }

        self.state = to;
        self.snapshot.update(|s| s.state = to);
        log::debug!("Player state changed: {:?} -> {:?}", from, to);
        self.delegate.change_player_state(to);
        true
    }

    fn begin_session(&mut self, url: &str, play_requested: bool) -> Result<()> {
        self.release_session();
        self.transition(PlaybackState::Unknown);

        let (token, _) = self.sessions.begin(url);
        self.play_requested = play_requested;
        self.snapshot.update(|s| {
            s.url = Some(url.to_string());
            s.session = Some(token);
            s.duration = None;
            s.current_time = 0.0;
        });

        log::info!("Loading {} (session {})", url, token);
        let sink = EngineSink::new(token, self.forward.clone());
        self.engine.set_volume(self.volume);
        if let Err(err) = self.engine.load(url, sink) {
            let err = match err {
                PlayerError::Load(_) | PlayerError::Decode(_) => err,
                other => PlayerError::Load(other.to_string()),
            };
            self.fail(err.clone());
            return Err(err);
        }
        Ok(())
    }

    /// Invalidate the current session and everything tied to it
    fn release_session(&mut self) {
        self.seeks.reset(self.delegate.as_mut());
        self.buffer.clear();
        self.progress.reset();
        self.surface.detach();
        if self.sessions.retire().is_some() {
            self.engine.unload();
        }
    }

    fn on_ready(&mut self, duration: Option<f64>) {
        let duration = duration.or_else(|| self.engine.duration());
        let render = self.engine.render_output().map(Arc::new);

        let session = match self.sessions.current_mut() {
            Some(session) => session,
            None => return,
        };
        if session.ready {
            log::debug!("duplicate ready for session {}", session.token);
            return;
        }
        session.ready = true;
        session.duration = duration;
        if let Some(output) = &render {
            self.surface.attach(output);
        }
        session.render = render;
        log::info!(
            "Session {} ready, duration {:?}s",
            session.token,
            duration
        );

        self.snapshot.update(|s| s.duration = duration);
        if self.state == PlaybackState::Unknown {
            self.transition(PlaybackState::ReadyToPlay);
        }

        if let Some(start) = self.pending_start.take() {
            self.issue_seek(start, Box::new(|_: bool| {}));
        }
        if self.play_requested && self.state == PlaybackState::ReadyToPlay {
            self.start_playback();
        }
    }

    fn on_ended(&mut self) {
        if !matches!(
            self.state,
            PlaybackState::Playing | PlaybackState::Buffering | PlaybackState::Paused
        ) {
            return;
        }

        log::info!("Playback reached end of media");
        if let Some(sample) = self.progress.finish(self.duration()) {
            self.delegate
                .change_play_progress(sample.progress, sample.elapsed);
        }
        self.seeks.cancel(self.delegate.as_mut());
        self.buffer.abandon_stall();
        self.play_requested = false;
        self.rewind();
        self.transition(PlaybackState::Stopped);
    }

    fn start_playback(&mut self) {
        self.play_requested = true;
        if let Some(range) = self.engine.loaded_time_range() {
            self.observe_range(range);
        }

        let playhead = self.engine.current_time();
        if self.buffer.has_enough_to_play(playhead, self.duration()) {
            self.engine.set_rate(self.rate);
            self.transition(PlaybackState::Playing);
        } else {
            log::info!("Not enough data buffered at {:.2}s, buffering", playhead);
            self.enter_buffering();
        }
    }

    fn enter_buffering(&mut self) {
        self.engine.pause();
        self.buffer.enter_stall();
        self.transition(PlaybackState::Buffering);
    }

    fn fail(&mut self, err: PlayerError) {
        log::error!("Playback failed: {}", err);
        self.seeks.cancel(self.delegate.as_mut());
        self.buffer.abandon_stall();
        self.play_requested = false;
        self.engine.pause();
        self.transition(PlaybackState::Failed);
    }

    /// Return the engine to the start without a listener-visible seek
    fn rewind(&mut self) {
        if self.session_ready() {
            self.seeks.reposition(0.0, self.engine.as_mut());
        }
        self.progress.reset();
        self.snapshot.update(|s| s.current_time = 0.0);
    }

    fn observe_range(&mut self, range: TimeRange) {
        let duration = self.duration();
        if let Some(sample) = self.buffer.observe(range, duration) {
            self.delegate
                .change_load_progress(sample.progress, sample.loaded);
        }
    }

    /// Stall detection and the resume threshold
    fn evaluate_buffer(&mut self) {
        let playhead = self.engine.current_time();
        let duration = self.duration();

        if self.state == PlaybackState::Playing
            && self.buffer.caught_loaded_edge(playhead, duration)
        {
            log::info!("Playhead caught loaded edge at {:.2}s", playhead);
            self.enter_buffering();
            return;
        }

        if self.buffer.try_resume(playhead, duration) {
            log::info!("Buffered enough to resume at {:.2}s", playhead);
            self.snapshot.update(|s| s.current_time = playhead);
            let snapshot = self.snapshot.get();
            self.delegate.did_buffer(&snapshot);

            if self.state == PlaybackState::Buffering && self.play_requested {
                self.engine.set_rate(self.rate);
                self.transition(PlaybackState::Playing);
            }
        }
    }

    fn issue_seek(&mut self, target: f64, completion: SeekCompletion) {
        let duration = self.duration();
        let seq = self.seeks.request(
            target,
            duration,
            completion,
            self.engine.as_mut(),
            self.delegate.as_mut(),
        );
        let landed = self.seeks.pending_target().unwrap_or(target);
        self.snapshot.update(|s| s.seek_time = Some(landed));
        log::debug!("seek #{} to {:.3}s issued", seq, landed);
    }

    fn refresh_duration(&mut self) {
        let engine_duration = self.engine.duration();
        if let Some(session) = self.sessions.current_mut() {
            if session.duration.is_none() && engine_duration.is_some() {
                session.duration = engine_duration;
                self.snapshot.update(|s| s.duration = engine_duration);
            }
        }
    }

    fn duration(&self) -> Option<f64> {
        self.sessions
            .current()
            .and_then(|s| s.duration)
            .or_else(|| self.engine.duration())
    }

    fn session_ready(&self) -> bool {
        self.sessions.current().map(|s| s.ready).unwrap_or(false)
    }

    fn can_seek(&self) -> bool {
        self.session_ready()
            && !matches!(self.state, PlaybackState::Unknown | PlaybackState::Failed)
    }
}
