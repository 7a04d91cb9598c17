// Seek serialization: one request in flight, later requests supersede earlier ones

use podium_playback_core::{PlayerDelegate, PlayerEngine};

/// Called once with `true` if the seek landed, `false` if it failed or was invalidated
pub type SeekCompletion = Box<dyn FnOnce(bool) + Send>;

/// An accepted seek awaiting engine acknowledgement
pub struct SeekRequest {
    pub target: f64,
    pub seq: u64,
    completion: SeekCompletion,
}

impl SeekRequest {
    fn complete(self, finished: bool) {
        (self.completion)(finished);
    }
}

/// Clamp a seek target into `[0, duration]`; only the lower bound applies when
/// the duration is unknown
pub fn clamp_target(target: f64, duration: Option<f64>) -> f64 {
    let target = if target.is_nan() { 0.0 } else { target.max(0.0) };
    match duration {
        Some(d) if d.is_finite() && d >= 0.0 => target.min(d),
        _ => target,
    }
}

#[derive(Default)]
pub struct SeekCoordinator {
    last_seq: u64,
    pending: Option<SeekRequest>,
}

impl SeekCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_target(&self) -> Option<f64> {
        self.pending.as_ref().map(|req| req.target)
    }

    fn next_seq(&mut self) -> u64 {
        self.last_seq += 1;
        self.last_seq
    }

    /// Issue a seek. A still-pending request is dropped without completing;
    /// `start_player_seek_time` fires only for the first request of a burst.
    pub fn request(
        &mut self,
        target: f64,
        duration: Option<f64>,
        completion: SeekCompletion,
        engine: &mut dyn PlayerEngine,
        delegate: &mut dyn PlayerDelegate,
    ) -> u64 {
        let target = clamp_target(target, duration);
        let seq = self.next_seq();

        match self.pending.take() {
            Some(superseded) => {
                log::debug!(
                    "seek #{} to {:.3}s superseded by #{} to {:.3}s",
                    superseded.seq,
                    superseded.target,
                    seq,
                    target
                );
            }
            None => delegate.start_player_seek_time(),
        }

        self.pending = Some(SeekRequest {
            target,
            seq,
            completion,
        });
        engine.seek(target, seq);
        seq
    }

    /// Reposition the engine without a listener-visible request.
    /// The acknowledgement is ignored since `seq` never becomes pending.
    pub fn reposition(&mut self, target: f64, engine: &mut dyn PlayerEngine) {
        let seq = self.next_seq();
        engine.seek(target.max(0.0), seq);
    }

    /// Engine acknowledgement. Returns the landed target when `seq` is the
    /// pending request; stale acknowledgements are ignored.
    pub fn on_finished(
        &mut self,
        seq: u64,
        finished: bool,
        delegate: &mut dyn PlayerDelegate,
    ) -> Option<f64> {
        let request = match self.pending.take() {
            Some(req) if req.seq == seq => req,
            other => {
                self.pending = other;
                log::debug!("ignoring stale seek acknowledgement #{}", seq);
                return None;
            }
        };

        if !finished {
            log::warn!("seek #{} to {:.3}s failed", request.seq, request.target);
        }
        let target = request.target;
        delegate.completion_player_seek_time();
        request.complete(finished);
        Some(target)
    }

    /// Resolve the pending request as failed (session invalidated, stop, error)
    pub fn cancel(&mut self, delegate: &mut dyn PlayerDelegate) -> bool {
        match self.pending.take() {
            Some(request) => {
                log::debug!("seek #{} cancelled", request.seq);
                delegate.completion_player_seek_time();
                request.complete(false);
                true
            }
            None => false,
        }
    }

    /// Start numbering afresh for a new session
    pub fn reset(&mut self, delegate: &mut dyn PlayerDelegate) {
        self.cancel(delegate);
        self.last_seq = 0;
    }
}
