// Listener contract for playback notifications
// All methods are invoked on the coordinator's owner thread, in event order.

use crate::state::{PlaybackState, PlayerSnapshot};
use crossbeam_channel::{Receiver, Sender};

/// Application-side listener
/// Implementations should be lightweight and non-blocking
pub trait PlayerDelegate: Send {
    /// Called once per actual state change
    fn change_player_state(&mut self, state: PlaybackState);

    /// Playhead progress, `progress` in 0 ~ 1, `seconds` is the raw playhead
    fn change_play_progress(&mut self, progress: f64, seconds: f64);

    /// Loaded progress, `progress` in 0 ~ 1, `seconds` is the loaded edge
    fn change_load_progress(&mut self, progress: f64, seconds: f64);

    /// Enough data is buffered to resume after a stall
    fn did_buffer(&mut self, player: &PlayerSnapshot);

    /// A seek burst started
    fn start_player_seek_time(&mut self);

    /// A seek burst finished (successfully or not)
    fn completion_player_seek_time(&mut self);
}

/// Listener notifications as values
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StateChanged(PlaybackState),
    PlayProgress { progress: f64, seconds: f64 },
    LoadProgress { progress: f64, seconds: f64 },
    DidBuffer(PlayerSnapshot),
    SeekStarted,
    SeekCompleted,
}

impl PlayerEvent {
    /// Replay this event against a delegate
    pub fn deliver(self, delegate: &mut dyn PlayerDelegate) {
        match self {
            PlayerEvent::StateChanged(state) => delegate.change_player_state(state),
            PlayerEvent::PlayProgress { progress, seconds } => {
                delegate.change_play_progress(progress, seconds)
            }
            PlayerEvent::LoadProgress { progress, seconds } => {
                delegate.change_load_progress(progress, seconds)
            }
            PlayerEvent::DidBuffer(snapshot) => delegate.did_buffer(&snapshot),
            PlayerEvent::SeekStarted => delegate.start_player_seek_time(),
            PlayerEvent::SeekCompleted => delegate.completion_player_seek_time(),
        }
    }
}

/// Delegate that forwards every notification over a channel,
/// for UI loops that poll instead of being called back
pub struct ChannelDelegate {
    tx: Sender<PlayerEvent>,
}

impl ChannelDelegate {
    pub fn new() -> (Self, Receiver<PlayerEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, event: PlayerEvent) {
        if self.tx.send(event).is_err() {
            log::trace!("event receiver dropped");
        }
    }
}

impl PlayerDelegate for ChannelDelegate {
    fn change_player_state(&mut self, state: PlaybackState) {
        self.send(PlayerEvent::StateChanged(state));
    }

    fn change_play_progress(&mut self, progress: f64, seconds: f64) {
        self.send(PlayerEvent::PlayProgress { progress, seconds });
    }

    fn change_load_progress(&mut self, progress: f64, seconds: f64) {
        self.send(PlayerEvent::LoadProgress { progress, seconds });
    }

    fn did_buffer(&mut self, player: &PlayerSnapshot) {
        self.send(PlayerEvent::DidBuffer(player.clone()));
    }

    fn start_player_seek_time(&mut self) {
        self.send(PlayerEvent::SeekStarted);
    }

    fn completion_player_seek_time(&mut self) {
        self.send(PlayerEvent::SeekCompleted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_delegate_preserves_order() {
        let (mut delegate, rx) = ChannelDelegate::new();
        delegate.change_player_state(PlaybackState::ReadyToPlay);
        delegate.start_player_seek_time();
        delegate.change_play_progress(0.5, 50.0);
        delegate.completion_player_seek_time();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                PlayerEvent::StateChanged(PlaybackState::ReadyToPlay),
                PlayerEvent::SeekStarted,
                PlayerEvent::PlayProgress {
                    progress: 0.5,
                    seconds: 50.0
                },
                PlayerEvent::SeekCompleted,
            ]
        );
    }

    #[test]
    fn test_deliver_round_trips_through_delegate() {
        let (mut delegate, rx) = ChannelDelegate::new();
        PlayerEvent::LoadProgress {
            progress: 0.25,
            seconds: 25.0,
        }
        .deliver(&mut delegate);
        assert_eq!(
            rx.try_recv().ok(),
            Some(PlayerEvent::LoadProgress {
                progress: 0.25,
                seconds: 25.0
            })
        );
    }

    #[test]
    fn test_dropped_receiver_is_harmless() {
        let (mut delegate, rx) = ChannelDelegate::new();
        drop(rx);
        delegate.did_buffer(&PlayerSnapshot::default());
    }
}
