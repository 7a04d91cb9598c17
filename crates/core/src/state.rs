// Playback state and the shared read-only snapshot

use crate::error::{PlayerError, Result};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of the current media item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PlaybackState {
    /// Nothing loaded yet, or a new resource is loading
    Unknown = 0,
    /// Load or decode failed; sticky until a new resource is loaded
    Failed = 1,
    /// Engine is ready, playback not started
    ReadyToPlay = 2,
    /// Playback requested but waiting for data
    Buffering = 3,
    /// Playing
    Playing = 4,
    /// Paused by the user
    Paused = 5,
    /// Stopped; play() rewinds, rePlay() reloads
    Stopped = 6,
}

impl PlaybackState {
    /// Numeric code used across the C ABI
    pub fn code(self) -> i32 {
        self as i32
    }

    /// States in which the playhead is expected to advance
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Buffering)
    }

    /// Validate a transition against the state table.
    ///
    /// `Unknown` as a target means "a new resource is being loaded", which is
    /// allowed from every state except `Unknown` itself.
    pub fn validate_transition(from: PlaybackState, to: PlaybackState) -> Result<()> {
        use PlaybackState::*;

        let allowed = match (from, to) {
            // A load in progress can become ready, fail, or be stopped
            (Unknown, ReadyToPlay) | (Unknown, Failed) | (Unknown, Stopped) => true,

            // Loading a new resource
            (Unknown, Unknown) => false,
            (_, Unknown) => true,

            // Failed is terminal until a reload
            (Failed, _) => false,

            // Fatal engine errors are accepted from any live state
            (_, Failed) => true,

            // From ReadyToPlay
            (ReadyToPlay, Playing) | (ReadyToPlay, Buffering) | (ReadyToPlay, Stopped) => true,

            // From Playing
            (Playing, Buffering) | (Playing, Paused) | (Playing, Stopped) => true,

            // From Buffering
            (Buffering, Playing) | (Buffering, Paused) | (Buffering, Stopped) => true,

            // From Paused
            (Paused, Playing) | (Paused, Buffering) | (Paused, Stopped) => true,

            // From Stopped
            (Stopped, Playing) | (Stopped, Buffering) => true,

            _ => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(PlayerError::InvalidState(format!(
                "Invalid state transition from {:?} to {:?}",
                from, to
            )))
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Unknown => "unknown",
            PlaybackState::Failed => "failed",
            PlaybackState::ReadyToPlay => "ready",
            PlaybackState::Buffering => "buffering",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Read-only view of the player, refreshed by the owner thread
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    /// Duration in seconds, `None` until the engine knows it
    pub duration: Option<f64>,
    /// Playhead in seconds
    pub current_time: f64,
    /// Volume (0.0 - 1.0)
    pub volume: f32,
    /// Last requested start/seek position in seconds
    pub seek_time: Option<f64>,
    /// Locator of the current resource
    pub url: Option<String>,
    /// Token of the current session
    pub session: Option<u64>,
}

impl PlayerSnapshot {
    /// Duration in seconds, 0 when unknown
    pub fn duration_secs(&self) -> f64 {
        self.duration.unwrap_or(0.0)
    }
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::Unknown,
            duration: None,
            current_time: 0.0,
            volume: 1.0,
            seek_time: None,
            url: None,
            session: None,
        }
    }
}

/// Thread-safe snapshot container shared between the owner thread and readers
#[derive(Clone, Default)]
pub struct SnapshotCell {
    inner: Arc<RwLock<PlayerSnapshot>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> PlayerSnapshot {
        self.inner.read().clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.read().state
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut PlayerSnapshot),
    {
        let mut snapshot = self.inner.write();
        f(&mut snapshot);
    }
}
