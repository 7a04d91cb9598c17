// Playback sessions: one loaded resource, identified by a monotonically increasing token

use podium_playback_core::RenderOutput;
use std::sync::Arc;

/// One loaded media resource
#[derive(Debug)]
pub struct PlaybackSession {
    pub token: u64,
    pub url: String,
    /// Engine reported readiness for this resource
    pub ready: bool,
    /// Duration in seconds once known
    pub duration: Option<f64>,
    /// Strong reference to the render output; surfaces only hold weak ones
    pub render: Option<Arc<RenderOutput>>,
}

/// Issues session tokens and tracks which session is current
#[derive(Debug, Default)]
pub struct SessionRegistry {
    last_token: u64,
    current: Option<PlaybackSession>,
    last_url: Option<String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session, replacing (and returning) the current one
    pub fn begin(&mut self, url: &str) -> (u64, Option<PlaybackSession>) {
        self.last_token += 1;
        let token = self.last_token;
        let previous = self.current.replace(PlaybackSession {
            token,
            url: url.to_string(),
            ready: false,
            duration: None,
            render: None,
        });
        self.last_url = Some(url.to_string());
        log::debug!("session {} begins for {}", token, url);
        (token, previous)
    }

    /// Invalidate the current session without starting another
    pub fn retire(&mut self) -> Option<PlaybackSession> {
        let retired = self.current.take();
        if let Some(session) = &retired {
            log::debug!("session {} retired", session.token);
        }
        retired
    }

    pub fn current(&self) -> Option<&PlaybackSession> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut PlaybackSession> {
        self.current.as_mut()
    }

    pub fn current_token(&self) -> Option<u64> {
        self.current.as_ref().map(|s| s.token)
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.current_token() == Some(token)
    }

    /// Locator of the most recent session, even if retired
    pub fn last_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }
}
