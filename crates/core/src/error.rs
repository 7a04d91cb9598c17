// Error handling for the playback coordinator

use thiserror::Error;

/// Failure reported by the media engine collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The resource could not be opened (bad locator, missing file)
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Network failure while loading or streaming
    #[error("network failure: {0}")]
    Network(String),

    /// Content could not be decoded
    #[error("decode failure: {0}")]
    Decode(String),
}

/// Playback coordinator error types
#[derive(Debug, Clone, Error)]
pub enum PlayerError {
    /// Operation not permitted from the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource could not be loaded (bad URL, network)
    #[error("Load error: {0}")]
    Load(String),

    /// Decoding failed mid-stream
    #[error("Decode error: {0}")]
    Decode(String),

    /// Seek rejected or failed; only surfaces through the seek completion
    #[error("Seek error: {0}")]
    Seek(String),

    /// Engine collaborator refused a command
    #[error("Engine error: {0}")]
    Engine(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// The owner thread has shut down
    #[error("Player coordinator is no longer running")]
    Disconnected,

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl PlayerError {
    /// Whether this error ends the current session (state goes to Failed)
    pub fn is_fatal(&self) -> bool {
        matches!(self, PlayerError::Load(_) | PlayerError::Decode(_))
    }
}

impl From<EngineError> for PlayerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ResourceUnavailable(msg) | EngineError::Network(msg) => {
                PlayerError::Load(msg)
            }
            EngineError::Decode(msg) => PlayerError::Decode(msg),
        }
    }
}

impl From<std::io::Error> for PlayerError {
    fn from(err: std::io::Error) -> Self {
        PlayerError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for PlayerError {
    fn from(err: toml::de::Error) -> Self {
        PlayerError::Config(err.to_string())
    }
}

/// Result type alias for coordinator operations
pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_classification() {
        let load: PlayerError = EngineError::Network("timeout".into()).into();
        assert!(matches!(load, PlayerError::Load(_)));
        assert!(load.is_fatal());

        let decode: PlayerError = EngineError::Decode("bad frame".into()).into();
        assert!(matches!(decode, PlayerError::Decode(_)));
        assert!(decode.is_fatal());

        assert!(!PlayerError::Seek("interrupted".into()).is_fatal());
        assert!(!PlayerError::InvalidState("x".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = PlayerError::InvalidState("cannot pause from Stopped".into());
        assert_eq!(err.to_string(), "Invalid state: cannot pause from Stopped");
    }
}
