// Core types and traits for the Podium playback coordinator

pub mod callback;
pub mod config;
pub mod engine;
pub mod error;
pub mod state;

// Re-export commonly used types
pub use callback::{ChannelDelegate, PlayerDelegate, PlayerEvent};
pub use config::{BufferPolicy, CoordinatorConfig};
pub use engine::{
    EngineSignal, EngineSink, PlayerEngine, RenderOutput, SignalForward, TimeRange,
};
pub use error::{EngineError, PlayerError, Result};
pub use state::{PlaybackState, PlayerSnapshot, SnapshotCell};
