// Podium playback coordinator
// Turns raw engine signals into the listener's state, progress, buffering and
// seek notifications.

pub mod buffer;
pub mod machine;
pub mod manager;
pub mod progress;
pub mod seek;
pub mod session;
pub mod surface;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use buffer::{BufferObserver, BufferSample};
pub use machine::{Command, PlaybackStateMachine};
pub use manager::PlayerManager;
pub use progress::{ProgressObserver, ProgressSample, TickContext};
pub use seek::{SeekCompletion, SeekCoordinator};
pub use session::{PlaybackSession, SessionRegistry};
pub use surface::PlayerLayerView;

pub use podium_playback_core::*;
