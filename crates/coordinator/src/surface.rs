// Display surface back-reference to the active session's render output

use parking_lot::RwLock;
use podium_playback_core::RenderOutput;
use std::sync::{Arc, Weak};

/// Slot shared by the coordinator and every layer view
#[derive(Clone, Default)]
pub(crate) struct RenderSlot {
    inner: Arc<RwLock<Weak<RenderOutput>>>,
}

impl RenderSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Point the slot at the current session's output
    pub(crate) fn attach(&self, output: &Arc<RenderOutput>) {
        *self.inner.write() = Arc::downgrade(output);
    }

    pub(crate) fn detach(&self) {
        *self.inner.write() = Weak::new();
    }

    pub(crate) fn view(&self) -> PlayerLayerView {
        PlayerLayerView { slot: self.clone() }
    }
}

/// Handle given to the display surface.
/// It never keeps a session's output alive; once the session is gone it resolves to `None`.
#[derive(Clone)]
pub struct PlayerLayerView {
    slot: RenderSlot,
}

impl PlayerLayerView {
    pub fn render_output(&self) -> Option<RenderOutput> {
        self.slot.inner.read().upgrade().map(|output| *output)
    }

    pub fn is_attached(&self) -> bool {
        self.render_output().is_some()
    }
}
