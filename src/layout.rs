//! Layout Store
//!
//! Shared layout signals. The dashboard reflows when the chat panel opens or
//! closes; subscribers get the latest state, not every intermediate one.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of layout signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LayoutState {
    /// Chat side panel is visible
    pub chat_open: bool,
}

/// Observable layout state, cheap to clone and share
#[derive(Debug, Clone)]
pub struct LayoutStore {
    tx: Arc<watch::Sender<LayoutState>>,
}

impl Default for LayoutStore {
    fn default() -> Self {
        Self::new(LayoutState::default())
    }
}

impl LayoutStore {
    pub fn new(initial: LayoutState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> LayoutState {
        *self.tx.borrow()
    }

    pub fn is_chat_open(&self) -> bool {
        self.state().chat_open
    }

    pub fn open_chat(&self) {
        self.set_chat_open(true);
    }

    pub fn close_chat(&self) {
        self.set_chat_open(false);
    }

    /// Flip the chat panel, returning the new visibility
    pub fn toggle_chat(&self) -> bool {
        let mut open = false;
        self.tx.send_modify(|state| {
            state.chat_open = !state.chat_open;
            open = state.chat_open;
        });
        tracing::debug!(chat_open = open, "Layout changed");
        open
    }

    /// Receiver that wakes on every change
    pub fn subscribe(&self) -> watch::Receiver<LayoutState> {
        self.tx.subscribe()
    }

    fn set_chat_open(&self, open: bool) {
        // No wakeup when nothing changes
        let changed = self.tx.send_if_modified(|state| {
            if state.chat_open == open {
                return false;
            }
            state.chat_open = open;
            true
        });
        if changed {
            tracing::debug!(chat_open = open, "Layout changed");
        }
    }
}
