//! Registry of every key handler created since startup.

use crate::{
    handler::KeyHandlerMgr,
    surface::{FocusTracker, SurfaceId},
};
use parking_lot::RwLock;
use std::sync::Arc;

/// Insertion-ordered collection of [`KeyHandlerMgr`]s, one per registered surface.
///
/// Entries are only ever appended.
#[derive(Default)]
pub struct Registry {
    managers: RwLock<Vec<Arc<KeyHandlerMgr>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, mgr: Arc<KeyHandlerMgr>) {
        tracing::debug!(surface = %mgr.surface(), "registered key handler");
        self.managers.write().push(mgr);
    }

    pub fn len(&self) -> usize {
        self.managers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the registered managers in registration order.
    pub fn managers(&self) -> Vec<Arc<KeyHandlerMgr>> {
        self.managers.read().clone()
    }

    /// The first manager registered for `surface`.
    pub fn get(&self, surface: SurfaceId) -> Option<Arc<KeyHandlerMgr>> {
        self.managers
            .read()
            .iter()
            .find(|mgr| mgr.surface() == surface)
            .cloned()
    }

    /// The manager owning the focused surface, if focus is inside a registered one.
    pub fn find_active(&self, focus: &dyn FocusTracker) -> Option<Arc<KeyHandlerMgr>> {
        let surface = focus.current_editable()?;
        self.get(surface)
    }

    /// Whether the focused surface is in command mode. `false` when nothing registered has focus.
    pub fn is_command_mode(&self, focus: &dyn FocusTracker) -> bool {
        self.find_active(focus)
            .is_some_and(|mgr| mgr.is_command_mode())
    }
}
