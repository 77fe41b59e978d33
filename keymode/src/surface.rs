//! Editable surfaces and the host capabilities that locate them.
//!
//! Surfaces are owned by the host application. This crate only refers to them by
//! [`SurfaceId`], asks a [`SurfaceSelector`] which surfaces a selector matches, and asks a
//! [`FocusTracker`] which one currently has focus.

use std::fmt;

/// Opaque reference to a host-owned editable region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Resolves a host selector to the editable surfaces it matches.
pub trait SurfaceSelector: Send + Sync {
    /// Surfaces matched by `selector`, in host order. May be empty.
    fn select(&self, selector: &str) -> Vec<SurfaceId>;
}

/// Reports which editable surface has input focus.
pub trait FocusTracker: Send + Sync {
    /// The focused surface, or `None` when focus is outside every editable.
    fn current_editable(&self) -> Option<SurfaceId>;
}
