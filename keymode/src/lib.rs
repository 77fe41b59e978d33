//! Modal key handling for editable surfaces.
//!
//! Every editable surface gets a [`KeyHandlerMgr`] that switches between an insert interpreter
//! (ordinary typing) and a command interpreter (single keys bound to editor commands). The
//! command keymap is fetched asynchronously and shared by every surface; plugins can announce
//! passthrough keys before it arrives, and can pause key handling while they own input.
//!
//! ```rust,ignore
//! let system = KeyHandlerSystem::builder(factory, focus, selector).build();
//! system.init(".editable", "keymap/keymap.json");
//!
//! if system.is_command_mode() {
//!     // route keys through the command keymap
//! }
//! ```

pub mod bus;
pub mod config;
pub mod handler;
pub mod keymap;
pub mod loader;
pub mod reconciler;
pub mod registry;
pub mod surface;
pub mod system;

#[cfg(any(test, feature = "test-support"))]
pub mod test;

pub use bus::{topics, EventBus, Handler, Payload, PubSub, SubscriptionId};
pub use config::Config;
pub use handler::{KeyHandlerMgr, KeyInterpreter, Mode};
pub use keymap::{
    Bindings, DocumentError, KeyId, Keymap, KeymapDocument, SharedKeymap, COMMAND_MAP,
    EXIT_COMMAND, INSERT_MAP, MODE_SWITCH_ENTRY,
};
pub use loader::{FetchError, FileSource, KeymapError, KeymapLoader, KeymapSource};
pub use registry::Registry;
pub use surface::{FocusTracker, SurfaceId, SurfaceSelector};
pub use system::{InterpreterFactory, KeyHandlerSystem, KeyHandlerSystemBuilder};
