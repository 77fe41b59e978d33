//! Per-editable modal state machine.
//!
//! A [`KeyHandlerMgr`] presides over one editable surface. It owns an insert interpreter and a
//! command interpreter, both created up front, and keeps exactly one of them active. Toggling
//! swaps the active interpreter and announces the new mode on
//! [`topics::MODE_COMMAND`](crate::bus::topics::MODE_COMMAND). Plugins that take over input
//! pause the active interpreter through [`topics::PLUGIN_OPEN`] and restore it through
//! [`topics::PLUGIN_SAVED`] or [`topics::PLUGIN_EXITED`].

use crate::{
    bus::{topics, EventBus, Payload, SubscriptionId},
    surface::SurfaceId,
};
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{Arc, Weak},
};

/// Which key interpretation strategy is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Keystrokes produce text.
    Insert,
    /// Keystrokes are looked up in the command keymap.
    Command,
}

impl Mode {
    pub fn other(self) -> Self {
        match self {
            Mode::Insert => Mode::Command,
            Mode::Command => Mode::Insert,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Insert => f.write_str("insert"),
            Mode::Command => f.write_str("command"),
        }
    }
}

/// A key interpretation strategy for one editable surface.
///
/// Both methods must be idempotent: starting a started interpreter or stopping a stopped one
/// has no further effect.
pub trait KeyInterpreter: Send + Sync {
    /// Begin intercepting key input for the surface.
    fn start(&self);

    /// Stop intercepting key input for the surface.
    fn stop(&self);
}

struct ModalState {
    insert: Arc<dyn KeyInterpreter>,
    command: Arc<dyn KeyInterpreter>,
    active: Mode,
}

impl ModalState {
    fn interpreter(&self, mode: Mode) -> Arc<dyn KeyInterpreter> {
        match mode {
            Mode::Insert => self.insert.clone(),
            Mode::Command => self.command.clone(),
        }
    }

    fn active_interpreter(&self) -> Arc<dyn KeyInterpreter> {
        self.interpreter(self.active)
    }
}

// Interpreters are always called with the state lock released so they can call back in.
fn suspend(state: &Mutex<ModalState>) {
    let interpreter = state.lock().active_interpreter();
    interpreter.stop();
}

fn resume(state: &Mutex<ModalState>) {
    let interpreter = state.lock().active_interpreter();
    interpreter.start();
}

/// Modal key handling for one editable surface.
pub struct KeyHandlerMgr {
    surface: SurfaceId,
    state: Arc<Mutex<ModalState>>,
    bus: Arc<dyn EventBus>,
    subscriptions: Vec<SubscriptionId>,
}

impl KeyHandlerMgr {
    /// Create the state machine for `surface` and start it in insert mode.
    ///
    /// Subscribes to the plugin lifecycle topics on `bus`; the subscriptions are removed when
    /// the manager is dropped.
    pub fn new(
        surface: SurfaceId,
        insert: Arc<dyn KeyInterpreter>,
        command: Arc<dyn KeyInterpreter>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        let state = Arc::new(Mutex::new(ModalState {
            insert,
            command,
            active: Mode::Insert,
        }));

        let subscriptions = vec![
            subscribe(&bus, topics::PLUGIN_OPEN, &state, suspend),
            subscribe(&bus, topics::PLUGIN_SAVED, &state, resume),
            subscribe(&bus, topics::PLUGIN_EXITED, &state, resume),
        ];

        resume(&state);
        tracing::debug!(%surface, "key handler started in insert mode");

        Self {
            surface,
            state,
            bus,
            subscriptions,
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn mode(&self) -> Mode {
        self.state.lock().active
    }

    pub fn is_command_mode(&self) -> bool {
        self.mode() == Mode::Command
    }

    /// Switch to the other mode and announce it.
    ///
    /// The outgoing interpreter is stopped before the incoming one starts. Always legal, even
    /// before the command keymap has loaded.
    pub fn toggle_mode(&self) -> Mode {
        let (outgoing, incoming, mode) = {
            let mut state = self.state.lock();
            let outgoing = state.active_interpreter();
            state.active = state.active.other();
            (outgoing, state.active_interpreter(), state.active)
        };

        outgoing.stop();
        incoming.start();
        tracing::debug!(surface = %self.surface, %mode, "key handler mode switched");

        self.bus
            .publish(topics::MODE_COMMAND, &Payload::Flag(mode == Mode::Command));
        mode
    }

    /// Pause the active interpreter without changing modes.
    pub fn suspend(&self) {
        suspend(&self.state);
    }

    /// Restart the active interpreter after [`suspend`](Self::suspend).
    pub fn resume(&self) {
        resume(&self.state);
    }
}

impl Drop for KeyHandlerMgr {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

impl fmt::Debug for KeyHandlerMgr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandlerMgr")
            .field("surface", &self.surface)
            .field("mode", &self.mode())
            .finish()
    }
}

fn subscribe(
    bus: &Arc<dyn EventBus>,
    topic: &str,
    state: &Arc<Mutex<ModalState>>,
    action: fn(&Mutex<ModalState>),
) -> SubscriptionId {
    let state: Weak<Mutex<ModalState>> = Arc::downgrade(state);
    bus.subscribe(
        topic,
        Arc::new(move |_| {
            if let Some(state) = state.upgrade() {
                action(&state);
            }
        }),
    )
}
