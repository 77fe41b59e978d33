//! Entry point that wires key handlers, the registry and the keymap together.
//!
//! # Architecture
//!
//! 1. [`KeyHandlerSystem::init`] subscribes the keybinding reconciler (once per system)
//! 2. It spawns the keymap fetch on the ambient tokio runtime, if any, and does not wait for it
//! 3. It creates one [`KeyHandlerMgr`] per newly matched surface, each started in insert mode,
//!    and registers it
//!
//! Queries such as [`KeyHandlerSystem::is_command_mode`] resolve the focused surface through the
//! host's [`FocusTracker`] and are safe at any time, including before the keymap arrives.

use crate::{
    bus::{EventBus, PubSub, SubscriptionId},
    config::Config,
    handler::{KeyHandlerMgr, KeyInterpreter, Mode},
    keymap::{Keymap, SharedKeymap},
    loader::{FileSource, KeymapLoader, KeymapSource},
    reconciler,
    registry::Registry,
    surface::{FocusTracker, SurfaceId, SurfaceSelector},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::{runtime::Handle, task::JoinHandle};

/// Creates the concrete interpreters for a surface.
///
/// Interpreters receive the shared keymap so the command interpreter sees bindings installed
/// after construction and the insert interpreter sees the mode-switch key once it is known.
pub trait InterpreterFactory: Send + Sync {
    fn create(
        &self,
        mode: Mode,
        surface: SurfaceId,
        keymap: SharedKeymap,
    ) -> Arc<dyn KeyInterpreter>;
}

/// Modal key handling for every editable surface of a host.
pub struct KeyHandlerSystem {
    bus: Arc<dyn EventBus>,
    keymap: SharedKeymap,
    registry: Registry,
    loader: KeymapLoader,
    factory: Arc<dyn InterpreterFactory>,
    focus: Arc<dyn FocusTracker>,
    selector: Arc<dyn SurfaceSelector>,
    reconciler: Mutex<Option<SubscriptionId>>,
}

impl KeyHandlerSystem {
    pub fn builder(
        factory: Arc<dyn InterpreterFactory>,
        focus: Arc<dyn FocusTracker>,
        selector: Arc<dyn SurfaceSelector>,
    ) -> KeyHandlerSystemBuilder {
        KeyHandlerSystemBuilder::new(factory, focus, selector)
    }

    /// Register the surfaces matched by `selector` and start loading the keymap.
    ///
    /// The returned handle completes when the load finishes. Load failures are logged, never
    /// returned; dropping the handle leaves the load running. Outside a tokio runtime the
    /// surfaces are still registered but no load starts and `None` is returned.
    ///
    /// Calling it again while a load is in flight races the two loads.
    pub fn init(&self, selector: &str, keymap_address: &str) -> Option<JoinHandle<()>> {
        self.subscribe_reconciler();

        let load = match Handle::try_current() {
            Ok(runtime) => {
                let loader = self.loader.clone();
                let address = keymap_address.to_string();
                Some(runtime.spawn(async move {
                    let _ = loader.load(&address).await;
                }))
            },
            Err(err) => {
                tracing::warn!(keymap_address, %err, "no tokio runtime, keymap not loaded");
                None
            },
        };

        let registered = self.create(selector);
        tracing::debug!(selector, registered, keymap_address, "key handlers initialized");
        load
    }

    /// [`init`](Self::init) with the selector and keymap address from `config`.
    pub fn init_with_config(&self, config: &Config) -> Option<JoinHandle<()>> {
        self.init(&config.selector, &config.keymap)
    }

    /// Create and register a manager for each surface matched by `selector`.
    ///
    /// Surfaces that already have a manager keep it. Returns the number of managers created.
    pub fn create(&self, selector: &str) -> usize {
        let mut created = 0;
        for surface in self.selector.select(selector) {
            if self.registry.get(surface).is_some() {
                tracing::trace!(%surface, "surface already registered");
                continue;
            }
            self.new_manager(surface);
            created += 1;
        }
        created
    }

    /// The manager for one surface, created and registered if the surface has none yet.
    pub fn register_surface(&self, surface: SurfaceId) -> Arc<KeyHandlerMgr> {
        match self.registry.get(surface) {
            Some(mgr) => mgr,
            None => self.new_manager(surface),
        }
    }

    fn new_manager(&self, surface: SurfaceId) -> Arc<KeyHandlerMgr> {
        let insert = self
            .factory
            .create(Mode::Insert, surface, self.keymap.clone());
        let command = self
            .factory
            .create(Mode::Command, surface, self.keymap.clone());
        let mgr = Arc::new(KeyHandlerMgr::new(
            surface,
            insert,
            command,
            self.bus.clone(),
        ));
        self.registry.register(mgr.clone());
        mgr
    }

    fn subscribe_reconciler(&self) {
        let mut subscription = self.reconciler.lock();
        if subscription.is_none() {
            *subscription = Some(reconciler::subscribe(
                self.bus.as_ref(),
                self.keymap.clone(),
            ));
        }
    }

    /// The manager owning the focused surface.
    pub fn find_active(&self) -> Option<Arc<KeyHandlerMgr>> {
        self.registry.find_active(self.focus.as_ref())
    }

    /// Whether the focused surface is in command mode. `false` when no registered surface has
    /// focus.
    pub fn is_command_mode(&self) -> bool {
        self.registry.is_command_mode(self.focus.as_ref())
    }

    /// Toggle the focused surface's mode. `None` when no registered surface has focus.
    pub fn toggle_mode(&self) -> Option<Mode> {
        self.find_active().map(|mgr| mgr.toggle_mode())
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    pub fn keymap(&self) -> &SharedKeymap {
        &self.keymap
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn loader(&self) -> &KeymapLoader {
        &self.loader
    }
}

/// Builder for [`KeyHandlerSystem`].
///
/// Defaults to an in-process [`PubSub`] bus, a [`FileSource`] transport and an empty keymap.
pub struct KeyHandlerSystemBuilder {
    factory: Arc<dyn InterpreterFactory>,
    focus: Arc<dyn FocusTracker>,
    selector: Arc<dyn SurfaceSelector>,
    bus: Option<Arc<dyn EventBus>>,
    source: Option<Arc<dyn KeymapSource>>,
    keymap: Option<SharedKeymap>,
}

impl KeyHandlerSystemBuilder {
    pub fn new(
        factory: Arc<dyn InterpreterFactory>,
        focus: Arc<dyn FocusTracker>,
        selector: Arc<dyn SurfaceSelector>,
    ) -> Self {
        Self {
            factory,
            focus,
            selector,
            bus: None,
            source: None,
            keymap: None,
        }
    }

    pub fn bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn source(mut self, source: Arc<dyn KeymapSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn keymap(mut self, keymap: SharedKeymap) -> Self {
        self.keymap = Some(keymap);
        self
    }

    pub fn build(self) -> KeyHandlerSystem {
        let bus = self.bus.unwrap_or_else(|| Arc::new(PubSub::new()));
        let keymap = self.keymap.unwrap_or_else(Keymap::shared);
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(FileSource::new()));

        KeyHandlerSystem {
            loader: KeymapLoader::new(source, keymap.clone()),
            bus,
            keymap,
            registry: Registry::new(),
            factory: self.factory,
            focus: self.focus,
            selector: self.selector,
            reconciler: Mutex::new(None),
        }
    }
}
