//! Late binding of plugin passthrough keys.
//!
//! Plugins announce keys that must keep their insert behavior in command mode on
//! [`topics::PLUGIN_INSERT_KEYBINDINGS`]. Announcements may arrive before the keymap has
//! loaded; [`Keymap::add_insert_keybindings`](crate::keymap::Keymap::add_insert_keybindings)
//! holds the latest one until the loader drains it.

use crate::{
    bus::{topics, EventBus, Payload, SubscriptionId},
    keymap::SharedKeymap,
};
use std::sync::Arc;

/// Route insert keybinding announcements on `bus` into `keymap`.
pub fn subscribe(bus: &dyn EventBus, keymap: SharedKeymap) -> SubscriptionId {
    bus.subscribe(
        topics::PLUGIN_INSERT_KEYBINDINGS,
        Arc::new(move |payload| match payload {
            Payload::Keys(keys) => keymap.write().add_insert_keybindings(keys.clone()),
            other => tracing::debug!(?other, "ignoring insert keybindings without keys"),
        }),
    )
}
