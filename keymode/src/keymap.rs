//! Command keymap shared by every key handler.
//!
//! A keymap document is a flat JSON object. Each entry is either a named sub-map of
//! key identifiers to command names, or the reserved [`MODE_SWITCH_ENTRY`] whose value is
//! the key that toggles between insert and command mode:
//!
//! ```json
//! {
//!     "mode-switch-key": "27",
//!     "COMMAND_MAP": { "100": "delete", "104": "left" },
//!     "INSERT_MAP": {}
//! }
//! ```
//!
//! The parsed [`KeymapDocument`] is installed into a [`Keymap`], which lives behind a
//! [`SharedKeymap`] handed to every interpreter at construction. The keymap starts empty and is
//! filled once the document arrives; keybinding announcements that arrive earlier are held in a
//! single pending slot until then.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::Value;
use std::{fmt, sync::Arc};
use thiserror::Error;

/// Reserved document entry naming the mode-switch key.
pub const MODE_SWITCH_ENTRY: &str = "mode-switch-key";
/// Sub-map consulted by the command interpreter.
pub const COMMAND_MAP: &str = "COMMAND_MAP";
/// Sub-map of keys that fall through to insert behavior while in command mode.
pub const INSERT_MAP: &str = "INSERT_MAP";
/// Command bound to the mode-switch key in [`COMMAND_MAP`].
pub const EXIT_COMMAND: &str = "exit";

/// Key identifier as it appears in keymap documents and keybinding announcements.
///
/// Documents use both numeric key codes and strings, so identifiers are normalized to their
/// string form: `27` and `"27"` name the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(from = "RawKeyId")]
pub struct KeyId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawKeyId {
    Code(u64),
    Name(String),
}

impl From<RawKeyId> for KeyId {
    fn from(raw: RawKeyId) -> Self {
        match raw {
            RawKeyId::Code(code) => Self(code.to_string()),
            RawKeyId::Name(name) => Self(name),
        }
    }
}

impl KeyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric key code, if the identifier is an integer.
    pub fn code(&self) -> Option<u32> {
        self.0.trim().parse().ok()
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<u32> for KeyId {
    fn from(code: u32) -> Self {
        Self(code.to_string())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key to command name bindings of one sub-map.
pub type Bindings = FxHashMap<KeyId, String>;

/// Keymap storage shared between the loader, the reconciler and every interpreter.
pub type SharedKeymap = Arc<RwLock<Keymap>>;

/// Reasons a keymap document is rejected.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("keymap is not valid JSON")]
    Malformed(#[source] serde_json::Error),

    #[error("keymap must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("keymap has no `mode-switch-key` entry")]
    MissingModeSwitchKey,

    #[error("`mode-switch-key` must be a numeric key code, found {found}")]
    InvalidModeSwitchKey { found: String },

    #[error("sub-map `{name}` must map keys to command names")]
    InvalidSubMap {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A parsed keymap document, ready to install.
#[derive(Debug, Clone, PartialEq)]
pub struct KeymapDocument {
    /// Identifier of the mode-switch key, normalized to its key code.
    pub mode_switch_key: KeyId,
    /// Numeric code of the mode-switch key.
    pub mode_switch_code: u32,
    /// Named sub-maps in document order.
    pub maps: Vec<(String, Bindings)>,
}

impl KeymapDocument {
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(text).map_err(DocumentError::Malformed)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        let entries = match value {
            Value::Object(entries) => entries,
            other => {
                return Err(DocumentError::NotAnObject {
                    found: json_kind(&other),
                })
            },
        };

        let mut mode_switch = None;
        let mut maps = Vec::with_capacity(entries.len());
        for (name, entry) in entries {
            if name == MODE_SWITCH_ENTRY {
                mode_switch = Some(entry);
                continue;
            }
            let bindings: Bindings = serde_json::from_value(entry)
                .map_err(|source| DocumentError::InvalidSubMap {
                    name: name.clone(),
                    source,
                })?;
            maps.push((name, bindings));
        }

        let entry = mode_switch.ok_or(DocumentError::MissingModeSwitchKey)?;
        let raw_key: KeyId = match &entry {
            Value::String(_) | Value::Number(_) => serde_json::from_value(entry.clone())
                .map_err(|_| DocumentError::InvalidModeSwitchKey {
                    found: entry.to_string(),
                })?,
            other => {
                return Err(DocumentError::InvalidModeSwitchKey {
                    found: other.to_string(),
                })
            },
        };
        let mode_switch_code =
            raw_key
                .code()
                .ok_or_else(|| DocumentError::InvalidModeSwitchKey {
                    found: entry.to_string(),
                })?;

        Ok(Self {
            mode_switch_key: KeyId::from(mode_switch_code),
            mode_switch_code,
            maps,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The command keymap: named sub-maps, the mode-switch key, and the pending announcement slot.
#[derive(Debug, Default)]
pub struct Keymap {
    maps: FxHashMap<String, Bindings>,
    mode_switch_code: Option<u32>,
    pending_insert: Option<Vec<KeyId>>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedKeymap {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Install a loaded document.
    ///
    /// Same-named sub-maps are replaced. The mode-switch key is bound to [`EXIT_COMMAND`] so the
    /// key that enters command mode also leaves it. [`INSERT_MAP`] is guaranteed to exist
    /// afterwards and any pending announcement is drained into it.
    pub fn install(&mut self, document: KeymapDocument) {
        let KeymapDocument {
            mode_switch_key,
            mode_switch_code,
            maps,
        } = document;

        for (name, bindings) in maps {
            self.maps.insert(name, bindings);
        }

        self.maps
            .entry(COMMAND_MAP.to_string())
            .or_default()
            .insert(mode_switch_key, EXIT_COMMAND.to_string());
        self.mode_switch_code = Some(mode_switch_code);

        self.maps.entry(INSERT_MAP.to_string()).or_default();
        if let Some(pending) = self.pending_insert.take() {
            tracing::debug!(keys = pending.len(), "draining pending insert keybindings");
            self.add_insert_keybindings(pending);
        }
    }

    /// Register keys that fall through to insert behavior while in command mode.
    ///
    /// Before [`INSERT_MAP`] exists the keys replace whatever announcement is pending; only
    /// the latest one survives.
    pub fn add_insert_keybindings(&mut self, keys: Vec<KeyId>) {
        match self.maps.get_mut(INSERT_MAP) {
            Some(map) => {
                for key in keys {
                    let command = passthrough_command(&key);
                    map.insert(key, command);
                }
            },
            None => {
                if self.pending_insert.is_some() {
                    tracing::debug!("replacing pending insert keybindings");
                }
                self.pending_insert = Some(keys);
            },
        }
    }

    /// True once a document has been installed.
    pub fn is_loaded(&self) -> bool {
        self.mode_switch_code.is_some()
    }

    pub fn sub_map(&self, name: &str) -> Option<&Bindings> {
        self.maps.get(name)
    }

    pub fn command_map(&self) -> Option<&Bindings> {
        self.sub_map(COMMAND_MAP)
    }

    pub fn insert_map(&self) -> Option<&Bindings> {
        self.sub_map(INSERT_MAP)
    }

    /// Names of all installed sub-maps, sorted.
    pub fn map_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.maps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Key code the insert interpreter treats as the switch into command mode.
    pub fn mode_switch_code(&self) -> Option<u32> {
        self.mode_switch_code
    }

    pub fn is_mode_switch(&self, code: u32) -> bool {
        self.mode_switch_code == Some(code)
    }

    /// Announcement waiting for [`INSERT_MAP`] to exist.
    pub fn pending_insert_keybindings(&self) -> Option<&[KeyId]> {
        self.pending_insert.as_deref()
    }

    /// Command bound to `key` in command mode. Passthrough bindings take precedence.
    pub fn command_for(&self, key: &KeyId) -> Option<&str> {
        self.insert_map()
            .and_then(|map| map.get(key))
            .or_else(|| self.command_map().and_then(|map| map.get(key)))
            .map(String::as_str)
    }
}

fn passthrough_command(key: &KeyId) -> String {
    format!("insert.{key}")
}
