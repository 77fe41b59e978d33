//! Configuration for key handler initialization.
//!
//! Loads `keymode.toml`, with an explicit path taking priority over a discovered one and the
//! embedded defaults used when neither is given. [`Config::discover`] looks for the file in the
//! start directory and its ancestors, then in the user config directory:
//!
//! ```toml
//! selector = ".editable"
//! keymap = "keymap/keymap.json"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const FILE_NAME: &str = "keymode.toml";

/// Settings consumed by [`KeyHandlerSystem::init_with_config`](crate::KeyHandlerSystem::init_with_config).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Host selector for the editable surfaces that get a key handler.
    #[serde(default = "default_selector")]
    pub selector: String,

    /// Address of the keymap document, passed to the keymap source.
    #[serde(default = "default_keymap")]
    pub keymap: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            selector: default_selector(),
            keymap: default_keymap(),
        }
    }
}

fn default_selector() -> String {
    ".editable".to_string()
}

fn default_keymap() -> String {
    "keymap/keymap.json".to_string()
}

impl Config {
    /// Read and deserialize a TOML config file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration with priority: explicit path > discovered path > embedded defaults.
    pub fn load_with_overrides(explicit: Option<&Path>, discovered: Option<&Path>) -> Result<Self> {
        match explicit.or(discovered) {
            Some(path) => Self::load(path),
            None => Self::load_embedded(),
        }
    }

    /// Find `keymode.toml` in `start_dir` or its nearest ancestor, falling back to
    /// `<config_dir>/keymode/keymode.toml`.
    pub fn discover(start_dir: &Path) -> Option<PathBuf> {
        let found = walk_ancestors(start_dir).or_else(system_config_file);
        match &found {
            Some(path) => tracing::info!("found config file: {}", path.display()),
            None => tracing::debug!("no keymode.toml found"),
        }
        found
    }

    fn load_embedded() -> Result<Self> {
        let source = include_str!("../keymode.toml");
        toml::from_str(source).context("Failed to parse embedded keymode.toml")
    }
}

fn walk_ancestors(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(FILE_NAME))
        .find(|candidate| candidate.is_file())
}

fn system_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("keymode").join(FILE_NAME);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn embedded_matches_defaults() {
        let config = Config::load_with_overrides(None, None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn loads_empty_config_with_defaults() {
        let tmp_dir = tempdir().unwrap();
        let config_path = tmp_dir.path().join("keymode.toml");
        std::fs::write(&config_path, "# nothing set\n").unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.selector, ".editable");
        assert_eq!(config.keymap, "keymap/keymap.json");
    }

    #[test]
    fn loads_custom_settings() {
        let tmp_dir = tempdir().unwrap();
        let config_path = tmp_dir.path().join("keymode.toml");
        std::fs::write(
            &config_path,
            r#"
selector = "[contenteditable]"
keymap = "https://example.invalid/keymap.json"
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.selector, "[contenteditable]");
        assert_eq!(config.keymap, "https://example.invalid/keymap.json");
    }

    #[test]
    fn errors_on_unknown_fields() {
        let tmp_dir = tempdir().unwrap();
        let config_path = tmp_dir.path().join("keymode.toml");
        std::fs::write(&config_path, "mode_switch = 27\n").unwrap();

        let result = Config::load(&config_path);
        assert!(result.unwrap_err().to_string().contains("Failed to parse"));
    }

    #[test]
    fn errors_on_nonexistent_file() {
        let tmp_dir = tempdir().unwrap();
        let result = Config::load(&tmp_dir.path().join("missing.toml"));
        assert!(result.unwrap_err().to_string().contains("Failed to read"));
    }

    #[test]
    fn explicit_path_takes_priority() {
        let tmp_dir = tempdir().unwrap();
        let explicit = tmp_dir.path().join("explicit.toml");
        let discovered = tmp_dir.path().join("discovered.toml");
        std::fs::write(&explicit, "selector = \".explicit\"").unwrap();
        std::fs::write(&discovered, "selector = \".discovered\"").unwrap();

        let config = Config::load_with_overrides(Some(&explicit), Some(&discovered)).unwrap();
        assert_eq!(config.selector, ".explicit");

        let config = Config::load_with_overrides(None, Some(&discovered)).unwrap();
        assert_eq!(config.selector, ".discovered");
    }

    #[test]
    fn discovers_nearest_ancestor_config() {
        let tmp_dir = tempdir().unwrap();
        let nested = tmp_dir.path().join("project").join("src");
        std::fs::create_dir_all(&nested).unwrap();
        let outer = tmp_dir.path().join(FILE_NAME);
        let inner = tmp_dir.path().join("project").join(FILE_NAME);
        std::fs::write(&outer, "selector = \".outer\"").unwrap();
        std::fs::write(&inner, "selector = \".inner\"").unwrap();

        assert_eq!(Config::discover(&nested), Some(inner.clone()));

        let discovered = Config::discover(&nested);
        let config = Config::load_with_overrides(None, discovered.as_deref()).unwrap();
        assert_eq!(config.selector, ".inner");
    }

    #[test]
    fn ancestor_walk_misses_without_config() {
        let tmp_dir = tempdir().unwrap();
        assert_eq!(walk_ancestors(tmp_dir.path()), None);
    }
}
