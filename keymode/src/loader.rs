//! Asynchronous keymap acquisition.
//!
//! The [`KeymapSource`] trait abstracts the transport: production code uses [`FileSource`],
//! tests use [`StaticSource`](crate::test::StaticSource). [`KeymapLoader`] fetches a document
//! through the source, parses it and installs it into the [`SharedKeymap`].
//!
//! A failed load is terminal for that call. Nothing is installed, a warning with the address,
//! status and error detail is logged, and command mode keeps whatever bindings it had (none on
//! first load). Retrying is up to the caller.

use crate::keymap::{DocumentError, KeymapDocument, SharedKeymap};
use async_trait::async_trait;
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

/// Transport-level failure to obtain a keymap document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Io(#[from] io::Error),

    /// Remote transports report a status code and reason.
    #[error("{code} {reason}")]
    Status { code: u16, reason: String },
}

impl FetchError {
    /// Short status label for diagnostics.
    pub fn status(&self) -> String {
        match self {
            FetchError::Io(err) => format!("{:?}", err.kind()),
            FetchError::Status { code, .. } => code.to_string(),
        }
    }
}

/// A keymap load that did not install anything.
#[derive(Debug, Error)]
pub enum KeymapError {
    #[error("failed to fetch keymap from {address}")]
    Fetch {
        address: String,
        #[source]
        source: FetchError,
    },

    #[error("invalid keymap from {address}")]
    Document {
        address: String,
        #[source]
        source: DocumentError,
    },
}

impl KeymapError {
    pub fn address(&self) -> &str {
        match self {
            KeymapError::Fetch { address, .. } | KeymapError::Document { address, .. } => address,
        }
    }

    pub fn status(&self) -> String {
        match self {
            KeymapError::Fetch { source, .. } => source.status(),
            KeymapError::Document { .. } => "invalid".to_string(),
        }
    }

    /// Description of the underlying cause.
    pub fn detail(&self) -> String {
        match self {
            KeymapError::Fetch { source, .. } => source.to_string(),
            KeymapError::Document { source, .. } => match std::error::Error::source(source) {
                Some(cause) => format!("{source}: {cause}"),
                None => source.to_string(),
            },
        }
    }
}

/// Retrieves the raw text of a keymap document.
#[async_trait]
pub trait KeymapSource: Send + Sync {
    async fn fetch(&self, address: &str) -> Result<String, FetchError>;
}

/// Reads keymap documents from the filesystem.
///
/// Relative addresses resolve against the base directory, if one is set.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    base_dir: Option<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    pub fn resolve(&self, address: &str) -> PathBuf {
        let path = Path::new(address);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl KeymapSource for FileSource {
    async fn fetch(&self, address: &str) -> Result<String, FetchError> {
        let path = self.resolve(address);
        Ok(tokio::fs::read_to_string(&path).await?)
    }
}

/// Fetches keymap documents and installs them into the shared keymap.
#[derive(Clone)]
pub struct KeymapLoader {
    source: Arc<dyn KeymapSource>,
    keymap: SharedKeymap,
}

impl KeymapLoader {
    pub fn new(source: Arc<dyn KeymapSource>, keymap: SharedKeymap) -> Self {
        Self { source, keymap }
    }

    pub fn keymap(&self) -> &SharedKeymap {
        &self.keymap
    }

    /// Fetch, parse and install the document at `address`.
    ///
    /// Must not run concurrently with another load into the same keymap; the last install wins.
    pub async fn load(&self, address: &str) -> Result<(), KeymapError> {
        let result = self.fetch_document(address).await;
        match result {
            Ok(document) => {
                let mode_switch = document.mode_switch_code;
                let maps = document.maps.len();
                self.keymap.write().install(document);
                tracing::info!(address, mode_switch, maps, "keymap downloaded");
                Ok(())
            },
            Err(err) => {
                tracing::warn!(
                    address = err.address(),
                    status = %err.status(),
                    error = %err.detail(),
                    "failed to fetch keymap"
                );
                Err(err)
            },
        }
    }

    async fn fetch_document(&self, address: &str) -> Result<KeymapDocument, KeymapError> {
        let text = self
            .source
            .fetch(address)
            .await
            .map_err(|source| KeymapError::Fetch {
                address: address.to_string(),
                source,
            })?;

        KeymapDocument::from_json(&text).map_err(|source| KeymapError::Document {
            address: address.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        keymap::{KeyId, Keymap, EXIT_COMMAND},
        test::StaticSource,
    };

    const KEYMAP: &str = r#"{ "mode-switch-key": "27", "COMMAND_MAP": { "100": "delete" } }"#;

    #[tokio::test]
    async fn installs_fetched_document() {
        let source = Arc::new(StaticSource::new().with_document("keymap.json", KEYMAP));
        let loader = KeymapLoader::new(source, Keymap::shared());

        loader.load("keymap.json").await.unwrap();

        let keymap = loader.keymap().read();
        let command_map = keymap.command_map().unwrap();
        assert_eq!(command_map.len(), 2);
        assert_eq!(command_map[&KeyId::from("100")], "delete");
        assert_eq!(command_map[&KeyId::from("27")], EXIT_COMMAND);
        assert_eq!(keymap.mode_switch_code(), Some(27));
    }

    #[tokio::test]
    async fn missing_document_reports_address_and_status() {
        let loader = KeymapLoader::new(Arc::new(StaticSource::new()), Keymap::shared());

        let err = loader.load("nowhere.json").await.unwrap_err();
        assert_eq!(err.address(), "nowhere.json");
        assert_eq!(err.status(), "NotFound");
        assert!(matches!(err, KeymapError::Fetch { .. }));
        assert!(!loader.keymap().read().is_loaded());
    }

    #[tokio::test]
    async fn remote_status_is_reported() {
        let source = StaticSource::new().with_failure(
            "https://example.invalid/keymap.json",
            FetchError::Status {
                code: 503,
                reason: "Service Unavailable".to_string(),
            },
        );
        let loader = KeymapLoader::new(Arc::new(source), Keymap::shared());

        let err = loader
            .load("https://example.invalid/keymap.json")
            .await
            .unwrap_err();
        assert_eq!(err.status(), "503");
        assert_eq!(err.detail(), "503 Service Unavailable");
    }

    #[tokio::test]
    async fn malformed_document_installs_nothing() {
        let source = Arc::new(StaticSource::new().with_document("bad.json", "{ nope"));
        let loader = KeymapLoader::new(source, Keymap::shared());
        loader.keymap().write().add_insert_keybindings(vec![KeyId::from("j")]);

        let err = loader.load("bad.json").await.unwrap_err();
        assert!(matches!(err, KeymapError::Document { .. }));
        assert_eq!(err.status(), "invalid");

        let keymap = loader.keymap().read();
        assert!(keymap.command_map().is_none());
        assert_eq!(keymap.pending_insert_keybindings(), Some(&[KeyId::from("j")][..]));
    }

    #[tokio::test]
    async fn file_source_reads_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keymap.json"), KEYMAP).unwrap();

        let loader = KeymapLoader::new(
            Arc::new(FileSource::with_base_dir(dir.path())),
            Keymap::shared(),
        );
        loader.load("keymap.json").await.unwrap();
        assert!(loader.keymap().read().is_loaded());
    }

    #[test]
    fn file_source_keeps_absolute_paths() {
        let source = FileSource::with_base_dir("/base");
        assert_eq!(source.resolve("/etc/keymap.json"), PathBuf::from("/etc/keymap.json"));
        assert_eq!(source.resolve("keymap.json"), PathBuf::from("/base/keymap.json"));
        assert_eq!(FileSource::new().resolve("keymap.json"), PathBuf::from("keymap.json"));
    }
}
