//! Storage for section content served from its own URL.
//!
//! The externify processor moves a section's content out of the page and
//! into a [`SectionStore`], keyed by document, section, and content hash.
//! A separate handler can later serve that content back by key.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Hash slot that always holds the most recently stored content.
pub const LATEST: &str = "latest";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("section store is unavailable: {0}")]
    Unavailable(String),
}

/// Address of one stored section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub document: String,
    pub section: String,
    pub hash: String,
}

impl StoreKey {
    pub fn new(document: &str, section: &str, hash: &str) -> Self {
        Self {
            document: document.to_string(),
            section: section.to_string(),
            hash: hash.to_string(),
        }
    }

    /// The same document/section under the [`LATEST`] slot.
    pub fn latest(&self) -> Self {
        Self {
            hash: LATEST.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "external_relocation.{}.{}.{}",
            self.document, self.section, self.hash
        )
    }
}

/// Content plus the MIME type it should be served with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSection {
    pub content: String,
    pub mimetype: String,
}

/// Backend for externified sections.
pub trait SectionStore {
    fn put(&self, key: &StoreKey, section: StoredSection) -> Result<(), StoreError>;

    fn get(&self, key: &StoreKey) -> Result<Option<StoredSection>, StoreError>;
}

impl<S: SectionStore + ?Sized> SectionStore for Arc<S> {
    fn put(&self, key: &StoreKey, section: StoredSection) -> Result<(), StoreError> {
        (**self).put(key, section)
    }

    fn get(&self, key: &StoreKey) -> Result<Option<StoredSection>, StoreError> {
        (**self).get(key)
    }
}

/// Process-local [`SectionStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<StoreKey, StoredSection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys, sorted by their display form.
    pub fn keys(&self) -> Vec<StoreKey> {
        let mut keys: Vec<StoreKey> = self
            .entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort_by_key(|key| key.to_string());
        keys
    }
}

impl SectionStore for MemoryStore {
    fn put(&self, key: &StoreKey, section: StoredSection) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        entries.insert(key.clone(), section);
        Ok(())
    }

    fn get(&self, key: &StoreKey) -> Result<Option<StoredSection>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        Ok(entries.get(key).cloned())
    }
}

/// Lowercase hex SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
