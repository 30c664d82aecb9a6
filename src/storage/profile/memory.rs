//! In-memory profile store for ephemeral sessions and tests.

use crate::models::CharacterProfile;
use crate::storage::sqlite::acquire_lock;
use crate::storage::traits::ProfileStore;
use crate::{Error, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Keeps the profile as a serialized document in memory.
///
/// Storing the serialized form keeps load/save semantics identical to the
/// file store, including full-document overwrite.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    document: Mutex<Option<String>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemoryProfileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `profile`.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be serialized.
    pub fn with_profile(profile: &CharacterProfile) -> Result<Self> {
        let store = Self::new();
        *acquire_lock(&store.document) = Some(profile.to_canonical_json()?);
        Ok(store)
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Makes every subsequent save fail with a storage error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// The raw stored document.
    #[must_use]
    pub fn document(&self) -> Option<String> {
        acquire_lock(&self.document).clone()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn load(&self) -> Result<Option<CharacterProfile>> {
        let guard = acquire_lock(&self.document);
        Ok(guard
            .as_deref()
            .and_then(|doc| serde_json::from_str(doc).ok()))
    }

    fn save(&self, profile: &CharacterProfile) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::storage("save_profile", "store is read-only"));
        }
        let json = profile.to_canonical_json()?;
        *acquire_lock(&self.document) = Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
