//! Profile store trait.

use crate::Result;
use crate::models::CharacterProfile;

/// Loads and persists a character profile as a single document.
///
/// Saves are full overwrites with last-writer-wins semantics.
pub trait ProfileStore: Send {
    /// Loads the stored profile.
    ///
    /// Returns `Ok(None)` when nothing is stored or the stored document does
    /// not parse.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the document exists but cannot be read.
    fn load(&self) -> Result<Option<CharacterProfile>>;

    /// Overwrites the stored profile.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the document cannot be written.
    fn save(&self, profile: &CharacterProfile) -> Result<()>;
}

impl<S: ProfileStore + Sync + ?Sized> ProfileStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Option<CharacterProfile>> {
        (**self).load()
    }

    fn save(&self, profile: &CharacterProfile) -> Result<()> {
        (**self).save(profile)
    }
}

impl<S: ProfileStore + ?Sized> ProfileStore for Box<S> {
    fn load(&self) -> Result<Option<CharacterProfile>> {
        (**self).load()
    }

    fn save(&self, profile: &CharacterProfile) -> Result<()> {
        (**self).save(profile)
    }
}
