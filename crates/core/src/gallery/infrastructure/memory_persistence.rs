use crate::gallery::domain::gallery_persistence::{
    GalleryPersistence, PersistenceError, StoredCollection,
};

/// Persistence that keeps nothing: the store's in-memory state is the only
/// copy and vanishes with the process.
pub struct MemoryPersistence;

impl GalleryPersistence for MemoryPersistence {
    fn load_all(&self) -> Result<Vec<StoredCollection>, PersistenceError> {
        Ok(Vec::new())
    }

    fn save_collection(&self, _collection: &StoredCollection) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn remove_collection(&self, _name: &str) -> Result<(), PersistenceError> {
        Ok(())
    }
}
