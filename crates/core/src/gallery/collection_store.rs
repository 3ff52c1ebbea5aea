use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::gallery::domain::distance::DistanceMetric;
use crate::gallery::domain::entry::{Entry, Neighbor};
use crate::gallery::domain::gallery_error::GalleryError;
use crate::gallery::domain::gallery_persistence::{GalleryPersistence, StoredCollection};
use crate::gallery::infrastructure::memory_persistence::MemoryPersistence;

/// Longest accepted collection name, in bytes.
pub const MAX_COLLECTION_NAME_LEN: usize = 100;

/// A live collection plus its tombstone flag.
///
/// `retired` is set under the collection's own write lock when a rename or
/// delete takes it out of the registry, so a writer that raced the
/// structural change sees `NotFound` instead of writing into a detached copy.
struct Collection {
    data: StoredCollection,
    retired: bool,
}

type CollectionHandle = Arc<RwLock<Collection>>;

/// Name bookkeeping. `reserved` holds names claimed by a create or rename
/// whose persistence write has not finished yet; they are taken but not
/// visible.
#[derive(Default)]
struct Registry {
    live: HashMap<String, CollectionHandle>,
    reserved: HashSet<String>,
}

impl Registry {
    fn is_taken(&self, name: &str) -> bool {
        self.live.contains_key(name) || self.reserved.contains(name)
    }
}

/// Named galleries of face embeddings with nearest-neighbor lookup.
///
/// Locking: the registry lock only guards name bookkeeping and is never
/// held across persistence I/O or while waiting on a collection lock.
/// Structural operations claim names under it, release it, persist, then
/// publish with a second short registry write. Entry operations clone a
/// collection handle and lock that collection alone, so work on different
/// names never waits on each other. Lock order is collection, then
/// registry. Every mutation is written through to the persistence backend
/// before it becomes visible in memory.
pub struct VectorCollectionStore {
    registry: RwLock<Registry>,
    persistence: Box<dyn GalleryPersistence>,
    metric: DistanceMetric,
}

impl VectorCollectionStore {
    /// Opens a store over `persistence`, loading every persisted collection.
    pub fn open(persistence: Box<dyn GalleryPersistence>) -> Result<Self, GalleryError> {
        let mut registry = Registry::default();
        for stored in persistence.load_all()? {
            log::debug!(
                "Loaded collection '{}' ({} entries)",
                stored.name,
                stored.entries.len()
            );
            registry.live.insert(stored.name.clone(), new_handle(stored));
        }
        Ok(Self {
            registry: RwLock::new(registry),
            persistence,
            metric: DistanceMetric::Cosine,
        })
    }

    /// A store without durable state.
    pub fn in_memory() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            persistence: Box::new(MemoryPersistence),
            metric: DistanceMetric::Cosine,
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn list_collections(&self) -> BTreeSet<String> {
        self.registry().live.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry().live.contains_key(name)
    }

    /// Creates an empty collection.
    ///
    /// A name claimed by a create or rename still in flight counts as taken.
    pub fn create_collection(&self, name: &str) -> Result<(), GalleryError> {
        validate_name(name)?;
        {
            let mut registry = self.registry_mut();
            if registry.is_taken(name) {
                return Err(GalleryError::AlreadyExists(name.to_string()));
            }
            registry.reserved.insert(name.to_string());
        }

        let stored = StoredCollection::empty(name, self.metric);
        let saved = self.persistence.save_collection(&stored);

        let mut registry = self.registry_mut();
        registry.reserved.remove(name);
        saved?;
        registry.live.insert(name.to_string(), new_handle(stored));
        log::info!("Created collection '{name}'");
        Ok(())
    }

    /// Moves every entry of `old` into a new collection named `new`.
    ///
    /// `new` is made durable before `old` is removed; if removing `old`
    /// fails, `new` is discarded again and `old` stays authoritative.
    pub fn rename_collection(&self, old: &str, new: &str) -> Result<(), GalleryError> {
        validate_name(new)?;
        let handle = {
            let mut registry = self.registry_mut();
            let handle = registry
                .live
                .get(old)
                .cloned()
                .ok_or_else(|| GalleryError::NotFound(old.to_string()))?;
            if registry.is_taken(new) {
                return Err(GalleryError::AlreadyExists(new.to_string()));
            }
            registry.reserved.insert(new.to_string());
            handle
        };

        let mut source = write(&handle);
        if source.retired {
            self.registry_mut().reserved.remove(new);
            return Err(GalleryError::NotFound(old.to_string()));
        }
        let renamed = StoredCollection {
            name: new.to_string(),
            ..source.data.clone()
        };
        if let Err(e) = self.move_document(old, &renamed) {
            self.registry_mut().reserved.remove(new);
            return Err(e);
        }

        source.retired = true;
        let moved = renamed.entries.len();
        let mut registry = self.registry_mut();
        registry.reserved.remove(new);
        registry.live.remove(old);
        registry.live.insert(new.to_string(), new_handle(renamed));
        log::info!("Renamed collection '{old}' to '{new}' ({moved} entries)");
        Ok(())
    }

    pub fn delete_collection(&self, name: &str) -> Result<(), GalleryError> {
        let handle = self.handle(name)?;
        let mut collection = write(&handle);
        if collection.retired {
            return Err(GalleryError::NotFound(name.to_string()));
        }
        self.persistence.remove_collection(name)?;
        collection.retired = true;
        self.registry_mut().live.remove(name);
        log::info!(
            "Deleted collection '{name}' ({} entries)",
            collection.data.entries.len()
        );
        Ok(())
    }

    /// Upserts `entries` by id.
    ///
    /// The batch is validated as a whole before anything changes: one bad
    /// embedding rejects the batch and leaves the collection untouched.
    pub fn add_entries(&self, collection: &str, entries: Vec<Entry>) -> Result<(), GalleryError> {
        let handle = self.handle(collection)?;
        let mut guard = write(&handle);
        if guard.retired {
            return Err(GalleryError::NotFound(collection.to_string()));
        }
        if entries.is_empty() {
            return Ok(());
        }

        let dimension = validate_batch(collection, guard.data.dimension, &entries)?;

        let mut next = guard.data.clone();
        next.dimension = Some(dimension);
        let count = entries.len();
        for entry in entries {
            match next.entries.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry,
                None => next.entries.push(entry),
            }
        }

        self.persistence.save_collection(&next)?;
        guard.data = next;
        log::debug!("Upserted {count} entries into '{collection}'");
        Ok(())
    }

    pub fn get_entry_ids(&self, collection: &str) -> Result<Vec<String>, GalleryError> {
        self.read_collection(collection, |data| {
            data.entries.iter().map(|e| e.id.clone()).collect()
        })
    }

    pub fn get_entries(&self, collection: &str) -> Result<Vec<Entry>, GalleryError> {
        self.read_collection(collection, |data| data.entries.clone())
    }

    /// Distinct enrolled identity names, sorted.
    pub fn list_identities(&self, collection: &str) -> Result<Vec<String>, GalleryError> {
        self.read_collection(collection, |data| {
            data.entries
                .iter()
                .map(|e| e.metadata.identity_name.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
    }

    pub fn entry_count(&self, collection: &str) -> Result<usize, GalleryError> {
        self.read_collection(collection, |data| data.entries.len())
    }

    /// Removes every entry enrolled under `identity_name`.
    ///
    /// Returns how many entries were removed; an unknown identity is a
    /// successful no-op.
    pub fn delete_entries(
        &self,
        collection: &str,
        identity_name: &str,
    ) -> Result<usize, GalleryError> {
        let handle = self.handle(collection)?;
        let mut guard = write(&handle);
        if guard.retired {
            return Err(GalleryError::NotFound(collection.to_string()));
        }

        let mut next = guard.data.clone();
        next.entries
            .retain(|e| e.metadata.identity_name != identity_name);
        let removed = guard.data.entries.len() - next.entries.len();
        if removed == 0 {
            return Ok(0);
        }

        self.persistence.save_collection(&next)?;
        guard.data = next;
        log::info!("Removed '{identity_name}' from '{collection}' ({removed} entries)");
        Ok(removed)
    }

    /// The `k` entries closest to `embedding`, ascending by distance.
    ///
    /// Equal distances keep insertion order. An empty collection yields an
    /// empty result.
    pub fn query_nearest(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>, GalleryError> {
        let metric = self.metric;
        let handle = self.handle(collection)?;
        let guard = read(&handle);
        if guard.retired {
            return Err(GalleryError::NotFound(collection.to_string()));
        }
        let data = &guard.data;
        if k == 0 || data.entries.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(expected) = data.dimension {
            if embedding.len() != expected {
                return Err(GalleryError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        let mut scored: Vec<(f64, usize)> = data
            .entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (metric.distance(embedding, &e.embedding), idx))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, idx)| {
                let entry = &data.entries[idx];
                Neighbor {
                    entry_id: entry.id.clone(),
                    metadata: entry.metadata.clone(),
                    distance,
                }
            })
            .collect())
    }

    fn read_collection<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&StoredCollection) -> T,
    ) -> Result<T, GalleryError> {
        let handle = self.handle(collection)?;
        let guard = read(&handle);
        if guard.retired {
            return Err(GalleryError::NotFound(collection.to_string()));
        }
        Ok(f(&guard.data))
    }

    /// Writes `renamed` and removes the document of `old`, rolling the new
    /// document back when the removal fails.
    fn move_document(&self, old: &str, renamed: &StoredCollection) -> Result<(), GalleryError> {
        self.persistence.save_collection(renamed)?;
        if let Err(e) = self.persistence.remove_collection(old) {
            if let Err(cleanup) = self.persistence.remove_collection(&renamed.name) {
                log::warn!(
                    "Failed to discard partial rename target '{}': {cleanup}",
                    renamed.name
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn handle(&self, name: &str) -> Result<CollectionHandle, GalleryError> {
        self.registry()
            .live
            .get(name)
            .cloned()
            .ok_or_else(|| GalleryError::NotFound(name.to_string()))
    }

    fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn new_handle(data: StoredCollection) -> CollectionHandle {
    Arc::new(RwLock::new(Collection {
        data,
        retired: false,
    }))
}

fn read(handle: &CollectionHandle) -> RwLockReadGuard<'_, Collection> {
    handle.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(handle: &CollectionHandle) -> RwLockWriteGuard<'_, Collection> {
    handle.write().unwrap_or_else(PoisonError::into_inner)
}

fn validate_name(name: &str) -> Result<(), GalleryError> {
    if name.trim().is_empty() {
        return Err(GalleryError::InvalidArgument(
            "collection name must not be empty".into(),
        ));
    }
    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(GalleryError::InvalidArgument(format!(
            "collection name must be at most {MAX_COLLECTION_NAME_LEN} bytes, got {}",
            name.len()
        )));
    }
    Ok(())
}

/// Checks ids, values and dimensionality; returns the batch dimension.
fn validate_batch(
    collection: &str,
    established: Option<usize>,
    entries: &[Entry],
) -> Result<usize, GalleryError> {
    let expected = established.unwrap_or(entries[0].embedding.len());
    if expected == 0 {
        return Err(GalleryError::InvalidArgument(
            "embedding must not be empty".into(),
        ));
    }
    for entry in entries {
        if entry.id.is_empty() {
            return Err(GalleryError::InvalidArgument(
                "entry id must not be empty".into(),
            ));
        }
        if entry.embedding.len() != expected {
            return Err(GalleryError::DimensionMismatch {
                collection: collection.to_string(),
                expected,
                actual: entry.embedding.len(),
            });
        }
        if entry.embedding.iter().any(|v| !v.is_finite()) {
            return Err(GalleryError::InvalidArgument(format!(
                "embedding for '{}' contains non-finite values",
                entry.id
            )));
        }
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::domain::gallery_persistence::PersistenceError;
    use crate::gallery::infrastructure::json_directory_persistence::JsonDirectoryPersistence;
    use approx::assert_abs_diff_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    // --- Stubs ---

    /// Records saved collections and can be told to fail writes.
    #[derive(Default)]
    struct FlakyPersistence {
        fail_saves: AtomicBool,
        fail_removes: AtomicBool,
        saved: Mutex<HashMap<String, StoredCollection>>,
    }

    fn io_failure() -> PersistenceError {
        PersistenceError::Io {
            path: "/gallery".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        }
    }

    impl GalleryPersistence for Arc<FlakyPersistence> {
        fn load_all(&self) -> Result<Vec<StoredCollection>, PersistenceError> {
            Ok(self.saved.lock().unwrap().values().cloned().collect())
        }

        fn save_collection(&self, collection: &StoredCollection) -> Result<(), PersistenceError> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(io_failure());
            }
            self.saved
                .lock()
                .unwrap()
                .insert(collection.name.clone(), collection.clone());
            Ok(())
        }

        fn remove_collection(&self, name: &str) -> Result<(), PersistenceError> {
            if self.fail_removes.load(Ordering::SeqCst) {
                return Err(io_failure());
            }
            self.saved.lock().unwrap().remove(name);
            Ok(())
        }
    }

    // --- Helpers ---

    fn entry(name: &str, index: usize, embedding: Vec<f32>) -> Entry {
        Entry::for_sample(name, index, embedding)
    }

    fn store_with(collection: &str, entries: Vec<Entry>) -> VectorCollectionStore {
        let store = VectorCollectionStore::in_memory();
        store.create_collection(collection).unwrap();
        store.add_entries(collection, entries).unwrap();
        store
    }

    // --- Collections ---

    #[test]
    fn test_list_collections_starts_empty() {
        let store = VectorCollectionStore::in_memory();
        assert!(store.list_collections().is_empty());
    }

    #[test]
    fn test_create_twice_fails_and_keeps_collection() {
        let store = store_with("3B", vec![entry("ann", 1, vec![1.0, 0.0])]);

        let err = store.create_collection("3B").unwrap_err();

        assert!(matches!(err, GalleryError::AlreadyExists(ref n) if n == "3B"));
        assert_eq!(store.get_entry_ids("3B").unwrap(), vec!["ann_1"]);
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let store = VectorCollectionStore::in_memory();
        assert!(matches!(
            store.create_collection("  "),
            Err(GalleryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_overlong_name_rejected() {
        let store = VectorCollectionStore::in_memory();
        let name = "x".repeat(MAX_COLLECTION_NAME_LEN + 1);
        store.create_collection("3B").unwrap();

        assert!(matches!(
            store.create_collection(&name),
            Err(GalleryError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.rename_collection("3B", &name),
            Err(GalleryError::InvalidArgument(_))
        ));
        store
            .create_collection(&"x".repeat(MAX_COLLECTION_NAME_LEN))
            .unwrap();
    }

    #[test]
    fn test_empty_collection_exists() {
        let store = VectorCollectionStore::in_memory();
        store.create_collection("3B").unwrap();
        assert!(store.contains("3B"));
        assert!(store.get_entry_ids("3B").unwrap().is_empty());
        assert!(matches!(
            store.get_entry_ids("4C"),
            Err(GalleryError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_collections_sorted() {
        let store = VectorCollectionStore::in_memory();
        for name in ["b", "c", "a"] {
            store.create_collection(name).unwrap();
        }
        let names: Vec<_> = store.list_collections().into_iter().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rename_preserves_entries_verbatim() {
        let entries = vec![
            entry("ann", 1, vec![1.0, 0.0, 0.0]),
            entry("ann", 2, vec![0.9, 0.1, 0.0]),
            entry("leo", 1, vec![0.0, 1.0, 0.0]),
        ];
        let store = store_with("old", entries.clone());

        store.rename_collection("old", "new").unwrap();

        assert_eq!(store.get_entries("new").unwrap(), entries);
        assert!(!store.contains("old"));
        assert!(matches!(
            store.get_entries("old"),
            Err(GalleryError::NotFound(_))
        ));
    }

    #[test]
    fn test_rename_missing_source_is_not_found() {
        let store = VectorCollectionStore::in_memory();
        assert!(matches!(
            store.rename_collection("nope", "new"),
            Err(GalleryError::NotFound(ref n)) if n == "nope"
        ));
    }

    #[test]
    fn test_rename_onto_existing_is_already_exists() {
        let store = store_with("a", vec![entry("ann", 1, vec![1.0])]);
        store.create_collection("b").unwrap();

        let err = store.rename_collection("a", "b").unwrap_err();

        assert!(matches!(err, GalleryError::AlreadyExists(ref n) if n == "b"));
        assert_eq!(store.entry_count("a").unwrap(), 1);
        assert_eq!(store.entry_count("b").unwrap(), 0);
    }

    #[test]
    fn test_rename_keeps_old_when_removal_fails() {
        let backend = Arc::new(FlakyPersistence::default());
        let store = VectorCollectionStore::open(Box::new(backend.clone())).unwrap();
        store.create_collection("old").unwrap();
        store
            .add_entries("old", vec![entry("ann", 1, vec![1.0, 0.0])])
            .unwrap();
        backend.fail_removes.store(true, Ordering::SeqCst);

        assert!(matches!(
            store.rename_collection("old", "new"),
            Err(GalleryError::Store(_))
        ));
        assert_eq!(store.get_entry_ids("old").unwrap(), vec!["ann_1"]);
        assert!(!store.contains("new"));
    }

    #[test]
    fn test_delete_collection_removes_it() {
        let store = store_with("3B", vec![entry("ann", 1, vec![1.0])]);
        store.delete_collection("3B").unwrap();
        assert!(store.list_collections().is_empty());
        assert!(matches!(
            store.delete_collection("3B"),
            Err(GalleryError::NotFound(_))
        ));
    }

    // --- Entries ---

    #[test]
    fn test_add_to_missing_collection_is_not_found() {
        let store = VectorCollectionStore::in_memory();
        assert!(matches!(
            store.add_entries("3B", vec![entry("ann", 1, vec![1.0])]),
            Err(GalleryError::NotFound(_))
        ));
    }

    #[test]
    fn test_add_upserts_by_id() {
        let store = store_with("3B", vec![entry("ann", 1, vec![1.0, 0.0])]);

        store
            .add_entries("3B", vec![entry("ann", 1, vec![0.0, 1.0])])
            .unwrap();

        let entries = store.get_entries("3B").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].embedding, vec![0.0, 1.0]);
    }

    #[test]
    fn test_first_insert_establishes_dimension() {
        let store = store_with("3B", vec![entry("ann", 1, vec![1.0, 0.0, 0.0])]);

        let err = store
            .add_entries("3B", vec![entry("leo", 1, vec![1.0, 0.0])])
            .unwrap_err();

        assert!(matches!(
            err,
            GalleryError::DimensionMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_mixed_dimension_batch_adds_nothing() {
        let store = VectorCollectionStore::in_memory();
        store.create_collection("3B").unwrap();

        let result = store.add_entries(
            "3B",
            vec![entry("ann", 1, vec![1.0, 0.0]), entry("ann", 2, vec![1.0])],
        );

        assert!(matches!(result, Err(GalleryError::DimensionMismatch { .. })));
        assert_eq!(store.entry_count("3B").unwrap(), 0);
    }

    #[test]
    fn test_non_finite_embedding_rejected() {
        let store = VectorCollectionStore::in_memory();
        store.create_collection("3B").unwrap();
        assert!(matches!(
            store.add_entries("3B", vec![entry("ann", 1, vec![f32::NAN, 0.0])]),
            Err(GalleryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_failed_write_leaves_collection_unchanged() {
        let backend = Arc::new(FlakyPersistence::default());
        let store = VectorCollectionStore::open(Box::new(backend.clone())).unwrap();
        store.create_collection("3B").unwrap();
        backend.fail_saves.store(true, Ordering::SeqCst);

        let result = store.add_entries("3B", vec![entry("ann", 1, vec![1.0])]);

        assert!(matches!(result, Err(GalleryError::Store(_))));
        assert_eq!(store.entry_count("3B").unwrap(), 0);
    }

    #[test]
    fn test_delete_entries_by_identity() {
        let store = store_with(
            "3B",
            vec![
                entry("ann", 1, vec![1.0]),
                entry("leo", 1, vec![1.0]),
                entry("ann", 2, vec![1.0]),
            ],
        );

        assert_eq!(store.delete_entries("3B", "ann").unwrap(), 2);
        assert_eq!(store.get_entry_ids("3B").unwrap(), vec!["leo_1"]);
    }

    #[test]
    fn test_delete_entries_twice_is_noop() {
        let store = store_with("3B", vec![entry("leo", 1, vec![1.0])]);
        assert_eq!(store.delete_entries("3B", "leo").unwrap(), 1);
        assert_eq!(store.delete_entries("3B", "leo").unwrap(), 0);
    }

    #[test]
    fn test_delete_entries_missing_collection() {
        let store = VectorCollectionStore::in_memory();
        assert!(matches!(
            store.delete_entries("3B", "leo"),
            Err(GalleryError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_identities_distinct_sorted() {
        let store = store_with(
            "3B",
            vec![
                entry("zoe", 1, vec![1.0]),
                entry("ann", 1, vec![1.0]),
                entry("zoe", 2, vec![1.0]),
            ],
        );
        assert_eq!(store.list_identities("3B").unwrap(), vec!["ann", "zoe"]);
    }

    // --- Queries ---

    #[test]
    fn test_query_empty_collection_returns_empty() {
        let store = VectorCollectionStore::in_memory();
        store.create_collection("3B").unwrap();
        assert!(store.query_nearest("3B", &[1.0, 0.0], 1).unwrap().is_empty());
    }

    #[test]
    fn test_query_missing_collection_is_not_found() {
        let store = VectorCollectionStore::in_memory();
        assert!(matches!(
            store.query_nearest("3B", &[1.0], 1),
            Err(GalleryError::NotFound(_))
        ));
    }

    #[test]
    fn test_query_orders_by_distance() {
        let store = store_with(
            "3B",
            vec![
                entry("far", 1, vec![0.0, 1.0]),
                entry("near", 1, vec![1.0, 0.1]),
                entry("mid", 1, vec![1.0, 1.0]),
            ],
        );

        let hits = store.query_nearest("3B", &[1.0, 0.0], 3).unwrap();

        let ids: Vec<_> = hits.iter().map(|h| h.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["near_1", "mid_1", "far_1"]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_abs_diff_eq!(hits[2].distance, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_query_ties_keep_insertion_order() {
        let store = store_with(
            "3B",
            vec![entry("first", 1, vec![1.0, 0.0]), entry("second", 1, vec![2.0, 0.0])],
        );
        let hits = store.query_nearest("3B", &[1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].entry_id, "first_1");
    }

    #[test]
    fn test_query_caps_k_and_handles_zero() {
        let store = store_with("3B", vec![entry("ann", 1, vec![1.0, 0.0])]);
        assert_eq!(store.query_nearest("3B", &[1.0, 0.0], 5).unwrap().len(), 1);
        assert!(store.query_nearest("3B", &[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let store = store_with("3B", vec![entry("ann", 1, vec![1.0, 0.0])]);
        assert!(matches!(
            store.query_nearest("3B", &[1.0, 0.0, 0.0], 1),
            Err(GalleryError::DimensionMismatch { .. })
        ));
    }

    // --- Durability / concurrency ---

    #[test]
    fn test_reopen_restores_collections() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VectorCollectionStore::open(Box::new(
                JsonDirectoryPersistence::new(dir.path()).unwrap(),
            ))
            .unwrap();
            store.create_collection("3B").unwrap();
            store.create_collection("empty").unwrap();
            store
                .add_entries("3B", vec![entry("ann", 1, vec![0.25, -0.5])])
                .unwrap();
            store.rename_collection("3B", "4B").unwrap();
        }

        let store = VectorCollectionStore::open(Box::new(
            JsonDirectoryPersistence::new(dir.path()).unwrap(),
        ))
        .unwrap();

        let names: Vec<_> = store.list_collections().into_iter().collect();
        assert_eq!(names, vec!["4B", "empty"]);
        let entries = store.get_entries("4B").unwrap();
        assert_eq!(entries, vec![entry("ann", 1, vec![0.25, -0.5])]);
    }

    #[test]
    fn test_concurrent_adds_and_rename_lose_nothing() {
        let store = Arc::new(VectorCollectionStore::in_memory());
        store.create_collection("old").unwrap();

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let mut committed = Vec::new();
                    for i in 0..25 {
                        let e = entry(&format!("w{t}"), i + 1, vec![1.0, t as f32]);
                        let id = e.id.clone();
                        if store.add_entries("old", vec![e]).is_ok() {
                            committed.push(id);
                        }
                    }
                    committed
                })
            })
            .collect();
        store.rename_collection("old", "new").unwrap();

        let committed: BTreeSet<String> = writers
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let stored: BTreeSet<String> = store.get_entry_ids("new").unwrap().into_iter().collect();
        assert_eq!(stored, committed);
        assert!(!store.contains("old"));
    }

    /// Blocks `save_collection` for one name until released.
    struct GatedPersistence {
        gated: &'static str,
        entered: crossbeam_channel::Sender<()>,
        release: crossbeam_channel::Receiver<()>,
    }

    impl GalleryPersistence for GatedPersistence {
        fn load_all(&self) -> Result<Vec<StoredCollection>, PersistenceError> {
            Ok(Vec::new())
        }

        fn save_collection(&self, collection: &StoredCollection) -> Result<(), PersistenceError> {
            if collection.name == self.gated {
                let _ = self.entered.send(());
                let _ = self.release.recv();
            }
            Ok(())
        }

        fn remove_collection(&self, _name: &str) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    #[test]
    fn test_slow_create_does_not_block_other_collections() {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let store = Arc::new(
            VectorCollectionStore::open(Box::new(GatedPersistence {
                gated: "A",
                entered: entered_tx,
                release: release_rx,
            }))
            .unwrap(),
        );
        store.create_collection("B").unwrap();
        store
            .add_entries("B", vec![entry("ann", 1, vec![1.0, 0.0])])
            .unwrap();

        let creator = {
            let store = store.clone();
            std::thread::spawn(move || store.create_collection("A"))
        };
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("create of 'A' never reached persistence");

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let other = {
            let store = store.clone();
            std::thread::spawn(move || {
                let nearest = store.query_nearest("B", &[1.0, 0.0], 1).unwrap();
                store
                    .add_entries("B", vec![entry("bob", 1, vec![0.0, 1.0])])
                    .unwrap();
                store.create_collection("C").unwrap();
                let listed = store.list_collections();
                let duplicate = store.create_collection("A");
                let _ = done_tx.send((nearest.len(), listed, duplicate));
            })
        };

        let (found, listed, duplicate) = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("operations on other collections waited for 'A'");
        assert_eq!(found, 1);
        assert_eq!(listed.into_iter().collect::<Vec<_>>(), vec!["B", "C"]);
        assert!(matches!(duplicate, Err(GalleryError::AlreadyExists(_))));
        assert!(!store.contains("A"));

        release_tx.send(()).unwrap();
        creator.join().unwrap().unwrap();
        other.join().unwrap();
        assert!(store.contains("A"));
    }

    #[test]
    fn test_failed_create_releases_name() {
        let persistence = Arc::new(FlakyPersistence::default());
        let store = VectorCollectionStore::open(Box::new(persistence.clone())).unwrap();
        persistence.fail_saves.store(true, Ordering::SeqCst);

        assert!(matches!(
            store.create_collection("3B"),
            Err(GalleryError::Store(_))
        ));
        assert!(!store.contains("3B"));

        persistence.fail_saves.store(false, Ordering::SeqCst);
        store.create_collection("3B").unwrap();
        assert!(store.contains("3B"));
    }
}
