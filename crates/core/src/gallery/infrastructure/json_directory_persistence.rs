use std::fs;
use std::path::{Path, PathBuf};

use crate::gallery::domain::gallery_persistence::{
    GalleryPersistence, PersistenceError, StoredCollection,
};

const DOCUMENT_EXTENSION: &str = "json";

/// Stores each collection as one JSON document in a directory.
///
/// File stems are the hex-encoded collection name, so names containing
/// spaces, slashes or other path-hostile characters map to valid files.
/// Writes go to a `.part` sibling first and are renamed into place.
pub struct JsonDirectoryPersistence {
    dir: PathBuf,
}

impl JsonDirectoryPersistence {
    /// Uses `dir` as the gallery directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{DOCUMENT_EXTENSION}", hex_encode(name)))
    }
}

impl GalleryPersistence for JsonDirectoryPersistence {
    fn load_all(&self) -> Result<Vec<StoredCollection>, PersistenceError> {
        let mut collections = Vec::new();
        for dir_entry in fs::read_dir(&self.dir).map_err(io_error(&self.dir))? {
            let path = dir_entry.map_err(io_error(&self.dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            let json = fs::read_to_string(&path).map_err(io_error(&path))?;
            let collection: StoredCollection =
                serde_json::from_str(&json).map_err(|source| PersistenceError::Json {
                    path: path.clone(),
                    source,
                })?;
            collections.push(collection);
        }
        collections.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(collections)
    }

    fn save_collection(&self, collection: &StoredCollection) -> Result<(), PersistenceError> {
        let path = self.document_path(&collection.name);
        let temp_path = path.with_extension("part");
        let json = serde_json::to_vec(collection).map_err(|source| PersistenceError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&temp_path, json).map_err(io_error(&temp_path))?;
        fs::rename(&temp_path, &path).map_err(io_error(&path))?;
        Ok(())
    }

    fn remove_collection(&self, name: &str) -> Result<(), PersistenceError> {
        let path = self.document_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Io { path, source }),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError {
    let path = path.to_path_buf();
    move |source| PersistenceError::Io { path, source }
}

fn hex_encode(name: &str) -> String {
    name.bytes().map(|b| format!("{b:02x}")).collect()
}
