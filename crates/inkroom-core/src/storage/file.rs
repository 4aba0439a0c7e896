//! File-based record store for native platforms.

use super::{
    BoxFuture, CanvasRecord, CanvasSummary, CanvasVersion, RecordPatch, RecordStore,
    StorageError, StorageResult, newest_first, versions_newest_first,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Stores each record as `<base>/<stem>.json` and its versions as a JSON
/// array in `<base>/versions/<stem>.json`, where the stem is the hex-encoded
/// record id.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    base_path: PathBuf,
}

impl FileRecordStore {
    /// Create a store rooted at `base_path`, creating directories as needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        let versions = base_path.join("versions");
        fs::create_dir_all(&versions).map_err(|e| {
            StorageError::Io(format!("Failed to create storage directory: {}", e))
        })?;
        log::debug!("Record store at {}", base_path.display());
        Ok(Self { base_path })
    }

    /// Create a store in the default location.
    ///
    /// On Linux: `~/.local/share/inkroom/canvases/`
    /// On Windows: `%LOCALAPPDATA%\inkroom\canvases\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("inkroom").join("canvases"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File stem for a record id: lowercase hex of its UTF-8 bytes, so
    /// distinct ids never share a file.
    fn file_stem(id: &str) -> String {
        id.bytes().map(|b| format!("{b:02x}")).collect()
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", Self::file_stem(id)))
    }

    fn versions_path(&self, id: &str) -> PathBuf {
        self.base_path
            .join("versions")
            .join(format!("{}.json", Self::file_stem(id)))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)
        .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&json).map(Some).map_err(|e| {
        StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
}

impl RecordStore for FileRecordStore {
    fn create(&self, record: CanvasRecord) -> BoxFuture<'_, StorageResult<String>> {
        Box::pin(async move {
            write_json(&self.record_path(&record.id), &record)?;
            Ok(record.id)
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, StorageResult<Option<CanvasRecord>>> {
        let path = self.record_path(id);
        Box::pin(async move { read_json(&path) })
    }

    fn update(&self, id: &str, patch: RecordPatch) -> BoxFuture<'_, StorageResult<CanvasRecord>> {
        let path = self.record_path(id);
        let id = id.to_string();
        Box::pin(async move {
            let mut record: CanvasRecord =
                read_json(&path)?.ok_or_else(|| StorageError::NotFound(id))?;
            patch.apply(&mut record);
            write_json(&path, &record)?;
            Ok(record)
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let paths = [self.record_path(id), self.versions_path(id)];
        Box::pin(async move {
            for path in paths {
                if path.exists() {
                    fs::remove_file(&path).map_err(|e| {
                        StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                    })?;
                }
            }
            Ok(())
        })
    }

    fn list(&self, owner_id: &str) -> BoxFuture<'_, StorageResult<Vec<CanvasSummary>>> {
        let base = self.base_path.clone();
        let owner_id = owner_id.to_string();
        Box::pin(async move {
            let entries = fs::read_dir(&base)
                .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;

            let mut summaries = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() || path.extension().is_none_or(|e| e != "json") {
                    continue;
                }
                match read_json::<CanvasRecord>(&path) {
                    Ok(Some(record)) if record.owner_id == owner_id => {
                        summaries.push(record.summary())
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("Skipping unreadable record: {e}"),
                }
            }
            newest_first(&mut summaries);
            Ok(summaries)
        })
    }

    fn append_version(&self, version: CanvasVersion) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.versions_path(&version.canvas_id);
        Box::pin(async move {
            let mut versions: Vec<CanvasVersion> = read_json(&path)?.unwrap_or_default();
            versions.push(version);
            write_json(&path, &versions)
        })
    }

    fn list_versions(&self, canvas_id: &str) -> BoxFuture<'_, StorageResult<Vec<CanvasVersion>>> {
        let path = self.versions_path(canvas_id);
        Box::pin(async move {
            let mut versions: Vec<CanvasVersion> = read_json(&path)?.unwrap_or_default();
            versions_newest_first(&mut versions);
            Ok(versions)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DocumentSnapshot, block_on};
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_create_and_get() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path().to_path_buf()).unwrap();

        let record = CanvasRecord::new("ada", "Test Canvas");
        let id = block_on(store.create(record.clone())).unwrap();
        let loaded = block_on(store.get(&id)).unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.document(), DocumentSnapshot::default());
    }

    #[test]
    fn test_file_store_missing() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(block_on(store.get("nonexistent")).unwrap(), None);
        assert!(matches!(
            block_on(store.update("nonexistent", RecordPatch::default())),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_file_store_list_by_owner() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path().to_path_buf()).unwrap();
        block_on(store.create(CanvasRecord::new("ada", "One"))).unwrap();
        block_on(store.create(CanvasRecord::new("ada", "Two"))).unwrap();
        block_on(store.create(CanvasRecord::new("bob", "Three"))).unwrap();

        let list = block_on(store.list("ada")).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|s| s.title != "Three"));
    }

    #[test]
    fn test_file_store_versions_and_delete() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path().to_path_buf()).unwrap();
        let id = block_on(store.create(CanvasRecord::new("ada", "Board"))).unwrap();
        block_on(store.append_version(CanvasVersion::new(&id, 1, json!(null), "ada"))).unwrap();
        block_on(store.append_version(CanvasVersion::new(&id, 2, json!(null), "ada"))).unwrap();

        let versions = block_on(store.list_versions(&id)).unwrap();
        assert_eq!(versions[0].version_number, 2);
        assert_eq!(versions.len(), 2);

        block_on(store.delete(&id)).unwrap();
        assert_eq!(block_on(store.get(&id)).unwrap(), None);
        assert!(block_on(store.list_versions(&id)).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_encodes_id() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path().to_path_buf()).unwrap();
        let mut record = CanvasRecord::new("ada", "Odd");
        record.id = "test/doc:with*special".into();
        block_on(store.create(record)).unwrap();

        let loaded = block_on(store.get("test/doc:with*special")).unwrap().unwrap();
        assert_eq!(loaded.id, "test/doc:with*special");
        assert!(
            dir.path()
                .join("746573742f646f633a776974682a7370656369616c.json")
                .exists()
        );
    }

    #[test]
    fn test_file_store_similar_ids_do_not_collide() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path().to_path_buf()).unwrap();
        let mut slash = CanvasRecord::new("ada", "Slash");
        slash.id = "a/b".into();
        let mut underscore = CanvasRecord::new("ada", "Underscore");
        underscore.id = "a_b".into();
        block_on(store.create(slash)).unwrap();
        block_on(store.create(underscore)).unwrap();
        block_on(store.append_version(CanvasVersion::new("a/b", 1, json!(null), "ada"))).unwrap();

        assert_eq!(block_on(store.get("a/b")).unwrap().unwrap().title, "Slash");
        assert_eq!(block_on(store.get("a_b")).unwrap().unwrap().title, "Underscore");
        assert_eq!(block_on(store.list("ada")).unwrap().len(), 2);
        assert_eq!(block_on(store.list_versions("a/b")).unwrap().len(), 1);
        assert!(block_on(store.list_versions("a_b")).unwrap().is_empty());
    }
}
