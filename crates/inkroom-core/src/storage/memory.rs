//! In-memory record store.

use super::{
    BoxFuture, CanvasRecord, CanvasSummary, CanvasVersion, RecordPatch, RecordStore,
    StorageError, StorageResult, newest_first, versions_newest_first,
};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    records: HashMap<String, CanvasRecord>,
    versions: HashMap<String, Vec<CanvasVersion>>,
}

/// In-memory storage for testing and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl RecordStore for MemoryRecordStore {
    fn create(&self, record: CanvasRecord) -> BoxFuture<'_, StorageResult<String>> {
        Box::pin(async move {
            let mut tables = self.tables.write().map_err(lock_error)?;
            let id = record.id.clone();
            tables.records.insert(id.clone(), record);
            Ok(id)
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, StorageResult<Option<CanvasRecord>>> {
        let id = id.to_string();
        Box::pin(async move {
            let tables = self.tables.read().map_err(lock_error)?;
            Ok(tables.records.get(&id).cloned())
        })
    }

    fn update(&self, id: &str, patch: RecordPatch) -> BoxFuture<'_, StorageResult<CanvasRecord>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut tables = self.tables.write().map_err(lock_error)?;
            let record = tables
                .records
                .get_mut(&id)
                .ok_or_else(|| StorageError::NotFound(id.clone()))?;
            patch.apply(record);
            Ok(record.clone())
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut tables = self.tables.write().map_err(lock_error)?;
            tables.records.remove(&id);
            tables.versions.remove(&id);
            Ok(())
        })
    }

    fn list(&self, owner_id: &str) -> BoxFuture<'_, StorageResult<Vec<CanvasSummary>>> {
        let owner_id = owner_id.to_string();
        Box::pin(async move {
            let tables = self.tables.read().map_err(lock_error)?;
            let mut summaries: Vec<CanvasSummary> = tables
                .records
                .values()
                .filter(|r| r.owner_id == owner_id)
                .map(CanvasRecord::summary)
                .collect();
            newest_first(&mut summaries);
            Ok(summaries)
        })
    }

    fn append_version(&self, version: CanvasVersion) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let mut tables = self.tables.write().map_err(lock_error)?;
            tables
                .versions
                .entry(version.canvas_id.clone())
                .or_default()
                .push(version);
            Ok(())
        })
    }

    fn list_versions(&self, canvas_id: &str) -> BoxFuture<'_, StorageResult<Vec<CanvasVersion>>> {
        let canvas_id = canvas_id.to_string();
        Box::pin(async move {
            let tables = self.tables.read().map_err(lock_error)?;
            let mut versions = tables.versions.get(&canvas_id).cloned().unwrap_or_default();
            versions_newest_first(&mut versions);
            Ok(versions)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::block_on;
    use serde_json::json;

    #[test]
    fn test_create_get_update() {
        let store = MemoryRecordStore::new();
        let record = CanvasRecord::new("ada", "Board");
        let id = block_on(store.create(record.clone())).unwrap();
        assert_eq!(block_on(store.get(&id)).unwrap(), Some(record));

        let updated = block_on(store.update(
            &id,
            RecordPatch {
                is_public: Some(true),
                ..Default::default()
            },
        ))
        .unwrap();
        assert!(updated.is_public);
        assert!(block_on(store.get(&id)).unwrap().unwrap().is_public);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = MemoryRecordStore::new();
        let result = block_on(store.update("nope", RecordPatch::default()));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert_eq!(block_on(store.get("nope")).unwrap(), None);
    }

    #[test]
    fn test_list_filters_by_owner() {
        let store = MemoryRecordStore::new();
        block_on(store.create(CanvasRecord::new("ada", "One"))).unwrap();
        block_on(store.create(CanvasRecord::new("ada", "Two"))).unwrap();
        block_on(store.create(CanvasRecord::new("bob", "Three"))).unwrap();
        assert_eq!(block_on(store.list("ada")).unwrap().len(), 2);
        assert_eq!(block_on(store.list("carol")).unwrap().len(), 0);
    }

    #[test]
    fn test_versions_newest_first_and_deleted_with_record() {
        let store = MemoryRecordStore::new();
        let id = block_on(store.create(CanvasRecord::new("ada", "Board"))).unwrap();
        for n in [1, 3, 2] {
            block_on(store.append_version(CanvasVersion::new(&id, n, json!({"layers": []}), "ada")))
                .unwrap();
        }
        let numbers: Vec<u64> = block_on(store.list_versions(&id))
            .unwrap()
            .iter()
            .map(|v| v.version_number)
            .collect();
        assert_eq!(numbers, vec![3, 2, 1]);

        block_on(store.delete(&id)).unwrap();
        assert!(block_on(store.list_versions(&id)).unwrap().is_empty());
        block_on(store.delete(&id)).unwrap();
    }
}
