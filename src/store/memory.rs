use super::{
    InventoryStore, PhotoRecord, ScanLogEntry, StoreError, StoreResult, UploadStatus,
};
use crate::types::ImageHandle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    photos: Vec<PhotoRecord>,
    scan_logs: Vec<ScanLogEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    data: Snapshot,
    watchers: HashMap<String, watch::Sender<Vec<PhotoRecord>>>,
}

impl Inner {
    fn photos_for(&self, inventory_id: &str) -> Vec<PhotoRecord> {
        self.data
            .photos
            .iter()
            .filter(|p| p.inventory_id == inventory_id)
            .cloned()
            .collect()
    }

    fn prune_watchers(&mut self) {
        self.watchers.retain(|_, tx| tx.receiver_count() > 0);
    }

    fn publish(&mut self, inventory_id: &str) {
        let current = self.photos_for(inventory_id);
        let abandoned = match self.watchers.get(inventory_id) {
            Some(tx) if tx.receiver_count() == 0 => true,
            Some(tx) => {
                tx.send_replace(current);
                false
            }
            None => false,
        };
        if abandoned {
            self.watchers.remove(inventory_id);
        }
    }
}

/// In-process store with an optional JSON snapshot on disk
///
/// Every mutation rewrites the snapshot when a path is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a file-backed store, loading the snapshot if it exists
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&contents)?;
            log::info!(
                "Loaded store from {:?}: {} photos, {} scan logs",
                path,
                snapshot.photos.len(),
                snapshot.scan_logs.len()
            );
            snapshot
        } else {
            log::info!("No store at {:?}, starting empty", path);
            Snapshot::default()
        };

        Ok(Self {
            inner: Mutex::new(Inner {
                data,
                watchers: HashMap::new(),
            }),
            path: Some(path),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    fn persist(&self, data: &Snapshot) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Apply `change` to a copy of the data and swap it in once written
    fn commit<T>(
        &self,
        inner: &mut Inner,
        change: impl FnOnce(&mut Snapshot) -> T,
    ) -> StoreResult<T> {
        let mut next = inner.data.clone();
        let result = change(&mut next);
        self.persist(&next)?;
        inner.data = next;
        Ok(result)
    }

    pub fn watcher_count(&self) -> usize {
        self.lock().map(|inner| inner.watchers.len()).unwrap_or(0)
    }

    pub fn photo_count(&self) -> usize {
        self.lock().map(|inner| inner.data.photos.len()).unwrap_or(0)
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn insert_photo(&self, record: PhotoRecord) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let inventory_id = record.inventory_id.clone();
        log::debug!("Inserting photo {} for {}", record.handle, inventory_id);
        self.commit(&mut inner, |data| data.photos.push(record))?;
        inner.publish(&inventory_id);
        Ok(())
    }

    async fn delete_by_handle(&self, handle: &ImageHandle) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        if !inner.data.photos.iter().any(|p| &p.handle == handle) {
            return Ok(false);
        }

        let mut affected = self.commit(&mut inner, |data| {
            let mut affected = Vec::new();
            data.photos.retain(|p| {
                if &p.handle == handle {
                    affected.push(p.inventory_id.clone());
                    false
                } else {
                    true
                }
            });
            affected
        })?;
        affected.dedup();
        for id in &affected {
            inner.publish(id);
        }
        Ok(true)
    }

    async fn photos_for(&self, inventory_id: &str) -> StoreResult<Vec<PhotoRecord>> {
        Ok(self.lock()?.photos_for(inventory_id))
    }

    fn watch_photos(&self, inventory_id: &str) -> watch::Receiver<Vec<PhotoRecord>> {
        match self.lock() {
            Ok(mut inner) => {
                inner.prune_watchers();
                if let Some(tx) = inner.watchers.get(inventory_id) {
                    return tx.subscribe();
                }
                let (tx, rx) = watch::channel(inner.photos_for(inventory_id));
                inner.watchers.insert(inventory_id.to_string(), tx);
                rx
            }
            Err(e) => {
                log::error!("Cannot watch photos for {}: {}", inventory_id, e);
                // Closed channel
                watch::channel(Vec::new()).1
            }
        }
    }

    async fn insert_scan_log(&self, entry: ScanLogEntry) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        if inner
            .data
            .scan_logs
            .iter()
            .any(|l| l.inventory_id == entry.inventory_id)
        {
            log::debug!("Scan log for {} already exists, keeping it", entry.inventory_id);
            return Ok(false);
        }
        self.commit(&mut inner, |data| data.scan_logs.push(entry))?;
        Ok(true)
    }

    async fn delete_scan_log(&self, inventory_id: &str) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        if !inner
            .data
            .scan_logs
            .iter()
            .any(|l| l.inventory_id == inventory_id)
        {
            return Ok(false);
        }
        self.commit(&mut inner, |data| {
            data.scan_logs.retain(|l| l.inventory_id != inventory_id)
        })?;
        Ok(true)
    }

    async fn scan_log(&self, inventory_id: &str) -> StoreResult<Option<ScanLogEntry>> {
        Ok(self
            .lock()?
            .data
            .scan_logs
            .iter()
            .find(|l| l.inventory_id == inventory_id)
            .cloned())
    }

    async fn latest_scan_log(&self) -> StoreResult<Option<ScanLogEntry>> {
        Ok(self
            .lock()?
            .data
            .scan_logs
            .iter()
            .max_by_key(|l| l.scanned_at)
            .cloned())
    }

    async fn logs_with_status(&self, status: UploadStatus) -> StoreResult<Vec<ScanLogEntry>> {
        Ok(self
            .lock()?
            .data
            .scan_logs
            .iter()
            .filter(|l| l.status == status)
            .cloned()
            .collect())
    }

    async fn mark_uploaded(
        &self,
        inventory_id: &str,
        image_count: u32,
        uploaded_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let index = inner
            .data
            .scan_logs
            .iter()
            .position(|l| l.inventory_id == inventory_id)
            .ok_or_else(|| StoreError::NotFound(inventory_id.to_string()))?;
        self.commit(&mut inner, |data| {
            let entry = &mut data.scan_logs[index];
            entry.status = UploadStatus::UploadComplete;
            entry.uploaded_at = Some(uploaded_at);
            entry.uploaded_image_count = image_count;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, file: &str) -> PhotoRecord {
        PhotoRecord::new(id, ImageHandle::new(format!("/tmp/{file}.jpg")))
    }

    #[tokio::test]
    async fn test_photos_keep_insertion_order() {
        let store = MemoryStore::new();
        store.insert_photo(record("INV1", "a")).await.unwrap();
        store.insert_photo(record("INV2", "b")).await.unwrap();
        store.insert_photo(record("INV1", "c")).await.unwrap();

        let photos = store.photos_for("INV1").await.unwrap();
        let names: Vec<_> = photos.iter().map(|p| p.handle.name()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_delete_by_handle() {
        let store = MemoryStore::new();
        let photo = record("INV1", "a");
        store.insert_photo(photo.clone()).await.unwrap();

        assert!(store.delete_by_handle(&photo.handle).await.unwrap());
        assert!(!store.delete_by_handle(&photo.handle).await.unwrap());
        assert!(store.photos_for("INV1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_watch_sees_changes_for_its_item_only() {
        let store = MemoryStore::new();
        store.insert_photo(record("INV1", "a")).await.unwrap();

        let mut rx = store.watch_photos("INV1");
        assert_eq!(rx.borrow_and_update().len(), 1);

        store.insert_photo(record("INV2", "x")).await.unwrap();
        assert!(!rx.has_changed().unwrap());

        store.insert_photo(record("INV1", "b")).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 2);
    }

    #[tokio::test]
    async fn test_scan_log_ignores_conflicts() {
        let store = MemoryStore::new();
        assert!(store
            .insert_scan_log(ScanLogEntry::pending("INV1", "BX00001"))
            .await
            .unwrap());
        assert!(!store
            .insert_scan_log(ScanLogEntry::pending("INV1", "BX00009"))
            .await
            .unwrap());

        let entry = store.scan_log("INV1").await.unwrap().unwrap();
        assert_eq!(entry.batch_id, "BX00001");
    }

    #[tokio::test]
    async fn test_mark_uploaded_and_filter() {
        let store = MemoryStore::new();
        store
            .insert_scan_log(ScanLogEntry::pending("INV1", "BX00001"))
            .await
            .unwrap();
        store
            .insert_scan_log(ScanLogEntry::pending("INV2", "BX00001"))
            .await
            .unwrap();

        store.mark_uploaded("INV1", 4, Utc::now()).await.unwrap();
        let pending = store.logs_with_status(UploadStatus::PendingUpload).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].inventory_id, "INV2");

        let done = store.scan_log("INV1").await.unwrap().unwrap();
        assert_eq!(done.uploaded_image_count, 4);
        assert!(done.uploaded_at.is_some());

        assert!(matches!(
            store.mark_uploaded("INV9", 1, Utc::now()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_data_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let store = MemoryStore::open(blocker.join("store.json")).unwrap();

        assert!(store
            .insert_scan_log(ScanLogEntry::pending("INV1", "BX00001"))
            .await
            .is_err());
        assert!(store.insert_photo(record("INV1", "a")).await.is_err());

        assert!(store.scan_log("INV1").await.unwrap().is_none());
        assert!(store.photos_for("INV1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_scan_log() {
        let store = MemoryStore::new();
        store
            .insert_scan_log(ScanLogEntry::pending("INV1", "BX00001"))
            .await
            .unwrap();

        assert!(store.delete_scan_log("INV1").await.unwrap());
        assert!(!store.delete_scan_log("INV1").await.unwrap());
        assert!(store.scan_log("INV1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_watchers_are_pruned() {
        let store = MemoryStore::new();
        for id in ["INV1", "INV2", "INV3"] {
            drop(store.watch_photos(id));
        }
        let _live = store.watch_photos("INV4");
        assert_eq!(store.watcher_count(), 1);
    }

    #[tokio::test]
    async fn test_file_backed_store_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = MemoryStore::open(&path).unwrap();
            store.insert_photo(record("INV1", "a")).await.unwrap();
            store
                .insert_scan_log(ScanLogEntry::pending("INV1", "BX00002"))
                .await
                .unwrap();
        }

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.photos_for("INV1").await.unwrap().len(), 1);
        let latest = reopened.latest_scan_log().await.unwrap().unwrap();
        assert_eq!(latest.batch_id, "BX00002");
    }
}
