//! Photo and scan-log persistence
//!
//! [`InventoryStore`] is the narrow contract the engine needs from the
//! database: photo rows keyed by inventory id with a live per-item query,
//! and the scan log used for duplicate detection, restore and upload.

pub mod memory;

pub use memory::MemoryStore;

use crate::errors::CaptureError;
use crate::types::ImageHandle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence layer errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for CaptureError {
    fn from(e: StoreError) -> Self {
        CaptureError::StorageError(e.to_string())
    }
}

/// One accepted photo of an inventory item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub inventory_id: String,
    pub handle: ImageHandle,
    pub taken_at: DateTime<Utc>,
}

impl PhotoRecord {
    pub fn new(inventory_id: impl Into<String>, handle: ImageHandle) -> Self {
        Self {
            inventory_id: inventory_id.into(),
            handle,
            taken_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    PendingUpload,
    UploadComplete,
}

/// Scan log row, primary key `inventory_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub inventory_id: String,
    pub batch_id: String,
    pub scanned_at: DateTime<Utc>,
    pub status: UploadStatus,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub uploaded_image_count: u32,
    pub is_duplicate: bool,
}

impl ScanLogEntry {
    pub fn pending(inventory_id: impl Into<String>, batch_id: impl Into<String>) -> Self {
        Self {
            inventory_id: inventory_id.into(),
            batch_id: batch_id.into(),
            scanned_at: Utc::now(),
            status: UploadStatus::PendingUpload,
            uploaded_at: None,
            uploaded_image_count: 0,
            is_duplicate: false,
        }
    }
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn insert_photo(&self, record: PhotoRecord) -> StoreResult<()>;

    /// Remove every photo row pointing at `handle`; returns whether any existed
    async fn delete_by_handle(&self, handle: &ImageHandle) -> StoreResult<bool>;

    /// Photos of one item in insertion order
    async fn photos_for(&self, inventory_id: &str) -> StoreResult<Vec<PhotoRecord>>;

    /// Live view of `photos_for`, updated after every change to the item
    fn watch_photos(&self, inventory_id: &str) -> watch::Receiver<Vec<PhotoRecord>>;

    /// Insert a scan log row; an existing row for the same id is kept and
    /// `false` is returned
    async fn insert_scan_log(&self, entry: ScanLogEntry) -> StoreResult<bool>;

    /// Remove a scan log row; returns whether it existed
    async fn delete_scan_log(&self, inventory_id: &str) -> StoreResult<bool>;

    async fn scan_log(&self, inventory_id: &str) -> StoreResult<Option<ScanLogEntry>>;

    /// Most recently scanned row
    async fn latest_scan_log(&self) -> StoreResult<Option<ScanLogEntry>>;

    async fn logs_with_status(&self, status: UploadStatus) -> StoreResult<Vec<ScanLogEntry>>;

    async fn mark_uploaded(
        &self,
        inventory_id: &str,
        image_count: u32,
        uploaded_at: DateTime<Utc>,
    ) -> StoreResult<()>;
}
