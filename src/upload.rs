//! Batch upload of pending items to the image host
//!
//! Photos are uploaded in capture order as `<clean id>-<n>` into the folder
//! `<prefix><batch id>`. An item is marked uploaded only when every one of
//! its photos went through.

use crate::batch::BatchCounter;
use crate::errors::CaptureError;
use crate::store::{InventoryStore, UploadStatus};
use crate::types::{photo_name, ImageHandle};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Host response for one uploaded asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub url: String,
    pub delete_token: Option<String>,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(
        &self,
        handle: &ImageHandle,
        folder: &str,
        public_id: &str,
    ) -> Result<UploadReceipt, CaptureError>;
}

/// Outcome of one upload run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadReport {
    pub images_uploaded: u32,
    pub images_failed: u32,
    pub items_completed: Vec<String>,
    pub items_failed: Vec<String>,
    /// Batch id the counter advanced to, when the run closed the batch
    pub next_batch: Option<String>,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.images_failed == 0 && self.items_failed.is_empty()
    }
}

/// Upload folder for a batch
pub fn batch_folder(prefix: &str, batch_id: &str) -> String {
    format!("{}{}", prefix, batch_id)
}

/// Upload every item whose scan log is still pending
///
/// Individual upload failures are counted and logged, never propagated. Only
/// store errors abort the run. The batch counter advances when at least one
/// item was uploaded and nothing failed.
pub async fn upload_pending_batch(
    store: &dyn InventoryStore,
    host: &dyn ImageHost,
    counter: &dyn BatchCounter,
    folder_prefix: &str,
) -> Result<UploadReport, CaptureError> {
    let pending = store.logs_with_status(UploadStatus::PendingUpload).await?;
    let mut report = UploadReport::default();

    if pending.is_empty() {
        log::info!("No pending items to upload");
        return Ok(report);
    }

    log::info!("Uploading {} pending items", pending.len());

    for entry in pending {
        let folder = batch_folder(folder_prefix, &entry.batch_id);
        let photos = store.photos_for(&entry.inventory_id).await?;
        let mut item_ok = !photos.is_empty();
        let mut uploaded = 0u32;

        if photos.is_empty() {
            log::warn!("{} has no photos, skipping", entry.inventory_id);
        }

        for (index, photo) in photos.iter().enumerate() {
            let public_id = photo_name(&entry.inventory_id, index as u32 + 1);
            match host.upload(&photo.handle, &folder, &public_id).await {
                Ok(receipt) if receipt.delete_token.is_some() => {
                    log::debug!("Uploaded {}/{} to {}", folder, public_id, receipt.url);
                    uploaded += 1;
                }
                Ok(_) => {
                    log::error!("Upload of {} returned no delete token", public_id);
                    item_ok = false;
                }
                Err(e) => {
                    log::error!("Upload failed for {}: {}", public_id, e);
                    item_ok = false;
                }
            }
        }

        report.images_uploaded += uploaded;
        report.images_failed += photos.len() as u32 - uploaded;

        if item_ok {
            store
                .mark_uploaded(&entry.inventory_id, uploaded, Utc::now())
                .await?;
            report.items_completed.push(entry.inventory_id);
        } else {
            report.items_failed.push(entry.inventory_id);
        }
    }

    if report.is_success() && !report.items_completed.is_empty() {
        report.next_batch = Some(counter.increment()?);
    }

    log::info!(
        "Upload complete. Success: {}, Failed: {}",
        report.images_uploaded,
        report.images_failed
    );
    Ok(report)
}
