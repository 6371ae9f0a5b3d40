//! Operator feedback and item notifications
//!
//! The engine never talks to speakers, vibration motors or dialogs directly.
//! It emits [`Signal`]s and [`Prompt`]s through a [`NotificationSink`], and
//! fires [`ItemNotifier::item_scanned`] once per accepted scan.

use crate::errors::CaptureError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Momentary feedback cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// Scan accepted
    AckTone,
    /// Scan rejected or duplicate
    ErrorTone,
    /// One pulse of the triple haptic after a blurry capture
    ErrorPulse,
    /// Focus indicator switches to its error state
    FocusError,
    /// Focus indicator back to normal
    FocusRestored,
}

/// Blocking dialog the operator must acknowledge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prompt {
    /// The scanned item is already in the scan log
    Duplicate { inventory_id: String },
    /// The previous item has not reached the minimum photo count
    TooFewPhotos {
        previous_id: String,
        photo_count: u32,
        required: u32,
    },
}

/// Receiver for capture results and feedback cues
pub trait NotificationSink: Send + Sync {
    fn notify_accepted(&self, inventory_id: &str, score: f64);

    fn notify_rejected(&self, inventory_id: &str, score: f64);

    fn notify_failed(&self, inventory_id: &str, error: &CaptureError);

    fn signal(&self, signal: Signal);

    fn prompt(&self, prompt: Prompt);
}

/// Sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify_accepted(&self, inventory_id: &str, score: f64) {
        log::info!("Photo accepted for {} (sharpness {:.1})", inventory_id, score);
    }

    fn notify_rejected(&self, inventory_id: &str, score: f64) {
        log::warn!("Blurry photo rejected for {} (sharpness {:.1}), retake", inventory_id, score);
    }

    fn notify_failed(&self, inventory_id: &str, error: &CaptureError) {
        log::error!("Capture failed for {}: {}", inventory_id, error);
    }

    fn signal(&self, signal: Signal) {
        log::debug!("Signal: {:?}", signal);
    }

    fn prompt(&self, prompt: Prompt) {
        match prompt {
            Prompt::Duplicate { inventory_id } => {
                log::warn!("{} has already been scanned", inventory_id)
            }
            Prompt::TooFewPhotos {
                previous_id,
                photo_count,
                required,
            } => log::warn!(
                "{} has only {} of {} required photos",
                previous_id,
                photo_count,
                required
            ),
        }
    }
}

/// Downstream hook fired once for every accepted scan (label printing)
#[async_trait]
pub trait ItemNotifier: Send + Sync {
    async fn item_scanned(&self, inventory_id: &str, batch_id: &str) -> Result<(), CaptureError>;
}

/// Notifier that records the call in the log and nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl ItemNotifier for LoggingNotifier {
    async fn item_scanned(&self, inventory_id: &str, batch_id: &str) -> Result<(), CaptureError> {
        log::info!("Label requested for {} in batch {}", inventory_id, batch_id);
        Ok(())
    }
}
