//! Recording collaborators for assertions in tests and the simulator

use crate::errors::CaptureError;
use crate::feedback::{ItemNotifier, NotificationSink, Prompt, Signal};
use crate::types::ImageHandle;
use crate::upload::{ImageHost, UploadReceipt};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Accepted { inventory_id: String, score: f64 },
    Rejected { inventory_id: String, score: f64 },
    Failed { inventory_id: String, error: CaptureError },
    Signal(Signal),
    Prompt(Prompt),
}

/// Sink that keeps every call in order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: SinkEvent) {
        log::debug!("Sink event: {:?}", event);
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Signal(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Prompt(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn count_signal(&self, signal: Signal) -> usize {
        self.signals().into_iter().filter(|s| *s == signal).count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl NotificationSink for RecordingSink {
    fn notify_accepted(&self, inventory_id: &str, score: f64) {
        self.push(SinkEvent::Accepted {
            inventory_id: inventory_id.to_string(),
            score,
        });
    }

    fn notify_rejected(&self, inventory_id: &str, score: f64) {
        self.push(SinkEvent::Rejected {
            inventory_id: inventory_id.to_string(),
            score,
        });
    }

    fn notify_failed(&self, inventory_id: &str, error: &CaptureError) {
        self.push(SinkEvent::Failed {
            inventory_id: inventory_id.to_string(),
            error: error.clone(),
        });
    }

    fn signal(&self, signal: Signal) {
        self.push(SinkEvent::Signal(signal));
    }

    fn prompt(&self, prompt: Prompt) {
        self.push(SinkEvent::Prompt(prompt));
    }
}

/// Item notifier that records `(inventory id, batch id)` pairs
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls but report every one as failed
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ItemNotifier for RecordingNotifier {
    async fn item_scanned(&self, inventory_id: &str, batch_id: &str) -> Result<(), CaptureError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((inventory_id.to_string(), batch_id.to_string()));
        }
        if self.fail {
            return Err(CaptureError::NotificationError(
                "Label service unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

/// In-memory image host
#[derive(Debug, Default)]
pub struct MemoryImageHost {
    uploads: Mutex<Vec<(String, String)>>,
    failing_ids: Mutex<HashSet<String>>,
    omit_delete_token: bool,
}

impl MemoryImageHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host that answers without delete tokens
    pub fn without_delete_tokens() -> Self {
        Self {
            omit_delete_token: true,
            ..Default::default()
        }
    }

    pub fn fail_public_id(&self, public_id: &str) {
        if let Ok(mut ids) = self.failing_ids.lock() {
            ids.insert(public_id.to_string());
        }
    }

    /// `(folder, public id)` of every successful call, in order
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ImageHost for MemoryImageHost {
    async fn upload(
        &self,
        handle: &ImageHandle,
        folder: &str,
        public_id: &str,
    ) -> Result<UploadReceipt, CaptureError> {
        let rejected = self
            .failing_ids
            .lock()
            .map(|ids| ids.contains(public_id))
            .unwrap_or(false);
        if rejected {
            return Err(CaptureError::UploadError(format!(
                "Host rejected {}",
                public_id
            )));
        }

        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push((folder.to_string(), public_id.to_string()));
        }
        log::debug!("Stored {} as {}/{}", handle, folder, public_id);

        Ok(UploadReceipt {
            url: format!("memory://{}/{}", folder, public_id),
            delete_token: (!self.omit_delete_token).then(|| format!("token-{}", public_id)),
        })
    }
}
