//! Scan acceptance policy
//!
//! A scan is screened in two steps. [`ScanGate::screen`] applies every rule
//! that only needs the in-memory session; when it returns `None` the caller
//! looks the code up in the scan log and finishes with [`ScanGate::resolve`].

use crate::config::{ScanConfig, StockcamConfig};
use serde::{Deserialize, Serialize};

/// Per-item scan state owned by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSession {
    pub current_inventory_id: Option<String>,
    pub photo_count: u32,
    /// A scan is in progress or a blocking prompt is open
    pub is_processing: bool,
}

impl ScanSession {
    pub fn is_active(&self) -> bool {
        self.current_inventory_id.is_some()
    }

    /// Make `inventory_id` the active item with its scan snapshot as photo 1
    pub fn activate(&mut self, inventory_id: impl Into<String>, photo_count: u32) {
        self.current_inventory_id = Some(inventory_id.into());
        self.photo_count = photo_count;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanDecision {
    Ignored,
    RejectedFormat,
    Duplicate,
    TooFewPhotos,
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanGate {
    required_prefix: String,
    min_photos_per_item: u32,
}

impl Default for ScanGate {
    fn default() -> Self {
        Self::from_config(&StockcamConfig::default().scan)
    }
}

impl ScanGate {
    pub fn new(required_prefix: impl Into<String>, min_photos_per_item: u32) -> Self {
        Self {
            required_prefix: required_prefix.into(),
            min_photos_per_item,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.required_prefix.clone(), config.min_photos_per_item)
    }

    pub fn min_photos_per_item(&self) -> u32 {
        self.min_photos_per_item
    }

    /// Rules that need no scan log lookup; `None` means continue to
    /// [`ScanGate::resolve`]
    pub fn screen(
        &self,
        code: &str,
        session: &ScanSession,
        capture_in_flight: bool,
    ) -> Option<ScanDecision> {
        if session.current_inventory_id.as_deref() == Some(code) {
            return Some(ScanDecision::Ignored);
        }
        if !code.starts_with(&self.required_prefix) {
            log::warn!("Rejected scan {:?}: missing {} prefix", code, self.required_prefix);
            return Some(ScanDecision::RejectedFormat);
        }
        if session.is_processing || capture_in_flight {
            log::debug!("Ignoring scan {:?} while busy", code);
            return Some(ScanDecision::Ignored);
        }
        None
    }

    /// Final decision once the scan log has been checked
    pub fn resolve(&self, session: &ScanSession, already_logged: bool) -> ScanDecision {
        if already_logged {
            return ScanDecision::Duplicate;
        }
        if session.is_active() && session.photo_count < self.min_photos_per_item {
            return ScanDecision::TooFewPhotos;
        }
        ScanDecision::Accepted
    }

    pub fn on_scan(
        &self,
        code: &str,
        session: &ScanSession,
        capture_in_flight: bool,
        already_logged: bool,
    ) -> ScanDecision {
        self.screen(code, session, capture_in_flight)
            .unwrap_or_else(|| self.resolve(session, already_logged))
    }
}
