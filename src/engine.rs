//! Capture engine actor
//!
//! One task owns the [`ScanSession`], the selected mode and orientation. UI
//! commands arrive on an unbounded channel with oneshot replies; capture
//! tasks, scan lookups and the photo observer report back on a second
//! channel. Nothing outside the actor touches session state.

use crate::assert_invariant;
use crate::batch::BatchCounter;
use crate::binder::{CaptureRequest, ModeBinder};
use crate::capture::{
    CaptureDevice, CaptureJob, CaptureOutcome, CaptureSession, CaptureState, InFlightCounter,
};
use crate::config::StockcamConfig;
use crate::errors::CaptureError;
use crate::feedback::{ItemNotifier, NotificationSink, Prompt, Signal};
use crate::invariant_ppt::contracts;
use crate::lens::{CapabilityProvider, LensCache, ResolvedLenses};
use crate::scan::{ScanDecision, ScanGate, ScanSession};
use crate::store::{InventoryStore, PhotoRecord, ScanLogEntry, UploadStatus};
use crate::types::{photo_name, CaptureMode, ImageHandle, Orientation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Why a shutter press was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutterRejection {
    NoActiveItem,
    CaptureInFlight,
    ScanInProgress,
    EngineStopped,
}

impl fmt::Display for ShutterRejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShutterRejection::NoActiveItem => write!(f, "scan an item first"),
            ShutterRejection::CaptureInFlight => write!(f, "a capture is already running"),
            ShutterRejection::ScanInProgress => write!(f, "a scan is being processed"),
            ShutterRejection::EngineStopped => write!(f, "capture engine is not running"),
        }
    }
}

/// Snapshot of engine state for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub inventory_id: Option<String>,
    pub photo_count: u32,
    pub is_processing: bool,
    pub prompt_open: bool,
    pub mode: CaptureMode,
    pub effective_mode: CaptureMode,
    pub orientation: Orientation,
    pub orientation_toggle_enabled: bool,
    pub macro_available: bool,
    pub captures_in_flight: usize,
}

/// A capture that has been started
#[derive(Debug)]
pub struct PendingCapture {
    photo_name: String,
    request: CaptureRequest,
    rx: oneshot::Receiver<CaptureOutcome>,
}

impl PendingCapture {
    pub fn photo_name(&self) -> &str {
        &self.photo_name
    }

    pub fn request(&self) -> &CaptureRequest {
        &self.request
    }

    pub async fn outcome(self) -> CaptureOutcome {
        self.rx.await.unwrap_or_else(|_| CaptureOutcome::Failed {
            error: CaptureError::DeviceError("Capture task ended without a result".to_string()),
        })
    }
}

/// Collaborators the engine drives
#[derive(Clone)]
pub struct EngineParts {
    pub device: Arc<dyn CaptureDevice>,
    pub store: Arc<dyn InventoryStore>,
    pub sink: Arc<dyn NotificationSink>,
    pub notifier: Arc<dyn ItemNotifier>,
    pub batches: Arc<dyn BatchCounter>,
}

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Scan {
        code: String,
        reply: Reply<Result<ScanDecision, CaptureError>>,
    },
    TriggerCapture {
        reply: Reply<Result<PendingCapture, ShutterRejection>>,
    },
    AcknowledgePrompt {
        reply: Reply<bool>,
    },
    SetMode {
        mode: CaptureMode,
        reply: Reply<CaptureRequest>,
    },
    ToggleOrientation {
        reply: Reply<Orientation>,
    },
    DeleteLastPhoto {
        reply: Reply<Result<Option<ImageHandle>, CaptureError>>,
    },
    Status {
        reply: Reply<EngineStatus>,
    },
    Restore {
        reply: Reply<Result<Option<String>, CaptureError>>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

enum Event {
    ScanChecked {
        code: String,
        lookup: Result<(ImageHandle, bool), CaptureError>,
        reply: Reply<Result<ScanDecision, CaptureError>>,
    },
    CaptureFinished {
        inventory_id: String,
        outcome: CaptureOutcome,
    },
    PhotosChanged {
        inventory_id: String,
        count: u32,
    },
}

/// Handle to a running engine; cheap to clone
#[derive(Clone)]
pub struct CaptureEngine {
    commands: mpsc::UnboundedSender<Command>,
    capture_state: watch::Receiver<CaptureState>,
}

impl CaptureEngine {
    /// Resolve lenses through the process-wide cache and start the engine
    pub fn start(
        config: &StockcamConfig,
        provider: &dyn CapabilityProvider,
        parts: EngineParts,
    ) -> Self {
        let lenses = LensCache::global().get_or_resolve(provider);
        Self::spawn(config, lenses, parts)
    }

    pub fn spawn(
        config: &StockcamConfig,
        lenses: Option<Arc<ResolvedLenses>>,
        parts: EngineParts,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let capture = Arc::new(CaptureSession::new(
            Arc::clone(&parts.device),
            Arc::clone(&parts.store),
            Arc::clone(&parts.sink),
            &config.quality,
        ));
        let capture_state = capture.subscribe();

        let actor = EngineActor {
            session: ScanSession::default(),
            prompt_open: false,
            mode: config.camera.default_mode,
            orientation: config.camera.default_orientation,
            binder: ModeBinder::new(lenses, config.camera.clone()),
            gate: ScanGate::from_config(&config.scan),
            capture,
            in_flight: InFlightCounter::new(),
            observer: None,
            events: event_tx,
            parts,
        };

        log::info!(
            "Starting capture engine in {} mode (macro available: {})",
            actor.mode,
            actor.binder.is_mode_available(CaptureMode::Macro)
        );
        tokio::spawn(actor.run(command_rx, event_rx));

        Self {
            commands: command_tx,
            capture_state,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(build(tx)).ok()?;
        rx.await.ok()
    }

    fn stopped() -> CaptureError {
        CaptureError::InitializationError("Capture engine is not running".to_string())
    }

    /// Feed one decoded QR payload
    pub async fn scan(&self, code: impl Into<String>) -> Result<ScanDecision, CaptureError> {
        let code = code.into();
        self.request(|reply| Command::Scan { code, reply })
            .await
            .unwrap_or_else(|| Err(Self::stopped()))
    }

    /// Shutter press
    pub async fn trigger_capture(&self) -> Result<PendingCapture, ShutterRejection> {
        self.request(|reply| Command::TriggerCapture { reply })
            .await
            .unwrap_or(Err(ShutterRejection::EngineStopped))
    }

    /// Dismiss the open prompt; returns whether one was open
    pub async fn acknowledge_prompt(&self) -> bool {
        self.request(|reply| Command::AcknowledgePrompt { reply })
            .await
            .unwrap_or(false)
    }

    /// Select a mode and return the request it binds to
    pub async fn set_mode(&self, mode: CaptureMode) -> Result<CaptureRequest, CaptureError> {
        self.request(|reply| Command::SetMode { mode, reply })
            .await
            .ok_or_else(Self::stopped)
    }

    pub async fn toggle_orientation(&self) -> Result<Orientation, CaptureError> {
        self.request(|reply| Command::ToggleOrientation { reply })
            .await
            .ok_or_else(Self::stopped)
    }

    /// Remove the newest photo of the active item, keeping at least one
    pub async fn delete_last_photo(&self) -> Result<Option<ImageHandle>, CaptureError> {
        self.request(|reply| Command::DeleteLastPhoto { reply })
            .await
            .unwrap_or_else(|| Err(Self::stopped()))
    }

    pub async fn status(&self) -> Result<EngineStatus, CaptureError> {
        self.request(|reply| Command::Status { reply })
            .await
            .ok_or_else(Self::stopped)
    }

    /// Re-activate the most recent item still pending upload
    pub async fn restore(&self) -> Result<Option<String>, CaptureError> {
        self.request(|reply| Command::Restore { reply })
            .await
            .unwrap_or_else(|| Err(Self::stopped()))
    }

    pub async fn shutdown(&self) {
        let _ = self.request(|reply| Command::Shutdown { reply }).await;
    }

    pub fn capture_state(&self) -> watch::Receiver<CaptureState> {
        self.capture_state.clone()
    }
}

struct EngineActor {
    session: ScanSession,
    prompt_open: bool,
    mode: CaptureMode,
    orientation: Orientation,
    binder: ModeBinder,
    gate: ScanGate,
    capture: Arc<CaptureSession>,
    in_flight: InFlightCounter,
    observer: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<Event>,
    parts: EngineParts,
}

impl EngineActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => self.handle_event(event).await,
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        self.stop_observer();
        log::info!("Capture engine stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Scan { code, reply } => self.on_scan(code, reply),
            Command::TriggerCapture { reply } => {
                let _ = reply.send(self.on_shutter());
            }
            Command::AcknowledgePrompt { reply } => {
                let _ = reply.send(self.on_acknowledge());
            }
            Command::SetMode { mode, reply } => {
                self.mode = mode;
                let request = self.binder.bind(self.mode, self.orientation);
                log::info!(
                    "Mode set to {} (effective {}{})",
                    mode,
                    request.effective_mode,
                    if request.degraded { ", degraded" } else { "" }
                );
                let _ = reply.send(request);
            }
            Command::ToggleOrientation { reply } => {
                if self.mode == CaptureMode::Wide {
                    log::debug!("Orientation is fixed in wide mode");
                } else {
                    self.orientation = self.orientation.toggled();
                    log::info!("Orientation set to {:?}", self.orientation);
                }
                let _ = reply.send(self.orientation);
            }
            Command::DeleteLastPhoto { reply } => {
                let _ = reply.send(self.delete_last_photo().await);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Restore { reply } => {
                let _ = reply.send(self.restore().await);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::ScanChecked {
                code,
                lookup,
                reply,
            } => {
                let result = self.finish_scan(code, lookup).await;
                let _ = reply.send(result);
            }
            Event::CaptureFinished {
                inventory_id,
                outcome,
            } => {
                if self.session.current_inventory_id.as_deref() != Some(inventory_id.as_str()) {
                    log::debug!("Capture for inactive item {} finished", inventory_id);
                    return;
                }
                if outcome.is_accepted() {
                    self.refresh_photo_count().await;
                }
            }
            Event::PhotosChanged {
                inventory_id,
                count,
            } => {
                if self.session.current_inventory_id.as_deref() == Some(inventory_id.as_str()) {
                    self.session.photo_count = count;
                } else {
                    log::debug!("Ignoring stale photo update for {}", inventory_id);
                }
            }
        }
    }

    fn on_scan(&mut self, code: String, reply: Reply<Result<ScanDecision, CaptureError>>) {
        if let Some(decision) = self
            .gate
            .screen(&code, &self.session, self.in_flight.is_busy())
        {
            if decision == ScanDecision::RejectedFormat {
                self.parts.sink.signal(Signal::ErrorTone);
            }
            let _ = reply.send(Ok(decision));
            return;
        }

        self.session.is_processing = true;
        log::info!("Processing scan {}", code);

        let device = Arc::clone(&self.parts.device);
        let store = Arc::clone(&self.parts.store);
        let events = self.events.clone();
        tokio::spawn(async move {
            let lookup = check_scan(device.as_ref(), store.as_ref(), &code).await;
            let _ = events.send(Event::ScanChecked {
                code,
                lookup,
                reply,
            });
        });
    }

    async fn finish_scan(
        &mut self,
        code: String,
        lookup: Result<(ImageHandle, bool), CaptureError>,
    ) -> Result<ScanDecision, CaptureError> {
        let (snapshot, already_logged) = match lookup {
            Ok(found) => found,
            Err(e) => {
                log::error!("Scan of {} failed: {}", code, e);
                self.session.is_processing = false;
                return Err(e);
            }
        };

        let decision = self.gate.resolve(&self.session, already_logged);
        match decision {
            ScanDecision::Duplicate => {
                log::warn!("{} was already scanned", code);
                self.parts.sink.signal(Signal::ErrorTone);
                remove_asset(&snapshot).await;
                self.open_prompt(Prompt::Duplicate { inventory_id: code });
            }
            ScanDecision::TooFewPhotos => {
                let previous_id = self.session.current_inventory_id.clone().unwrap_or_default();
                log::warn!(
                    "Refusing {}: {} has {} of {} photos",
                    code,
                    previous_id,
                    self.session.photo_count,
                    self.gate.min_photos_per_item()
                );
                remove_asset(&snapshot).await;
                self.open_prompt(Prompt::TooFewPhotos {
                    previous_id,
                    photo_count: self.session.photo_count,
                    required: self.gate.min_photos_per_item(),
                });
            }
            ScanDecision::Accepted => {
                if let Err(e) = self.accept_scan(&code, snapshot).await {
                    log::error!("Failed to start item {}: {}", code, e);
                    self.session.is_processing = false;
                    return Err(e);
                }
            }
            ScanDecision::Ignored | ScanDecision::RejectedFormat => {
                remove_asset(&snapshot).await;
                self.session.is_processing = false;
            }
        }

        Ok(decision)
    }

    async fn accept_scan(&mut self, code: &str, snapshot: ImageHandle) -> Result<(), CaptureError> {
        self.parts.sink.signal(Signal::AckTone);

        let batch_id = self.parts.batches.current_id();
        let logged = self
            .parts
            .store
            .insert_scan_log(ScanLogEntry::pending(code, batch_id.clone()))
            .await;
        let inserted = match logged {
            Ok(inserted) => inserted,
            Err(e) => {
                remove_asset(&snapshot).await;
                return Err(e.into());
            }
        };

        let first = adopt_snapshot(snapshot, code).await;
        if let Err(e) = self
            .parts
            .store
            .insert_photo(PhotoRecord::new(code, first.clone()))
            .await
        {
            remove_asset(&first).await;
            if inserted {
                if let Err(rollback) = self.parts.store.delete_scan_log(code).await {
                    log::error!("Failed to roll back scan log for {}: {}", code, rollback);
                }
            }
            return Err(e.into());
        }

        let notifier = Arc::clone(&self.parts.notifier);
        let (id, batch) = (code.to_string(), batch_id.clone());
        tokio::spawn(async move {
            if let Err(e) = notifier.item_scanned(&id, &batch).await {
                log::error!("Item notification for {} failed: {}", id, e);
            }
        });

        self.activate(code.to_string()).await?;
        assert_invariant!(
            self.session.photo_count >= 1,
            contracts::SCAN_PHOTO_PRESENT,
            "CaptureEngine::accept_scan"
        );
        log::info!("Now capturing {} in batch {}", code, batch_id);
        Ok(())
    }

    fn open_prompt(&mut self, prompt: Prompt) {
        // Stays processing until acknowledged
        self.prompt_open = true;
        self.parts.sink.prompt(prompt);
    }

    fn on_acknowledge(&mut self) -> bool {
        if !self.prompt_open {
            return false;
        }
        self.prompt_open = false;
        self.session.is_processing = false;
        log::debug!("Prompt acknowledged, scanning resumed");
        true
    }

    fn on_shutter(&mut self) -> Result<PendingCapture, ShutterRejection> {
        let Some(inventory_id) = self.session.current_inventory_id.clone() else {
            return Err(ShutterRejection::NoActiveItem);
        };
        if self.in_flight.is_busy() {
            return Err(ShutterRejection::CaptureInFlight);
        }
        if self.session.is_processing {
            return Err(ShutterRejection::ScanInProgress);
        }

        let request = self.binder.bind(self.mode, self.orientation);
        let name = photo_name(&inventory_id, self.session.photo_count + 1);
        let job = CaptureJob {
            inventory_id: inventory_id.clone(),
            photo_name: name.clone(),
            request: request.clone(),
        };

        let ticket = self.in_flight.acquire();
        let capture = Arc::clone(&self.capture);
        let events = self.events.clone();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let outcome = capture.run(&job).await;
            // Queued ahead of the release so the next press sees the new count
            let _ = events.send(Event::CaptureFinished {
                inventory_id,
                outcome: outcome.clone(),
            });
            drop(ticket);
            let _ = tx.send(outcome);
        });

        Ok(PendingCapture {
            photo_name: name,
            request,
            rx,
        })
    }

    async fn delete_last_photo(&mut self) -> Result<Option<ImageHandle>, CaptureError> {
        let Some(inventory_id) = self.session.current_inventory_id.clone() else {
            return Ok(None);
        };
        if self.in_flight.is_busy() {
            log::debug!("Not deleting while a capture is running");
            return Ok(None);
        }

        let photos = self.parts.store.photos_for(&inventory_id).await?;
        if photos.len() <= 1 {
            log::info!("{} keeps its only photo", inventory_id);
            return Ok(None);
        }
        let Some(last) = photos.last() else {
            return Ok(None);
        };

        remove_asset(&last.handle).await;
        self.parts.store.delete_by_handle(&last.handle).await?;
        self.refresh_photo_count().await;
        log::info!("Deleted {} from {}", last.handle, inventory_id);
        Ok(Some(last.handle.clone()))
    }

    async fn restore(&mut self) -> Result<Option<String>, CaptureError> {
        if let Some(active) = &self.session.current_inventory_id {
            return Ok(Some(active.clone()));
        }
        if self.session.is_processing {
            return Ok(None);
        }

        let Some(latest) = self.parts.store.latest_scan_log().await? else {
            return Ok(None);
        };
        if latest.status != UploadStatus::PendingUpload {
            log::debug!("Last item {} was already uploaded", latest.inventory_id);
            return Ok(None);
        }

        self.activate(latest.inventory_id.clone()).await?;
        log::info!(
            "Restored {} with {} photos",
            latest.inventory_id,
            self.session.photo_count
        );
        Ok(Some(latest.inventory_id))
    }

    async fn activate(&mut self, inventory_id: String) -> Result<(), CaptureError> {
        let count = self.parts.store.photos_for(&inventory_id).await?.len() as u32;
        self.session.activate(inventory_id.clone(), count);
        self.session.is_processing = false;
        self.replace_observer(inventory_id);
        Ok(())
    }

    async fn refresh_photo_count(&mut self) {
        let Some(id) = self.session.current_inventory_id.clone() else {
            return;
        };
        match self.parts.store.photos_for(&id).await {
            Ok(photos) => self.session.photo_count = photos.len() as u32,
            Err(e) => log::warn!("Failed to refresh photo count for {}: {}", id, e),
        }
    }

    fn replace_observer(&mut self, inventory_id: String) {
        self.stop_observer();

        let mut rx = self.parts.store.watch_photos(&inventory_id);
        let events = self.events.clone();
        self.observer = Some(tokio::spawn(async move {
            loop {
                let count = rx.borrow_and_update().len() as u32;
                let update = Event::PhotosChanged {
                    inventory_id: inventory_id.clone(),
                    count,
                };
                if events.send(update).is_err() || rx.changed().await.is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_observer(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.abort();
        }
    }

    fn status(&self) -> EngineStatus {
        let request = self.binder.bind(self.mode, self.orientation);
        EngineStatus {
            inventory_id: self.session.current_inventory_id.clone(),
            photo_count: self.session.photo_count,
            is_processing: self.session.is_processing,
            prompt_open: self.prompt_open,
            mode: self.mode,
            effective_mode: request.effective_mode,
            orientation: self.orientation,
            orientation_toggle_enabled: request.orientation_toggle_enabled,
            macro_available: self.binder.is_mode_available(CaptureMode::Macro),
            captures_in_flight: self.in_flight.current(),
        }
    }
}

/// Preview snapshot plus whether the code is already in the scan log
async fn check_scan(
    device: &dyn CaptureDevice,
    store: &dyn InventoryStore,
    code: &str,
) -> Result<(ImageHandle, bool), CaptureError> {
    let name = format!("scan-{}", uuid::Uuid::new_v4());
    let snapshot = device.snapshot_preview(&name).await?;
    match store.scan_log(code).await {
        Ok(entry) => Ok((snapshot, entry.is_some())),
        Err(e) => {
            remove_asset(&snapshot).await;
            Err(e.into())
        }
    }
}

/// Rename the scan snapshot to the item's first photo name
async fn adopt_snapshot(snapshot: ImageHandle, inventory_id: &str) -> ImageHandle {
    let stem = photo_name(inventory_id, 1);
    let file_name = match snapshot.path().extension() {
        Some(extension) => format!("{}.{}", stem, extension.to_string_lossy()),
        None => stem,
    };
    let target = snapshot.path().with_file_name(file_name);

    match tokio::fs::rename(snapshot.path(), &target).await {
        Ok(()) => ImageHandle::new(target),
        Err(e) => {
            log::warn!("Keeping snapshot name {}: {}", snapshot, e);
            snapshot
        }
    }
}

async fn remove_asset(handle: &ImageHandle) {
    if let Err(e) = tokio::fs::remove_file(handle.path()).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to delete {}: {}", handle, e);
        }
    }
}
