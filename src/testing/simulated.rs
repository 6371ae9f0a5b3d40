//! Simulated hardware
//!
//! [`SimulatedCaptureDevice`] writes synthetic JPEGs to a directory and
//! follows a script of frame kinds. [`StaticCapabilityProvider`] answers
//! lens queries from a fixed table.

use super::synthetic_data::{blurry_frame, encode_frame, sharp_frame};
use crate::binder::CaptureRequest;
use crate::capture::CaptureDevice;
use crate::config::StockcamConfig;
use crate::errors::CaptureError;
use crate::lens::{CapabilityProvider, SensorCharacteristics};
use crate::types::{ImageHandle, PixelArray};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// What the next simulated capture produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameScript {
    Sharp,
    Blurry,
    /// The device reports an error, nothing is written
    DeviceError,
    /// A file is written but does not decode
    Corrupt,
}

pub struct SimulatedCaptureDevice {
    output_dir: PathBuf,
    frame_size: (u32, u32),
    snapshot_quality: u8,
    capture_delay: Duration,
    script: Mutex<VecDeque<FrameScript>>,
    fallback: FrameScript,
    fail_snapshots: AtomicBool,
    exposure_locked: AtomicBool,
    lock_count: AtomicUsize,
    unlock_count: AtomicUsize,
    requests: Mutex<Vec<CaptureRequest>>,
}

impl SimulatedCaptureDevice {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            frame_size: (640, 480),
            snapshot_quality: 95,
            capture_delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            fallback: FrameScript::Sharp,
            fail_snapshots: AtomicBool::new(false),
            exposure_locked: AtomicBool::new(false),
            lock_count: AtomicUsize::new(0),
            unlock_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Device writing to the configured output directory
    pub fn from_config(config: &StockcamConfig) -> Self {
        Self::new(&config.storage.output_directory)
            .with_snapshot_quality(config.scan.snapshot_jpeg_quality)
    }

    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width, height);
        self
    }

    pub fn with_snapshot_quality(mut self, quality: u8) -> Self {
        self.snapshot_quality = quality;
        self
    }

    /// Hold every capture for `delay` before writing the frame
    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_delay = delay;
        self
    }

    /// Frame kind used once the script runs out
    pub fn with_fallback(mut self, fallback: FrameScript) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn push_script(&self, frames: &[FrameScript]) {
        if let Ok(mut script) = self.script.lock() {
            script.extend(frames.iter().copied());
        }
    }

    pub fn set_snapshot_failure(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }

    pub fn is_exposure_locked(&self) -> bool {
        self.exposure_locked.load(Ordering::SeqCst)
    }

    pub fn lock_count(&self) -> usize {
        self.lock_count.load(Ordering::SeqCst)
    }

    pub fn unlock_count(&self) -> usize {
        self.unlock_count.load(Ordering::SeqCst)
    }

    /// Requests seen by `trigger_capture`, oldest first
    pub fn requests(&self) -> Vec<CaptureRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_frame(&self) -> FrameScript {
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or(self.fallback)
    }

    async fn write(&self, name: &str, bytes: Vec<u8>) -> Result<ImageHandle, CaptureError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("{}.jpg", name));
        tokio::fs::write(&path, bytes).await?;
        Ok(ImageHandle::new(path))
    }
}

#[async_trait]
impl CaptureDevice for SimulatedCaptureDevice {
    async fn lock_exposure(&self) -> Result<(), CaptureError> {
        if self.exposure_locked.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::ExposureError(
                "Exposure is already locked".to_string(),
            ));
        }
        self.lock_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn trigger_capture(
        &self,
        request: &CaptureRequest,
        name: &str,
    ) -> Result<ImageHandle, CaptureError> {
        if !self.is_exposure_locked() {
            return Err(CaptureError::ExposureError(
                "Capture triggered without exposure lock".to_string(),
            ));
        }
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if !self.capture_delay.is_zero() {
            tokio::time::sleep(self.capture_delay).await;
        }

        let (width, height) = self.frame_size;
        let bytes = match self.next_frame() {
            FrameScript::Sharp => encode_frame(&sharp_frame(width, height), request.jpeg_quality)?,
            FrameScript::Blurry => {
                encode_frame(&blurry_frame(width, height), request.jpeg_quality)?
            }
            FrameScript::DeviceError => {
                return Err(CaptureError::DeviceError("Simulated capture failure".to_string()))
            }
            FrameScript::Corrupt => b"simulated corrupt frame".to_vec(),
        };
        self.write(name, bytes).await
    }

    async fn unlock_exposure(&self) -> Result<(), CaptureError> {
        self.exposure_locked.store(false, Ordering::SeqCst);
        self.unlock_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn snapshot_preview(&self, name: &str) -> Result<ImageHandle, CaptureError> {
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceError("Preview unavailable".to_string()));
        }
        let (width, height) = self.frame_size;
        let bytes = encode_frame(&sharp_frame(width, height), self.snapshot_quality)?;
        self.write(name, bytes).await
    }
}

const LOGICAL_ID: &str = "logical-0";

/// Capability provider answering from a fixed sensor table
#[derive(Debug, Default)]
pub struct StaticCapabilityProvider {
    rear: Vec<String>,
    sensors: HashMap<String, SensorCharacteristics>,
    failure: Option<String>,
    queries: AtomicUsize,
}

impl StaticCapabilityProvider {
    /// One rear logical camera grouping `(physical id, focal length)` sensors
    /// with 4000x3000 active arrays
    pub fn multi_camera(physical: &[(&str, f32)]) -> Self {
        let array = PixelArray {
            width: 4000,
            height: 3000,
        };
        let mut sensors = HashMap::new();
        sensors.insert(
            LOGICAL_ID.to_string(),
            SensorCharacteristics {
                is_logical_multi_camera: true,
                physical_ids: physical.iter().map(|(id, _)| id.to_string()).collect(),
                focal_lengths: vec![4.0],
                active_array: Some(array),
            },
        );
        for (id, focal) in physical {
            sensors.insert(
                id.to_string(),
                SensorCharacteristics {
                    focal_lengths: vec![*focal],
                    active_array: Some(array),
                    ..Default::default()
                },
            );
        }
        Self {
            rear: vec![LOGICAL_ID.to_string()],
            sensors,
            ..Default::default()
        }
    }

    /// A single plain rear camera
    pub fn single_camera() -> Self {
        let mut sensors = HashMap::new();
        sensors.insert(
            "0".to_string(),
            SensorCharacteristics {
                focal_lengths: vec![4.2],
                ..Default::default()
            },
        );
        Self {
            rear: vec!["0".to_string()],
            sensors,
            ..Default::default()
        }
    }

    /// Every query fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn with_sensor(mut self, id: &str, characteristics: SensorCharacteristics) -> Self {
        self.sensors.insert(id.to_string(), characteristics);
        self
    }

    /// Number of `characteristics` calls answered so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl CapabilityProvider for StaticCapabilityProvider {
    fn list_rear_sensors(&self) -> Result<Vec<String>, CaptureError> {
        match &self.failure {
            Some(message) => Err(CaptureError::LensQueryError(message.clone())),
            None => Ok(self.rear.clone()),
        }
    }

    fn characteristics(&self, id: &str) -> Result<SensorCharacteristics, CaptureError> {
        if let Some(message) = &self.failure {
            return Err(CaptureError::LensQueryError(message.clone()));
        }
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.sensors
            .get(id)
            .cloned()
            .ok_or_else(|| CaptureError::LensQueryError(format!("Unknown sensor {}", id)))
    }
}
