//! A capture station wired to files under one directory

use std::path::Path;
use std::sync::Arc;
use stockcam::batch::FileBatchCounter;
use stockcam::config::StockcamConfig;
use stockcam::engine::{CaptureEngine, EngineParts};
use stockcam::store::MemoryStore;
use stockcam::testing::{
    RecordingNotifier, RecordingSink, SimulatedCaptureDevice, StaticCapabilityProvider,
};

pub struct Station {
    pub config: StockcamConfig,
    pub device: Arc<SimulatedCaptureDevice>,
    pub store: Arc<MemoryStore>,
    pub batches: Arc<FileBatchCounter>,
    pub sink: Arc<RecordingSink>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: CaptureEngine,
}

pub fn station_config(root: &Path) -> StockcamConfig {
    let mut config = StockcamConfig::default();
    let path = |name: &str| -> String { root.join(name).to_string_lossy().into_owned() };
    config.storage.output_directory = path("captures");
    config.storage.store_path = path("store.json");
    config.storage.batch_counter_path = path("batch.toml");
    config.quality.focus_restore_delay_ms = 5;
    config.quality.error_pulse_gap_ms = 1;
    config
}

impl Station {
    /// Open (or reopen) the station rooted at `root`
    pub fn open(root: &Path) -> Self {
        let config = station_config(root);
        let device = Arc::new(SimulatedCaptureDevice::from_config(&config));
        let store = Arc::new(MemoryStore::open(&config.storage.store_path).unwrap());
        let batches = Arc::new(FileBatchCounter::open(&config.storage.batch_counter_path).unwrap());
        let sink = Arc::new(RecordingSink::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let provider =
            StaticCapabilityProvider::multi_camera(&[("0", 4.0), ("2", 2.2), ("3", 6.0)]);
        let parts = EngineParts {
            device: device.clone(),
            store: store.clone(),
            sink: sink.clone(),
            notifier: notifier.clone(),
            batches: batches.clone(),
        };
        let engine = CaptureEngine::start(&config, &provider, parts);

        Self {
            config,
            device,
            store,
            batches,
            sink,
            notifier,
            engine,
        }
    }

    pub async fn close(self) {
        self.engine.shutdown().await;
    }
}
