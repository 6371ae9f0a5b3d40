//! Single-capture state machine
//!
//! `Idle -> ExposureLocked -> Captured -> Evaluating -> Accepted | RejectedRetry -> Idle`
//!
//! A session runs one capture attempt end to end and always produces exactly
//! one [`CaptureOutcome`]. Exposure is unlocked on every path once it was
//! locked.

use super::device::CaptureDevice;
use super::postprocess::{self, PostProcessOptions};
use crate::assert_invariant;
use crate::binder::CaptureRequest;
use crate::config::QualityConfig;
use crate::errors::CaptureError;
use crate::feedback::{NotificationSink, Signal};
use crate::invariant_ppt::contracts;
use crate::quality::{SharpnessEvaluator, SharpnessReport};
use crate::store::{InventoryStore, PhotoRecord};
use crate::types::ImageHandle;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const ERROR_PULSES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    ExposureLocked,
    Captured,
    Evaluating,
    Accepted,
    RejectedRetry,
}

/// Result of one capture attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Accepted { handle: ImageHandle, score: f64 },
    RejectedBlur { score: f64 },
    Failed { error: CaptureError },
}

impl CaptureOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CaptureOutcome::Accepted { .. })
    }
}

/// Number of captures currently running
///
/// Cloning shares the count. Tickets decrement on drop and never take the
/// count below zero.
#[derive(Debug, Clone, Default)]
pub struct InFlightCounter {
    count: Arc<AtomicUsize>,
}

impl InFlightCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.current() > 0
    }

    pub fn acquire(&self) -> InFlightTicket {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightTicket {
            count: Arc::clone(&self.count),
        }
    }
}

#[derive(Debug)]
pub struct InFlightTicket {
    count: Arc<AtomicUsize>,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        let released = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        assert_invariant!(
            released.is_ok(),
            contracts::IN_FLIGHT_NON_NEGATIVE,
            "InFlightTicket::drop"
        );
    }
}

/// What to capture and where it belongs
#[derive(Debug, Clone)]
pub struct CaptureJob {
    pub inventory_id: String,
    pub photo_name: String,
    pub request: CaptureRequest,
}

/// Runs capture attempts against one device
pub struct CaptureSession {
    device: Arc<dyn CaptureDevice>,
    store: Arc<dyn InventoryStore>,
    sink: Arc<dyn NotificationSink>,
    evaluator: SharpnessEvaluator,
    max_output_side: u32,
    pulse_gap: Duration,
    focus_restore_delay: Duration,
    state: watch::Sender<CaptureState>,
}

impl CaptureSession {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        store: Arc<dyn InventoryStore>,
        sink: Arc<dyn NotificationSink>,
        quality: &QualityConfig,
    ) -> Self {
        let (state, _) = watch::channel(CaptureState::Idle);
        Self {
            device,
            store,
            sink,
            evaluator: SharpnessEvaluator::from_config(quality),
            max_output_side: quality.max_output_side,
            pulse_gap: Duration::from_millis(quality.error_pulse_gap_ms),
            focus_restore_delay: Duration::from_millis(quality.focus_restore_delay_ms),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    fn enter(&self, state: CaptureState) {
        log::debug!("Capture state -> {:?}", state);
        self.state.send_replace(state);
    }

    pub async fn run(&self, job: &CaptureJob) -> CaptureOutcome {
        log::info!(
            "Capturing {} for {} ({} mode)",
            job.photo_name,
            job.inventory_id,
            job.request.effective_mode
        );

        if let Err(e) = self.device.lock_exposure().await {
            log::error!("Exposure lock failed: {}", e);
            return self.fail(&job.inventory_id, e);
        }
        self.enter(CaptureState::ExposureLocked);

        let result = self.capture_locked(job).await;

        if let Err(e) = self.device.unlock_exposure().await {
            log::warn!("Exposure unlock failed: {}", e);
        }

        let outcome = match result {
            Ok((handle, report)) if report.is_sharp => self.accept(job, handle, report).await,
            Ok((handle, report)) => self.reject(job, handle, report).await,
            Err((handle, e)) => {
                if let Some(handle) = handle {
                    self.discard(&handle).await;
                }
                self.fail(&job.inventory_id, e)
            }
        };

        self.enter(CaptureState::Idle);
        outcome
    }

    async fn capture_locked(
        &self,
        job: &CaptureJob,
    ) -> Result<(ImageHandle, SharpnessReport), (Option<ImageHandle>, CaptureError)> {
        let handle = self
            .device
            .trigger_capture(&job.request, &job.photo_name)
            .await
            .map_err(|e| (None, e))?;
        self.enter(CaptureState::Captured);

        let options = PostProcessOptions {
            square_crop: job.request.square_crop,
            max_side: self.max_output_side,
            jpeg_quality: job.request.jpeg_quality,
        };
        let evaluator = self.evaluator;
        let path = handle.path().to_path_buf();

        self.enter(CaptureState::Evaluating);
        let evaluated = tokio::task::spawn_blocking(move || {
            let image = postprocess::process_file(&path, &options)?;
            Ok::<_, CaptureError>(evaluator.evaluate_dynamic(&image))
        })
        .await
        .map_err(CaptureError::from)
        .and_then(|r| r);

        match evaluated {
            Ok(report) => Ok((handle, report)),
            Err(e) => Err((Some(handle), e)),
        }
    }

    async fn accept(
        &self,
        job: &CaptureJob,
        handle: ImageHandle,
        report: SharpnessReport,
    ) -> CaptureOutcome {
        let record = PhotoRecord::new(job.inventory_id.clone(), handle.clone());
        if let Err(e) = self.store.insert_photo(record).await {
            log::error!("Failed to record {}: {}", handle, e);
            self.discard(&handle).await;
            return self.fail(&job.inventory_id, e.into());
        }

        self.enter(CaptureState::Accepted);
        log::info!("Accepted {} (sharpness {:.1})", handle, report.score);
        self.sink.notify_accepted(&job.inventory_id, report.score);
        CaptureOutcome::Accepted {
            handle,
            score: report.score,
        }
    }

    async fn reject(
        &self,
        job: &CaptureJob,
        handle: ImageHandle,
        report: SharpnessReport,
    ) -> CaptureOutcome {
        self.enter(CaptureState::RejectedRetry);
        log::warn!(
            "Rejected {} as blurry (sharpness {:.1} <= {:.1})",
            handle,
            report.score,
            self.evaluator.threshold
        );
        self.discard(&handle).await;
        self.sink.notify_rejected(&job.inventory_id, report.score);
        self.spawn_error_feedback();
        CaptureOutcome::RejectedBlur {
            score: report.score,
        }
    }

    fn fail(&self, inventory_id: &str, error: CaptureError) -> CaptureOutcome {
        self.sink.notify_failed(inventory_id, &error);
        self.enter(CaptureState::Idle);
        CaptureOutcome::Failed { error }
    }

    /// Delete a frame that will not be kept, along with any record of it
    async fn discard(&self, handle: &ImageHandle) {
        if let Err(e) = tokio::fs::remove_file(handle.path()).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to delete {}: {}", handle, e);
            }
        }
        if let Err(e) = self.store.delete_by_handle(handle).await {
            log::warn!("Failed to remove record for {}: {}", handle, e);
        }
    }

    /// Focus indicator to error, three haptic pulses, indicator restored
    fn spawn_error_feedback(&self) {
        let sink = Arc::clone(&self.sink);
        let gap = self.pulse_gap;
        let restore_after = self.focus_restore_delay;

        tokio::spawn(async move {
            sink.signal(Signal::FocusError);
            let restore = {
                let sink = Arc::clone(&sink);
                tokio::spawn(async move {
                    tokio::time::sleep(restore_after).await;
                    sink.signal(Signal::FocusRestored);
                })
            };

            for pulse in 0..ERROR_PULSES {
                if pulse > 0 {
                    tokio::time::sleep(gap).await;
                }
                sink.signal(Signal::ErrorPulse);
            }

            if let Err(e) = restore.await {
                log::warn!("Focus restore task failed: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_tracks_tickets() {
        let counter = InFlightCounter::new();
        assert!(!counter.is_busy());
        let a = counter.acquire();
        let b = counter.clone().acquire();
        assert_eq!(counter.current(), 2);
        drop(b);
        assert_eq!(counter.current(), 1);
        drop(a);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_tickets_released_out_of_order() {
        let counter = InFlightCounter::new();
        let tickets: Vec<_> = (0..5).map(|_| counter.acquire()).collect();
        for (i, ticket) in tickets.into_iter().rev().enumerate() {
            drop(ticket);
            assert_eq!(counter.current(), 4 - i);
        }
    }

    #[test]
    fn test_outcome_helpers() {
        let accepted = CaptureOutcome::Accepted {
            handle: ImageHandle::new("a.jpg"),
            score: 300.0,
        };
        assert!(accepted.is_accepted());
        assert!(!CaptureOutcome::RejectedBlur { score: 1.0 }.is_accepted());
    }
}
