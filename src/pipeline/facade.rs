//! Public, thread-safe pipeline facade

use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::controller::{ControlMsg, Controller, ControllerHandle, ControllerParams, ControllerSlot};
use super::error::{PipelineError, PipelineResult};
use super::filter::FilterFactory;
use super::shared::SharedCell;
use crate::config::PipelineConfig;

/// Media playback pipeline.
///
/// Every method may be called from any thread. Operations that touch
/// filters (`start`, `stop`, `seek`, the setters) are queued onto the
/// controller task and return at once; their outcome arrives through the
/// callback. Getters read a snapshot of the shared state under one short
/// lock and never wait on filters.
///
/// Completion callbacks run on the controller task, or on the calling
/// thread when the outcome is known up front.
pub struct Pipeline {
    runtime: Handle,
    config: PipelineConfig,
    shared: Arc<SharedCell>,
    slot: Arc<ControllerSlot>,
    generation: AtomicU64,
}

impl Pipeline {
    /// Create a pipeline whose controller tasks run on `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self::with_config(runtime, PipelineConfig::default())
    }

    pub fn with_config(runtime: Handle, config: PipelineConfig) -> Self {
        let shared = Arc::new(SharedCell::new(
            config.default_volume,
            config.default_playback_rate,
        ));
        Self {
            runtime,
            config,
            shared,
            slot: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build the filter chain for `uri` using filters from `factory`.
    ///
    /// Returns false, without ever calling `on_done`, if a controller is
    /// already active (including one parked in the error state that has
    /// not been stopped yet). Otherwise the outcome arrives via `on_done`.
    pub fn start<F>(&self, factory: Arc<dyn FilterFactory>, uri: impl Into<String>, on_done: F) -> bool
    where
        F: FnOnce(PipelineResult) + Send + 'static,
    {
        let uri = uri.into();
        let mut slot = self.lock_slot();
        if slot.is_some() {
            warn!("{}: start({}) while already running", self.config.name, uri);
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.shared.with(|s| s.reset_for_start());

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        *slot = Some(ControllerHandle {
            generation,
            control_tx: control_tx.clone(),
        });
        drop(slot);

        info!("{}: start #{} {}", self.config.name, generation, uri);
        let controller = Controller::new(ControllerParams {
            generation,
            factory,
            uri,
            on_start: Box::new(on_done),
            shared: self.shared.clone(),
            slot: self.slot.clone(),
            control_tx,
        });
        self.runtime.spawn(controller.run(control_rx));
        true
    }

    /// Tear down the active chain.
    ///
    /// `on_done` always fires exactly once with success: immediately when
    /// nothing is running, otherwise after the teardown and after a still
    /// pending start callback has been resolved with failure.
    pub fn stop<F>(&self, on_done: F)
    where
        F: FnOnce(PipelineResult) + Send + 'static,
    {
        info!("{}: stop", self.config.name);
        self.send_or_resolve(ControlMsg::Stop {
            on_done: Box::new(on_done),
        });
    }

    /// Reposition playback; requires a fully started chain
    pub fn seek<F>(&self, time: Duration, on_done: F)
    where
        F: FnOnce(PipelineResult) + Send + 'static,
    {
        if !self.is_initialized() {
            debug!("{}: seek before initialization", self.config.name);
            on_done(Err(PipelineError::NotRunning));
            return;
        }
        self.send_or_resolve(ControlMsg::Seek {
            time,
            on_done: Box::new(on_done),
        });
    }

    /// Controller exists and has not reached `Stopped` or `Error`
    pub fn is_running(&self) -> bool {
        self.has_controller() && self.shared.lock().state.is_running()
    }

    /// Controller has reached `Started`
    pub fn is_initialized(&self) -> bool {
        self.has_controller() && self.shared.lock().state.is_started()
    }

    /// Check whether a stream of the given major mime type ("audio",
    /// "video") is wired all the way to a renderer
    pub fn is_rendered(&self, major_mime_type: &str) -> bool {
        self.shared
            .lock()
            .rendered_mime_types
            .contains(major_mime_type)
    }

    pub fn playback_rate(&self) -> f32 {
        self.shared.lock().playback_rate
    }

    /// Record the rate and forward it to constructed filters; negative
    /// rates are clamped to 0.0
    pub fn set_playback_rate(&self, rate: f32) {
        let rate = if rate.is_nan() { 0.0 } else { rate.max(0.0) };
        self.shared.with(|s| s.playback_rate = rate);
        self.forward(ControlMsg::SetPlaybackRate(rate));
    }

    pub fn volume(&self) -> f32 {
        self.shared.lock().volume
    }

    /// Record the volume and forward it to constructed renderers; clamped
    /// to 0.0..=1.0
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.shared.with(|s| s.volume = volume);
        self.forward(ControlMsg::SetVolume(volume));
    }

    /// Current playback position
    pub fn time(&self) -> Duration {
        self.shared.lock().current_time
    }

    pub fn buffered_time(&self) -> Duration {
        self.shared.lock().buffered_time
    }

    pub fn duration(&self) -> Duration {
        self.shared.lock().duration
    }

    pub fn buffered_bytes(&self) -> u64 {
        self.shared.lock().buffered_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.shared.lock().total_bytes
    }

    /// Natural video size as `(width, height)`, zero without video
    pub fn video_size(&self) -> (u32, u32) {
        let state = self.shared.lock();
        (state.video_width, state.video_height)
    }

    /// Sticky error of the current generation; `None` means OK
    pub fn error(&self) -> Option<PipelineError> {
        self.shared.lock().error
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<ControllerHandle>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_controller(&self) -> bool {
        self.lock_slot().is_some()
    }

    fn control_tx(&self) -> Option<mpsc::UnboundedSender<ControlMsg>> {
        self.lock_slot().as_ref().map(|h| h.control_tx.clone())
    }

    /// Queue `msg` on the active controller, or resolve it here if there is none
    fn send_or_resolve(&self, msg: ControlMsg) {
        match self.control_tx() {
            Some(tx) => {
                if let Err(mpsc::error::SendError(msg)) = tx.send(msg) {
                    msg.resolve_unprocessed();
                }
            }
            None => msg.resolve_unprocessed(),
        }
    }

    /// Best-effort push to the active controller
    fn forward(&self, msg: ControlMsg) {
        if let Some(tx) = self.control_tx() {
            let _ = tx.send(msg);
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Some(tx) = self.control_tx() {
            debug!("{}: dropped while running, stopping", self.config.name);
            let _ = tx.send(ControlMsg::Stop {
                on_done: Box::new(|_| {}),
            });
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock().state;
        f.debug_struct("Pipeline")
            .field("name", &self.config.name)
            .field("state", &state)
            .field("running", &self.has_controller())
            .finish()
    }
}
