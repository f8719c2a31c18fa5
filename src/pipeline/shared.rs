//! State shared between the orchestration task and caller threads

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::error::PipelineError;
use super::state::ControllerState;

/// Snapshot-able pipeline state.
///
/// Written only by the controller task (directly or through a filter host
/// relay) and read by any number of caller threads. Every field lives behind
/// the one mutex in [`SharedCell`], so a read never observes half of a relay.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedState {
    pub state: ControllerState,
    pub duration: Duration,
    pub buffered_time: Duration,
    pub current_time: Duration,
    pub buffered_bytes: u64,
    pub total_bytes: u64,
    pub video_width: u32,
    pub video_height: u32,
    pub volume: f32,
    pub playback_rate: f32,
    /// Sticky error, `None` while everything is fine
    pub error: Option<PipelineError>,
    /// Major mime types wired all the way to a renderer
    pub rendered_mime_types: BTreeSet<String>,
}

impl SharedState {
    pub fn new(volume: f32, playback_rate: f32) -> Self {
        Self {
            state: ControllerState::Stopped,
            duration: Duration::ZERO,
            buffered_time: Duration::ZERO,
            current_time: Duration::ZERO,
            buffered_bytes: 0,
            total_bytes: 0,
            video_width: 0,
            video_height: 0,
            volume,
            playback_rate,
            error: None,
            rendered_mime_types: BTreeSet::new(),
        }
    }

    /// Reset for a fresh generation, keeping the last requested volume and rate
    pub fn reset_for_start(&mut self) {
        let (volume, playback_rate) = (self.volume, self.playback_rate);
        *self = Self::new(volume, playback_rate);
        self.state = ControllerState::Created;
    }

    /// Record `error` unless an earlier one is already stored
    ///
    /// Returns true when this call set the sticky error.
    pub fn record_error(&mut self, error: PipelineError) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.error = Some(error);
        true
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = self.duration.max(duration);
    }

    pub fn set_buffered_time(&mut self, time: Duration) {
        self.buffered_time = self.buffered_time.max(time);
    }

    pub fn set_buffered_bytes(&mut self, bytes: u64) {
        self.buffered_bytes = self.buffered_bytes.max(bytes);
    }
}

/// The single mutex guarding [`SharedState`]
#[derive(Debug)]
pub struct SharedCell {
    inner: Mutex<SharedState>,
    default_volume: f32,
    default_playback_rate: f32,
}

impl SharedCell {
    pub fn new(default_volume: f32, default_playback_rate: f32) -> Self {
        Self {
            inner: Mutex::new(SharedState::new(default_volume, default_playback_rate)),
            default_volume,
            default_playback_rate,
        }
    }

    /// Lock the state; a poisoned lock still holds consistent plain data
    pub fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the locked state
    pub fn with<R>(&self, f: impl FnOnce(&mut SharedState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> SharedState {
        self.lock().clone()
    }

    /// Restore every field to its configured default, clearing the sticky error
    pub fn reset_for_stop(&self) {
        let mut state = self.lock();
        *state = SharedState::new(self.default_volume, self.default_playback_rate);
    }
}
