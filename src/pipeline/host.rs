//! Filter host: the only channel from a filter back into the pipeline

use log::{debug, trace, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use super::controller::ControlMsg;
use super::error::PipelineError;
use super::filter::FilterRole;
use super::shared::{SharedCell, SharedState};

/// Identifies one filter host within one controller generation
pub type HostId = u64;

/// Lifecycle signal relayed to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    InitializationComplete,
    Error(PipelineError),
}

/// Callback sink handed to a filter's `initialize`.
///
/// Cheap to clone and safe to use from any thread. Statistics updates are
/// written straight into the pipeline's shared state under its mutex;
/// lifecycle signals are queued to the controller task. Once the controller
/// starts tearing the filter down the host is invalidated and every call
/// becomes a no-op.
#[derive(Clone)]
pub struct FilterHost {
    inner: Arc<HostInner>,
}

struct HostInner {
    id: HostId,
    role: FilterRole,
    shared: Arc<SharedCell>,
    control_tx: mpsc::UnboundedSender<ControlMsg>,
    /// Only read or written while holding the shared state lock
    valid: AtomicBool,
    initialization_signalled: AtomicBool,
    error_signalled: AtomicBool,
}

impl FilterHost {
    pub(crate) fn new(
        id: HostId,
        role: FilterRole,
        shared: Arc<SharedCell>,
        control_tx: mpsc::UnboundedSender<ControlMsg>,
    ) -> Self {
        Self {
            inner: Arc::new(HostInner {
                id,
                role,
                shared,
                control_tx,
                valid: AtomicBool::new(true),
                initialization_signalled: AtomicBool::new(false),
                error_signalled: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn id(&self) -> HostId {
        self.inner.id
    }

    /// Role of the filter this host serves
    pub fn role(&self) -> FilterRole {
        self.inner.role
    }

    /// Check whether the filter is still part of the graph
    pub fn is_valid(&self) -> bool {
        let _state = self.inner.shared.lock();
        self.inner.valid.load(Ordering::Acquire)
    }

    /// Detach the host; later relays are dropped.
    ///
    /// Takes the state lock so no relay can be half way through a write
    /// once this returns.
    pub(crate) fn invalidate(&self) {
        let _state = self.inner.shared.lock();
        self.inner.valid.store(false, Ordering::Release);
    }

    /// Report that `initialize` finished successfully
    pub fn initialization_complete(&self) {
        if self.inner.initialization_signalled.swap(true, Ordering::AcqRel) {
            warn!(
                "FilterHost({}): initialization already signalled, ignoring",
                self.inner.role
            );
            return;
        }
        self.signal(HostSignal::InitializationComplete);
    }

    /// Report a fatal error, during or after initialization
    pub fn error(&self, error: PipelineError) {
        if self.inner.error_signalled.swap(true, Ordering::AcqRel) {
            debug!(
                "FilterHost({}): error already signalled, ignoring {}",
                self.inner.role, error
            );
            return;
        }
        self.inner
            .initialization_signalled
            .store(true, Ordering::Release);
        self.signal(HostSignal::Error(error));
    }

    pub fn set_duration(&self, duration: Duration) {
        self.relay(|state| state.set_duration(duration));
    }

    pub fn set_buffered_time(&self, time: Duration) {
        self.relay(|state| state.set_buffered_time(time));
    }

    pub fn set_total_bytes(&self, bytes: u64) {
        self.relay(|state| state.total_bytes = bytes);
    }

    pub fn set_buffered_bytes(&self, bytes: u64) {
        self.relay(|state| state.set_buffered_bytes(bytes));
    }

    /// Width and height are stored together under one lock
    pub fn set_video_size(&self, width: u32, height: u32) {
        self.relay(|state| {
            state.video_width = width;
            state.video_height = height;
        });
    }

    pub fn set_time(&self, time: Duration) {
        self.relay(|state| state.current_time = time);
    }

    /// Current playback position
    pub fn time(&self) -> Duration {
        self.inner.shared.lock().current_time
    }

    pub fn duration(&self) -> Duration {
        self.inner.shared.lock().duration
    }

    pub fn playback_rate(&self) -> f32 {
        self.inner.shared.lock().playback_rate
    }

    fn relay(&self, update: impl FnOnce(&mut SharedState)) {
        let mut state = self.inner.shared.lock();
        if !self.inner.valid.load(Ordering::Acquire) {
            trace!("FilterHost({}): relay after teardown dropped", self.inner.role);
            return;
        }
        update(&mut state);
    }

    fn signal(&self, signal: HostSignal) {
        if !self.is_valid() {
            debug!(
                "FilterHost({}): {:?} after teardown dropped",
                self.inner.role, signal
            );
            return;
        }
        let msg = ControlMsg::Host {
            id: self.inner.id,
            signal,
        };
        if self.inner.control_tx.send(msg).is_err() {
            debug!("FilterHost({}): controller gone", self.inner.role);
        }
    }
}

impl std::fmt::Debug for FilterHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterHost")
            .field("id", &self.inner.id)
            .field("role", &self.inner.role)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> (FilterHost, Arc<SharedCell>, mpsc::UnboundedReceiver<ControlMsg>) {
        let shared = Arc::new(SharedCell::new(1.0, 0.0));
        let (tx, rx) = mpsc::unbounded_channel();
        let host = FilterHost::new(7, FilterRole::Demuxer, shared.clone(), tx);
        (host, shared, rx)
    }

    fn next_signal(rx: &mut mpsc::UnboundedReceiver<ControlMsg>) -> Option<(HostId, HostSignal)> {
        match rx.try_recv() {
            Ok(ControlMsg::Host { id, signal }) => Some((id, signal)),
            _ => None,
        }
    }

    #[test]
    fn test_relays_write_shared_state() {
        let (host, shared, _rx) = host();
        host.set_duration(Duration::from_millis(5000));
        host.set_total_bytes(4096);
        host.set_buffered_bytes(1024);
        host.set_video_size(640, 480);
        host.set_time(Duration::from_millis(20));

        let state = shared.snapshot();
        assert_eq!(state.duration, Duration::from_millis(5000));
        assert_eq!(state.total_bytes, 4096);
        assert_eq!(state.buffered_bytes, 1024);
        assert_eq!((state.video_width, state.video_height), (640, 480));
        assert_eq!(host.time(), Duration::from_millis(20));
    }

    #[test]
    fn test_shorter_duration_report_is_ignored() {
        let (host, shared, _rx) = host();
        host.set_duration(Duration::from_millis(5000));
        host.set_duration(Duration::from_millis(1000));

        assert_eq!(shared.snapshot().duration, Duration::from_millis(5000));
        assert_eq!(host.duration(), Duration::from_millis(5000));
    }

    #[test]
    fn test_invalidated_host_is_noop() {
        let (host, shared, mut rx) = host();
        host.set_total_bytes(10);
        host.invalidate();

        host.set_total_bytes(20);
        host.initialization_complete();
        host.error(PipelineError::Read);

        assert!(!host.is_valid());
        assert_eq!(shared.snapshot().total_bytes, 10);
        assert!(next_signal(&mut rx).is_none());
    }

    #[test]
    fn test_lifecycle_signals_once() {
        let (host, _shared, mut rx) = host();
        host.initialization_complete();
        host.initialization_complete();
        host.error(PipelineError::Read);
        host.error(PipelineError::OutOfMemory);

        assert_eq!(
            next_signal(&mut rx),
            Some((7, HostSignal::InitializationComplete))
        );
        assert_eq!(
            next_signal(&mut rx),
            Some((7, HostSignal::Error(PipelineError::Read)))
        );
        assert!(next_signal(&mut rx).is_none());
    }
}
