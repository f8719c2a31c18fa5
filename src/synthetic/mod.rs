//! Synthetic filters
//!
//! In-process implementations of every filter role that produce generated
//! data instead of decoding real media. They drive the demo binary and the
//! test-suite:
//! - SyntheticSource: "opens" any uri and trickles download progress
//! - SyntheticDemuxer: exposes the configured audio/video streams
//! - SyntheticDecoder: turns a stream into an uncompressed one
//! - SyntheticRenderer: consumes a stream and reports clock and video size
//!
//! Each role's initialization outcome is scriptable through [`InitBehavior`]
//! and every call the pipeline makes into a filter is recorded in an
//! [`EventLog`].

pub mod decoder;
pub mod demuxer;
pub mod factory;
pub mod renderer;
pub mod source;
pub mod stream;

pub use decoder::SyntheticDecoder;
pub use demuxer::SyntheticDemuxer;
pub use factory::SyntheticFactory;
pub use renderer::SyntheticRenderer;
pub use source::SyntheticSource;
pub use stream::SyntheticStream;

use log::debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{FilterHost, FilterRole, PipelineError};

/// How a synthetic filter finishes its `initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitBehavior {
    /// Report completion from a spawned task right away
    #[default]
    Complete,
    /// Report completion after the delay, unless stopped first
    Delay(Duration),
    /// Report the error from a spawned task
    Fail(PipelineError),
    /// Never report anything
    Hang,
}

/// A call the pipeline made into a synthetic filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterCall {
    Initialize,
    Pause,
    Flush,
    Seek(Duration),
    Play,
    PlaybackRate(f32),
    Volume(f32),
    Stop,
}

/// Shared, ordered record of filter calls
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<(FilterRole, FilterCall)>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, role: FilterRole, call: FilterCall) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((role, call));
    }

    pub fn events(&self) -> Vec<(FilterRole, FilterCall)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Roles in the order `call` reached them
    pub fn roles_for(&self, call: FilterCall) -> Vec<FilterRole> {
        self.events()
            .into_iter()
            .filter(|(_, c)| *c == call)
            .map(|(role, _)| role)
            .collect()
    }

    /// Roles in the order they were stopped
    pub fn stops(&self) -> Vec<FilterRole> {
        self.roles_for(FilterCall::Stop)
    }

    /// Every volume pushed into `role`
    pub fn volumes(&self, role: FilterRole) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|(r, call)| match call {
                FilterCall::Volume(v) if r == role => Some(v),
                _ => None,
            })
            .collect()
    }

    /// Every playback rate pushed into `role`
    pub fn playback_rates(&self, role: FilterRole) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|(r, call)| match call {
                FilterCall::PlaybackRate(v) if r == role => Some(v),
                _ => None,
            })
            .collect()
    }
}

/// Per-role script a synthetic filter follows
#[derive(Debug, Clone, Default)]
pub struct FilterScript {
    pub behavior: InitBehavior,
    /// Notified when `initialize` is entered
    pub entered: Option<Arc<Notify>>,
    /// Report a read error this long after a successful initialization
    pub read_error_after: Option<Duration>,
}

/// State every synthetic filter carries
pub(crate) struct FilterCore {
    role: FilterRole,
    script: FilterScript,
    log: EventLog,
    cancel: CancellationToken,
}

impl FilterCore {
    pub fn new(role: FilterRole, script: FilterScript, log: EventLog) -> Self {
        Self {
            role,
            script,
            log,
            cancel: CancellationToken::new(),
        }
    }

    pub fn role(&self) -> FilterRole {
        self.role
    }

    pub fn record(&self, call: FilterCall) {
        self.log.record(self.role, call);
    }

    /// Cancelled when the filter is stopped
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Record the call and announce it to whoever waits on `entered`
    pub fn enter_initialize(&self) {
        self.record(FilterCall::Initialize);
        if let Some(entered) = &self.script.entered {
            entered.notify_one();
        }
    }

    /// Report the scripted outcome through `host` from a separate task
    pub fn finish_initialize(&self, host: FilterHost) {
        if matches!(
            self.script.behavior,
            InitBehavior::Complete | InitBehavior::Delay(_)
        ) {
            self.schedule_read_error(host.clone());
        }
        let role = self.role;
        let cancel = self.cancel.clone();
        match self.script.behavior {
            InitBehavior::Complete => {
                tokio::spawn(async move { host.initialization_complete() });
            }
            InitBehavior::Delay(delay) => {
                tokio::spawn(async move {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => host.initialization_complete(),
                        _ = cancel.cancelled() => debug!("{}: stopped during initialization", role),
                    }
                });
            }
            InitBehavior::Fail(error) => {
                tokio::spawn(async move { host.error(error) });
            }
            InitBehavior::Hang => debug!("{}: initialization will never complete", role),
        }
    }

    /// Fail with [`PipelineError::Read`] after the scripted delay
    fn schedule_read_error(&self, host: FilterHost) {
        let Some(after) = self.script.read_error_after else {
            return;
        };
        let role = self.role;
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(after) => host.error(PipelineError::Read),
                _ = cancel.cancelled() => debug!("{}: stopped before the read error", role),
            }
        });
    }

    pub fn stop(&self) {
        self.record(FilterCall::Stop);
        self.cancel.cancel();
    }
}

/// Implement [`MediaFilter`](crate::pipeline::MediaFilter) by recording
/// every call into the filter's `core`
macro_rules! recorded_media_filter {
    ($ty:ty, $name:expr) => {
        impl $crate::pipeline::MediaFilter for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn pause(&mut self) {
                self.core.record($crate::synthetic::FilterCall::Pause);
                self.on_pause();
            }

            fn flush(&mut self) {
                self.core.record($crate::synthetic::FilterCall::Flush);
                self.on_flush();
            }

            fn seek(&mut self, time: std::time::Duration) {
                self.core.record($crate::synthetic::FilterCall::Seek(time));
                self.on_seek(time);
            }

            fn play(&mut self) {
                self.core.record($crate::synthetic::FilterCall::Play);
                self.on_play();
            }

            fn set_playback_rate(&mut self, rate: f32) {
                self.core
                    .record($crate::synthetic::FilterCall::PlaybackRate(rate));
                self.on_playback_rate(rate);
            }

            fn stop(&mut self) {
                self.core.stop();
            }
        }
    };
}

pub(crate) use recorded_media_filter;

/// Hooks behind [`recorded_media_filter`]; everything defaults to nothing
pub(crate) trait FilterHooks {
    fn on_pause(&mut self) {}
    fn on_flush(&mut self) {}
    fn on_seek(&mut self, _time: Duration) {}
    fn on_play(&mut self) {}
    fn on_playback_rate(&mut self, _rate: f32) {}
}
