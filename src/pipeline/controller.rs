//! Pipeline controller
//!
//! Builds the filter chain one role at a time on a single tokio task,
//! reacts to filter host signals and tears the chain down on error or stop.
//!
//! ```text
//! DataSource → Demuxer → [AudioDecoder → AudioRenderer] → [VideoDecoder → VideoRenderer] → Started
//! ```

use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

use super::error::{PipelineCallback, PipelineError};
use super::filter::{FilterFactory, FilterInput, FilterRole, MediaStream, create_for_role};
use super::graph::FilterGraph;
use super::host::{FilterHost, HostId, HostSignal};
use super::shared::SharedCell;
use super::state::ControllerState;
use super::types::MediaFormat;

/// Work queued onto the orchestration task
pub(crate) enum ControlMsg {
    /// Lifecycle signal relayed by a filter host
    Host { id: HostId, signal: HostSignal },
    Seek {
        time: Duration,
        on_done: PipelineCallback,
    },
    SetPlaybackRate(f32),
    SetVolume(f32),
    Stop { on_done: PipelineCallback },
}

impl ControlMsg {
    /// Resolve a message that no controller will ever process
    pub(crate) fn resolve_unprocessed(self) {
        match self {
            ControlMsg::Seek { on_done, .. } => on_done(Err(PipelineError::NotRunning)),
            ControlMsg::Stop { on_done } => on_done(Ok(())),
            ControlMsg::Host { .. } | ControlMsg::SetPlaybackRate(_) | ControlMsg::SetVolume(_) => {}
        }
    }
}

impl std::fmt::Debug for ControlMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMsg::Host { id, signal } => write!(f, "Host({}, {:?})", id, signal),
            ControlMsg::Seek { time, .. } => write!(f, "Seek({:?})", time),
            ControlMsg::SetPlaybackRate(rate) => write!(f, "SetPlaybackRate({})", rate),
            ControlMsg::SetVolume(volume) => write!(f, "SetVolume({})", volume),
            ControlMsg::Stop { .. } => write!(f, "Stop"),
        }
    }
}

/// Handle the facade keeps on the active controller
pub(crate) struct ControllerHandle {
    pub generation: u64,
    pub control_tx: mpsc::UnboundedSender<ControlMsg>,
}

/// Occupied from `start` until the controller finishes a stop
pub(crate) type ControllerSlot = Mutex<Option<ControllerHandle>>;

/// Everything a controller generation needs to build its chain
pub(crate) struct ControllerParams {
    pub generation: u64,
    pub factory: Arc<dyn FilterFactory>,
    pub uri: String,
    pub on_start: PipelineCallback,
    pub shared: Arc<SharedCell>,
    pub slot: Arc<ControllerSlot>,
    pub control_tx: mpsc::UnboundedSender<ControlMsg>,
}

/// One generation of the filter chain state machine.
///
/// Lives on its own task; every field is touched only from that task.
pub(crate) struct Controller {
    generation: u64,
    state: ControllerState,
    factory: Arc<dyn FilterFactory>,
    uri: String,
    graph: FilterGraph,
    shared: Arc<SharedCell>,
    slot: Arc<ControllerSlot>,
    control_tx: mpsc::UnboundedSender<ControlMsg>,
    /// Start callback, resolved once `Started`, `Error` or `Stopped` is reached
    pending_start: Option<PipelineCallback>,
    /// Host whose initialization the chain is waiting on
    awaiting: Option<HostId>,
    next_host_id: HostId,
    /// Messages pulled off the channel early, handled before anything newer
    backlog: VecDeque<ControlMsg>,
}

impl Controller {
    pub fn new(params: ControllerParams) -> Self {
        Self {
            generation: params.generation,
            state: ControllerState::Created,
            factory: params.factory,
            uri: params.uri,
            graph: FilterGraph::new(),
            shared: params.shared,
            slot: params.slot,
            control_tx: params.control_tx,
            pending_start: Some(params.on_start),
            awaiting: None,
            next_host_id: 1,
            backlog: VecDeque::new(),
        }
    }

    /// Drive the state machine until a stop request is processed
    pub async fn run(mut self, mut control_rx: mpsc::UnboundedReceiver<ControlMsg>) {
        info!("Controller[{}]: starting {}", self.generation, self.uri);
        self.advance();

        loop {
            let msg = match self.backlog.pop_front() {
                Some(msg) => msg,
                None => match control_rx.recv().await {
                    Some(msg) => msg,
                    None => break,
                },
            };
            debug!("Controller[{}]: {:?} in {}", self.generation, msg, self.state);
            match msg {
                ControlMsg::Host { id, signal } => {
                    self.fill_backlog(&mut control_rx);
                    self.on_host_signal(id, signal);
                }
                ControlMsg::Seek { time, on_done } => self.seek(time, on_done),
                ControlMsg::SetPlaybackRate(rate) => self.push_playback_rate(rate),
                ControlMsg::SetVolume(volume) => self.push_volume(volume),
                ControlMsg::Stop { on_done } => {
                    self.stop(on_done);
                    break;
                }
            }
        }

        // Anything queued behind the stop belongs to a finished generation
        control_rx.close();
        self.fill_backlog(&mut control_rx);
        while let Some(msg) = self.backlog.pop_front() {
            debug!("Controller[{}]: dropping {:?}", self.generation, msg);
            msg.resolve_unprocessed();
        }
        info!("Controller[{}]: finished", self.generation);
    }

    /// Move everything already queued into the backlog, keeping its order
    fn fill_backlog(&mut self, control_rx: &mut mpsc::UnboundedReceiver<ControlMsg>) {
        while let Ok(msg) = control_rx.try_recv() {
            self.backlog.push_back(msg);
        }
    }

    fn stop_queued(&self) -> bool {
        self.backlog
            .iter()
            .any(|msg| matches!(msg, ControlMsg::Stop { .. }))
    }

    fn transition(&mut self, target: ControllerState) {
        if !self.state.can_transition_to(&target) {
            warn!(
                "Controller[{}]: unexpected transition {} -> {}",
                self.generation, self.state, target
            );
        }
        debug!("Controller[{}]: {} -> {}", self.generation, self.state, target);
        self.state = target;
        self.shared.with(|s| s.state = target);
    }

    /// Move to the next stage that has something to build
    fn advance(&mut self) {
        let mut next = self.state.next();

        while let Some(target) = next {
            let Some(role) = target.role() else {
                self.transition(target);
                self.on_started();
                return;
            };

            match self.input_for(role) {
                Ok(Some((input, format))) => {
                    self.transition(target);
                    self.create_and_initialize(role, input, format);
                    return;
                }
                Ok(None) => {
                    // No stream of this kind: skip the decoder and its renderer
                    debug!(
                        "Controller[{}]: no {} stream, skipping",
                        self.generation,
                        role.kind().map(|k| k.major_type()).unwrap_or("?")
                    );
                    next = target.next().and_then(|renderer| renderer.next());
                }
                Err(e) => {
                    self.transition(target);
                    self.fail(e);
                    return;
                }
            }
        }
    }

    /// Input and factory format for `role`, `None` when an optional pair
    /// has no stream to work on
    fn input_for(
        &self,
        role: FilterRole,
    ) -> Result<Option<(FilterInput, MediaFormat)>, PipelineError> {
        match role {
            FilterRole::DataSource => Ok(Some((
                FilterInput::Uri(self.uri.clone()),
                MediaFormat::url(&self.uri),
            ))),
            FilterRole::Demuxer => {
                let stream = self
                    .upstream_outputs(FilterRole::DataSource)
                    .into_iter()
                    .next()
                    .ok_or(PipelineError::InitializationFailed)?;
                let format = stream.media_format();
                Ok(Some((FilterInput::Stream(stream), format)))
            }
            FilterRole::AudioDecoder | FilterRole::VideoDecoder => {
                let kind = role.kind().ok_or(PipelineError::InitializationFailed)?;
                let stream = self
                    .upstream_outputs(FilterRole::Demuxer)
                    .into_iter()
                    .find(|s| s.media_format().is_kind(kind));
                Ok(stream.map(|s| {
                    let format = s.media_format();
                    (FilterInput::Stream(s), format)
                }))
            }
            FilterRole::AudioRenderer | FilterRole::VideoRenderer => {
                let stream = self
                    .upstream_outputs(decoder_for(role))
                    .into_iter()
                    .next()
                    .ok_or(PipelineError::InitializationFailed)?;
                let format = stream.media_format();
                Ok(Some((FilterInput::Stream(stream), format)))
            }
        }
    }

    fn upstream_outputs(&self, role: FilterRole) -> Vec<Arc<dyn MediaStream>> {
        self.graph
            .get(role)
            .map(|entry| entry.filter.outputs())
            .unwrap_or_default()
    }

    fn create_and_initialize(&mut self, role: FilterRole, input: FilterInput, format: MediaFormat) {
        let Some(filter) = create_for_role(self.factory.as_ref(), role, &format) else {
            error!(
                "Controller[{}]: no {} available for {}",
                self.generation, role, format
            );
            self.fail(PipelineError::RequiredFilterMissing);
            return;
        };
        info!(
            "Controller[{}]: created {} ({}) for {}",
            self.generation,
            role,
            filter.name(),
            format.mime_type()
        );

        let id = self.next_host_id;
        self.next_host_id += 1;
        let host = FilterHost::new(id, role, self.shared.clone(), self.control_tx.clone());
        if self.graph.push(filter, host.clone()).is_err() {
            error!("Controller[{}]: {} already in the graph", self.generation, role);
            self.fail(PipelineError::InitializationFailed);
            return;
        }

        self.awaiting = Some(id);
        let initialized = self
            .graph
            .get_mut(role)
            .map(|entry| entry.filter.initialize(input, host))
            .unwrap_or(Err(PipelineError::InitializationFailed));
        if let Err(e) = initialized {
            self.fail(e);
        }
        // Otherwise suspended until the host reports back
    }

    fn on_host_signal(&mut self, id: HostId, signal: HostSignal) {
        let Some(role) = self.graph.find_host(id).map(|e| e.filter.role()) else {
            debug!(
                "Controller[{}]: {:?} from a filter no longer in the graph",
                self.generation, signal
            );
            return;
        };

        match signal {
            HostSignal::InitializationComplete => {
                if self.awaiting != Some(id) {
                    warn!(
                        "Controller[{}]: unexpected initialization of {} in {}",
                        self.generation, role, self.state
                    );
                    return;
                }
                self.awaiting = None;
                info!("Controller[{}]: {} initialized", self.generation, role);
                if self.stop_queued() {
                    // A stop issued before this signal was handled cancels the rest of the chain
                    debug!("Controller[{}]: stop queued, not advancing", self.generation);
                    return;
                }
                if role.is_renderer() {
                    self.on_renderer_initialized(role);
                }
                self.advance();
            }
            HostSignal::Error(e) => {
                error!("Controller[{}]: {} reported {}", self.generation, role, e);
                self.fail(e);
            }
        }
    }

    fn on_renderer_initialized(&mut self, role: FilterRole) {
        let major = self
            .upstream_outputs(decoder_for(role))
            .first()
            .map(|s| s.media_format().major_type().to_string())
            .or_else(|| role.kind().map(|k| k.major_type().to_string()));

        let volume = self.shared.with(|s| {
            if let Some(major) = major {
                s.rendered_mime_types.insert(major);
            }
            s.volume
        });
        if let Some(entry) = self.graph.get_mut(role) {
            entry.filter.set_volume(volume);
        }
    }

    fn on_started(&mut self) {
        let rate = self.shared.with(|s| s.playback_rate);
        for entry in self.graph.iter_mut() {
            entry.filter.set_playback_rate(rate);
        }
        info!(
            "Controller[{}]: started with {} filters",
            self.generation,
            self.graph.len()
        );
        if let Some(on_start) = self.pending_start.take() {
            on_start(Ok(()));
        }
    }

    /// Record the error, tear everything down and park in `Error`
    fn fail(&mut self, error: PipelineError) {
        if !self.state.is_running() {
            return;
        }
        let sticky = self.shared.with(|s| {
            s.record_error(error);
            s.error.unwrap_or(error)
        });
        self.awaiting = None;
        let order = self.graph.teardown();
        debug!("Controller[{}]: torn down {:?}", self.generation, order);
        self.transition(ControllerState::Error);

        if let Some(on_start) = self.pending_start.take() {
            on_start(Err(sticky));
        }
    }

    fn seek(&mut self, time: Duration, on_done: PipelineCallback) {
        if !self.state.is_started() {
            debug!(
                "Controller[{}]: seek in {}, rejecting",
                self.generation, self.state
            );
            on_done(Err(PipelineError::NotRunning));
            return;
        }

        info!("Controller[{}]: seeking to {:?}", self.generation, time);
        for entry in self.graph.renderers_mut() {
            entry.filter.pause();
        }
        for entry in self.graph.iter_mut() {
            entry.filter.flush();
        }
        for entry in self.graph.iter_mut() {
            entry.filter.seek(time);
        }
        self.shared.with(|s| s.current_time = time);
        for entry in self.graph.renderers_mut() {
            entry.filter.play();
        }
        on_done(Ok(()));
    }

    fn push_playback_rate(&mut self, rate: f32) {
        for entry in self.graph.iter_mut() {
            entry.filter.set_playback_rate(rate);
        }
    }

    fn push_volume(&mut self, volume: f32) {
        for entry in self.graph.renderers_mut() {
            entry.filter.set_volume(volume);
        }
    }

    fn stop(&mut self, on_done: PipelineCallback) {
        info!("Controller[{}]: stopping in {}", self.generation, self.state);
        let order = self.graph.teardown();
        debug!("Controller[{}]: torn down {:?}", self.generation, order);
        self.awaiting = None;
        self.transition(ControllerState::Stopped);
        self.shared.reset_for_stop();

        {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().map(|h| h.generation) == Some(self.generation) {
                *slot = None;
            }
        }

        if let Some(on_start) = self.pending_start.take() {
            on_start(Err(PipelineError::Aborted));
        }
        on_done(Ok(()));
    }
}

/// Decoder feeding the given renderer role
fn decoder_for(renderer: FilterRole) -> FilterRole {
    match renderer {
        FilterRole::VideoRenderer => FilterRole::VideoDecoder,
        _ => FilterRole::AudioDecoder,
    }
}
