//! Builder-style factory producing synthetic filters

use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::{
    EventLog, FilterCore, FilterScript, InitBehavior, SyntheticDecoder, SyntheticDemuxer,
    SyntheticRenderer, SyntheticSource,
};
use crate::pipeline::types::mime_type;
use crate::pipeline::{Filter, FilterFactory, FilterRole, MediaFormat, MediaKind};

const DEFAULT_DURATION: Duration = Duration::from_millis(5000);
const DEFAULT_TOTAL_BYTES: u64 = 1 << 20;
const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024;
const DEFAULT_VIDEO_SIZE: (u32, u32) = (640, 360);
const DEFAULT_CLOCK_TICK: Duration = Duration::from_millis(10);

/// Factory for a synthetic clip.
///
/// By default it offers every role for a 5 second clip carrying one audio
/// and one video stream. Every filter it creates records into the same
/// [`EventLog`].
#[derive(Debug, Clone)]
pub struct SyntheticFactory {
    roles: BTreeSet<FilterRole>,
    kinds: Vec<MediaKind>,
    duration: Duration,
    total_bytes: u64,
    chunk_size: u64,
    video_size: (u32, u32),
    clock_tick: Option<Duration>,
    scripts: HashMap<FilterRole, FilterScript>,
    log: EventLog,
}

impl Default for SyntheticFactory {
    fn default() -> Self {
        Self {
            roles: FilterRole::ALL.into_iter().collect(),
            kinds: vec![MediaKind::Audio, MediaKind::Video],
            duration: DEFAULT_DURATION,
            total_bytes: DEFAULT_TOTAL_BYTES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            video_size: DEFAULT_VIDEO_SIZE,
            clock_tick: Some(DEFAULT_CLOCK_TICK),
            scripts: HashMap::new(),
            log: EventLog::new(),
        }
    }
}

impl SyntheticFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams the demuxer exposes, in order
    pub fn with_streams(mut self, kinds: &[MediaKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    /// Stop offering filters for `role`
    pub fn without(mut self, role: FilterRole) -> Self {
        self.roles.remove(&role);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_total_bytes(mut self, total_bytes: u64) -> Self {
        self.total_bytes = total_bytes;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_video_size(mut self, width: u32, height: u32) -> Self {
        self.video_size = (width, height);
        self
    }

    /// Period of the renderer clock; `None` leaves the position untouched
    pub fn with_clock_tick(mut self, tick: Option<Duration>) -> Self {
        self.clock_tick = tick;
        self
    }

    pub fn with_behavior(mut self, role: FilterRole, behavior: InitBehavior) -> Self {
        self.scripts.entry(role).or_default().behavior = behavior;
        self
    }

    /// Make the filter for `role` report a read error `after` it initialized
    pub fn with_read_error(mut self, role: FilterRole, after: Duration) -> Self {
        self.scripts.entry(role).or_default().read_error_after = Some(after);
        self
    }

    /// Get notified whenever `initialize` is entered on the filter for `role`
    pub fn notify_on_initialize(&mut self, role: FilterRole) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.scripts.entry(role).or_default().entered = Some(notify.clone());
        notify
    }

    /// Record of every call made into filters from this factory
    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn core(&self, role: FilterRole) -> FilterCore {
        let script = self.scripts.get(&role).cloned().unwrap_or_default();
        FilterCore::new(role, script, self.log.clone())
    }

    /// The renderer that advances the playback clock: audio when present
    fn clock_role(&self) -> FilterRole {
        if self.kinds.contains(&MediaKind::Audio) {
            FilterRole::AudioRenderer
        } else {
            FilterRole::VideoRenderer
        }
    }

    fn renderer(&self, role: FilterRole, kind: MediaKind) -> SyntheticRenderer {
        let tick = if role == self.clock_role() {
            self.clock_tick
        } else {
            None
        };
        SyntheticRenderer::new(self.core(role), kind, tick)
    }
}

impl FilterFactory for SyntheticFactory {
    fn create_filter(&self, role: FilterRole, format: &MediaFormat) -> Option<Filter> {
        if !self.roles.contains(&role) {
            debug!("SyntheticFactory: {} not offered", role);
            return None;
        }

        let filter = match role {
            FilterRole::DataSource => {
                if format.mime_type() != mime_type::URL {
                    return None;
                }
                Filter::DataSource(Box::new(SyntheticSource::new(
                    self.core(role),
                    self.total_bytes,
                    self.chunk_size,
                )))
            }
            FilterRole::Demuxer => Filter::Demuxer(Box::new(SyntheticDemuxer::new(
                self.core(role),
                self.kinds.clone(),
                self.duration,
                self.total_bytes,
                self.video_size,
            ))),
            FilterRole::AudioDecoder => Filter::AudioDecoder(Box::new(SyntheticDecoder::new(
                self.core(role),
                MediaKind::Audio,
            ))),
            FilterRole::VideoDecoder => Filter::VideoDecoder(Box::new(SyntheticDecoder::new(
                self.core(role),
                MediaKind::Video,
            ))),
            FilterRole::AudioRenderer => {
                Filter::AudioRenderer(Box::new(self.renderer(role, MediaKind::Audio)))
            }
            FilterRole::VideoRenderer => {
                Filter::VideoRenderer(Box::new(self.renderer(role, MediaKind::Video)))
            }
        };
        Some(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offers_every_role_by_default() {
        let factory = SyntheticFactory::new();
        let format = MediaFormat::url("synthetic://clip");
        for role in FilterRole::ALL {
            let filter = factory.create_filter(role, &format);
            assert_eq!(filter.map(|f| f.role()), Some(role));
        }
    }

    #[test]
    fn test_without_and_source_format() {
        let factory = SyntheticFactory::new().without(FilterRole::Demuxer);
        let url = MediaFormat::url("synthetic://clip");

        assert!(factory.create_filter(FilterRole::Demuxer, &url).is_none());
        let octets = MediaFormat::new(mime_type::APPLICATION_OCTET_STREAM);
        assert!(factory.create_filter(FilterRole::DataSource, &octets).is_none());
    }

    #[test]
    fn test_clock_follows_audio() {
        let factory = SyntheticFactory::new();
        assert_eq!(factory.clock_role(), FilterRole::AudioRenderer);

        let video_only = SyntheticFactory::new().with_streams(&[MediaKind::Video]);
        assert_eq!(video_only.clock_role(), FilterRole::VideoRenderer);
    }
}
