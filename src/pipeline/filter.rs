//! Filter capability interfaces and factories
//!
//! Every processing stage of the chain is a [`Filter`], a tagged variant over
//! the six roles. Filters are created through a [`FilterFactory`] with one
//! `create_filter(role, format)` call per role, and report back only through
//! the [`FilterHost`] handed to their `initialize`.

use bytes::Bytes;
use log::warn;
use std::sync::Arc;
use std::time::Duration;

use super::error::PipelineError;
use super::host::FilterHost;
use super::types::{MediaFormat, MediaKind};

/// The role a filter plays in the chain, in construction order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterRole {
    DataSource,
    Demuxer,
    AudioDecoder,
    AudioRenderer,
    VideoDecoder,
    VideoRenderer,
}

impl FilterRole {
    pub const ALL: [FilterRole; 6] = [
        FilterRole::DataSource,
        FilterRole::Demuxer,
        FilterRole::AudioDecoder,
        FilterRole::AudioRenderer,
        FilterRole::VideoDecoder,
        FilterRole::VideoRenderer,
    ];

    /// The media kind handled by a decoder or renderer role
    pub fn kind(&self) -> Option<MediaKind> {
        match self {
            FilterRole::AudioDecoder | FilterRole::AudioRenderer => Some(MediaKind::Audio),
            FilterRole::VideoDecoder | FilterRole::VideoRenderer => Some(MediaKind::Video),
            _ => None,
        }
    }

    pub fn is_renderer(&self) -> bool {
        matches!(self, FilterRole::AudioRenderer | FilterRole::VideoRenderer)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterRole::DataSource => "DataSource",
            FilterRole::Demuxer => "Demuxer",
            FilterRole::AudioDecoder => "AudioDecoder",
            FilterRole::AudioRenderer => "AudioRenderer",
            FilterRole::VideoDecoder => "VideoDecoder",
            FilterRole::VideoRenderer => "VideoRenderer",
        }
    }
}

impl std::fmt::Display for FilterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for FilterRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterRole::ALL
            .into_iter()
            .find(|role| role.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unknown filter role: {}", s))
    }
}

/// A stream of media buffers flowing from one filter to the next
pub trait MediaStream: Send + Sync {
    /// Format of the buffers this stream yields
    fn media_format(&self) -> MediaFormat;

    /// Next buffer if one is ready; never blocks
    fn read(&self) -> Option<Bytes>;
}

/// Operations shared by every filter role.
///
/// All of them are called from the orchestration task and must return
/// without waiting on I/O.
pub trait MediaFilter: Send {
    /// Get the name of this filter for logging
    fn name(&self) -> &'static str;

    fn pause(&mut self) {}

    /// Drop any buffered data
    fn flush(&mut self) {}

    /// Reposition to `time`
    fn seek(&mut self, _time: Duration) {}

    fn play(&mut self) {}

    fn set_playback_rate(&mut self, _rate: f32) {}

    /// Release resources; called once, during teardown
    fn stop(&mut self) {}
}

/// Opens the uri and exposes its raw bytes
pub trait DataSource: MediaFilter {
    /// Begin opening `uri`; must end in exactly one host lifecycle signal
    fn initialize(&mut self, uri: &str, host: FilterHost);

    fn output(&self) -> Option<Arc<dyn MediaStream>>;
}

/// Splits the raw bytes into elementary streams
pub trait Demuxer: MediaFilter {
    fn initialize(&mut self, source: Arc<dyn MediaStream>, host: FilterHost);

    fn streams(&self) -> Vec<Arc<dyn MediaStream>>;
}

/// Decodes one elementary stream, audio or video
pub trait Decoder: MediaFilter {
    fn initialize(&mut self, stream: Arc<dyn MediaStream>, host: FilterHost);

    fn output(&self) -> Option<Arc<dyn MediaStream>>;
}

/// Consumes decoded data, audio or video
pub trait Renderer: MediaFilter {
    fn initialize(&mut self, stream: Arc<dyn MediaStream>, host: FilterHost);

    fn set_volume(&mut self, _volume: f32) {}
}

/// What a filter is initialized from
#[derive(Clone)]
pub enum FilterInput {
    /// The opaque source uri, for the data source
    Uri(String),
    /// The upstream filter's output, for every other role
    Stream(Arc<dyn MediaStream>),
}

/// A pipeline stage, tagged with its role
pub enum Filter {
    DataSource(Box<dyn DataSource>),
    Demuxer(Box<dyn Demuxer>),
    AudioDecoder(Box<dyn Decoder>),
    AudioRenderer(Box<dyn Renderer>),
    VideoDecoder(Box<dyn Decoder>),
    VideoRenderer(Box<dyn Renderer>),
}

/// Run the same expression against whichever variant `$filter` holds
macro_rules! each_filter {
    ($filter:expr, $f:ident => $body:expr) => {
        match $filter {
            Filter::DataSource($f) => $body,
            Filter::Demuxer($f) => $body,
            Filter::AudioDecoder($f) => $body,
            Filter::AudioRenderer($f) => $body,
            Filter::VideoDecoder($f) => $body,
            Filter::VideoRenderer($f) => $body,
        }
    };
}

impl Filter {
    pub fn role(&self) -> FilterRole {
        match self {
            Filter::DataSource(_) => FilterRole::DataSource,
            Filter::Demuxer(_) => FilterRole::Demuxer,
            Filter::AudioDecoder(_) => FilterRole::AudioDecoder,
            Filter::AudioRenderer(_) => FilterRole::AudioRenderer,
            Filter::VideoDecoder(_) => FilterRole::VideoDecoder,
            Filter::VideoRenderer(_) => FilterRole::VideoRenderer,
        }
    }

    pub fn name(&self) -> &'static str {
        each_filter!(self, f => f.name())
    }

    /// Begin initialization from `input`.
    ///
    /// Fails without touching the filter when the input does not fit the role.
    pub fn initialize(&mut self, input: FilterInput, host: FilterHost) -> Result<(), PipelineError> {
        match (self, input) {
            (Filter::DataSource(f), FilterInput::Uri(uri)) => f.initialize(&uri, host),
            (Filter::Demuxer(f), FilterInput::Stream(stream)) => f.initialize(stream, host),
            (Filter::AudioDecoder(f) | Filter::VideoDecoder(f), FilterInput::Stream(stream)) => {
                f.initialize(stream, host)
            }
            (Filter::AudioRenderer(f) | Filter::VideoRenderer(f), FilterInput::Stream(stream)) => {
                f.initialize(stream, host)
            }
            _ => return Err(PipelineError::InitializationFailed),
        }
        Ok(())
    }

    /// Streams produced for downstream filters; empty for renderers
    pub fn outputs(&self) -> Vec<Arc<dyn MediaStream>> {
        match self {
            Filter::DataSource(f) => f.output().into_iter().collect(),
            Filter::Demuxer(f) => f.streams(),
            Filter::AudioDecoder(f) | Filter::VideoDecoder(f) => f.output().into_iter().collect(),
            Filter::AudioRenderer(_) | Filter::VideoRenderer(_) => Vec::new(),
        }
    }

    pub fn pause(&mut self) {
        each_filter!(self, f => f.pause())
    }

    pub fn flush(&mut self) {
        each_filter!(self, f => f.flush())
    }

    pub fn seek(&mut self, time: Duration) {
        each_filter!(self, f => f.seek(time))
    }

    pub fn play(&mut self) {
        each_filter!(self, f => f.play())
    }

    pub fn set_playback_rate(&mut self, rate: f32) {
        each_filter!(self, f => f.set_playback_rate(rate))
    }

    /// Forward a volume change; only renderers take it
    pub fn set_volume(&mut self, volume: f32) {
        if let Filter::AudioRenderer(f) | Filter::VideoRenderer(f) = self {
            f.set_volume(volume);
        }
    }

    pub fn stop(&mut self) {
        each_filter!(self, f => f.stop())
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter")
            .field("role", &self.role())
            .field("name", &self.name())
            .finish()
    }
}

/// Source of filters, supplied by the embedder when starting a pipeline
pub trait FilterFactory: Send + Sync {
    /// Create a filter for `role` able to consume `format`, or `None` if
    /// no such filter is available
    fn create_filter(&self, role: FilterRole, format: &MediaFormat) -> Option<Filter>;
}

impl<F> FilterFactory for F
where
    F: Fn(FilterRole, &MediaFormat) -> Option<Filter> + Send + Sync,
{
    fn create_filter(&self, role: FilterRole, format: &MediaFormat) -> Option<Filter> {
        self(role, format)
    }
}

/// Ask the factory for `role` and keep the answer only if its variant matches
pub(crate) fn create_for_role(
    factory: &dyn FilterFactory,
    role: FilterRole,
    format: &MediaFormat,
) -> Option<Filter> {
    let filter = factory.create_filter(role, format)?;
    if filter.role() != role {
        warn!(
            "FilterFactory: asked for {} but got {} ({}), ignoring",
            role,
            filter.role(),
            filter.name()
        );
        return None;
    }
    Some(filter)
}

/// Ordered set of factories; the first one offering a filter wins
#[derive(Default, Clone)]
pub struct FilterFactoryCollection {
    factories: Vec<Arc<dyn FilterFactory>>,
}

impl FilterFactoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factory with lower precedence than the ones already added
    pub fn add(&mut self, factory: Arc<dyn FilterFactory>) {
        self.factories.push(factory);
    }

    pub fn with(mut self, factory: Arc<dyn FilterFactory>) -> Self {
        self.add(factory);
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl FilterFactory for FilterFactoryCollection {
    fn create_filter(&self, role: FilterRole, format: &MediaFormat) -> Option<Filter> {
        self.factories
            .iter()
            .find_map(|factory| create_for_role(factory.as_ref(), role, format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::mime_type;

    struct NamedRenderer(&'static str);

    impl MediaFilter for NamedRenderer {
        fn name(&self) -> &'static str {
            self.0
        }
    }

    impl Renderer for NamedRenderer {
        fn initialize(&mut self, _stream: Arc<dyn MediaStream>, _host: FilterHost) {}
    }

    fn renderer_factory(name: &'static str) -> Arc<dyn FilterFactory> {
        Arc::new(move |role: FilterRole, _format: &MediaFormat| match role {
            FilterRole::AudioRenderer => Some(Filter::AudioRenderer(Box::new(NamedRenderer(name)))),
            _ => None,
        })
    }

    #[test]
    fn test_role_properties() {
        assert_eq!(FilterRole::VideoRenderer.kind(), Some(MediaKind::Video));
        assert_eq!(FilterRole::Demuxer.kind(), None);
        assert!(FilterRole::AudioRenderer.is_renderer());
        assert_eq!("videodecoder".parse::<FilterRole>().unwrap(), FilterRole::VideoDecoder);
        assert!("mixer".parse::<FilterRole>().is_err());
    }

    #[test]
    fn test_collection_first_match_wins() {
        let collection = FilterFactoryCollection::new()
            .with(renderer_factory("first"))
            .with(renderer_factory("second"));
        let format = MediaFormat::new(mime_type::AUDIO_UNCOMPRESSED);

        let filter = collection
            .create_filter(FilterRole::AudioRenderer, &format)
            .unwrap();
        assert_eq!(filter.name(), "first");
        assert!(collection.create_filter(FilterRole::Demuxer, &format).is_none());
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_mismatched_variant_is_rejected() {
        let factory = renderer_factory("audio");
        let format = MediaFormat::new(mime_type::VIDEO_UNCOMPRESSED);

        // Answers every role with an audio renderer
        let wrong = move |_role: FilterRole, format: &MediaFormat| {
            factory.create_filter(FilterRole::AudioRenderer, format)
        };
        assert!(create_for_role(&wrong, FilterRole::VideoRenderer, &format).is_none());
        assert!(create_for_role(&wrong, FilterRole::AudioRenderer, &format).is_some());
    }
}
