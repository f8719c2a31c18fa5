//! Synthetic decoder for one media kind

use std::sync::Arc;
use std::time::Duration;

use super::stream::SyntheticStream;
use super::{FilterCore, FilterHooks, recorded_media_filter};
use crate::pipeline::types::{format_key, mime_type};
use crate::pipeline::{Decoder, FilterHost, MediaFormat, MediaKind, MediaStream};

const DECODE_TICK: Duration = Duration::from_millis(5);
const STREAM_CAPACITY: usize = 16;

pub struct SyntheticDecoder {
    core: FilterCore,
    kind: MediaKind,
    output: Option<Arc<SyntheticStream>>,
}

impl SyntheticDecoder {
    pub(crate) fn new(core: FilterCore, kind: MediaKind) -> Self {
        Self {
            core,
            kind,
            output: None,
        }
    }

    /// Uncompressed format carrying over the properties a renderer needs
    fn output_format(&self, input: &MediaFormat) -> MediaFormat {
        let mime = match self.kind {
            MediaKind::Audio => mime_type::AUDIO_UNCOMPRESSED,
            MediaKind::Video => mime_type::VIDEO_UNCOMPRESSED,
        };
        let mut format =
            MediaFormat::new(mime).with_string(format_key::CODEC, input.mime_type().to_string());
        for key in [
            format_key::SAMPLE_RATE,
            format_key::CHANNELS,
            format_key::WIDTH,
            format_key::HEIGHT,
        ] {
            if let Some(value) = input.get_int(key) {
                format = format.with_int(key, value);
            }
        }
        format
    }

    fn spawn_decode(&self, input: Arc<dyn MediaStream>, output: Arc<SyntheticStream>) {
        let cancel = self.core.cancel_token();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(DECODE_TICK);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = cancel.cancelled() => break,
                }
                while let Some(buffer) = input.read() {
                    if !output.push(buffer) {
                        break;
                    }
                }
            }
        });
    }
}

impl FilterHooks for SyntheticDecoder {
    fn on_flush(&mut self) {
        if let Some(output) = &self.output {
            output.clear();
        }
    }
}

recorded_media_filter!(SyntheticDecoder, "SyntheticDecoder");

impl Decoder for SyntheticDecoder {
    fn initialize(&mut self, stream: Arc<dyn MediaStream>, host: FilterHost) {
        self.core.enter_initialize();

        let format = self.output_format(&stream.media_format());
        let output = Arc::new(SyntheticStream::new(format, STREAM_CAPACITY));
        self.output = Some(output.clone());

        self.spawn_decode(stream, output);
        self.core.finish_initialize(host);
    }

    fn output(&self) -> Option<Arc<dyn MediaStream>> {
        self.output
            .clone()
            .map(|stream| stream as Arc<dyn MediaStream>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FilterRole;
    use crate::synthetic::{EventLog, FilterScript};

    #[test]
    fn test_output_format_keeps_video_size() {
        let core = FilterCore::new(
            FilterRole::VideoDecoder,
            FilterScript::default(),
            EventLog::new(),
        );
        let decoder = SyntheticDecoder::new(core, MediaKind::Video);
        let input = MediaFormat::new("video/x-synthetic")
            .with_int(format_key::WIDTH, 320)
            .with_int(format_key::HEIGHT, 240);

        let output = decoder.output_format(&input);
        assert_eq!(output.mime_type(), mime_type::VIDEO_UNCOMPRESSED);
        assert_eq!(output.get_int(format_key::WIDTH), Some(320));
        assert_eq!(output.get_int(format_key::HEIGHT), Some(240));
        assert_eq!(output.get_string(format_key::CODEC), Some("video/x-synthetic"));
    }
}
