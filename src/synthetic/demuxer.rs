//! Synthetic demuxer
//!
//! Exposes one elementary stream per configured media kind and reports the
//! clip duration. A background task drains the source and converts the
//! bytes read into buffered time.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use super::stream::SyntheticStream;
use super::{FilterCore, FilterHooks, recorded_media_filter};
use crate::pipeline::types::format_key;
use crate::pipeline::{Demuxer, FilterHost, MediaFormat, MediaKind, MediaStream};

const DEMUX_TICK: Duration = Duration::from_millis(5);
const STREAM_CAPACITY: usize = 32;

pub struct SyntheticDemuxer {
    core: FilterCore,
    kinds: Vec<MediaKind>,
    duration: Duration,
    total_bytes: u64,
    video_size: (u32, u32),
    streams: Vec<Arc<SyntheticStream>>,
}

impl SyntheticDemuxer {
    pub(crate) fn new(
        core: FilterCore,
        kinds: Vec<MediaKind>,
        duration: Duration,
        total_bytes: u64,
        video_size: (u32, u32),
    ) -> Self {
        Self {
            core,
            kinds,
            duration,
            total_bytes,
            video_size,
            streams: Vec::new(),
        }
    }

    fn stream_format(&self, kind: MediaKind) -> MediaFormat {
        match kind {
            MediaKind::Audio => MediaFormat::new("audio/x-synthetic")
                .with_int(format_key::SAMPLE_RATE, 48_000)
                .with_int(format_key::CHANNELS, 2),
            MediaKind::Video => MediaFormat::new("video/x-synthetic")
                .with_int(format_key::WIDTH, i64::from(self.video_size.0))
                .with_int(format_key::HEIGHT, i64::from(self.video_size.1)),
        }
    }

    fn spawn_demux(&self, source: Arc<dyn MediaStream>, host: FilterHost) {
        let cancel = self.core.cancel_token();
        let streams = self.streams.clone();
        let duration = self.duration;
        let total = self.total_bytes.max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(DEMUX_TICK);
            let mut read = 0u64;
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = cancel.cancelled() => break,
                }
                while let Some(chunk) = source.read() {
                    read += chunk.len() as u64;
                    for stream in &streams {
                        stream.push(Bytes::copy_from_slice(&chunk[..chunk.len().min(16)]));
                    }
                }
                let buffered = duration.mul_f64((read.min(total) as f64) / total as f64);
                host.set_buffered_time(buffered);
                if read >= total {
                    break;
                }
            }
        });
    }
}

impl FilterHooks for SyntheticDemuxer {
    fn on_flush(&mut self) {
        for stream in &self.streams {
            stream.clear();
        }
    }
}

recorded_media_filter!(SyntheticDemuxer, "SyntheticDemuxer");

impl Demuxer for SyntheticDemuxer {
    fn initialize(&mut self, source: Arc<dyn MediaStream>, host: FilterHost) {
        self.core.enter_initialize();

        self.streams = self
            .kinds
            .iter()
            .map(|kind| Arc::new(SyntheticStream::new(self.stream_format(*kind), STREAM_CAPACITY)))
            .collect();

        host.set_duration(self.duration);
        self.spawn_demux(source, host.clone());
        self.core.finish_initialize(host);
    }

    fn streams(&self) -> Vec<Arc<dyn MediaStream>> {
        self.streams
            .iter()
            .map(|stream| stream.clone() as Arc<dyn MediaStream>)
            .collect()
    }
}
