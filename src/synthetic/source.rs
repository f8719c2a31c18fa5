//! Synthetic data source
//!
//! Accepts any uri and simulates a download: total size is reported up
//! front and buffered bytes grow from a background task until everything
//! is "fetched" or the filter is stopped.

use bytes::Bytes;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

use super::stream::SyntheticStream;
use super::{FilterCore, FilterHooks, recorded_media_filter};
use crate::pipeline::types::{format_key, mime_type};
use crate::pipeline::{DataSource, FilterHost, MediaFormat, MediaStream};

const DOWNLOAD_TICK: Duration = Duration::from_millis(5);
const STREAM_CAPACITY: usize = 64;

pub struct SyntheticSource {
    core: FilterCore,
    total_bytes: u64,
    chunk_size: u64,
    output: Option<Arc<SyntheticStream>>,
}

impl SyntheticSource {
    pub(crate) fn new(core: FilterCore, total_bytes: u64, chunk_size: u64) -> Self {
        Self {
            core,
            total_bytes,
            chunk_size: chunk_size.max(1),
            output: None,
        }
    }

    fn spawn_download(&self, host: FilterHost, output: Arc<SyntheticStream>) {
        let cancel = self.core.cancel_token();
        let total = self.total_bytes;
        let chunk = self.chunk_size;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(DOWNLOAD_TICK);
            let mut buffered = 0u64;
            while buffered < total {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = cancel.cancelled() => break,
                }
                let n = chunk.min(total - buffered);
                buffered += n;
                output.push(Bytes::from(vec![0u8; n as usize]));
                host.set_buffered_bytes(buffered);
            }
            debug!("SyntheticSource: download ended at {}/{} bytes", buffered, total);
        });
    }
}

impl FilterHooks for SyntheticSource {
    fn on_flush(&mut self) {
        if let Some(output) = &self.output {
            output.clear();
        }
    }
}

recorded_media_filter!(SyntheticSource, "SyntheticSource");

impl DataSource for SyntheticSource {
    fn initialize(&mut self, uri: &str, host: FilterHost) {
        self.core.enter_initialize();

        let format = MediaFormat::new(mime_type::APPLICATION_OCTET_STREAM)
            .with_string(format_key::URL, uri);
        let output = Arc::new(SyntheticStream::new(format, STREAM_CAPACITY));
        self.output = Some(output.clone());

        host.set_total_bytes(self.total_bytes);
        self.spawn_download(host.clone(), output);
        self.core.finish_initialize(host);
    }

    fn output(&self) -> Option<Arc<dyn MediaStream>> {
        self.output
            .clone()
            .map(|stream| stream as Arc<dyn MediaStream>)
    }
}
