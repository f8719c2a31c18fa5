//! Synthetic renderer
//!
//! Drains its decoded stream and, when it owns the clock, advances the
//! playback position by `tick * playback_rate` while playing.

use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{FilterCall, FilterCore, FilterHooks, recorded_media_filter};
use crate::pipeline::types::format_key;
use crate::pipeline::{FilterHost, MediaKind, MediaStream, Renderer};

pub struct SyntheticRenderer {
    core: FilterCore,
    kind: MediaKind,
    /// Clock period; `None` when another renderer drives the clock
    clock_tick: Option<Duration>,
    playing: Arc<AtomicBool>,
    host: Option<FilterHost>,
}

impl SyntheticRenderer {
    pub(crate) fn new(core: FilterCore, kind: MediaKind, clock_tick: Option<Duration>) -> Self {
        Self {
            core,
            kind,
            clock_tick,
            playing: Arc::new(AtomicBool::new(true)),
            host: None,
        }
    }

    fn spawn_render(&self, stream: Arc<dyn MediaStream>, host: FilterHost) {
        let cancel = self.core.cancel_token();
        let playing = self.playing.clone();
        let tick = self.clock_tick;
        let role = self.core.role();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick.unwrap_or(Duration::from_millis(10)));
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = cancel.cancelled() => break,
                }
                while stream.read().is_some() {}

                let Some(tick) = tick else { continue };
                if !playing.load(Ordering::Acquire) {
                    continue;
                }
                let rate = host.playback_rate();
                if rate <= 0.0 || !rate.is_finite() {
                    continue;
                }
                host.set_time(advance_clock(host.time(), tick, rate, host.duration()));
            }
            debug!("{}: render loop ended", role);
        });
    }
}

/// Position after one clock tick at `rate`, never past `duration`
fn advance_clock(time: Duration, tick: Duration, rate: f32, duration: Duration) -> Duration {
    Duration::try_from_secs_f32(tick.as_secs_f32() * rate)
        .ok()
        .and_then(|step| time.checked_add(step))
        .unwrap_or(duration)
        .min(duration)
}

impl FilterHooks for SyntheticRenderer {
    fn on_pause(&mut self) {
        self.playing.store(false, Ordering::Release);
    }

    fn on_seek(&mut self, time: Duration) {
        if let Some(host) = &self.host {
            host.set_time(time);
        }
    }

    fn on_play(&mut self) {
        self.playing.store(true, Ordering::Release);
    }
}

recorded_media_filter!(SyntheticRenderer, "SyntheticRenderer");

impl Renderer for SyntheticRenderer {
    fn initialize(&mut self, stream: Arc<dyn MediaStream>, host: FilterHost) {
        self.core.enter_initialize();

        if self.kind == MediaKind::Video {
            let format = stream.media_format();
            let width = format.get_int(format_key::WIDTH).unwrap_or(0);
            let height = format.get_int(format_key::HEIGHT).unwrap_or(0);
            host.set_video_size(
                u32::try_from(width).unwrap_or(0),
                u32::try_from(height).unwrap_or(0),
            );
        }

        self.host = Some(host.clone());
        self.spawn_render(stream, host.clone());
        self.core.finish_initialize(host);
    }

    fn set_volume(&mut self, volume: f32) {
        self.core.record(FilterCall::Volume(volume));
    }
}
