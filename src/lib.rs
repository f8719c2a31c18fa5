//! Media playback pipeline orchestrator.
//!
//! A [`Pipeline`] builds a chain of pluggable filters (data source, demuxer,
//! audio/video decoders and renderers) for a uri, drives it through an
//! asynchronous initialization state machine and exposes thread-safe
//! playback controls and statistics. Filters come from a [`FilterFactory`]
//! supplied at start; [`synthetic`] provides in-process ones.

pub mod config;
pub mod pipeline;
pub mod synthetic;

pub use config::PipelineConfig;
pub use pipeline::{
    ControllerState, Filter, FilterFactory, FilterFactoryCollection, FilterHost, FilterRole,
    MediaFormat, MediaKind, Pipeline, PipelineError, PipelineResult,
};
