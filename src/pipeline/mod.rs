//! Media playback pipeline
//!
//! This module assembles a chain of pluggable filters at runtime and keeps
//! it under the control of a single orchestration task, separating concerns
//! between:
//! - Facade: thread-safe playback controls and statistics getters
//! - Control: the controller state machine building and tearing down the chain
//! - Filters: role-tagged processing stages created by a factory
//! - Relay: filter hosts carrying filter updates back into shared state
//!
//! # Architecture
//!
//! ```text
//! caller → Pipeline → Controller → Filter → FilterHost → Controller / shared state → caller
//! ```
//!
//! - Every `Pipeline` owns at most one `Controller` generation at a time
//! - The controller runs on its own tokio task; all transitions happen there
//! - Filters may do background work anywhere but only talk back through
//!   their `FilterHost`
//! - Shared state is one struct behind one mutex; getters take snapshots

pub(crate) mod controller;
pub mod error;
pub mod facade;
pub mod filter;
pub(crate) mod graph;
pub mod host;
pub(crate) mod shared;
pub mod state;
pub mod types;


pub use error::{PipelineCallback, PipelineError, PipelineResult};
pub use facade::Pipeline;
pub use filter::{
    DataSource, Decoder, Demuxer, Filter, FilterFactory, FilterFactoryCollection, FilterInput,
    FilterRole, MediaFilter, MediaStream, Renderer,
};
pub use host::FilterHost;
pub use state::ControllerState;
pub use types::{MediaFormat, MediaKind};
