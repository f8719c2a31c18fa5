//! Pipeline error taxonomy

use thiserror::Error;

/// Error codes surfaced by the pipeline.
///
/// Filters report failures through their [`FilterHost`](super::host::FilterHost);
/// the controller records the first one as the sticky pipeline error and
/// completion callbacks carry it as `Err(code)`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineError {
    /// The factory produced no filter for a role the chain cannot do without
    #[error("no filter available for a required role")]
    RequiredFilterMissing,
    /// A filter reported failure while initializing
    #[error("filter initialization failed")]
    InitializationFailed,
    /// A filter reported a data read failure after initialization
    #[error("failed to read media data")]
    Read,
    /// The operation needs a fully started pipeline
    #[error("pipeline is not running")]
    NotRunning,
    /// A filter could not allocate its buffers; only ever raised by filters
    /// through their host, the pipeline itself never produces it
    #[error("out of memory")]
    OutOfMemory,
    /// A pending start was cancelled by a stop request
    #[error("operation aborted by stop")]
    Aborted,
}

/// Result type handed to completion callbacks
pub type PipelineResult = Result<(), PipelineError>;

/// Completion callback for `start`, `stop` and `seek`
pub type PipelineCallback = Box<dyn FnOnce(PipelineResult) + Send + 'static>;
