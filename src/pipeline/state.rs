//! Controller state machine

use super::filter::FilterRole;

/// Controller state machine
///
/// Forward progress walks the `Init*` states in construction order and ends
/// in `Started`. A decoder/renderer pair whose stream kind is absent is
/// skipped as a whole. `Stopped` and `Error` are reachable from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Created,
    InitDataSource,
    InitDemuxer,
    InitAudioDecoder,
    InitAudioRenderer,
    InitVideoDecoder,
    InitVideoRenderer,
    /// Every available stage is initialized
    Started,
    /// Torn down by an explicit stop
    Stopped,
    /// Torn down after a fatal filter error, waiting for stop
    Error,
}

impl ControllerState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &ControllerState) -> bool {
        use ControllerState::*;

        match (self, target) {
            // Nothing leaves Stopped, a new generation starts from Created
            (Stopped, _) => false,

            // Teardown paths
            (_, Stopped) => true,
            (Error, _) => false,
            (_, Error) => true,

            (Created, InitDataSource) => true,
            (InitDataSource, InitDemuxer) => true,

            // Audio pair, or skip straight to video / started
            (InitDemuxer, InitAudioDecoder | InitVideoDecoder | Started) => true,
            (InitAudioDecoder, InitAudioRenderer) => true,
            (InitAudioRenderer, InitVideoDecoder | Started) => true,

            (InitVideoDecoder, InitVideoRenderer) => true,
            (InitVideoRenderer, Started) => true,

            _ => false,
        }
    }

    /// The filter role constructed while in this state
    pub fn role(&self) -> Option<FilterRole> {
        match self {
            ControllerState::InitDataSource => Some(FilterRole::DataSource),
            ControllerState::InitDemuxer => Some(FilterRole::Demuxer),
            ControllerState::InitAudioDecoder => Some(FilterRole::AudioDecoder),
            ControllerState::InitAudioRenderer => Some(FilterRole::AudioRenderer),
            ControllerState::InitVideoDecoder => Some(FilterRole::VideoDecoder),
            ControllerState::InitVideoRenderer => Some(FilterRole::VideoRenderer),
            _ => None,
        }
    }

    /// The state following this one when nothing is skipped
    pub fn next(&self) -> Option<ControllerState> {
        use ControllerState::*;

        match self {
            Created => Some(InitDataSource),
            InitDataSource => Some(InitDemuxer),
            InitDemuxer => Some(InitAudioDecoder),
            InitAudioDecoder => Some(InitAudioRenderer),
            InitAudioRenderer => Some(InitVideoDecoder),
            InitVideoDecoder => Some(InitVideoRenderer),
            InitVideoRenderer => Some(Started),
            Started | Stopped | Error => None,
        }
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            ControllerState::Created => "Created",
            ControllerState::InitDataSource => "InitDataSource",
            ControllerState::InitDemuxer => "InitDemuxer",
            ControllerState::InitAudioDecoder => "InitAudioDecoder",
            ControllerState::InitAudioRenderer => "InitAudioRenderer",
            ControllerState::InitVideoDecoder => "InitVideoDecoder",
            ControllerState::InitVideoRenderer => "InitVideoRenderer",
            ControllerState::Started => "Started",
            ControllerState::Stopped => "Stopped",
            ControllerState::Error => "Error",
        }
    }

    /// Check if the controller is building the filter chain
    pub fn is_initializing(&self) -> bool {
        self.role().is_some()
    }

    /// Check if the controller has not reached a teardown state
    pub fn is_running(&self) -> bool {
        !matches!(self, ControllerState::Stopped | ControllerState::Error)
    }

    pub fn is_started(&self) -> bool {
        matches!(self, ControllerState::Started)
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ControllerState::*;

    #[test]
    fn test_valid_transitions() {
        // Full chain
        let mut state = Created;
        while let Some(next) = state.next() {
            assert!(state.can_transition_to(&next), "{} -> {}", state, next);
            state = next;
        }
        assert_eq!(state, Started);

        // Skipping optional pairs
        assert!(InitDemuxer.can_transition_to(&InitVideoDecoder));
        assert!(InitDemuxer.can_transition_to(&Started));
        assert!(InitAudioRenderer.can_transition_to(&Started));

        // Teardown from anywhere
        for state in [Created, InitDataSource, InitAudioDecoder, InitVideoRenderer, Started] {
            assert!(state.can_transition_to(&Stopped));
            assert!(state.can_transition_to(&Error));
        }
        assert!(Error.can_transition_to(&Stopped));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!Created.can_transition_to(&Started)); // Must build the chain
        assert!(!InitDataSource.can_transition_to(&InitAudioDecoder)); // Demuxer is mandatory
        assert!(!InitAudioDecoder.can_transition_to(&InitVideoDecoder)); // Pair skipped as a whole
        assert!(!Started.can_transition_to(&InitDataSource));
        assert!(!Error.can_transition_to(&Started));
        assert!(!Stopped.can_transition_to(&Created));
        assert!(!Stopped.can_transition_to(&Error));
    }

    #[test]
    fn test_state_checks() {
        assert!(InitAudioDecoder.is_initializing());
        assert!(InitAudioDecoder.is_running());
        assert!(!InitAudioDecoder.is_started());

        assert!(Started.is_running());
        assert!(Started.is_started());
        assert!(!Started.is_initializing());

        assert!(!Error.is_running());
        assert!(!Stopped.is_running());
        assert_eq!(InitVideoRenderer.role(), Some(FilterRole::VideoRenderer));
        assert_eq!(Created.role(), None);
    }
}
