//! Capture lifecycle transitions.
//! Requests that make no sense in the current state leave it unchanged.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    #[default]
    Idle,
    Running,
    /// A redemption is in flight.
    Paused,
    Stopped,
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanState::Idle => write!(f, "idle"),
            ScanState::Running => write!(f, "running"),
            ScanState::Paused => write!(f, "paused"),
            ScanState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    /// Decoder acquired and started.
    Started,
    PauseRequested,
    ResumeRequested,
    StopRequested,
    /// Decoder released (restart or surface teardown).
    TornDown,
}

pub fn next_state(current: ScanState, event: ScanEvent) -> ScanState {
    match (current, event) {
        (_, ScanEvent::Started) => ScanState::Running,
        (ScanState::Running, ScanEvent::PauseRequested) => ScanState::Paused,
        (ScanState::Paused, ScanEvent::ResumeRequested) => ScanState::Running,
        (ScanState::Running | ScanState::Paused, ScanEvent::StopRequested) => ScanState::Stopped,
        (_, ScanEvent::TornDown) => ScanState::Stopped,
        (state, _) => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_from_idle_runs() {
        assert_eq!(next_state(ScanState::Idle, ScanEvent::Started), ScanState::Running);
    }

    #[test]
    fn test_restart_while_running_stays_running() {
        assert_eq!(
            next_state(ScanState::Running, ScanEvent::Started),
            ScanState::Running
        );
    }

    #[test]
    fn test_start_after_stop_runs() {
        assert_eq!(
            next_state(ScanState::Stopped, ScanEvent::Started),
            ScanState::Running
        );
    }

    #[test]
    fn test_pause_only_from_running() {
        assert_eq!(
            next_state(ScanState::Running, ScanEvent::PauseRequested),
            ScanState::Paused
        );
        assert_eq!(
            next_state(ScanState::Idle, ScanEvent::PauseRequested),
            ScanState::Idle
        );
        assert_eq!(
            next_state(ScanState::Stopped, ScanEvent::PauseRequested),
            ScanState::Stopped
        );
    }

    #[test]
    fn test_resume_only_from_paused() {
        assert_eq!(
            next_state(ScanState::Paused, ScanEvent::ResumeRequested),
            ScanState::Running
        );
        assert_eq!(
            next_state(ScanState::Stopped, ScanEvent::ResumeRequested),
            ScanState::Stopped
        );
        assert_eq!(
            next_state(ScanState::Idle, ScanEvent::ResumeRequested),
            ScanState::Idle
        );
    }

    #[test]
    fn test_stop_from_running_or_paused() {
        assert_eq!(
            next_state(ScanState::Running, ScanEvent::StopRequested),
            ScanState::Stopped
        );
        assert_eq!(
            next_state(ScanState::Paused, ScanEvent::StopRequested),
            ScanState::Stopped
        );
    }

    #[test]
    fn test_stop_from_idle_ignored() {
        assert_eq!(
            next_state(ScanState::Idle, ScanEvent::StopRequested),
            ScanState::Idle
        );
    }

    #[test]
    fn test_teardown_always_stops() {
        for state in [
            ScanState::Idle,
            ScanState::Running,
            ScanState::Paused,
            ScanState::Stopped,
        ] {
            assert_eq!(next_state(state, ScanEvent::TornDown), ScanState::Stopped);
        }
    }
}
