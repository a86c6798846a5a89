//! Stream session state as seen by observers

use serde::{Deserialize, Serialize};

/// Public state of the streaming engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StreamState {
    /// No session has run yet.
    #[default]
    Idle,
    /// Commands are being transmitted.
    Streaming,
    /// Transmission is suspended; an in-flight command may still be awaited.
    Paused,
    /// Every line of the source was processed and acknowledged.
    Completed,
    /// The caller stopped the session.
    Stopped,
    /// The session ended on a fatal error.
    Failed,
}

impl StreamState {
    /// Streaming or paused
    pub fn is_active(&self) -> bool {
        matches!(self, StreamState::Streaming | StreamState::Paused)
    }

    /// Completed, stopped or failed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Stopped | StreamState::Failed
        )
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamState::Idle => write!(f, "Idle"),
            StreamState::Streaming => write!(f, "Streaming"),
            StreamState::Paused => write!(f, "Paused"),
            StreamState::Completed => write!(f, "Completed"),
            StreamState::Stopped => write!(f, "Stopped"),
            StreamState::Failed => write!(f, "Failed"),
        }
    }
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    /// Current engine state
    pub state: StreamState,
    /// Port of the open link, if any
    pub port: Option<String>,
    /// Total raw lines of the active or last source
    pub total_lines: usize,
    /// Index of the next line to evaluate
    pub current_index: usize,
    /// Last reported progress percentage
    pub percent: u8,
    /// Command awaiting acknowledgment
    pub in_flight: Option<String>,
}

/// Progress percentage for `current` out of `total` lines, rounded down
pub fn progress_percent(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let current = current.min(total);
    ((current as u128 * 100) / total as u128) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent_floors() {
        assert_eq!(progress_percent(0, 3), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 66);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(199, 200), 99);
    }

    #[test]
    fn test_progress_percent_edges() {
        assert_eq!(progress_percent(0, 0), 100);
        assert_eq!(progress_percent(10, 5), 100);
    }

    #[test]
    fn test_state_predicates() {
        assert!(StreamState::Paused.is_active());
        assert!(!StreamState::Idle.is_active());
        assert!(StreamState::Failed.is_terminal());
        assert!(!StreamState::Streaming.is_terminal());
    }
}
