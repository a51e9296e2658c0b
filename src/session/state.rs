// Top-level session states and the transitions allowed between them

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SessionState {
    /// Waiting for a queued song
    #[default]
    Menu,
    Playing,
    /// Final score on screen until acknowledged
    Score,
    /// Editing audio settings
    Configuring,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Menu => write!(f, "MENU"),
            SessionState::Playing => write!(f, "PLAYING"),
            SessionState::Score => write!(f, "SCORE"),
            SessionState::Configuring => write!(f, "CONFIGURING"),
        }
    }
}

impl SessionState {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Menu, SessionState::Playing)
                | (SessionState::Playing, SessionState::Score)
                | (SessionState::Score, SessionState::Menu)
                | (SessionState::Menu, SessionState::Configuring)
                | (SessionState::Configuring, SessionState::Menu)
        )
    }
}
