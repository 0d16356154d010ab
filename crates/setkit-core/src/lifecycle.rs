use crate::SettingsError;
use serde::Serialize;

/// `Open -> Closed`, one way.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HandleState {
    Open,
    Closed,
}

impl HandleState {
    pub fn ensure_open(self, schema_id: &str) -> Result<(), SettingsError> {
        match self {
            HandleState::Open => Ok(()),
            HandleState::Closed => Err(SettingsError::HandleClosed(schema_id.to_owned())),
        }
    }

    /// Whether moving from `self` to `to` is allowed. Closing a closed handle
    /// is allowed and does nothing.
    pub fn can_transition(self, to: HandleState) -> bool {
        matches!(
            (self, to),
            (HandleState::Open, HandleState::Open | HandleState::Closed)
                | (HandleState::Closed, HandleState::Closed)
        )
    }
}

impl std::fmt::Display for HandleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleState::Open => write!(f, "open"),
            HandleState::Closed => write!(f, "closed"),
        }
    }
}
