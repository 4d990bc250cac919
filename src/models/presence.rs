use serde::Serialize;

/// Presence of a member, derived from whether an open interval exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PresenceState {
    Available,
    OnBreak,
}

impl PresenceState {
    pub fn label(&self) -> &'static str {
        match self {
            PresenceState::Available => "Available",
            PresenceState::OnBreak => "On break",
        }
    }

    pub fn is_on_break(&self) -> bool {
        matches!(self, PresenceState::OnBreak)
    }
}
