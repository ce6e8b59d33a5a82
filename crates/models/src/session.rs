use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

/// Lifecycle of a video-conference session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum SessionStatus {
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "started")]
    Started,
    #[sea_orm(string_value = "ended")]
    Ended,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled)
    }

    /// Whether students may still join
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Scheduled | Self::Started)
    }

    /// Transitions only move forward; staying in the same state is allowed
    /// for non-terminal states so repeated updates are harmless.
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Scheduled, Self::Scheduled | Self::Started | Self::Ended | Self::Cancelled) => {
                true
            }
            (Self::Started, Self::Started | Self::Ended | Self::Cancelled) => true,
            _ => false,
        }
    }
}

/// How a session's meeting reference was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum MeetingKind {
    /// Created by the conferencing provider
    #[sea_orm(string_value = "provider")]
    Provider,
    /// Synthesized locally after the provider failed
    #[sea_orm(string_value = "placeholder")]
    Placeholder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(SessionStatus::Scheduled.can_transition_to(SessionStatus::Started));
        assert!(SessionStatus::Started.can_transition_to(SessionStatus::Ended));
        assert!(SessionStatus::Scheduled.can_transition_to(SessionStatus::Cancelled));
        assert!(SessionStatus::Started.can_transition_to(SessionStatus::Cancelled));
    }

    #[test]
    fn test_backward_and_terminal_transitions() {
        assert!(!SessionStatus::Started.can_transition_to(SessionStatus::Scheduled));
        assert!(!SessionStatus::Ended.can_transition_to(SessionStatus::Started));
        assert!(!SessionStatus::Cancelled.can_transition_to(SessionStatus::Scheduled));
        assert!(!SessionStatus::Cancelled.can_transition_to(SessionStatus::Cancelled));
        assert!(!SessionStatus::Ended.can_transition_to(SessionStatus::Cancelled));
    }

    #[test]
    fn test_joinable() {
        assert!(SessionStatus::Scheduled.is_joinable());
        assert!(SessionStatus::Started.is_joinable());
        assert!(!SessionStatus::Ended.is_joinable());
        assert!(!SessionStatus::Cancelled.is_joinable());
        assert!(SessionStatus::Cancelled.is_terminal());
    }
}
