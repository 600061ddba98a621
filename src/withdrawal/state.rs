//! Withdrawal request state machine

use std::fmt;

/// Request lifecycle, stored as small ints
///
/// ```text
/// PENDING ──approve──> APPROVED ──process──> COMPLETED
///    │
///    └──reject──> REJECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn id(&self) -> i16 {
        match self {
            WithdrawalStatus::Pending => 0,
            WithdrawalStatus::Approved => 10,
            WithdrawalStatus::Completed => 40,
            WithdrawalStatus::Rejected => -10,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(WithdrawalStatus::Pending),
            10 => Some(WithdrawalStatus::Approved),
            40 => Some(WithdrawalStatus::Completed),
            -10 => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "PENDING",
            WithdrawalStatus::Approved => "APPROVED",
            WithdrawalStatus::Completed => "COMPLETED",
            WithdrawalStatus::Rejected => "REJECTED",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Completed | WithdrawalStatus::Rejected)
    }

    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        matches!(
            (self, next),
            (WithdrawalStatus::Pending, WithdrawalStatus::Approved)
                | (WithdrawalStatus::Pending, WithdrawalStatus::Rejected)
                | (WithdrawalStatus::Approved, WithdrawalStatus::Completed)
        )
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ids_roundtrip() {
        for status in [
            WithdrawalStatus::Pending,
            WithdrawalStatus::Approved,
            WithdrawalStatus::Completed,
            WithdrawalStatus::Rejected,
        ] {
            assert_eq!(WithdrawalStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(WithdrawalStatus::from_id(7), None);
    }

    #[test]
    fn test_allowed_transitions() {
        use WithdrawalStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Completed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Completed.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_states() {
        assert!(WithdrawalStatus::Completed.is_terminal());
        assert!(WithdrawalStatus::Rejected.is_terminal());
        assert!(!WithdrawalStatus::Pending.is_terminal());
        assert!(!WithdrawalStatus::Approved.is_terminal());
    }
}
