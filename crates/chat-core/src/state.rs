//! Session lifecycle state machine.

use std::fmt;

use crate::{DomainError, DomainResult};

/// Lifecycle state of a chat session.
///
/// ```text
/// Connecting ──▶ Naming ──▶ Active ──▶ Closing ──▶ Closed
///      │            │                    ▲
///      │            └────────────────────┘
///      └──────────────────────────────────────────▶ Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Transport attached, no registry slot yet.
    #[default]
    Connecting,

    /// Slot held, waiting for a unique display name.
    Naming,

    /// Named and exchanging messages.
    Active,

    /// Announcing departure and releasing resources.
    Closing,

    /// Terminal state.
    Closed,
}

impl SessionState {
    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Naming)
                | (Connecting, Closed)
                | (Naming, Active)
                | (Naming, Closing)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }

    /// Returns the next state, or an error if the transition is illegal.
    pub fn transition(self, next: SessionState) -> DomainResult<SessionState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Returns true once no further operations are permitted.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }

    /// Short lowercase label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Naming => "naming",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
