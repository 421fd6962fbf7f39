use serde::{Deserialize, Serialize};

/// Whether this attempt counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Warm-up run: fixed countdown, no integrity tracking, never persisted.
    Practice,
    /// The real interview: elapsed timer, integrity tracking, one persisted
    /// outcome record.
    Scored,
}

/// Session lifecycle status.
///
/// `Ended` and `Rejected` are terminal for a given attempt; a new attempt
/// goes through [`crate::session::InterviewSession::reset_for_new_attempt`]
/// rather than reusing fields in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    PermissionPending,
    ReadyToStart,
    Connecting,
    Connected,
    Ended,
    /// The pre-start eligibility check failed. Terminal like `Ended`, but
    /// triggers no persistence.
    Rejected,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Rejected)
    }

    /// Admissible transitions. Everything else is refused by the state
    /// machine (and logged by the caller).
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Idle, PermissionPending)
                | (PermissionPending, ReadyToStart)
                | (PermissionPending, Idle)
                | (ReadyToStart, Connecting)
                | (ReadyToStart, Rejected)
                | (Connecting, ReadyToStart)
                | (Connecting, Connected)
                | (Connecting, Ended)
                | (Connected, Ended)
        )
    }
}

/// Which of the racing completion paths won. Recorded for logging and
/// display; not part of the persisted outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Explicit hang-up by the user.
    UserAction,
    /// The transport reported the call over. Also covers practice-countdown
    /// expiry, which stops the transport and lets its own end event finish
    /// the transition.
    TransportEnded,
    /// The transport reported an error; treated as a forced stop then end.
    TransportError,
}

/// Email shape check used by the required-fields gate. Deliberately loose:
/// the backend owns real validation, this only blocks obvious typos.
pub(crate) fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
