//! Error types for attendance reconciliation
//!
//! Every failure in this crate is recoverable at the view boundary:
//! - Transport failures from the collaborators (retryable)
//! - Roster fetch failures
//! - Overlay guard violations (read-only view, unknown enrollment)
//! - Commit failures (overlay preserved)
//! - Justification eligibility and field validation failures
//! - Configuration errors

use crate::commit::CommitPhase;
use crate::justification::FieldError;
use crate::notice::Notice;
use crate::types::EnrollmentId;
use std::path::PathBuf;

/// Failure reported by a backend collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Request could not be completed
    #[error("request failed: {0}")]
    Request(String),

    /// Server answered with an error
    #[error("server rejected request ({status}): {message}")]
    Rejected {
        /// HTTP-like status code
        status: u16,
        /// Server message
        message: String,
    },

    /// Request timed out
    #[error("request timed out after {duration_secs}s")]
    Timeout {
        /// Elapsed time
        duration_secs: u64,
    },
}

/// Roster fetch errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// Loader failed
    #[error("could not load attendance: {0}")]
    Fetch(#[from] TransportError),

    /// A fetch is already in flight
    #[error("attendance is already loading")]
    AlreadyLoading,

    /// A batch is in flight; rows fetched now could predate it
    #[error("cannot reload while changes are being saved")]
    CommitInFlight,

    /// Every row of the current query is loaded
    #[error("no more attendance pages to load")]
    NoMorePages,
}

impl RosterError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

/// Errors staging or discarding local edits
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    /// The actor may not manage this roster
    #[error("attendance is read-only for this user")]
    ReadOnly,

    /// Enrollment is not in the loaded roster
    #[error("enrollment {0} is not in the loaded roster")]
    UnknownEnrollment(EnrollmentId),

    /// Edits are frozen while their batch is being saved
    #[error("cannot change attendance while changes are being saved")]
    CommitInFlight,
}

/// Commit coordinator errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// The actor may not manage this roster
    #[error("attendance is read-only for this user")]
    ReadOnly,

    /// Overlay is empty
    #[error("there are no pending changes to save")]
    NothingToCommit,

    /// A batch is already in flight
    #[error("changes are already being saved")]
    AlreadyInFlight,

    /// The roster is being reloaded
    #[error("cannot save while attendance is loading")]
    FetchInFlight,

    /// The batch request failed; pending changes are kept
    #[error("could not save attendance: {0}")]
    Rejected(#[from] TransportError),

    /// Transition outside the commit state machine
    #[error("illegal commit transition: {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current phase
        from: CommitPhase,
        /// Requested phase
        to: CommitPhase,
    },
}

impl CommitError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Failure returned by the justification collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JustificationRejection {
    /// Field-level validation errors
    #[error("justification rejected: {}", join_fields(.0))]
    Invalid(Vec<FieldError>),

    /// Request failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Justification sub-flow errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JustificationError {
    /// The actor may not manage this roster
    #[error("attendance is read-only for this user")]
    ReadOnly,

    /// Enrollment is not in the loaded roster
    #[error("enrollment {0} is not in the loaded roster")]
    UnknownEnrollment(EnrollmentId),

    /// Only absences can be justified
    #[error("enrollment {0} is not absent")]
    NotAbsent(EnrollmentId),

    /// The absence has not been saved yet
    #[error("enrollment {0} has an unsaved change")]
    PendingChange(EnrollmentId),

    /// Field-level validation errors
    #[error("invalid justification: {}", join_fields(.0))]
    Invalid(Vec<FieldError>),

    /// Request failed
    #[error("could not save justification: {0}")]
    Transport(TransportError),
}

impl JustificationError {
    /// Field errors, if this is a validation failure
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Invalid(errors) => errors,
            _ => &[],
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<JustificationRejection> for JustificationError {
    fn from(rejection: JustificationRejection) -> Self {
        match rejection {
            JustificationRejection::Invalid(errors) => Self::Invalid(errors),
            JustificationRejection::Transport(e) => Self::Transport(e),
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML did not parse
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values are inconsistent
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main error type of the attendance subsystem
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    /// Roster fetch failed
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// Staging failed
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// Commit failed
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// Justification failed
    #[error(transparent)]
    Justification(#[from] JustificationError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AttendanceError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Roster(e) => e.is_retryable(),
            Self::Commit(e) => e.is_retryable(),
            Self::Justification(e) => e.is_retryable(),
            Self::Overlay(_) | Self::Config(_) => false,
        }
    }

    /// Render as a user-facing notice
    #[must_use]
    pub fn notice(&self) -> Notice {
        Notice::error(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::justification::JustificationField;

    #[test]
    fn commit_error_display() {
        let err = CommitError::Rejected(TransportError::Request("connection reset".into()));
        assert!(err.to_string().contains("connection reset"));
        assert!(err.is_retryable());
        assert!(!CommitError::AlreadyInFlight.is_retryable());
        assert!(!CommitError::FetchInFlight.is_retryable());
    }

    #[test]
    fn roster_error_is_retryable() {
        assert!(RosterError::Fetch(TransportError::Timeout { duration_secs: 5 }).is_retryable());
        assert!(!RosterError::NoMorePages.is_retryable());
    }

    #[test]
    fn rejection_maps_to_sub_flow_error() {
        let rejection = JustificationRejection::Invalid(vec![FieldError::new(
            JustificationField::ReasonText,
            "too short",
        )]);
        let err = JustificationError::from(rejection);
        assert_eq!(err.field_errors().len(), 1);
        assert!(err.to_string().contains("reason_text: too short"));
    }

    #[test]
    fn attendance_error_notice() {
        let err = AttendanceError::from(OverlayError::ReadOnly);
        assert!(!err.is_retryable());
        assert!(err.notice().message.contains("read-only"));
    }
}
