//! Commit coordinator: flushes the pending overlay as one atomic batch
//!
//! Phases:
//! - `Idle`: nothing in flight, roster is the current baseline
//! - `Committing`: batch request in flight; a second commit is rejected
//! - `Settled`: batch stored, overlay cleared, roster must be re-fetched
//!
//! The coordinator never awaits anything itself. [`CommitCoordinator::begin`]
//! builds the payload and enters `Committing`; the caller sends the batch and
//! hands the result to [`CommitCoordinator::finish`]. This keeps the in-flight
//! guard independent of how long the request takes.

use crate::error::{CommitError, TransportError};
use crate::notice::{students, Notice};
use crate::overlay::PendingOverlay;
use crate::types::{AttendanceStatus, AttendanceUpdate, EnrollmentId};
use serde::Serialize;
use std::collections::HashMap;

/// Commit state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPhase {
    /// No batch in flight
    #[default]
    Idle,
    /// Batch request in flight
    Committing,
    /// Batch stored; roster is stale until the next reload
    Settled,
}

/// Phases reachable from `from`
#[must_use]
pub fn allowed_transitions(from: CommitPhase) -> &'static [CommitPhase] {
    use CommitPhase::{Committing, Idle, Settled};
    match from {
        Idle => &[Committing],
        Committing => &[Settled, Idle],
        // Edits staged before the reload may be committed right away.
        Settled => &[Committing, Idle],
    }
}

/// Validates a phase transition
pub fn validate_transition(from: CommitPhase, to: CommitPhase) -> Result<(), CommitError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(CommitError::IllegalTransition { from, to })
    }
}

/// Payload derived from the overlay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitPlan {
    /// Updates to send, in staging order
    pub updates: Vec<AttendanceUpdate>,
    /// Overlay entries whose enrollment is no longer loaded
    pub dropped_stale: Vec<EnrollmentId>,
    /// Overlay entries equal to the confirmed status
    pub unchanged: Vec<EnrollmentId>,
}

impl CommitPlan {
    /// Whether there is nothing to send
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    fn into_outcome(self, sent_request: bool) -> CommitOutcome {
        CommitOutcome {
            submitted: self.updates,
            dropped_stale: self.dropped_stale,
            unchanged: self.unchanged,
            sent_request,
        }
    }
}

/// Resolve every overlay entry against the confirmed roster statuses.
///
/// Entries for enrollments missing from `confirmed` are dropped. When
/// `skip_unchanged` is set, entries matching the confirmed status are left out
/// of the batch.
#[must_use]
pub fn build_batch(
    overlay: &PendingOverlay,
    confirmed: &HashMap<EnrollmentId, AttendanceStatus>,
    skip_unchanged: bool,
) -> CommitPlan {
    let mut plan = CommitPlan::default();

    for (enrollment_id, status) in overlay.iter() {
        let Some(server_status) = confirmed.get(enrollment_id) else {
            tracing::debug!(%enrollment_id, "dropping overlay entry for enrollment not in roster");
            plan.dropped_stale.push(enrollment_id.clone());
            continue;
        };
        if skip_unchanged && *server_status == status {
            plan.unchanged.push(enrollment_id.clone());
            continue;
        }
        plan.updates.push(AttendanceUpdate {
            enrollment_id: enrollment_id.clone(),
            status,
        });
    }

    plan
}

/// Result of a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    /// Updates the server accepted
    pub submitted: Vec<AttendanceUpdate>,
    /// Entries dropped because their enrollment left the roster
    pub dropped_stale: Vec<EnrollmentId>,
    /// Entries that matched the stored status
    pub unchanged: Vec<EnrollmentId>,
    /// Whether a batch request was made
    pub sent_request: bool,
}

impl CommitOutcome {
    /// Success notice
    #[must_use]
    pub fn notice(&self) -> Notice {
        if self.sent_request {
            Notice::success(format!("Attendance saved for {}", students(self.submitted.len())))
        } else {
            Notice::info("No attendance changes to save")
        }
    }
}

/// An accepted commit whose batch is in flight
#[derive(Debug)]
pub struct CommitTicket {
    plan: CommitPlan,
    resume: CommitPhase,
}

impl CommitTicket {
    /// Batch to send
    #[inline]
    #[must_use]
    pub fn updates(&self) -> &[AttendanceUpdate] {
        &self.plan.updates
    }
}

/// What [`CommitCoordinator::begin`] decided
#[derive(Debug)]
pub enum CommitStep {
    /// Send the batch, then call [`CommitCoordinator::finish`]
    Submit(CommitTicket),
    /// Every entry was stale or unchanged; the overlay was cleared locally
    Settled(CommitOutcome),
}

/// Commit state machine
#[derive(Debug, Default)]
pub struct CommitCoordinator {
    phase: CommitPhase,
}

impl CommitCoordinator {
    /// Create idle coordinator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> CommitPhase {
        self.phase
    }

    /// Whether a batch is in flight
    #[inline]
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.phase == CommitPhase::Committing
    }

    /// Whether the roster must be re-fetched
    #[inline]
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.phase == CommitPhase::Settled
    }

    fn transition(&mut self, to: CommitPhase) -> Result<(), CommitError> {
        validate_transition(self.phase, to)?;
        tracing::trace!(from = ?self.phase, ?to, "commit phase");
        self.phase = to;
        Ok(())
    }

    /// Start a commit.
    ///
    /// # Errors
    /// - `CommitError::AlreadyInFlight` while a batch is in flight
    /// - `CommitError::NothingToCommit` if the overlay is empty
    pub fn begin(
        &mut self,
        overlay: &mut PendingOverlay,
        confirmed: &HashMap<EnrollmentId, AttendanceStatus>,
        skip_unchanged: bool,
    ) -> Result<CommitStep, CommitError> {
        if self.is_in_flight() {
            return Err(CommitError::AlreadyInFlight);
        }
        if overlay.is_empty() {
            return Err(CommitError::NothingToCommit);
        }

        let plan = build_batch(overlay, confirmed, skip_unchanged);
        if plan.is_empty() {
            overlay.clear();
            return Ok(CommitStep::Settled(plan.into_outcome(false)));
        }

        let resume = self.phase;
        self.transition(CommitPhase::Committing)?;
        Ok(CommitStep::Submit(CommitTicket { plan, resume }))
    }

    /// Apply the batch result.
    ///
    /// Success clears the whole overlay and marks the roster stale. Failure
    /// leaves the overlay untouched and returns to the phase the commit
    /// started from.
    pub fn finish(
        &mut self,
        ticket: CommitTicket,
        result: Result<(), TransportError>,
        overlay: &mut PendingOverlay,
    ) -> Result<CommitOutcome, CommitError> {
        match result {
            Ok(()) => {
                self.transition(CommitPhase::Settled)?;
                overlay.clear();
                Ok(ticket.plan.into_outcome(true))
            }
            Err(e) => {
                self.transition(ticket.resume)?;
                Err(CommitError::Rejected(e))
            }
        }
    }

    /// Back to `Idle` after a reload.
    ///
    /// # Errors
    /// `CommitError::AlreadyInFlight` while a batch is in flight
    pub fn reset(&mut self) -> Result<(), CommitError> {
        match self.phase {
            CommitPhase::Idle => Ok(()),
            CommitPhase::Committing => Err(CommitError::AlreadyInFlight),
            CommitPhase::Settled => self.transition(CommitPhase::Idle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttendanceStatus::{Absent, Present};

    fn confirmed(entries: &[(&str, AttendanceStatus)]) -> HashMap<EnrollmentId, AttendanceStatus> {
        entries.iter().map(|(id, s)| (EnrollmentId::new(*id), *s)).collect()
    }

    fn overlay(entries: &[(&str, bool)]) -> PendingOverlay {
        let mut overlay = PendingOverlay::new();
        for (id, present) in entries {
            overlay.stage(EnrollmentId::new(*id), *present);
        }
        overlay
    }

    fn submit(step: CommitStep) -> CommitTicket {
        match step {
            CommitStep::Submit(ticket) => ticket,
            CommitStep::Settled(outcome) => panic!("expected submit, got {outcome:?}"),
        }
    }

    #[test]
    fn transition_table() {
        assert!(validate_transition(CommitPhase::Idle, CommitPhase::Committing).is_ok());
        assert!(validate_transition(CommitPhase::Committing, CommitPhase::Idle).is_ok());
        assert!(validate_transition(CommitPhase::Idle, CommitPhase::Settled).is_err());
        assert!(validate_transition(CommitPhase::Committing, CommitPhase::Committing).is_err());
    }

    #[test]
    fn batch_drops_stale_and_unchanged() {
        let roster = confirmed(&[("a", Absent), ("b", Present)]);
        let pending = overlay(&[("a", true), ("b", true), ("gone", false)]);

        let plan = build_batch(&pending, &roster, true);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].enrollment_id.as_str(), "a");
        assert_eq!(plan.unchanged, vec![EnrollmentId::new("b")]);
        assert_eq!(plan.dropped_stale, vec![EnrollmentId::new("gone")]);

        let plan = build_batch(&pending, &roster, false);
        assert_eq!(plan.updates.len(), 2);
    }

    #[test]
    fn success_clears_overlay_and_settles() {
        let roster = confirmed(&[("a", Absent), ("b", Absent)]);
        let mut pending = overlay(&[("a", true), ("b", true)]);
        let mut coordinator = CommitCoordinator::new();

        let ticket = submit(coordinator.begin(&mut pending, &roster, true).unwrap());
        assert!(coordinator.is_in_flight());
        assert_eq!(ticket.updates().len(), 2);

        let outcome = coordinator.finish(ticket, Ok(()), &mut pending).unwrap();
        assert!(pending.is_empty());
        assert!(coordinator.is_stale());
        assert!(outcome.sent_request);
        assert_eq!(outcome.submitted.len(), 2);
    }

    #[test]
    fn failure_preserves_overlay() {
        let roster = confirmed(&[("a", Absent), ("b", Absent)]);
        let mut pending = overlay(&[("a", true), ("b", false)]);
        let before = pending.clone();
        let mut coordinator = CommitCoordinator::new();

        let ticket = submit(coordinator.begin(&mut pending, &roster, false).unwrap());
        let err = coordinator
            .finish(ticket, Err(TransportError::Request("offline".into())), &mut pending)
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(pending, before);
        assert_eq!(coordinator.phase(), CommitPhase::Idle);
    }

    #[test]
    fn second_begin_while_in_flight_is_rejected() {
        let roster = confirmed(&[("a", Absent)]);
        let mut pending = overlay(&[("a", true)]);
        let mut coordinator = CommitCoordinator::new();

        let _ticket = submit(coordinator.begin(&mut pending, &roster, true).unwrap());
        assert_eq!(
            coordinator.begin(&mut pending, &roster, true).unwrap_err(),
            CommitError::AlreadyInFlight
        );
    }

    #[test]
    fn empty_overlay_is_rejected() {
        let mut coordinator = CommitCoordinator::new();
        let err = coordinator
            .begin(&mut PendingOverlay::new(), &HashMap::new(), true)
            .unwrap_err();
        assert_eq!(err, CommitError::NothingToCommit);
    }

    #[test]
    fn all_unchanged_settles_without_request() {
        let roster = confirmed(&[("a", Present)]);
        let mut pending = overlay(&[("a", true)]);
        let mut coordinator = CommitCoordinator::new();

        match coordinator.begin(&mut pending, &roster, true).unwrap() {
            CommitStep::Settled(outcome) => {
                assert!(!outcome.sent_request);
                assert_eq!(outcome.unchanged.len(), 1);
            }
            CommitStep::Submit(_) => panic!("nothing should be sent"),
        }
        assert!(pending.is_empty());
        assert_eq!(coordinator.phase(), CommitPhase::Idle);
    }

    #[test]
    fn failure_after_settled_keeps_roster_stale() {
        let roster = confirmed(&[("a", Absent), ("b", Absent)]);
        let mut pending = overlay(&[("a", true)]);
        let mut coordinator = CommitCoordinator::new();

        let ticket = submit(coordinator.begin(&mut pending, &roster, true).unwrap());
        coordinator.finish(ticket, Ok(()), &mut pending).unwrap();

        pending.stage("b".into(), true);
        let ticket = submit(coordinator.begin(&mut pending, &roster, true).unwrap());
        coordinator
            .finish(ticket, Err(TransportError::Timeout { duration_secs: 30 }), &mut pending)
            .unwrap_err();

        assert!(coordinator.is_stale());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn reset_after_settle() {
        let mut coordinator = CommitCoordinator::new();
        assert!(coordinator.reset().is_ok());

        let roster = confirmed(&[("a", Absent)]);
        let mut pending = overlay(&[("a", true)]);
        let ticket = submit(coordinator.begin(&mut pending, &roster, true).unwrap());
        assert_eq!(coordinator.reset().unwrap_err(), CommitError::AlreadyInFlight);

        coordinator.finish(ticket, Ok(()), &mut pending).unwrap();
        coordinator.reset().unwrap();
        assert_eq!(coordinator.phase(), CommitPhase::Idle);
    }
}
