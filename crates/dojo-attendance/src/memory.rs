//! In-memory backend
//!
//! Implements every collaborator port over a process-local table. Batches
//! are applied all-or-nothing. Used by the simulator, demos and tests; it
//! supports failure injection and holding a commit in flight.

use crate::error::{JustificationRejection, TransportError};
use crate::justification::{FieldError, JustificationField, JustificationRecord};
use crate::ports::{AttendanceTransport, JustificationService, RosterLoader};
use crate::types::{
    AttendanceId, AttendanceRecord, AttendanceStatus, AttendanceUpdate, EnrollmentId, RosterPage,
    RosterQuery, SessionId, SessionRef,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// Call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCalls {
    /// Roster fetches
    pub fetches: usize,
    /// Batch submissions
    pub commits: usize,
    /// Justification submissions
    pub justifications: usize,
}

#[derive(Debug, Default)]
struct BackendState {
    rosters: HashMap<SessionId, Vec<AttendanceRecord>>,
    /// Session dates; justifications resolve their row through these
    dates: HashMap<SessionId, NaiveDate>,
    justifications: Vec<JustificationRecord>,
    fail_fetches: usize,
    fail_commits: usize,
    calls: BackendCalls,
}

/// Process-local attendance backend
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    commit_gate: Option<Arc<Notify>>,
}

impl InMemoryBackend {
    /// Create empty backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every batch until the gate is notified
    #[inline]
    #[must_use]
    pub fn with_commit_gate(mut self, gate: Arc<Notify>) -> Self {
        self.commit_gate = Some(gate);
        self
    }

    /// Register a session and its date
    pub fn schedule(&self, session: &SessionRef) {
        let mut state = self.state.lock();
        state.dates.insert(session.id.clone(), session.date);
        state.rosters.entry(session.id.clone()).or_default();
    }

    /// Replace a session roster
    pub fn seed(&self, session_id: &SessionId, records: Vec<AttendanceRecord>) {
        self.state.lock().rosters.insert(session_id.clone(), records);
    }

    /// Add one student to a session with a fresh attendance id
    pub fn enroll(
        &self,
        session_id: &SessionId,
        enrollment_id: impl Into<EnrollmentId>,
        name: &str,
        status: AttendanceStatus,
    ) -> AttendanceId {
        let id = AttendanceId::new(uuid::Uuid::new_v4().to_string());
        let email = format!("{}@dojo.test", name.to_lowercase().replace(' ', "."));
        let record = AttendanceRecord::new(id.clone(), enrollment_id, name, email, status);
        self.state
            .lock()
            .rosters
            .entry(session_id.clone())
            .or_default()
            .push(record);
        id
    }

    /// Remove a student from a session, as a concurrent unenrollment would
    pub fn unenroll(&self, session_id: &SessionId, enrollment_id: &EnrollmentId) -> bool {
        let mut state = self.state.lock();
        let Some(roster) = state.rosters.get_mut(session_id) else {
            return false;
        };
        let before = roster.len();
        roster.retain(|r| &r.enrollment_id != enrollment_id);
        roster.len() != before
    }

    /// Current stored rows of a session
    #[must_use]
    pub fn roster(&self, session_id: &SessionId) -> Vec<AttendanceRecord> {
        self.state
            .lock()
            .rosters
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Stored status of one enrollment
    #[must_use]
    pub fn status_of(
        &self,
        session_id: &SessionId,
        enrollment_id: &EnrollmentId,
    ) -> Option<AttendanceStatus> {
        self.state
            .lock()
            .rosters
            .get(session_id)?
            .iter()
            .find(|r| &r.enrollment_id == enrollment_id)
            .map(|r| r.status)
    }

    /// Stored justifications
    #[must_use]
    pub fn justifications(&self) -> Vec<JustificationRecord> {
        self.state.lock().justifications.clone()
    }

    /// Fail the next `n` roster fetches
    pub fn fail_next_fetches(&self, n: usize) {
        self.state.lock().fail_fetches = n;
    }

    /// Fail the next `n` batch submissions
    pub fn fail_next_commits(&self, n: usize) {
        self.state.lock().fail_commits = n;
    }

    /// Call counters
    #[must_use]
    pub fn calls(&self) -> BackendCalls {
        self.state.lock().calls
    }
}

fn take_failure(counter: &mut usize) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl RosterLoader for InMemoryBackend {
    async fn fetch_attendance(
        &self,
        session_id: &SessionId,
        query: &RosterQuery,
    ) -> Result<RosterPage, TransportError> {
        let mut state = self.state.lock();
        state.calls.fetches += 1;
        if take_failure(&mut state.fail_fetches) {
            return Err(TransportError::Request("roster service unavailable".to_string()));
        }

        let matching: Vec<&AttendanceRecord> = state
            .rosters
            .get(session_id)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).collect())
            .unwrap_or_default();

        Ok(RosterPage {
            count: matching.len(),
            items: matching
                .into_iter()
                .skip(query.offset())
                .take(query.page_size as usize)
                .cloned()
                .collect(),
        })
    }
}

#[async_trait]
impl AttendanceTransport for InMemoryBackend {
    async fn submit_batch(
        &self,
        session_id: &SessionId,
        updates: &[AttendanceUpdate],
    ) -> Result<(), TransportError> {
        self.state.lock().calls.commits += 1;

        if let Some(gate) = &self.commit_gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        if take_failure(&mut state.fail_commits) {
            return Err(TransportError::Rejected {
                status: 503,
                message: "attendance service unavailable".to_string(),
            });
        }

        let Some(roster) = state.rosters.get_mut(session_id) else {
            return Err(TransportError::Rejected {
                status: 404,
                message: format!("session {session_id} not found"),
            });
        };

        // Resolve everything before writing anything.
        let mut targets = Vec::with_capacity(updates.len());
        for update in updates {
            let Some(idx) = roster
                .iter()
                .position(|r| r.enrollment_id == update.enrollment_id)
            else {
                return Err(TransportError::Rejected {
                    status: 422,
                    message: format!("enrollment {} not in session", update.enrollment_id),
                });
            };
            targets.push((idx, update.status));
        }

        for (idx, status) in targets {
            let row = &mut roster[idx];
            row.status = status;
            if status == AttendanceStatus::Present {
                row.notes = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl JustificationService for InMemoryBackend {
    async fn create_justification(
        &self,
        record: &JustificationRecord,
    ) -> Result<(), JustificationRejection> {
        let mut state = self.state.lock();
        state.calls.justifications += 1;

        let BackendState { rosters, dates, .. } = &mut *state;
        let mut rows: Vec<&mut AttendanceRecord> = rosters
            .iter_mut()
            .filter(|(session_id, _)| dates.get(*session_id) == Some(&record.date))
            .flat_map(|(_, rows)| rows.iter_mut())
            .filter(|r| r.enrollment_id == record.enrollment_id)
            .collect();
        if rows.is_empty() {
            return Err(JustificationRejection::Invalid(vec![FieldError::new(
                JustificationField::EnrollmentId,
                "no attendance for this enrollment on that date",
            )]));
        }
        rows.retain(|r| r.status == AttendanceStatus::Absent);
        if rows.is_empty() {
            return Err(JustificationRejection::Invalid(vec![FieldError::new(
                JustificationField::EnrollmentId,
                "attendance is not an absence",
            )]));
        }
        for row in rows {
            row.notes = Some(record.summary());
        }

        state.justifications.retain(|j| {
            !(j.enrollment_id == record.enrollment_id && j.date == record.date)
        });
        state.justifications.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::justification::ReasonCategory;
    use crate::types::StatusFilter;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn backend() -> (InMemoryBackend, SessionId) {
        let session = SessionId::new("s1");
        let backend = InMemoryBackend::new();
        backend.schedule(&SessionRef::new(session.clone(), date(14)));
        backend.enroll(&session, "e1", "Ana Lima", AttendanceStatus::Absent);
        backend.enroll(&session, "e2", "Bruno Costa", AttendanceStatus::Present);
        backend.enroll(&session, "e3", "Carla Dias", AttendanceStatus::Absent);
        (backend, session)
    }

    #[tokio::test]
    async fn fetch_filters_and_pages() {
        let (backend, session) = backend();

        let page = backend
            .fetch_attendance(&session, &RosterQuery::new(2))
            .await
            .unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.items.len(), 2);

        let page = backend
            .fetch_attendance(&session, &RosterQuery::new(2).with_page(2))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);

        let absent = RosterQuery::new(10).with_status(StatusFilter::Absent);
        let page = backend.fetch_attendance(&session, &absent).await.unwrap();
        assert_eq!(page.count, 2);
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let (backend, session) = backend();
        let updates = vec![
            AttendanceUpdate {
                enrollment_id: "e1".into(),
                status: AttendanceStatus::Present,
            },
            AttendanceUpdate {
                enrollment_id: "missing".into(),
                status: AttendanceStatus::Present,
            },
        ];

        let err = backend.submit_batch(&session, &updates).await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 422, .. }));
        assert_eq!(
            backend.status_of(&session, &"e1".into()),
            Some(AttendanceStatus::Absent)
        );

        backend.submit_batch(&session, &updates[..1]).await.unwrap();
        assert_eq!(
            backend.status_of(&session, &"e1".into()),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(backend.calls().commits, 2);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let (backend, session) = backend();
        backend.fail_next_fetches(1);

        assert!(backend
            .fetch_attendance(&session, &RosterQuery::new(10))
            .await
            .is_err());
        assert!(backend
            .fetch_attendance(&session, &RosterQuery::new(10))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn justification_writes_notes() {
        let (backend, session) = backend();
        let record = JustificationRecord {
            date: date(14),
            enrollment_id: "e1".into(),
            reason_category: ReasonCategory::Family,
            reason_text: "family emergency".to_string(),
        };

        backend.create_justification(&record).await.unwrap();
        let row = backend
            .roster(&session)
            .into_iter()
            .find(|r| r.enrollment_id.as_str() == "e1")
            .unwrap();
        assert_eq!(row.notes.as_deref(), Some("family: family emergency"));

        let present = JustificationRecord {
            enrollment_id: "e2".into(),
            ..record
        };
        assert!(matches!(
            backend.create_justification(&present).await,
            Err(JustificationRejection::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn justification_lands_on_the_session_of_its_date() {
        let (backend, first) = backend();
        let second = SessionRef::new("s2", date(21));
        backend.schedule(&second);
        backend.enroll(&second.id, "e1", "Ana Lima", AttendanceStatus::Absent);
        backend.enroll(&second.id, "e2", "Bruno Costa", AttendanceStatus::Absent);

        let notes = |session: &SessionId, id: &str| {
            backend
                .roster(session)
                .into_iter()
                .find(|r| r.enrollment_id.as_str() == id)
                .and_then(|r| r.notes)
        };

        let record = JustificationRecord {
            date: date(14),
            enrollment_id: "e1".into(),
            reason_category: ReasonCategory::Medical,
            reason_text: "sprained ankle".to_string(),
        };
        backend.create_justification(&record).await.unwrap();
        assert_eq!(notes(&first, "e1").as_deref(), Some("medical: sprained ankle"));
        assert_eq!(notes(&second.id, "e1"), None);

        // Present on the 14th, absent on the 21st.
        let later = JustificationRecord {
            date: date(21),
            enrollment_id: "e2".into(),
            ..record.clone()
        };
        backend.create_justification(&later).await.unwrap();
        assert_eq!(notes(&second.id, "e2").as_deref(), Some("medical: sprained ankle"));
        assert_eq!(notes(&first, "e2"), None);

        let unscheduled = JustificationRecord {
            date: date(28),
            ..record
        };
        assert!(matches!(
            backend.create_justification(&unscheduled).await,
            Err(JustificationRejection::Invalid(_))
        ));
    }
}
