//! Attendance view: one open roster screen for one training session
//!
//! Owns the loaded roster, the pending overlay and the fetch/commit phases.
//! The state lock is never held across a collaborator call; re-entry during
//! a fetch or a commit is rejected by phase instead.

use crate::bulk::{self, BulkOutcome};
use crate::commit::{CommitCoordinator, CommitOutcome, CommitPhase, CommitStep};
use crate::config::AttendanceConfig;
use crate::error::{CommitError, JustificationError, OverlayError, RosterError};
use crate::justification::{JustificationForm, JustificationRecord};
use crate::merge::{self, EffectiveRecord};
use crate::overlay::PendingOverlay;
use crate::ports::{AttendanceTransport, JustificationService, RosterLoader};
use crate::stats::{self, AttendanceStats};
use crate::types::{
    AccessMode, AttendanceRecord, AttendanceStatus, EnrollmentId, RosterQuery, SessionRef,
    StatusFilter,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Backend collaborators of a view
#[derive(Clone)]
pub struct Collaborators {
    /// Roster source
    pub loader: Arc<dyn RosterLoader>,
    /// Batch sink
    pub transport: Arc<dyn AttendanceTransport>,
    /// Justification sink
    pub justifications: Arc<dyn JustificationService>,
}

impl Collaborators {
    /// Use one backend for every port
    #[must_use]
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: RosterLoader + AttendanceTransport + JustificationService + 'static,
    {
        Self {
            loader: backend.clone(),
            transport: backend.clone(),
            justifications: backend,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Roster fetch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPhase {
    /// No fetch in flight
    #[default]
    Idle,
    /// Fetch in flight
    Loading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    /// First page of a (possibly new) filter; overlay kept
    Load,
    /// Next page appended
    More,
    /// First page again; baseline reset
    Refresh,
}

/// Result of a roster fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    /// Rows received in this fetch
    pub received: usize,
    /// Rows now loaded
    pub loaded: usize,
    /// Rows matching the filter on the server
    pub total: usize,
}

/// Everything a renderer needs, computed from one consistent state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterSnapshot {
    /// Merged rows in server order
    pub records: Vec<EffectiveRecord>,
    /// Statistics over `records`
    pub stats: AttendanceStats,
    /// Pending edits, including rows outside the current window
    pub pending: usize,
    /// Rows matching the filter on the server
    pub total_count: usize,
    /// Commit phase
    pub phase: CommitPhase,
    /// Whether the commit action is enabled
    pub can_commit: bool,
    /// Whether "load more" is enabled
    pub can_load_more: bool,
}

#[derive(Debug, Default)]
struct ViewState {
    query: Option<RosterQuery>,
    records: Vec<AttendanceRecord>,
    /// Stored status of every enrollment loaded since the last baseline reset
    confirmed: HashMap<EnrollmentId, AttendanceStatus>,
    total_count: usize,
    overlay: PendingOverlay,
    fetch: FetchPhase,
    commit: CommitCoordinator,
}

impl ViewState {
    fn record(&self, enrollment_id: &EnrollmentId) -> Option<&AttendanceRecord> {
        self.records
            .iter()
            .find(|r| &r.enrollment_id == enrollment_id)
    }

    fn has_more(&self) -> bool {
        self.query.is_some() && self.records.len() < self.total_count
    }

    /// Forget rows of the replaced window that did not come back.
    ///
    /// Server order is stable, so a row listed before one that was returned
    /// again would have been returned too unless it left the session.
    fn prune_departed(&mut self, previous: &[AttendanceRecord]) {
        let Self {
            records, confirmed, ..
        } = self;
        let returned =
            |row: &AttendanceRecord| records.iter().any(|r| r.enrollment_id == row.enrollment_id);
        let Some(last_returned) = previous.iter().rposition(|row| returned(row)) else {
            return;
        };
        for row in &previous[..last_returned] {
            if !returned(row) && confirmed.remove(&row.enrollment_id).is_some() {
                tracing::debug!(enrollment_id = %row.enrollment_id, "enrollment left the roster");
            }
        }
    }

    fn ensure_editable(&self, enrollment_id: &EnrollmentId) -> Result<&AttendanceRecord, OverlayError> {
        if self.commit.is_in_flight() {
            return Err(OverlayError::CommitInFlight);
        }
        self.record(enrollment_id)
            .ok_or_else(|| OverlayError::UnknownEnrollment(enrollment_id.clone()))
    }
}

/// One open attendance screen
#[derive(Debug)]
pub struct AttendanceView {
    session: SessionRef,
    access: AccessMode,
    config: AttendanceConfig,
    collaborators: Collaborators,
    state: Mutex<ViewState>,
}

impl AttendanceView {
    /// Create a view with nothing loaded
    #[must_use]
    pub fn new(
        session: SessionRef,
        access: AccessMode,
        config: AttendanceConfig,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            session,
            access,
            config,
            collaborators,
            state: Mutex::new(ViewState::default()),
        }
    }

    /// Session this view is bound to
    #[inline]
    #[must_use]
    pub fn session(&self) -> &SessionRef {
        &self.session
    }

    /// Access mode
    #[inline]
    #[must_use]
    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AttendanceConfig {
        &self.config
    }

    /// Query of the current window, once something was loaded
    #[must_use]
    pub fn query(&self) -> Option<RosterQuery> {
        self.state.lock().query.clone()
    }

    /// Default first-page query from configuration
    #[must_use]
    pub fn default_query(&self) -> RosterQuery {
        RosterQuery::new(self.config.page_size)
    }

    // --- Roster loading ---

    /// Load the first page of `query`.
    ///
    /// Pending edits survive a filter change; rows that leave the window keep
    /// their overlay entry and are still committed.
    pub async fn load(&self, query: RosterQuery) -> Result<LoadOutcome, RosterError> {
        self.fetch(FetchKind::Load, Some(query.with_page(1))).await
    }

    /// Append the next page of the current query
    pub async fn load_more(&self) -> Result<LoadOutcome, RosterError> {
        self.fetch(FetchKind::More, None).await
    }

    /// Reload the first page and discard every pending edit
    pub async fn refresh(&self) -> Result<LoadOutcome, RosterError> {
        self.fetch(FetchKind::Refresh, None).await
    }

    async fn fetch(
        &self,
        kind: FetchKind,
        requested: Option<RosterQuery>,
    ) -> Result<LoadOutcome, RosterError> {
        let query = {
            let mut state = self.state.lock();
            if state.fetch == FetchPhase::Loading {
                return Err(RosterError::AlreadyLoading);
            }
            // Rows fetched now could predate the batch once it lands.
            if state.commit.is_in_flight() {
                return Err(RosterError::CommitInFlight);
            }
            let current = state.query.clone().unwrap_or_else(|| self.default_query());
            let query = match kind {
                FetchKind::Load => requested.unwrap_or(current),
                FetchKind::More => {
                    if !state.has_more() {
                        return Err(RosterError::NoMorePages);
                    }
                    let next = current.page + 1;
                    current.with_page(next)
                }
                FetchKind::Refresh => current.with_page(1),
            };
            state.fetch = FetchPhase::Loading;
            query
        };

        tracing::debug!(session_id = %self.session.id, ?kind, page = query.page, "fetching attendance");
        let result = self
            .collaborators
            .loader
            .fetch_attendance(&self.session.id, &query)
            .await;

        let mut state = self.state.lock();
        state.fetch = FetchPhase::Idle;
        let page = result.map_err(|e| {
            tracing::warn!(session_id = %self.session.id, error = %e, "attendance fetch failed");
            RosterError::Fetch(e)
        })?;

        let received = page.items.len();
        if kind != FetchKind::More {
            // Fresh rows supersede a settled batch.
            state
                .commit
                .reset()
                .map_err(|_| RosterError::CommitInFlight)?;
        }
        let previous = match kind {
            FetchKind::More => {
                state.records.extend(page.items);
                Vec::new()
            }
            FetchKind::Load => std::mem::replace(&mut state.records, page.items),
            FetchKind::Refresh => {
                state.confirmed.clear();
                state.overlay.clear();
                std::mem::replace(&mut state.records, page.items)
            }
        };
        let fresh: Vec<_> = state
            .records
            .iter()
            .map(|r| (r.enrollment_id.clone(), r.status))
            .collect();
        state.confirmed.extend(fresh);
        let same_window = state
            .query
            .as_ref()
            .is_some_and(|prior| prior.same_filter(&query));
        if kind == FetchKind::Load && same_window && query.status == StatusFilter::All {
            state.prune_departed(&previous);
        }
        if kind != FetchKind::More && query.is_unfiltered() && received == page.count {
            // One response holds the whole roster; anything else was unenrolled.
            let ViewState {
                records, confirmed, ..
            } = &mut *state;
            confirmed.retain(|id, _| records.iter().any(|r| &r.enrollment_id == id));
        }
        state.total_count = page.count;
        state.query = Some(query);

        tracing::info!(
            session_id = %self.session.id,
            received,
            loaded = state.records.len(),
            total = page.count,
            "attendance loaded"
        );
        Ok(LoadOutcome {
            received,
            loaded: state.records.len(),
            total: page.count,
        })
    }

    // --- Overlay mutations ---

    fn ensure_manage<E>(&self, read_only: E) -> Result<(), E> {
        if self.access.can_manage() {
            Ok(())
        } else {
            Err(read_only)
        }
    }

    /// Stage an intended presence for a loaded row
    pub fn stage(&self, enrollment_id: &EnrollmentId, present: bool) -> Result<(), OverlayError> {
        self.ensure_manage(OverlayError::ReadOnly)?;
        let mut state = self.state.lock();
        state.ensure_editable(enrollment_id)?;
        state.overlay.stage(enrollment_id.clone(), present);
        tracing::debug!(%enrollment_id, present, pending = state.overlay.len(), "staged");
        Ok(())
    }

    /// Flip the effective status of a loaded row; returns the new status
    pub fn toggle(&self, enrollment_id: &EnrollmentId) -> Result<AttendanceStatus, OverlayError> {
        self.ensure_manage(OverlayError::ReadOnly)?;
        let mut state = self.state.lock();
        let record = state.ensure_editable(enrollment_id)?;
        let next = merge::effective_status(record, &state.overlay).toggled();
        state.overlay.stage_status(enrollment_id.clone(), next);
        tracing::debug!(%enrollment_id, status = %next, pending = state.overlay.len(), "toggled");
        Ok(next)
    }

    /// Discard the pending edit of one row; returns whether one existed
    pub fn unstage(&self, enrollment_id: &EnrollmentId) -> Result<bool, OverlayError> {
        self.ensure_manage(OverlayError::ReadOnly)?;
        let mut state = self.state.lock();
        if state.commit.is_in_flight() {
            return Err(OverlayError::CommitInFlight);
        }
        Ok(state.overlay.unstage(enrollment_id).is_some())
    }

    /// Stage `target` for every row in the current window
    pub fn apply_bulk(&self, target: AttendanceStatus) -> Result<BulkOutcome, OverlayError> {
        self.ensure_manage(OverlayError::ReadOnly)?;
        let mut state = self.state.lock();
        if state.commit.is_in_flight() {
            return Err(OverlayError::CommitInFlight);
        }
        let ViewState {
            records, overlay, ..
        } = &mut *state;
        Ok(bulk::apply_bulk(target, records.iter(), overlay))
    }

    // --- Commit ---

    /// Send every pending edit as one batch.
    ///
    /// On success the overlay is empty and [`Self::is_stale`] is true until
    /// the next [`Self::refresh`]. On failure the overlay is unchanged.
    pub async fn commit(&self) -> Result<CommitOutcome, CommitError> {
        self.ensure_manage(CommitError::ReadOnly)?;

        let ticket = {
            let mut state = self.state.lock();
            // Baseline statuses are being replaced.
            if state.fetch == FetchPhase::Loading {
                return Err(CommitError::FetchInFlight);
            }
            let ViewState {
                overlay,
                confirmed,
                commit,
                ..
            } = &mut *state;
            match commit.begin(overlay, confirmed, self.config.skip_unchanged)? {
                CommitStep::Submit(ticket) => ticket,
                CommitStep::Settled(outcome) => {
                    tracing::info!(session_id = %self.session.id, "nothing changed, commit settled locally");
                    return Ok(outcome);
                }
            }
        };

        tracing::debug!(session_id = %self.session.id, updates = ticket.updates().len(), "submitting attendance batch");
        let result = self
            .collaborators
            .transport
            .submit_batch(&self.session.id, ticket.updates())
            .await;

        let mut state = self.state.lock();
        let ViewState {
            overlay,
            confirmed,
            commit,
            ..
        } = &mut *state;
        match commit.finish(ticket, result, overlay) {
            Ok(outcome) => {
                for update in &outcome.submitted {
                    confirmed.insert(update.enrollment_id.clone(), update.status);
                }
                tracing::info!(
                    session_id = %self.session.id,
                    submitted = outcome.submitted.len(),
                    dropped = outcome.dropped_stale.len(),
                    unchanged = outcome.unchanged.len(),
                    "attendance committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session.id, error = %e, pending = overlay.len(), "attendance commit failed");
                Err(e)
            }
        }
    }

    // --- Justification ---

    /// Open a justification form for a confirmed absence
    pub fn open_justification(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<JustificationForm, JustificationError> {
        self.ensure_manage(JustificationError::ReadOnly)?;
        let state = self.state.lock();
        let record = state
            .record(enrollment_id)
            .ok_or_else(|| JustificationError::UnknownEnrollment(enrollment_id.clone()))?;
        JustificationForm::open(&merge::merge_one(record, &state.overlay), self.session.date)
    }

    /// Validate and submit a justification.
    ///
    /// Eligibility is checked again, since the row may have been edited while
    /// the form was open.
    pub async fn submit_justification(
        &self,
        form: &JustificationForm,
        category: &str,
        reason_text: &str,
    ) -> Result<JustificationRecord, JustificationError> {
        self.ensure_manage(JustificationError::ReadOnly)?;
        let record = form.build(category, reason_text, &self.config.justification)?;
        self.open_justification(&form.enrollment_id)?;

        self.collaborators
            .justifications
            .create_justification(&record)
            .await
            .map_err(|e| {
                tracing::warn!(enrollment_id = %record.enrollment_id, error = %e, "justification rejected");
                JustificationError::from(e)
            })?;

        tracing::info!(enrollment_id = %record.enrollment_id, category = %record.reason_category, "absence justified");
        Ok(record)
    }

    // --- Derived state ---

    /// Server rows of the current window
    #[must_use]
    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.state.lock().records.clone()
    }

    /// Copy of the pending overlay
    #[must_use]
    pub fn overlay(&self) -> PendingOverlay {
        self.state.lock().overlay.clone()
    }

    /// Merged rows of the current window
    #[must_use]
    pub fn effective_records(&self) -> Vec<EffectiveRecord> {
        let state = self.state.lock();
        merge::merge(&state.records, &state.overlay)
    }

    /// Statistics over the merged window
    #[must_use]
    pub fn stats(&self) -> AttendanceStats {
        stats::stats(&self.effective_records())
    }

    /// Number of pending edits
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().overlay.len()
    }

    /// Commit phase
    #[must_use]
    pub fn commit_phase(&self) -> CommitPhase {
        self.state.lock().commit.phase()
    }

    /// Whether the roster must be re-fetched after a commit
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.state.lock().commit.is_stale()
    }

    /// Whether the commit action is enabled
    #[must_use]
    pub fn can_commit(&self) -> bool {
        let state = self.state.lock();
        self.access.can_manage()
            && !state.overlay.is_empty()
            && !state.commit.is_in_flight()
            && state.fetch == FetchPhase::Idle
    }

    /// Whether "load more" is enabled
    #[must_use]
    pub fn can_load_more(&self) -> bool {
        let state = self.state.lock();
        state.fetch == FetchPhase::Idle && !state.commit.is_in_flight() && state.has_more()
    }

    /// Consistent render snapshot
    #[must_use]
    pub fn snapshot(&self) -> RosterSnapshot {
        let state = self.state.lock();
        let records = merge::merge(&state.records, &state.overlay);
        RosterSnapshot {
            stats: stats::stats(&records),
            records,
            pending: state.overlay.len(),
            total_count: state.total_count,
            phase: state.commit.phase(),
            can_commit: self.access.can_manage()
                && !state.overlay.is_empty()
                && !state.commit.is_in_flight()
                && state.fetch == FetchPhase::Idle,
            can_load_more: state.fetch == FetchPhase::Idle
                && !state.commit.is_in_flight()
                && state.has_more(),
        }
    }
}
