//! Pending overlay of local, uncommitted attendance edits
//!
//! Maps an enrollment to the presence the user intends to record. A key is
//! present exactly when the user changed that row since the last successful
//! commit or refresh. The store is a plain value: it knows nothing about the
//! roster, rendering, or the server.

use crate::types::{AttendanceStatus, EnrollmentId};
use indexmap::IndexMap;
use serde::Serialize;

/// Pending local edits, in the order they were first staged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingOverlay {
    entries: IndexMap<EnrollmentId, bool>,
}

impl PendingOverlay {
    /// Create empty overlay
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an intended presence, overwriting any earlier edit.
    ///
    /// Returns the previously staged value.
    pub fn stage(&mut self, enrollment_id: EnrollmentId, intended_present: bool) -> Option<bool> {
        self.entries.insert(enrollment_id, intended_present)
    }

    /// Stage an intended status
    #[inline]
    pub fn stage_status(
        &mut self,
        enrollment_id: EnrollmentId,
        status: AttendanceStatus,
    ) -> Option<bool> {
        self.stage(enrollment_id, status.is_present())
    }

    /// Discard the edit for one enrollment.
    ///
    /// Keeps the relative order of the remaining entries.
    pub fn unstage(&mut self, enrollment_id: &EnrollmentId) -> Option<bool> {
        self.entries.shift_remove(enrollment_id)
    }

    /// Discard every edit
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of pending edits
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an edit is pending for this enrollment
    #[inline]
    #[must_use]
    pub fn contains(&self, enrollment_id: &EnrollmentId) -> bool {
        self.entries.contains_key(enrollment_id)
    }

    /// Intended presence for this enrollment
    #[inline]
    #[must_use]
    pub fn get(&self, enrollment_id: &EnrollmentId) -> Option<bool> {
        self.entries.get(enrollment_id).copied()
    }

    /// Intended status for this enrollment
    #[inline]
    #[must_use]
    pub fn intended_status(&self, enrollment_id: &EnrollmentId) -> Option<AttendanceStatus> {
        self.get(enrollment_id).map(AttendanceStatus::from_present)
    }

    /// Pending edits in staging order
    pub fn iter(&self) -> impl Iterator<Item = (&EnrollmentId, AttendanceStatus)> + '_ {
        self.entries
            .iter()
            .map(|(id, present)| (id, AttendanceStatus::from_present(*present)))
    }
}
