//! Merge engine: server records overlaid with pending edits
//!
//! Pure functions only. The effective status computed here is the only status
//! that is ever rendered or counted.

use crate::overlay::PendingOverlay;
use crate::types::{AttendanceRecord, AttendanceStatus, EnrollmentId};
use serde::Serialize;

/// A server record with its overlay applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveRecord {
    /// Server-confirmed record, untouched
    pub record: AttendanceRecord,
    /// Overlay value if one is pending, server value otherwise
    pub effective_status: AttendanceStatus,
    /// Whether an uncommitted edit exists for this row
    pub has_pending_change: bool,
}

impl EffectiveRecord {
    /// Enrollment of this row
    #[inline]
    #[must_use]
    pub fn enrollment_id(&self) -> &EnrollmentId {
        &self.record.enrollment_id
    }

    /// Whether this row counts as present
    #[inline]
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.effective_status.is_present()
    }

    /// A confirmed absence with nothing pending
    #[inline]
    #[must_use]
    pub fn is_justifiable(&self) -> bool {
        self.effective_status == AttendanceStatus::Absent && !self.has_pending_change
    }
}

/// Effective status of a single record
#[inline]
#[must_use]
pub fn effective_status(record: &AttendanceRecord, overlay: &PendingOverlay) -> AttendanceStatus {
    overlay
        .intended_status(&record.enrollment_id)
        .unwrap_or(record.status)
}

/// Overlay one record
#[must_use]
pub fn merge_one(record: &AttendanceRecord, overlay: &PendingOverlay) -> EffectiveRecord {
    EffectiveRecord {
        record: record.clone(),
        effective_status: effective_status(record, overlay),
        has_pending_change: overlay.contains(&record.enrollment_id),
    }
}

/// Overlay every record, preserving order
#[must_use]
pub fn merge(records: &[AttendanceRecord], overlay: &PendingOverlay) -> Vec<EffectiveRecord> {
    records.iter().map(|r| merge_one(r, overlay)).collect()
}
