//! Bulk "mark all present / absent" over the visible roster
//!
//! Only the records handed in are staged; anything filtered out or on an
//! unloaded page keeps whatever overlay state it had. Nothing is sent to the
//! server.

use crate::notice::{students, Notice};
use crate::overlay::PendingOverlay;
use crate::types::{AttendanceRecord, AttendanceStatus};
use serde::Serialize;

/// Result of a bulk action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    /// Status that was staged
    pub target: AttendanceStatus,
    /// Number of records staged
    pub staged: usize,
}

impl BulkOutcome {
    /// Informational notice telling the user a commit is still required
    #[must_use]
    pub fn notice(&self) -> Notice {
        Notice::info(format!(
            "{} marked {}; save changes to record them",
            students(self.staged),
            self.target
        ))
    }
}

/// Stage `target` for every visible record, whatever its current status
pub fn apply_bulk<'a, I>(
    target: AttendanceStatus,
    visible: I,
    overlay: &mut PendingOverlay,
) -> BulkOutcome
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut staged = 0;
    for record in visible {
        overlay.stage_status(record.enrollment_id.clone(), target);
        staged += 1;
    }

    tracing::debug!(%target, staged, "bulk action staged");

    BulkOutcome { target, staged }
}
