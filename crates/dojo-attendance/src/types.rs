//! Core types for attendance reconciliation
//!
//! Defines the fundamental types shared by every component:
//! - Opaque identifiers (session, attendance row, enrollment)
//! - Server-confirmed attendance records
//! - Roster queries and pages
//! - Batch update payload
//! - Access mode

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a server-issued identifier
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw identifier
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Identifier of a training session
    SessionId
);

opaque_id!(
    /// Identifier of one attendance row
    AttendanceId
);

opaque_id!(
    /// Identifier of a student's enrollment in a discipline.
    ///
    /// Stable across sessions; keys the pending overlay, bulk actions and
    /// justifications.
    EnrollmentId
);

/// The training session an attendance view is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRef {
    /// Session identifier
    pub id: SessionId,
    /// Calendar date the session takes place on
    pub date: NaiveDate,
}

impl SessionRef {
    /// Create new session reference
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<SessionId>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            date,
        }
    }
}

/// Presence value of a roster entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Student attended
    Present,
    /// Student did not attend
    Absent,
}

impl AttendanceStatus {
    /// Map an intended-presence flag to a status
    #[inline]
    #[must_use]
    pub fn from_present(present: bool) -> Self {
        if present {
            Self::Present
        } else {
            Self::Absent
        }
    }

    /// Whether this is [`AttendanceStatus::Present`]
    #[inline]
    #[must_use]
    pub fn is_present(self) -> bool {
        matches!(self, Self::Present)
    }

    /// The opposite status
    #[inline]
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Present => Self::Absent,
            Self::Absent => Self::Present,
        }
    }

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-confirmed attendance row.
///
/// Immutable within one fetch cycle: `status` only changes through a
/// successful commit followed by a new fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Attendance row identifier
    pub id: AttendanceId,
    /// Enrollment of the student in the discipline
    pub enrollment_id: EnrollmentId,
    /// Display name
    pub student_name: String,
    /// Contact email
    pub student_email: String,
    /// Avatar reference, if the student has one
    pub student_avatar_ref: Option<String>,
    /// Last durably stored status
    pub status: AttendanceStatus,
    /// Justification summary; only set for justified absences
    pub notes: Option<String>,
}

impl AttendanceRecord {
    /// Create new record
    #[must_use]
    pub fn new(
        id: impl Into<AttendanceId>,
        enrollment_id: impl Into<EnrollmentId>,
        student_name: impl Into<String>,
        student_email: impl Into<String>,
        status: AttendanceStatus,
    ) -> Self {
        Self {
            id: id.into(),
            enrollment_id: enrollment_id.into(),
            student_name: student_name.into(),
            student_email: student_email.into(),
            student_avatar_ref: None,
            status,
            notes: None,
        }
    }

    /// With avatar reference
    #[inline]
    #[must_use]
    pub fn with_avatar(mut self, avatar_ref: impl Into<String>) -> Self {
        self.student_avatar_ref = Some(avatar_ref.into());
        self
    }

    /// With justification notes
    #[inline]
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Server-side status filter of a roster query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    /// No filtering
    #[default]
    All,
    /// Only present rows
    Present,
    /// Only absent rows
    Absent,
}

impl StatusFilter {
    /// Check whether a status passes the filter
    #[inline]
    #[must_use]
    pub fn matches(self, status: AttendanceStatus) -> bool {
        match self {
            Self::All => true,
            Self::Present => status == AttendanceStatus::Present,
            Self::Absent => status == AttendanceStatus::Absent,
        }
    }
}

/// Filter and paging parameters for one roster fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterQuery {
    /// Status filter
    pub status: StatusFilter,
    /// Case-insensitive student name substring
    pub name_contains: Option<String>,
    /// Page number, starting at 1
    pub page: u32,
    /// Rows per page
    pub page_size: u32,
}

impl RosterQuery {
    /// First page, unfiltered
    #[inline]
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            status: StatusFilter::All,
            name_contains: None,
            page: 1,
            page_size,
        }
    }

    /// With status filter
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    /// With name substring; blank input clears the filter
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        self.name_contains = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Same filter at another page
    #[inline]
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Check a record against the filter part of the query (paging ignored)
    #[must_use]
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        if !self.status.matches(record.status) {
            return false;
        }
        match &self.name_contains {
            Some(needle) => record
                .student_name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }

    /// Whether every row of the session matches
    #[inline]
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.status == StatusFilter::All && self.name_contains.is_none()
    }

    /// Whether both queries select the same rows, paging aside
    #[inline]
    #[must_use]
    pub fn same_filter(&self, other: &Self) -> bool {
        self.status == other.status && self.name_contains == other.name_contains
    }

    /// Offset of the first row of this page
    #[inline]
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.page_size as usize
    }
}

/// One page of a roster fetch
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RosterPage {
    /// Rows on this page
    pub items: Vec<AttendanceRecord>,
    /// Total rows matching the filter, across all pages
    pub count: usize,
}

/// One entry of a batch commit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendanceUpdate {
    /// Enrollment being updated
    pub enrollment_id: EnrollmentId,
    /// Status to store
    pub status: AttendanceStatus,
}

/// Whether the current actor may change the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Toggles, bulk actions, commit and justification are interactive
    Manage,
    /// Rendering only
    #[default]
    ReadOnly,
}

impl AccessMode {
    /// Build from the authorization collaborator's boolean
    #[inline]
    #[must_use]
    pub fn from_can_manage(can_manage: bool) -> Self {
        if can_manage {
            Self::Manage
        } else {
            Self::ReadOnly
        }
    }

    /// Whether mutations are allowed
    #[inline]
    #[must_use]
    pub fn can_manage(self) -> bool {
        matches!(self, Self::Manage)
    }
}
