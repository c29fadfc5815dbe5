//! Justification of confirmed absences
//!
//! A form opens only for a row that is absent on the server and has no
//! pending edit; an absence the user is still editing is not a recorded
//! absence yet. The sub-flow never reads or writes the overlay.

use crate::error::JustificationError;
use crate::merge::EffectiveRecord;
use crate::types::{AttendanceStatus, EnrollmentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of absence reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCategory {
    /// Illness or injury
    Medical,
    /// Personal matters
    Personal,
    /// Family obligations
    Family,
    /// Work obligations
    Work,
    /// Anything else
    Other,
}

impl ReasonCategory {
    /// Every category, in display order
    pub const ALL: [Self; 5] = [
        Self::Medical,
        Self::Personal,
        Self::Family,
        Self::Work,
        Self::Other,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::Personal => "personal",
            Self::Family => "family",
            Self::Work => "work",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ReasonCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCategory {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| {
                FieldError::new(
                    JustificationField::ReasonCategory,
                    format!("unknown reason category '{}'", s.trim()),
                )
            })
    }
}

/// Form field a validation error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JustificationField {
    /// Session date
    Date,
    /// Enrollment
    EnrollmentId,
    /// Reason category
    ReasonCategory,
    /// Reason text
    ReasonText,
}

impl JustificationField {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::EnrollmentId => "enrollment_id",
            Self::ReasonCategory => "reason_category",
            Self::ReasonText => "reason_text",
        }
    }
}

/// Field-level validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Offending field
    pub field: JustificationField,
    /// Human-readable message
    pub message: String,
}

impl FieldError {
    /// Create new field error
    #[inline]
    #[must_use]
    pub fn new(field: JustificationField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field.as_str(), self.message)
    }
}

/// Bounds on the free-text reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JustificationPolicy {
    /// Minimum characters, inclusive
    pub min_reason_len: usize,
    /// Maximum characters, inclusive
    pub max_reason_len: usize,
}

impl Default for JustificationPolicy {
    fn default() -> Self {
        Self {
            min_reason_len: 10,
            max_reason_len: 500,
        }
    }
}

impl JustificationPolicy {
    /// Validate a trimmed reason text
    #[must_use]
    pub fn check_reason(&self, text: &str) -> Option<FieldError> {
        let len = text.trim().chars().count();
        if len < self.min_reason_len {
            Some(FieldError::new(
                JustificationField::ReasonText,
                format!("must be at least {} characters", self.min_reason_len),
            ))
        } else if len > self.max_reason_len {
            Some(FieldError::new(
                JustificationField::ReasonText,
                format!("must be at most {} characters", self.max_reason_len),
            ))
        } else {
            None
        }
    }
}

/// Justification submitted to the collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JustificationRecord {
    /// Session date
    pub date: NaiveDate,
    /// Justified enrollment
    pub enrollment_id: EnrollmentId,
    /// Reason category
    pub reason_category: ReasonCategory,
    /// Trimmed reason text
    pub reason_text: String,
}

impl JustificationRecord {
    /// Summary the server stores as the attendance row's notes
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{}: {}", self.reason_category, self.reason_text)
    }
}

/// An open justification form for one confirmed absence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JustificationForm {
    /// Enrollment being justified
    pub enrollment_id: EnrollmentId,
    /// Session date
    pub date: NaiveDate,
    /// Student display name
    pub student_name: String,
    /// Existing justification summary, if any
    pub existing_notes: Option<String>,
}

impl JustificationForm {
    /// Open a form against a merged row.
    ///
    /// # Errors
    /// - `JustificationError::PendingChange` if the row has an unsaved edit
    /// - `JustificationError::NotAbsent` if the row is not absent
    pub fn open(record: &EffectiveRecord, date: NaiveDate) -> Result<Self, JustificationError> {
        if record.has_pending_change {
            return Err(JustificationError::PendingChange(record.enrollment_id().clone()));
        }
        if record.effective_status != AttendanceStatus::Absent {
            return Err(JustificationError::NotAbsent(record.enrollment_id().clone()));
        }
        Ok(Self {
            enrollment_id: record.enrollment_id().clone(),
            date,
            student_name: record.record.student_name.clone(),
            existing_notes: record.record.notes.clone(),
        })
    }

    /// Validate input and build the record to submit.
    ///
    /// # Errors
    /// `JustificationError::Invalid` with one entry per offending field
    pub fn build(
        &self,
        category: &str,
        reason_text: &str,
        policy: &JustificationPolicy,
    ) -> Result<JustificationRecord, JustificationError> {
        let mut errors = Vec::new();

        let reason_category = match category.parse::<ReasonCategory>() {
            Ok(c) => Some(c),
            Err(e) => {
                errors.push(e);
                None
            }
        };
        if let Some(e) = policy.check_reason(reason_text) {
            errors.push(e);
        }

        match reason_category {
            Some(reason_category) if errors.is_empty() => Ok(JustificationRecord {
                date: self.date,
                enrollment_id: self.enrollment_id.clone(),
                reason_category,
                reason_text: reason_text.trim().to_string(),
            }),
            _ => Err(JustificationError::Invalid(errors)),
        }
    }
}
