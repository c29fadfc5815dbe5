//! Live attendance statistics over the merged view

use crate::merge::EffectiveRecord;
use serde::Serialize;

/// Aggregate counts of a merged roster
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AttendanceStats {
    /// Rows counted
    pub total: usize,
    /// Rows whose effective status is present
    pub present: usize,
    /// `total - present`
    pub absent: usize,
    /// `present / total * 100`, unrounded; `0.0` for an empty roster
    pub present_percentage: f64,
}

impl AttendanceStats {
    /// Percentage rounded to whole units, for display only
    #[inline]
    #[must_use]
    pub fn rounded_percentage(&self) -> String {
        format!("{:.0}%", self.present_percentage)
    }
}

/// Compute statistics from effective records
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn stats<'a, I>(records: I) -> AttendanceStats
where
    I: IntoIterator<Item = &'a EffectiveRecord>,
{
    let (total, present) = records
        .into_iter()
        .fold((0usize, 0usize), |(total, present), r| {
            (total + 1, present + usize::from(r.is_present()))
        });

    let present_percentage = if total == 0 {
        0.0
    } else {
        present as f64 / total as f64 * 100.0
    };

    AttendanceStats {
        total,
        present,
        absent: total - present,
        present_percentage,
    }
}
