//! Testing utilities for the dojo workspace
//!
//! Shared fixtures: rosters, seeded backends and loaded views.

#![allow(missing_docs)]

use chrono::NaiveDate;
use dojo_attendance::{
    AccessMode, AttendanceConfig, AttendanceRecord, AttendanceStatus, AttendanceView,
    Collaborators, EnrollmentId, InMemoryBackend, SessionRef,
};
use std::sync::Arc;

pub const SESSION_ID: &str = "adult-judo-0314";

pub fn session_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
}

pub fn session() -> SessionRef {
    SessionRef::new(SESSION_ID, session_date())
}

pub fn enrollment(n: usize) -> EnrollmentId {
    EnrollmentId::new(format!("enr-{n}"))
}

pub fn record(n: usize, status: AttendanceStatus) -> AttendanceRecord {
    AttendanceRecord::new(
        format!("att-{n}"),
        enrollment(n),
        format!("Student {n}"),
        format!("student{n}@dojo.test"),
        status,
    )
}

/// Roster with one row per status, numbered from 1
pub fn roster_of(statuses: &[AttendanceStatus]) -> Vec<AttendanceRecord> {
    statuses
        .iter()
        .enumerate()
        .map(|(i, status)| record(i + 1, *status))
        .collect()
}

pub fn seeded_backend(statuses: &[AttendanceStatus]) -> Arc<InMemoryBackend> {
    let backend = InMemoryBackend::new();
    backend.schedule(&session());
    backend.seed(&session().id, roster_of(statuses));
    Arc::new(backend)
}

pub fn view_over(
    backend: &Arc<InMemoryBackend>,
    access: AccessMode,
    config: AttendanceConfig,
) -> AttendanceView {
    AttendanceView::new(
        session(),
        access,
        config,
        Collaborators::from_backend(backend.clone()),
    )
}

/// Managing view with its first page already loaded
pub async fn loaded_view(backend: &Arc<InMemoryBackend>) -> AttendanceView {
    let view = view_over(backend, AccessMode::Manage, AttendanceConfig::new());
    view.load(view.default_query()).await.unwrap();
    view
}
