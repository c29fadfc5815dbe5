//! Collaborator ports
//!
//! The backend is reached only through these traits. Each call is one
//! request; the view never issues more than one commit request per commit.

use crate::error::{JustificationRejection, TransportError};
use crate::justification::JustificationRecord;
use crate::types::{AttendanceUpdate, RosterPage, RosterQuery, SessionId};
use async_trait::async_trait;

/// Fetches attendance rows for a session
#[async_trait]
pub trait RosterLoader: Send + Sync {
    /// Fetch one page of the session roster
    async fn fetch_attendance(
        &self,
        session_id: &SessionId,
        query: &RosterQuery,
    ) -> Result<RosterPage, TransportError>;
}

/// Stores attendance changes
#[async_trait]
pub trait AttendanceTransport: Send + Sync {
    /// Apply every update in one transactional request
    async fn submit_batch(
        &self,
        session_id: &SessionId,
        updates: &[AttendanceUpdate],
    ) -> Result<(), TransportError>;
}

/// Stores absence justifications
#[async_trait]
pub trait JustificationService: Send + Sync {
    /// Create a justification for a recorded absence
    async fn create_justification(
        &self,
        record: &JustificationRecord,
    ) -> Result<(), JustificationRejection>;
}
