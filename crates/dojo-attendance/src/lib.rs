//! Dojo Attendance - optimistic attendance reconciliation
//!
//! Tracks which students attended a training session:
//! - Loads the session roster page by page from a backend
//! - Keeps unsaved presence edits in a pending overlay
//! - Merges server rows with the overlay for display and statistics
//! - Stages bulk actions over the visible rows
//! - Commits every pending edit as one atomic batch
//! - Justifies confirmed absences
//!
//! # Example
//!
//! ```rust,ignore
//! use dojo_attendance::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(InMemoryBackend::new());
//! let session = SessionRef::new("kids-bjj-0314", chrono::NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
//! backend.schedule(&session);
//! backend.enroll(&session.id, "enr-1", "Ana Lima", AttendanceStatus::Absent);
//!
//! let view = AttendanceView::new(
//!     session,
//!     AccessMode::Manage,
//!     AttendanceConfig::new(),
//!     Collaborators::from_backend(backend),
//! );
//! view.load(view.default_query()).await?;
//! view.toggle(&"enr-1".into())?;
//! let outcome = view.commit().await?;
//!
//! println!("{}", outcome.notice());
//! # Ok(())
//! # }
//! ```

pub mod bulk;
pub mod commit;
pub mod config;
pub mod error;
pub mod justification;
pub mod memory;
pub mod merge;
pub mod notice;
pub mod overlay;
pub mod ports;
pub mod stats;
pub mod types;
pub mod view;

// Re-exports for convenience
pub use bulk::{apply_bulk, BulkOutcome};
pub use commit::{
    allowed_transitions, build_batch, validate_transition, CommitCoordinator, CommitOutcome,
    CommitPhase, CommitPlan, CommitStep, CommitTicket,
};
pub use config::AttendanceConfig;
pub use error::{
    AttendanceError, CommitError, ConfigError, JustificationError, JustificationRejection,
    OverlayError, RosterError, TransportError,
};
pub use justification::{
    FieldError, JustificationField, JustificationForm, JustificationPolicy, JustificationRecord,
    ReasonCategory,
};
pub use memory::{BackendCalls, InMemoryBackend};
pub use merge::{effective_status, merge, merge_one, EffectiveRecord};
pub use notice::{Notice, NoticeLevel};
pub use overlay::PendingOverlay;
pub use ports::{AttendanceTransport, JustificationService, RosterLoader};
pub use stats::{stats, AttendanceStats};
pub use types::{
    AccessMode, AttendanceId, AttendanceRecord, AttendanceStatus, AttendanceUpdate, EnrollmentId,
    RosterPage, RosterQuery, SessionId, SessionRef, StatusFilter,
};
pub use view::{AttendanceView, Collaborators, FetchPhase, LoadOutcome, RosterSnapshot};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with attendance views
    pub use crate::{
        AccessMode, AttendanceConfig, AttendanceError, AttendanceStatus, AttendanceView,
        Collaborators, EnrollmentId, InMemoryBackend, RosterQuery, SessionRef, StatusFilter,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
