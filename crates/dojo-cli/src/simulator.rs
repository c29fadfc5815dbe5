//! Attendance simulator - seeded randomized harness for the attendance view
//!
//! Drives one [`AttendanceView`] against an [`InMemoryBackend`] with a random
//! mix of edits, bulk actions, commits, reloads, unenrollments and injected
//! failures. A shadow model of the server roster is kept alongside and every
//! operation is followed by invariant checks.

use dojo_attendance::{
    AccessMode, AttendanceConfig, AttendanceStatus, AttendanceView, Collaborators, CommitError,
    EnrollmentId, InMemoryBackend, RosterQuery, SessionRef, StatusFilter,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Simulator configuration
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimulatorConfig {
    /// Random seed for reproducibility
    pub(crate) seed: u64,
    /// Total operations to execute
    pub(crate) total_operations: u64,
    /// Students enrolled at start
    pub(crate) students: usize,
    /// View configuration
    pub(crate) attendance: AttendanceConfig,
    /// Probability that a commit or fetch is made to fail
    pub(crate) failure_rate: f64,
    /// Stop on the first violation
    pub(crate) stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            total_operations: 1_000,
            students: 12,
            attendance: AttendanceConfig::new().with_page_size(5),
            failure_rate: 0.15,
            stop_on_first_violation: true,
        }
    }
}

/// Operations the simulator can generate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) enum SimulatedOperation {
    /// Flip a loaded row
    Toggle(EnrollmentId),
    /// Stage an explicit presence for a loaded row
    Stage(EnrollmentId, bool),
    /// Discard one pending edit
    Unstage(EnrollmentId),
    /// Stage a status for every visible row
    Bulk(AttendanceStatus),
    /// Commit, optionally with the batch request failing
    Commit {
        /// Whether the backend rejects the batch
        fail: bool,
    },
    /// Reload and discard pending edits
    Refresh {
        /// Whether the fetch fails
        fail: bool,
    },
    /// Fetch the next page
    LoadMore,
    /// Switch the status filter
    Filter(StatusFilter),
    /// Remove a student on the server behind the view's back
    Unenroll(EnrollmentId),
    /// Justify an absence
    Justify(EnrollmentId),
}

impl SimulatedOperation {
    fn kind(&self) -> &'static str {
        match self {
            Self::Toggle(_) => "toggle",
            Self::Stage(..) => "stage",
            Self::Unstage(_) => "unstage",
            Self::Bulk(_) => "bulk",
            Self::Commit { .. } => "commit",
            Self::Refresh { .. } => "refresh",
            Self::LoadMore => "load_more",
            Self::Filter(_) => "filter",
            Self::Unenroll(_) => "unenroll",
            Self::Justify(_) => "justify",
        }
    }
}

/// Invariants checked after every operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) enum InvariantCheck {
    /// Effective status follows the overlay, then the server row
    OverlayTakesPrecedence,
    /// Statistics agree with the merged rows
    StatsAreConsistent,
    /// A failed commit leaves every pending edit in place
    FailedCommitKeepsOverlay,
    /// A successful commit empties the overlay
    SuccessfulCommitClearsOverlay,
    /// One commit sends at most one batch request
    OneRequestPerCommit,
    /// Stored statuses match the shadow model
    ServerMatchesModel,
    /// Only unenrolled students are dropped from a batch
    OnlyRemovedStudentsDropped,
}

impl fmt::Display for InvariantCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A violation detected during simulation
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Violation {
    /// Index of the offending operation
    pub(crate) operation_index: u64,
    /// Offending operation
    pub(crate) operation: SimulatedOperation,
    /// Failed check
    pub(crate) check: InvariantCheck,
    /// What was observed
    pub(crate) details: String,
}

/// Statistics collected during simulation
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct OperationStats {
    /// Operations executed
    pub(crate) total_operations: u64,
    /// Operations that returned `Ok`
    pub(crate) successful_operations: u64,
    /// Operations that returned an error
    pub(crate) failed_operations: u64,
    /// Batch requests that reached the backend
    pub(crate) batch_requests: usize,
    /// Count per operation kind
    pub(crate) operations_by_type: BTreeMap<String, u64>,
}

impl OperationStats {
    fn record(&mut self, operation: &SimulatedOperation, result: &Result<String, String>) {
        self.total_operations += 1;
        *self
            .operations_by_type
            .entry(operation.kind().to_string())
            .or_insert(0) += 1;
        match result {
            Ok(_) => self.successful_operations += 1,
            Err(_) => self.failed_operations += 1,
        }
    }
}

/// Final report from the simulator
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimulatorReport {
    /// Configuration used
    pub(crate) config: SimulatorConfig,
    /// Operation counters
    pub(crate) stats: OperationStats,
    /// Detected violations
    pub(crate) violations: Vec<Violation>,
    /// Students still enrolled
    pub(crate) final_students: usize,
    /// Pending edits left at the end
    pub(crate) final_pending: usize,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub(crate) fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate a text report
    #[must_use]
    pub(crate) fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Attendance Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Total Operations: {}\n", self.stats.total_operations));
        report.push_str(&format!("Successful: {}\n", self.stats.successful_operations));
        report.push_str(&format!("Failed: {}\n", self.stats.failed_operations));
        report.push_str(&format!("Batch Requests: {}\n", self.stats.batch_requests));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));
        report.push_str(&format!("Final Students: {}\n", self.final_students));
        report.push_str(&format!("Final Pending: {}\n", self.final_pending));

        report.push_str("\n=== Operations ===\n");
        for (kind, count) in &self.stats.operations_by_type {
            report.push_str(&format!("{kind}: {count}\n"));
        }

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!(
                    "{}. #{} {:?}: {} ({})\n",
                    i + 1,
                    v.operation_index,
                    v.operation,
                    v.check,
                    v.details
                ));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

struct Harness {
    backend: Arc<InMemoryBackend>,
    view: AttendanceView,
    /// Expected stored status per enrolled student
    model: HashMap<EnrollmentId, AttendanceStatus>,
}

impl Harness {
    fn new(config: &SimulatorConfig, rng: &mut StdRng) -> Self {
        let session = SessionRef::new(
            format!("sim-{}", config.seed),
            chrono::NaiveDate::from_ymd_opt(2026, 3, 14).unwrap_or(chrono::NaiveDate::MIN),
        );
        let backend = Arc::new(InMemoryBackend::new());
        backend.schedule(&session);
        let mut model = HashMap::new();
        for n in 0..config.students {
            let status = AttendanceStatus::from_present(rng.random_bool(0.5));
            let enrollment_id = EnrollmentId::new(format!("enr-{n:03}"));
            backend.enroll(
                &session.id,
                enrollment_id.clone(),
                &format!("Student {n:03}"),
                status,
            );
            model.insert(enrollment_id, status);
        }
        let view = AttendanceView::new(
            session,
            AccessMode::Manage,
            config.attendance.clone(),
            Collaborators::from_backend(backend.clone()),
        );
        Self {
            backend,
            view,
            model,
        }
    }

    fn generate(&self, rng: &mut StdRng, failure_rate: f64) -> SimulatedOperation {
        let loaded: Vec<EnrollmentId> = self
            .view
            .records()
            .into_iter()
            .map(|r| r.enrollment_id)
            .collect();
        let pick = |rng: &mut StdRng| loaded[rng.random_range(0..loaded.len())].clone();

        if loaded.is_empty() {
            return match rng.random_range(0..3) {
                0 => SimulatedOperation::Filter(StatusFilter::All),
                1 => SimulatedOperation::Commit { fail: false },
                _ => SimulatedOperation::Refresh { fail: false },
            };
        }

        match rng.random_range(0..100) {
            0..=29 => SimulatedOperation::Toggle(pick(rng)),
            30..=41 => SimulatedOperation::Stage(pick(rng), rng.random_bool(0.5)),
            42..=46 => SimulatedOperation::Unstage(pick(rng)),
            47..=52 => SimulatedOperation::Bulk(AttendanceStatus::from_present(rng.random_bool(0.5))),
            53..=69 => SimulatedOperation::Commit {
                fail: rng.random_bool(failure_rate),
            },
            70..=76 => SimulatedOperation::Refresh {
                fail: rng.random_bool(failure_rate),
            },
            77..=83 => SimulatedOperation::LoadMore,
            84..=90 => SimulatedOperation::Filter(match rng.random_range(0..3) {
                0 => StatusFilter::Present,
                1 => StatusFilter::Absent,
                _ => StatusFilter::All,
            }),
            91..=93 => SimulatedOperation::Unenroll(pick(rng)),
            _ => SimulatedOperation::Justify(pick(rng)),
        }
    }

    async fn execute(
        &mut self,
        index: u64,
        operation: &SimulatedOperation,
        violations: &mut Vec<Violation>,
    ) -> Result<String, String> {
        let mut violate = |check, details: String| {
            violations.push(Violation {
                operation_index: index,
                operation: operation.clone(),
                check,
                details,
            });
        };

        match operation {
            SimulatedOperation::Toggle(id) => self
                .view
                .toggle(id)
                .map(|s| s.to_string())
                .map_err(|e| e.to_string()),
            SimulatedOperation::Stage(id, present) => self
                .view
                .stage(id, *present)
                .map(|()| "staged".to_string())
                .map_err(|e| e.to_string()),
            SimulatedOperation::Unstage(id) => self
                .view
                .unstage(id)
                .map(|had| had.to_string())
                .map_err(|e| e.to_string()),
            SimulatedOperation::Bulk(target) => self
                .view
                .apply_bulk(*target)
                .map(|o| o.notice().to_string())
                .map_err(|e| e.to_string()),
            SimulatedOperation::Commit { fail } => {
                let before = self.view.overlay();
                let requests_before = self.backend.calls().commits;
                if *fail {
                    self.backend.fail_next_commits(1);
                }
                let result = self.view.commit().await;
                self.backend.fail_next_commits(0);

                let sent = self.backend.calls().commits - requests_before;
                if sent > 1 {
                    violate(
                        InvariantCheck::OneRequestPerCommit,
                        format!("{sent} requests for one commit"),
                    );
                }
                match result {
                    Ok(outcome) => {
                        if self.view.pending_count() != 0 {
                            violate(
                                InvariantCheck::SuccessfulCommitClearsOverlay,
                                format!("{} entries left", self.view.pending_count()),
                            );
                        }
                        for id in &outcome.dropped_stale {
                            if self.model.contains_key(id) {
                                violate(
                                    InvariantCheck::OnlyRemovedStudentsDropped,
                                    format!("{id} is still enrolled"),
                                );
                            }
                        }
                        for update in &outcome.submitted {
                            self.model.insert(update.enrollment_id.clone(), update.status);
                        }
                        Ok(outcome.notice().to_string())
                    }
                    Err(e) => {
                        if matches!(e, CommitError::Rejected(_)) && self.view.overlay() != before {
                            violate(
                                InvariantCheck::FailedCommitKeepsOverlay,
                                "overlay changed after a rejected batch".to_string(),
                            );
                        }
                        Err(e.to_string())
                    }
                }
            }
            SimulatedOperation::Refresh { fail } => {
                if *fail {
                    self.backend.fail_next_fetches(1);
                }
                let result = self.view.refresh().await;
                self.backend.fail_next_fetches(0);
                result
                    .map(|o| format!("{} of {}", o.loaded, o.total))
                    .map_err(|e| e.to_string())
            }
            SimulatedOperation::LoadMore => self
                .view
                .load_more()
                .await
                .map(|o| format!("{} of {}", o.loaded, o.total))
                .map_err(|e| e.to_string()),
            SimulatedOperation::Filter(filter) => {
                let query = self.view.query().unwrap_or_else(|| self.view.default_query());
                self.view
                    .load(RosterQuery { status: *filter, ..query })
                    .await
                    .map(|o| format!("{} of {}", o.loaded, o.total))
                    .map_err(|e| e.to_string())
            }
            SimulatedOperation::Unenroll(id) => {
                self.model.remove(id);
                Ok(self
                    .backend
                    .unenroll(&self.view.session().id, id)
                    .to_string())
            }
            SimulatedOperation::Justify(id) => {
                let form = self.view.open_justification(id).map_err(|e| e.to_string())?;
                self.view
                    .submit_justification(&form, "medical", "recovering from a training injury")
                    .await
                    .map(|r| r.summary())
                    .map_err(|e| e.to_string())
            }
        }
    }

    fn check_invariants(&self, index: u64, operation: &SimulatedOperation) -> Vec<Violation> {
        let mut found = Vec::new();
        let mut violate = |check, details: String| {
            found.push(Violation {
                operation_index: index,
                operation: operation.clone(),
                check,
                details,
            });
        };

        let snapshot = self.view.snapshot();
        let overlay = self.view.overlay();
        for row in &snapshot.records {
            let expected = overlay
                .intended_status(row.enrollment_id())
                .unwrap_or(row.record.status);
            if row.effective_status != expected
                || row.has_pending_change != overlay.contains(row.enrollment_id())
            {
                violate(
                    InvariantCheck::OverlayTakesPrecedence,
                    format!("{} shows {}", row.enrollment_id(), row.effective_status),
                );
            }
        }

        let stats = snapshot.stats;
        if stats.total != snapshot.records.len()
            || stats.present + stats.absent != stats.total
            || !(0.0..=100.0).contains(&stats.present_percentage)
        {
            violate(InvariantCheck::StatsAreConsistent, format!("{stats:?}"));
        }

        let stored = self.backend.roster(&self.view.session().id);
        if stored.len() != self.model.len() {
            violate(
                InvariantCheck::ServerMatchesModel,
                format!("{} stored, {} expected", stored.len(), self.model.len()),
            );
        }
        for row in stored {
            if self.model.get(&row.enrollment_id) != Some(&row.status) {
                violate(
                    InvariantCheck::ServerMatchesModel,
                    format!("{} stored as {}", row.enrollment_id, row.status),
                );
            }
        }

        found
    }
}

/// Run the attendance simulator
pub(crate) async fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut harness = Harness::new(&config, &mut rng);
    let mut stats = OperationStats::default();
    let mut violations = Vec::new();

    if let Err(e) = harness.view.load(harness.view.default_query()).await {
        tracing::warn!(error = %e, "initial load failed");
    }

    for i in 0..config.total_operations {
        let operation = harness.generate(&mut rng, config.failure_rate);
        let result = harness.execute(i, &operation, &mut violations).await;
        tracing::trace!(index = i, ?operation, ?result, "simulated");
        stats.record(&operation, &result);

        violations.extend(harness.check_invariants(i, &operation));
        if config.stop_on_first_violation && !violations.is_empty() {
            tracing::warn!(index = i, "stopping on first violation");
            break;
        }
    }

    stats.batch_requests = harness.backend.calls().commits;
    SimulatorReport {
        final_students: harness.model.len(),
        final_pending: harness.view.pending_count(),
        config,
        stats,
        violations,
    }
}
