use dojo_attendance::{
    apply_bulk, build_batch, merge, stats, AttendanceStatus, CommitCoordinator, CommitStep,
    EnrollmentId, PendingOverlay, TransportError,
};
use dojo_test_utils::{enrollment, record};
use proptest::prelude::*;
use std::collections::HashMap;

fn status_strategy() -> impl Strategy<Value = AttendanceStatus> {
    prop_oneof![Just(AttendanceStatus::Present), Just(AttendanceStatus::Absent)]
}

fn roster(statuses: &[AttendanceStatus]) -> Vec<dojo_attendance::AttendanceRecord> {
    statuses
        .iter()
        .enumerate()
        .map(|(i, s)| record(i, *s))
        .collect()
}

fn overlay_from(edits: &[(usize, bool)]) -> PendingOverlay {
    let mut overlay = PendingOverlay::new();
    for (n, present) in edits {
        overlay.stage(enrollment(*n), *present);
    }
    overlay
}

proptest! {
    #[test]
    fn prop_merge_prefers_overlay_then_server(
        statuses in prop::collection::vec(status_strategy(), 0..30),
        edits in prop::collection::vec((0usize..40, any::<bool>()), 0..40),
    ) {
        let records = roster(&statuses);
        let overlay = overlay_from(&edits);
        let merged = merge(&records, &overlay);

        prop_assert_eq!(merged.len(), records.len());
        for (row, original) in merged.iter().zip(&records) {
            prop_assert_eq!(&row.record, original);
            match overlay.get(&original.enrollment_id) {
                Some(present) => {
                    prop_assert_eq!(row.effective_status, AttendanceStatus::from_present(present));
                    prop_assert!(row.has_pending_change);
                }
                None => {
                    prop_assert_eq!(row.effective_status, original.status);
                    prop_assert!(!row.has_pending_change);
                }
            }
        }
        prop_assert_eq!(merge(&records, &overlay), merged);
    }

    #[test]
    fn prop_overlay_is_last_write_wins(
        edits in prop::collection::vec((0usize..10, any::<bool>()), 0..50),
    ) {
        let overlay = overlay_from(&edits);
        let mut expected: HashMap<EnrollmentId, bool> = HashMap::new();
        for (n, present) in &edits {
            expected.insert(enrollment(*n), *present);
        }

        prop_assert_eq!(overlay.len(), expected.len());
        for (id, present) in &expected {
            prop_assert_eq!(overlay.get(id), Some(*present));
        }
    }

    #[test]
    fn prop_stats_agree_with_rows(
        statuses in prop::collection::vec(status_strategy(), 0..60),
        edits in prop::collection::vec((0usize..60, any::<bool>()), 0..30),
    ) {
        let merged = merge(&roster(&statuses), &overlay_from(&edits));
        let summary = stats(&merged);

        prop_assert_eq!(summary.total, merged.len());
        prop_assert_eq!(summary.present + summary.absent, summary.total);
        prop_assert_eq!(summary.present, merged.iter().filter(|r| r.is_present()).count());
        prop_assert!((0.0..=100.0).contains(&summary.present_percentage));
        if summary.total == 0 {
            prop_assert_eq!(summary.present_percentage, 0.0);
        }
    }

    #[test]
    fn prop_bulk_touches_only_visible_rows(
        statuses in prop::collection::vec(status_strategy(), 1..30),
        hidden in prop::collection::vec((100usize..120, any::<bool>()), 0..10),
        target in status_strategy(),
    ) {
        let visible = roster(&statuses);
        let mut overlay = overlay_from(&hidden);
        let before = overlay.clone();

        let outcome = apply_bulk(target, &visible, &mut overlay);

        prop_assert_eq!(outcome.staged, visible.len());
        for row in merge(&visible, &overlay) {
            prop_assert_eq!(row.effective_status, target);
            prop_assert!(row.has_pending_change);
        }
        for (id, status) in before.iter() {
            prop_assert_eq!(overlay.intended_status(id), Some(status));
        }
    }

    #[test]
    fn prop_batch_partitions_overlay(
        statuses in prop::collection::vec(status_strategy(), 0..20),
        edits in prop::collection::vec((0usize..30, any::<bool>()), 0..40),
        skip_unchanged in any::<bool>(),
    ) {
        let confirmed: HashMap<_, _> = roster(&statuses)
            .into_iter()
            .map(|r| (r.enrollment_id, r.status))
            .collect();
        let overlay = overlay_from(&edits);
        let plan = build_batch(&overlay, &confirmed, skip_unchanged);

        prop_assert_eq!(
            plan.updates.len() + plan.dropped_stale.len() + plan.unchanged.len(),
            overlay.len()
        );
        for id in &plan.dropped_stale {
            prop_assert!(!confirmed.contains_key(id));
        }
        for update in &plan.updates {
            prop_assert_eq!(overlay.intended_status(&update.enrollment_id), Some(update.status));
        }
        if !skip_unchanged {
            prop_assert!(plan.unchanged.is_empty());
        }
    }

    #[test]
    fn prop_commit_result_is_all_or_nothing(
        edits in prop::collection::vec((0usize..10, any::<bool>()), 1..20),
        succeed in any::<bool>(),
    ) {
        let confirmed: HashMap<_, _> = (0..10)
            .map(|n| (enrollment(n), AttendanceStatus::Absent))
            .collect();
        let mut overlay = overlay_from(&edits);
        let before = overlay.clone();
        let mut coordinator = CommitCoordinator::new();

        match coordinator.begin(&mut overlay, &confirmed, false).unwrap() {
            CommitStep::Submit(ticket) => {
                let result = if succeed {
                    Ok(())
                } else {
                    Err(TransportError::Request("offline".into()))
                };
                let finished = coordinator.finish(ticket, result, &mut overlay);
                if succeed {
                    prop_assert!(finished.is_ok());
                    prop_assert!(overlay.is_empty());
                    prop_assert!(coordinator.is_stale());
                } else {
                    prop_assert!(finished.is_err());
                    prop_assert_eq!(&overlay, &before);
                    prop_assert!(!coordinator.is_in_flight());
                }
            }
            CommitStep::Settled(_) => prop_assert!(false, "every edit targets a loaded row"),
        }
    }
}
