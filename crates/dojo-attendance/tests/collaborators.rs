use async_trait::async_trait;
use dojo_attendance::{
    AccessMode, AttendanceConfig, AttendanceStatus, AttendanceTransport, AttendanceUpdate,
    AttendanceView, Collaborators, CommitError, JustificationError, JustificationRecord,
    JustificationRejection, JustificationService, SessionId, TransportError,
};
use dojo_test_utils::{enrollment, seeded_backend, session};
use mockall::mock;
use std::sync::Arc;
use AttendanceStatus::{Absent, Present};

mock! {
    Transport {}

    #[async_trait]
    impl AttendanceTransport for Transport {
        async fn submit_batch(
            &self,
            session_id: &SessionId,
            updates: &[AttendanceUpdate],
        ) -> Result<(), TransportError>;
    }
}

mock! {
    Justifications {}

    #[async_trait]
    impl JustificationService for Justifications {
        async fn create_justification(
            &self,
            record: &JustificationRecord,
        ) -> Result<(), JustificationRejection>;
    }
}

fn view_with(
    statuses: &[AttendanceStatus],
    transport: MockTransport,
    justifications: MockJustifications,
) -> AttendanceView {
    let backend = seeded_backend(statuses);
    AttendanceView::new(
        session(),
        AccessMode::Manage,
        AttendanceConfig::new(),
        Collaborators {
            loader: backend,
            transport: Arc::new(transport),
            justifications: Arc::new(justifications),
        },
    )
}

#[tokio::test]
async fn commit_sends_exactly_one_batch_in_staging_order() {
    let mut transport = MockTransport::new();
    transport
        .expect_submit_batch()
        .withf(|session_id, updates| {
            session_id.as_str() == dojo_test_utils::SESSION_ID
                && updates
                    .iter()
                    .map(|u| (u.enrollment_id.as_str(), u.status))
                    .eq([("enr-3", Present), ("enr-1", Present)])
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let view = view_with(&[Absent, Present, Absent], transport, MockJustifications::new());
    view.load(view.default_query()).await.unwrap();
    view.toggle(&enrollment(3)).unwrap();
    view.toggle(&enrollment(1)).unwrap();

    let outcome = view.commit().await.unwrap();
    assert_eq!(outcome.submitted.len(), 2);
}

#[tokio::test]
async fn transport_failure_surfaces_as_retryable() {
    let mut transport = MockTransport::new();
    transport
        .expect_submit_batch()
        .times(2)
        .returning(|_, _| Err(TransportError::Timeout { duration_secs: 30 }));

    let view = view_with(&[Absent, Absent], transport, MockJustifications::new());
    view.load(view.default_query()).await.unwrap();
    view.apply_bulk(Present).unwrap();

    for _ in 0..2 {
        let err = view.commit().await.unwrap_err();
        assert!(matches!(err, CommitError::Rejected(TransportError::Timeout { .. })));
        assert_eq!(view.pending_count(), 2);
    }
}

#[tokio::test]
async fn server_field_errors_reach_the_form() {
    let mut justifications = MockJustifications::new();
    justifications
        .expect_create_justification()
        .times(1)
        .returning(|_| {
            Err(JustificationRejection::Invalid(vec![
                dojo_attendance::FieldError::new(
                    dojo_attendance::JustificationField::Date,
                    "session is in the future",
                ),
            ]))
        });

    let view = view_with(&[Absent], MockTransport::new(), justifications);
    view.load(view.default_query()).await.unwrap();
    let form = view.open_justification(&enrollment(1)).unwrap();

    let err = view
        .submit_justification(&form, "personal", "moving house this weekend")
        .await
        .unwrap_err();
    assert!(matches!(err, JustificationError::Invalid(_)));
    assert_eq!(err.field_errors()[0].message, "session is in the future");
    assert_eq!(view.pending_count(), 0);
}

#[tokio::test]
async fn read_only_commit_never_reaches_the_transport() {
    let mut transport = MockTransport::new();
    transport.expect_submit_batch().never();

    let backend = seeded_backend(&[Absent]);
    let view = AttendanceView::new(
        session(),
        AccessMode::from_can_manage(false),
        AttendanceConfig::new(),
        Collaborators {
            loader: backend.clone(),
            transport: Arc::new(transport),
            justifications: backend,
        },
    );
    view.load(view.default_query()).await.unwrap();
    assert_eq!(view.commit().await.unwrap_err(), CommitError::ReadOnly);
}
