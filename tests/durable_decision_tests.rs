//! Decisions that were emailed but not recorded, carried across engine
//! restarts through the SQLite store. Each CLI invocation is a fresh engine,
//! so the retry has to be driven by what the database remembers.
#![cfg(feature = "database")]

mod common;

use async_trait::async_trait;
use chrono::Local;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{request, StubGateway, INSTRUCTOR_ID, INSTRUCTOR_NAME};
use office_hours::{
    submit, Appointment, AppointmentId, AppointmentStatus, AppointmentStore, BookingWindow, Instructor,
    InstructorId, InstructorStore, NewAppointment, ReplyDraft, SessionContext, SqliteStore,
    StaticAuthProvider, StoreError, WorkflowEngine,
};

/// Delegates to SQLite but refuses the next N status writes.
struct FlakyStatusWrites {
    inner: Arc<SqliteStore>,
    fail_next: AtomicUsize,
}

impl FlakyStatusWrites {
    fn failing(inner: Arc<SqliteStore>, count: usize) -> Self {
        Self {
            inner,
            fail_next: AtomicUsize::new(count),
        }
    }
}

#[async_trait]
impl AppointmentStore for FlakyStatusWrites {
    async fn create(&self, payload: NewAppointment) -> Result<Appointment, StoreError> {
        self.inner.create(payload).await
    }

    async fn list_by_instructor(&self, instructor: &InstructorId) -> Result<Vec<Appointment>, StoreError> {
        self.inner.list_by_instructor(instructor).await
    }

    async fn get(&self, id: AppointmentId) -> Result<Appointment, StoreError> {
        self.inner.get(id).await
    }

    async fn update_status(&self, id: AppointmentId, status: AppointmentStatus) -> Result<(), StoreError> {
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable {
                message: "database is locked".to_string(),
            });
        }
        self.inner.update_status(id, status).await
    }

    async fn record_notified(&self, id: AppointmentId, status: AppointmentStatus) -> Result<(), StoreError> {
        self.inner.record_notified(id, status).await
    }

    async fn notified_unrecorded(&self, id: AppointmentId) -> Result<Option<AppointmentStatus>, StoreError> {
        self.inner.notified_unrecorded(id).await
    }
}

async fn sqlite() -> (Arc<SqliteStore>, Appointment, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("office-hours.db").display());
    let store = Arc::new(SqliteStore::connect(&url, 1, true).await.unwrap());

    let instructor = Instructor::new(INSTRUCTOR_ID, INSTRUCTOR_NAME).verified();
    store.upsert_instructor(instructor.clone()).await.unwrap();
    let appointment = submit(
        store.as_ref(),
        &instructor,
        &request(),
        &BookingWindow::default(),
        Local::now().date_naive(),
    )
    .await
    .unwrap();
    (store, appointment, dir)
}

async fn engine(
    instructors: &SqliteStore,
    appointments: Arc<dyn AppointmentStore>,
    gateway: Arc<StubGateway>,
) -> WorkflowEngine {
    let auth = Arc::new(StaticAuthProvider::signed_in(SessionContext::new(INSTRUCTOR_ID, "access-token")));
    WorkflowEngine::start(auth, instructors, appointments, gateway)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_second_engine_records_without_resending() {
    let (store, appointment, _dir) = sqlite().await;
    let gateway = Arc::new(StubGateway::new());

    let first = engine(
        store.as_ref(),
        Arc::new(FlakyStatusWrites::failing(store.clone(), 1)),
        gateway.clone(),
    )
    .await;
    let err = first
        .decide(appointment.id, AppointmentStatus::Approved, &ReplyDraft::new("s", "Approved"))
        .await
        .unwrap_err();
    assert!(err.is_partial_failure());
    assert_eq!(gateway.sent().len(), 1);
    assert_eq!(
        store.notified_unrecorded(appointment.id).await.unwrap(),
        Some(AppointmentStatus::Approved)
    );
    drop(first);

    let second = engine(store.as_ref(), store.clone(), gateway.clone()).await;
    let decision = second
        .decide(appointment.id, AppointmentStatus::Approved, &ReplyDraft::new("s", "Approved"))
        .await
        .unwrap();
    assert!(!decision.notified);
    assert_eq!(gateway.sent().len(), 1);
    assert_eq!(store.get(appointment.id).await.unwrap().status, AppointmentStatus::Approved);
    assert_eq!(store.notified_unrecorded(appointment.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_second_engine_with_new_outcome_emails_again() {
    let (store, appointment, _dir) = sqlite().await;
    let gateway = Arc::new(StubGateway::new());

    let first = engine(
        store.as_ref(),
        Arc::new(FlakyStatusWrites::failing(store.clone(), 1)),
        gateway.clone(),
    )
    .await;
    assert!(first
        .decide(appointment.id, AppointmentStatus::Approved, &ReplyDraft::new("s", "Approved"))
        .await
        .unwrap_err()
        .is_partial_failure());
    drop(first);

    let second = engine(store.as_ref(), store.clone(), gateway.clone()).await;
    let decision = second
        .decide(
            appointment.id,
            AppointmentStatus::NotApproved,
            &ReplyDraft::new("s", "Correction: not approved"),
        )
        .await
        .unwrap();
    assert!(decision.notified);
    assert_eq!(gateway.sent().len(), 2);
    assert_eq!(gateway.sent()[1].subject, format!("Not Approved: Your Appointment with {INSTRUCTOR_NAME}"));
    assert_eq!(store.get(appointment.id).await.unwrap().status, AppointmentStatus::NotApproved);
    assert_eq!(store.notified_unrecorded(appointment.id).await.unwrap(), None);
}
