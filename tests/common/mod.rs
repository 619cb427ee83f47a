//! Shared fixtures for the integration tests: a seeded in-memory store and a
//! scripted notification gateway.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use office_hours::{
    submit, Appointment, AppointmentRequest, AppointmentStore, BookingWindow, Instructor, InstructorStore,
    MemoryStore, Notification, NotificationGateway, NotifyError, SessionContext, StaticAuthProvider,
    WorkflowEngine, WorkflowError,
};

pub const INSTRUCTOR_ID: &str = "instr-1";
pub const INSTRUCTOR_NAME: &str = "Prof. Reyes";
pub const STUDENT_EMAIL: &str = "ana.cruz@example.edu";

/// Records every send; can be told to fail or to take a while.
#[derive(Default)]
pub struct StubGateway {
    sent: Mutex<Vec<Notification>>,
    attempts: AtomicUsize,
    fail_next: AtomicUsize,
    delay: Option<Duration>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationGateway for StubGateway {
    async fn send(&self, _session: &SessionContext, notification: &Notification) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NotifyError::Rejected {
                status: 500,
                detail: Some("relay unavailable".to_string()),
            });
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub fn session() -> SessionContext {
    SessionContext::new(INSTRUCTOR_ID, "access-token")
}

pub fn request() -> AppointmentRequest {
    let date = Local::now().date_naive() + ChronoDuration::days(7);
    AppointmentRequest {
        student_name: "Ana Cruz".to_string(),
        student_id: Some("2021001".to_string()),
        student_email: STUDENT_EMAIL.to_string(),
        student_program: "BS Computer Science".to_string(),
        student_year_level: Some("3".to_string()),
        mobile_number: None,
        reason: "Thesis consultation".to_string(),
        appointment_date: date.format("%Y-%m-%d").to_string(),
        appointment_time: "14:00".to_string(),
    }
}

pub async fn seed_instructor(store: &MemoryStore, id: &str, verified: bool) -> Instructor {
    let mut instructor = Instructor::new(id, INSTRUCTOR_NAME);
    instructor.verified = verified;
    store.upsert_instructor(instructor.clone()).await.unwrap();
    instructor
}

/// Submits one request through the student path and returns the stored row.
pub async fn submit_request(store: &MemoryStore, instructor: &Instructor) -> Appointment {
    submit(
        store,
        instructor,
        &request(),
        &BookingWindow::default(),
        Local::now().date_naive(),
    )
    .await
    .unwrap()
}

pub async fn start_engine(
    store: Arc<MemoryStore>,
    gateway: Arc<StubGateway>,
) -> Result<WorkflowEngine, WorkflowError> {
    start_engine_with_auth(store, gateway, Arc::new(StaticAuthProvider::signed_in(session()))).await
}

/// Like `start_engine`, with the caller keeping hold of the session provider.
pub async fn start_engine_with_auth(
    store: Arc<MemoryStore>,
    gateway: Arc<StubGateway>,
    auth: Arc<StaticAuthProvider>,
) -> Result<WorkflowEngine, WorkflowError> {
    WorkflowEngine::start(auth, store.as_ref(), store.clone(), gateway).await
}

/// Verified instructor, one pending appointment and a running engine.
pub async fn scenario(gateway: StubGateway) -> (Arc<MemoryStore>, Arc<StubGateway>, WorkflowEngine, Appointment) {
    let store = Arc::new(MemoryStore::new());
    let instructor = seed_instructor(&store, INSTRUCTOR_ID, true).await;
    let appointment = submit_request(&store, &instructor).await;
    let gateway = Arc::new(gateway);
    let engine = start_engine(store.clone(), gateway.clone()).await.unwrap();
    (store, gateway, engine, appointment)
}

pub async fn stored_status(store: &MemoryStore, appointment: &Appointment) -> office_hours::AppointmentStatus {
    store.get(appointment.id).await.unwrap().status
}
