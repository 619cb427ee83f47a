//! Appointment workflow engine
//!
//! Thin adapter around [`transition`]: it re-reads the appointment from the
//! store, asks the state machine what to do, then runs the effects in order.
//! For a decision that order is notify, persist, reflect; a failed step stops
//! the sequence so no status is ever written for an email that was not sent.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn, Instrument};

use super::draft::{decision_subject, ReplyDraft};
use super::errors::WorkflowError;
use super::state_machine::{transition, Effect, StatusEvent};
use crate::appointments::{Appointment, AppointmentId, AppointmentStatus};
use crate::instructors::Instructor;
use crate::notify::{Notification, NotificationGateway};
use crate::session::{require_session, AuthProvider, SessionContext, SessionError};
use crate::single_flight::SingleFlight;
use crate::store::{AppointmentStore, InstructorStore, StoreError};
use crate::sync::{self, Subscription};
use crate::telemetry::{create_workflow_span, generate_correlation_id};

/// The appointment currently open for review and its reply draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSession {
    pub appointment: Appointment,
    pub draft: ReplyDraft,
}

/// Result of a successful `decide`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub appointment: Appointment,
    /// False for a record-only retry after an earlier notified-but-not-recorded failure.
    pub notified: bool,
}

#[derive(Debug, Default)]
struct EngineState {
    appointments: Vec<Appointment>,
    review: Option<ReviewSession>,
    /// Decisions whose email went out but whose status write failed.
    unrecorded: HashMap<AppointmentId, AppointmentStatus>,
}

pub struct WorkflowEngine {
    auth: Arc<dyn AuthProvider>,
    instructor: Instructor,
    store: Arc<dyn AppointmentStore>,
    gateway: Arc<dyn NotificationGateway>,
    state: Mutex<EngineState>,
    controls: SingleFlight,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("instructor", &self.instructor.id)
            .field("busy", &self.controls.is_busy())
            .finish()
    }
}

impl WorkflowEngine {
    /// Binds an engine to the signed-in instructor and loads their appointments.
    ///
    /// A session whose user has no instructor record is signed out. An
    /// unverified instructor gets no engine and nothing is fetched. Every later
    /// action resolves the session from `auth` again.
    pub async fn start(
        auth: Arc<dyn AuthProvider>,
        instructors: &dyn InstructorStore,
        store: Arc<dyn AppointmentStore>,
        gateway: Arc<dyn NotificationGateway>,
    ) -> Result<Self, WorkflowError> {
        let session = require_session(auth.as_ref()).await?;

        let Some(instructor) = instructors.get_instructor(&session.user_id).await? else {
            warn!(user.id = %session.user_id, "No instructor profile for session user, signing out");
            if let Err(e) = auth.sign_out().await {
                error!(error = %e, "Sign-out failed");
            }
            return Err(WorkflowError::NoSession(SessionError::NotSignedIn));
        };

        if !instructor.verified {
            info!(instructor.id = %instructor.id, "Instructor awaiting admin approval");
            return Err(WorkflowError::UnverifiedInstructor(instructor.id));
        }

        let engine = Self {
            auth,
            instructor,
            store,
            gateway,
            state: Mutex::new(EngineState::default()),
            controls: SingleFlight::new(),
        };
        engine.refresh().await?;
        Ok(engine)
    }

    pub fn instructor(&self) -> &Instructor {
        &self.instructor
    }

    /// True while a decide or follow-up is in flight; action controls are disabled.
    pub fn is_busy(&self) -> bool {
        self.controls.is_busy()
    }

    pub async fn appointments(&self) -> Vec<Appointment> {
        self.state.lock().await.appointments.clone()
    }

    pub async fn review(&self) -> Option<ReviewSession> {
        self.state.lock().await.review.clone()
    }

    /// Decisions from this engine that reached the student but not the store.
    /// The store keeps its own marker, so a new engine still skips the resend.
    pub async fn unrecorded(&self) -> Vec<(AppointmentId, AppointmentStatus)> {
        let state = self.state.lock().await;
        let mut pending: Vec<_> = state.unrecorded.iter().map(|(id, s)| (*id, *s)).collect();
        pending.sort();
        pending
    }

    /// Replaces the local collection with the store's copy. The open review
    /// picks up the fresh status but keeps its draft.
    pub async fn refresh(&self) -> Result<usize, WorkflowError> {
        self.ensure_session().await?;
        let fresh = self.store.list_by_instructor(&self.instructor.id).await?;
        let count = fresh.len();

        let mut state = self.state.lock().await;
        if let Some(review) = state.review.as_mut() {
            if let Some(current) = fresh.iter().find(|a| a.id == review.appointment.id) {
                review.appointment = current.clone();
            }
        }
        state.appointments = fresh;
        Ok(count)
    }

    /// Re-fetches on every appointments change until `subscription` closes.
    pub async fn follow(self: Arc<Self>, subscription: Subscription) -> usize {
        sync::follow(subscription, || {
            let engine = self.clone();
            async move {
                engine.refresh().await.map_err(|e| match e {
                    WorkflowError::Store(store) => store,
                    other => StoreError::Unavailable {
                        message: other.to_string(),
                    },
                })
            }
        })
        .await
    }

    /// Opens an appointment for review, marking it read if it was pending.
    /// A failed read-marking write is logged and otherwise ignored.
    pub async fn open(&self, id: AppointmentId) -> Result<ReviewSession, WorkflowError> {
        self.ensure_session().await?;
        let mut appointment = self.fetch_owned(id).await?;
        let draft = ReplyDraft::default_for(&appointment, &self.instructor.name);
        let plan = transition(appointment.status, &StatusEvent::Opened)?;

        for effect in plan.effects {
            match effect {
                Effect::PersistStatus(status) => {
                    if let Err(e) = self.store.update_status(id, status).await {
                        warn!(appointment.id = %id, error = %e, "Failed to mark appointment as read");
                    }
                }
                Effect::ReflectLocally(status) => {
                    appointment.status = status;
                }
                Effect::Notify => {}
            }
        }

        let review = ReviewSession {
            appointment: appointment.clone(),
            draft,
        };
        let mut state = self.state.lock().await;
        replace_in(&mut state.appointments, &appointment);
        state.review = Some(review.clone());
        Ok(review)
    }

    /// Discards the open review and its draft. An in-flight decision is not cancelled.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(review) = state.review.take() {
            info!(appointment.id = %review.appointment.id, "Review closed, draft discarded");
        }
    }

    /// Replaces the draft of the open review.
    pub async fn edit_draft(&self, draft: ReplyDraft) -> Result<(), WorkflowError> {
        let mut state = self.state.lock().await;
        match state.review.as_mut() {
            Some(review) => {
                review.draft = draft;
                Ok(())
            }
            None => Err(WorkflowError::NoOpenReview),
        }
    }

    /// Notifies the student of `target` and records it.
    ///
    /// A second call while one is in flight fails with `ActionInProgress`.
    pub async fn decide(
        &self,
        id: AppointmentId,
        target: AppointmentStatus,
        draft: &ReplyDraft,
    ) -> Result<Decision, WorkflowError> {
        let _controls = self.controls.try_begin().ok_or(WorkflowError::ActionInProgress)?;

        let correlation_id = generate_correlation_id();
        let span = create_workflow_span("decide", Some(&id.to_string()), Some(&correlation_id));
        self.run_decision(id, target, draft).instrument(span).await
    }

    async fn run_decision(
        &self,
        id: AppointmentId,
        target: AppointmentStatus,
        draft: &ReplyDraft,
    ) -> Result<Decision, WorkflowError> {
        let session = self.ensure_session().await?;
        if draft.is_empty() {
            return Err(WorkflowError::EmptyDraft);
        }

        let appointment = self.fetch_owned(id).await?;

        let remembered = self.state.lock().await.unrecorded.get(&id).copied();
        let retry = match remembered {
            Some(status) => Some(status),
            None => self.store.notified_unrecorded(id).await?,
        };
        if retry == Some(target) {
            return self.record_only(appointment, target).await;
        }

        let plan = transition(appointment.status, &StatusEvent::Decided(target))?;
        let recipient = appointment
            .student
            .recipient()
            .ok_or(WorkflowError::MissingRecipient(id))?
            .to_string();
        let notification = Notification::new(
            recipient,
            decision_subject(target, &self.instructor.name),
            draft.message.clone(),
        );

        let mut updated = appointment;
        for effect in plan.effects {
            match effect {
                Effect::Notify => {
                    if let Err(e) = self.gateway.send(&session, &notification).await {
                        error!(error = %e, "Notification failed, decision not recorded");
                        return Err(WorkflowError::NotificationFailed(e));
                    }
                    info!(to = %notification.to, "Student notified");
                    if let Err(e) = self.store.record_notified(id, target).await {
                        warn!(error = %e, "Could not remember the sent notification");
                    }
                }
                Effect::PersistStatus(status) => {
                    if let Err(e) = self.store.update_status(id, status).await {
                        error!(status = %status, error = %e, "Student notified but decision not recorded");
                        self.state.lock().await.unrecorded.insert(id, status);
                        return Err(WorkflowError::NotifiedButNotRecorded { id, status, source: e });
                    }
                }
                Effect::ReflectLocally(status) => {
                    updated.status = status;
                    self.reflect(&updated).await;
                }
            }
        }

        info!(from = %plan.from, to = %plan.to, "Decision recorded");
        Ok(Decision {
            appointment: updated,
            notified: true,
        })
    }

    /// Completes a decision whose email already went out.
    async fn record_only(
        &self,
        appointment: Appointment,
        target: AppointmentStatus,
    ) -> Result<Decision, WorkflowError> {
        let id = appointment.id;
        // Also runs when the status already landed, so the store forgets the pending marker.
        if let Err(e) = self.store.update_status(id, target).await {
            error!(status = %target, error = %e, "Record-only retry failed");
            return Err(WorkflowError::NotifiedButNotRecorded {
                id,
                status: target,
                source: e,
            });
        }

        let updated = appointment.with_status(target);
        self.reflect(&updated).await;
        info!(status = %target, "Decision recorded without re-notifying");
        Ok(Decision {
            appointment: updated,
            notified: false,
        })
    }

    /// Re-sends the draft about an already decided appointment. No status change.
    pub async fn follow_up(&self, id: AppointmentId, draft: &ReplyDraft) -> Result<(), WorkflowError> {
        let _controls = self.controls.try_begin().ok_or(WorkflowError::ActionInProgress)?;
        let session = self.ensure_session().await?;
        if draft.is_empty() {
            return Err(WorkflowError::EmptyDraft);
        }

        let appointment = self.fetch_owned(id).await?;
        let plan = transition(appointment.status, &StatusEvent::FollowUp)?;
        let recipient = appointment
            .student
            .recipient()
            .ok_or(WorkflowError::MissingRecipient(id))?;

        if plan.effects.contains(&Effect::Notify) {
            let notification = Notification::new(recipient, draft.subject.clone(), draft.message.clone());
            self.gateway
                .send(&session, &notification)
                .await
                .map_err(WorkflowError::NotificationFailed)?;
            info!(appointment.id = %id, status = %appointment.status, "Follow-up sent");
        }
        Ok(())
    }

    /// The current session, which must still belong to this engine's instructor.
    async fn ensure_session(&self) -> Result<SessionContext, WorkflowError> {
        let session = require_session(self.auth.as_ref()).await?;
        if session.user_id != self.instructor.id {
            warn!(user.id = %session.user_id, instructor.id = %self.instructor.id, "Session now belongs to another user");
            return Err(WorkflowError::NoSession(SessionError::DifferentUser(session.user_id)));
        }
        Ok(session)
    }

    /// Fresh read of `id`, refusing appointments owned by someone else.
    async fn fetch_owned(&self, id: AppointmentId) -> Result<Appointment, WorkflowError> {
        let appointment = self.store.get(id).await.map_err(|e| match e {
            StoreError::AppointmentNotFound(id) => WorkflowError::UnknownAppointment(id),
            other => WorkflowError::Store(other),
        })?;

        if appointment.instructor_id != self.instructor.id {
            warn!(appointment.id = %id, instructor.id = %self.instructor.id, "Refusing to act on another instructor's appointment");
            return Err(WorkflowError::NotOwner {
                appointment: id,
                instructor: self.instructor.id.clone(),
            });
        }
        Ok(appointment)
    }

    async fn reflect(&self, updated: &Appointment) {
        let mut state = self.state.lock().await;
        state.unrecorded.remove(&updated.id);
        replace_in(&mut state.appointments, updated);
        if let Some(review) = state.review.as_mut() {
            if review.appointment.id == updated.id {
                review.appointment = updated.clone();
            }
        }
    }
}

fn replace_in(appointments: &mut [Appointment], updated: &Appointment) {
    if let Some(slot) = appointments.iter_mut().find(|a| a.id == updated.id) {
        *slot = updated.clone();
    }
}
