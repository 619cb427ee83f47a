use thiserror::Error;

use super::state_machine::TransitionError;
use crate::appointments::{AppointmentId, AppointmentStatus};
use crate::instructors::InstructorId;
use crate::notify::NotifyError;
use crate::session::SessionError;
use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Not signed in: {0}")]
    NoSession(SessionError),

    #[error("Appointment {appointment} does not belong to {instructor}")]
    NotOwner {
        appointment: AppointmentId,
        instructor: InstructorId,
    },

    #[error("Instructor {0} is awaiting admin approval")]
    UnverifiedInstructor(InstructorId),

    #[error("Reply message is empty")]
    EmptyDraft,

    #[error("This appointment is already {}", .0.label().to_lowercase())]
    AlreadyInStatus(AppointmentStatus),

    #[error("Appointment {0} has no student email to notify")]
    MissingRecipient(AppointmentId),

    #[error(transparent)]
    TerminalState(TransitionError),

    #[error("Another action on this appointment is still in progress")]
    ActionInProgress,

    #[error("Unknown appointment: {0}")]
    UnknownAppointment(AppointmentId),

    #[error("No appointment is open for review")]
    NoOpenReview,

    /// The email was not sent; nothing was written.
    #[error("Email not sent, decision not recorded: {0}")]
    NotificationFailed(#[source] NotifyError),

    /// The email went out but the status write failed. Retrying the same
    /// decision only re-attempts the write.
    #[error("Student was notified but the {status} decision for {id} was not recorded: {source}")]
    NotifiedButNotRecorded {
        id: AppointmentId,
        status: AppointmentStatus,
        #[source]
        source: StoreError,
    },

    #[error("Failed to load appointments: {0}")]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Rejected before any side effect; fixable by retrying with corrected input.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            WorkflowError::NoSession(_)
                | WorkflowError::NotOwner { .. }
                | WorkflowError::UnverifiedInstructor(_)
                | WorkflowError::EmptyDraft
                | WorkflowError::AlreadyInStatus(_)
                | WorkflowError::MissingRecipient(_)
                | WorkflowError::TerminalState(_)
                | WorkflowError::ActionInProgress
                | WorkflowError::UnknownAppointment(_)
                | WorkflowError::NoOpenReview
        )
    }

    pub fn is_partial_failure(&self) -> bool {
        matches!(self, WorkflowError::NotifiedButNotRecorded { .. })
    }
}

impl From<SessionError> for WorkflowError {
    fn from(error: SessionError) -> Self {
        WorkflowError::NoSession(error)
    }
}

impl From<TransitionError> for WorkflowError {
    fn from(error: TransitionError) -> Self {
        match error {
            TransitionError::AlreadyInStatus(status) => WorkflowError::AlreadyInStatus(status),
            other => WorkflowError::TerminalState(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(WorkflowError::EmptyDraft.is_precondition());
        assert!(!WorkflowError::EmptyDraft.is_partial_failure());

        let failed = WorkflowError::NotificationFailed(NotifyError::Busy);
        assert!(!failed.is_precondition());
        assert!(!failed.is_partial_failure());

        let partial = WorkflowError::NotifiedButNotRecorded {
            id: AppointmentId::new(),
            status: AppointmentStatus::Approved,
            source: StoreError::Unavailable {
                message: "offline".to_string(),
            },
        };
        assert!(partial.is_partial_failure());
        assert!(!partial.is_precondition());
    }

    #[test]
    fn test_transition_errors_map_to_preconditions() {
        let err: WorkflowError = TransitionError::AlreadyInStatus(AppointmentStatus::Approved).into();
        assert_eq!(err, WorkflowError::AlreadyInStatus(AppointmentStatus::Approved));
        assert_eq!(err.to_string(), "This appointment is already approved");

        let err: WorkflowError = TransitionError::TerminalState(AppointmentStatus::NotApproved).into();
        assert!(err.is_precondition());
    }
}
