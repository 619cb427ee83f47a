// Reply drafts shown while an appointment is under review. Never persisted.

use serde::{Deserialize, Serialize};

use crate::appointments::{Appointment, AppointmentStatus};

pub const BLANK_SUBJECT: &str = "Instructor Reply";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyDraft {
    pub subject: String,
    pub message: String,
}

impl Default for ReplyDraft {
    fn default() -> Self {
        Self::blank()
    }
}

impl ReplyDraft {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// The draft left behind once a review is closed.
    pub fn blank() -> Self {
        Self::new(BLANK_SUBJECT, "")
    }

    /// Pre-filled draft for `appointment`. Decided appointments get a follow-up
    /// prompt; the rest get a template the instructor is expected to edit.
    pub fn default_for(appointment: &Appointment, instructor_name: &str) -> Self {
        let student = &appointment.student.student_name;
        let status_text = match appointment.status {
            AppointmentStatus::Pending | AppointmentStatus::Read => "Pending Action".to_string(),
            status => status.label(),
        };
        let subject = format!("Reply to {student} (Status: {status_text})");

        let message = if appointment.status.is_terminal() {
            format!(
                "This appointment was already marked as {}. You can send a follow-up email here.",
                appointment.status.label()
            )
        } else {
            format!(
                "Hi {student},\n\nRegarding your appointment request on {} at {}:\n\n\
                 [Type your personalized response here. State clearly if you are approving or rejecting the request.]\n\n\
                 Regards,\n{instructor_name}",
                appointment.appointment_date.format("%Y-%m-%d"),
                appointment.appointment_time.format("%H:%M"),
            )
        };

        Self { subject, message }
    }

    pub fn is_empty(&self) -> bool {
        self.message.trim().is_empty()
    }
}

/// Subject line of the email that carries a decision.
pub fn decision_subject(target: AppointmentStatus, instructor_name: &str) -> String {
    format!("{}: Your Appointment with {instructor_name}", target.label())
}
