// Student submission: validates an intake request and creates a pending appointment

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{info, warn};

use super::types::{Appointment, NewAppointment, StudentSnapshot};
use crate::instructors::Instructor;
use crate::store::{AppointmentStore, StoreError};

static STUDENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("student id pattern is valid"));

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("Student ID must contain digits only")]
    InvalidStudentId,
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("Appointment date {date} is in the past")]
    DateInPast { date: NaiveDate },
    #[error("The appointment hours are only {window}.")]
    OutsideBookingWindow { window: BookingWindow },
    #[error("Instructor {0} is not accepting appointments")]
    InstructorUnavailable(String),
    #[error("Failed to create appointment: {0}")]
    Store(#[from] StoreError),
}

/// Inclusive range of bookable times of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWindow {
    pub earliest: NaiveTime,
    pub latest: NaiveTime,
}

impl Default for BookingWindow {
    fn default() -> Self {
        Self {
            earliest: NaiveTime::from_hms_opt(7, 0, 0).expect("07:00 is a valid time"),
            latest: NaiveTime::from_hms_opt(18, 0, 0).expect("18:00 is a valid time"),
        }
    }
}

impl BookingWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.earliest && time <= self.latest
    }
}

impl std::fmt::Display for BookingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.earliest.format("%-I %P"),
            self.latest.format("%-I %P")
        )
    }
}

/// Raw intake as typed by the student.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub student_name: String,
    pub student_id: Option<String>,
    pub student_email: String,
    pub student_program: String,
    pub student_year_level: Option<String>,
    pub mobile_number: Option<String>,
    pub reason: String,
    pub appointment_date: String,
    pub appointment_time: String,
}

fn required(value: &str, field: &'static str) -> Result<String, SubmissionError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SubmissionError::MissingField { field });
    }
    Ok(value.to_string())
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl AppointmentRequest {
    /// Checks the request and builds the store payload for `instructor`.
    pub fn validate(
        &self,
        instructor: &Instructor,
        window: &BookingWindow,
        today: NaiveDate,
    ) -> Result<NewAppointment, SubmissionError> {
        let student_name = required(&self.student_name, "student_name")?;
        let student_program = required(&self.student_program, "student_program")?;
        let reason = required(&self.reason, "reason")?;
        let email = required(&self.student_email, "student_email")?;
        if !EMAIL.is_match(&email) {
            return Err(SubmissionError::InvalidEmail(email));
        }

        let student_id = optional(&self.student_id);
        if let Some(id) = &student_id {
            if !STUDENT_ID.is_match(id) {
                return Err(SubmissionError::InvalidStudentId);
            }
        }

        let raw_date = required(&self.appointment_date, "appointment_date")?;
        let appointment_date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
            .map_err(|_| SubmissionError::InvalidDate(raw_date.clone()))?;
        if appointment_date < today {
            return Err(SubmissionError::DateInPast { date: appointment_date });
        }

        let raw_time = required(&self.appointment_time, "appointment_time")?;
        let appointment_time = NaiveTime::parse_from_str(&raw_time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw_time, "%H:%M:%S"))
            .map_err(|_| SubmissionError::InvalidTime(raw_time.clone()))?;
        if !window.contains(appointment_time) {
            return Err(SubmissionError::OutsideBookingWindow { window: *window });
        }

        if !instructor.verified {
            return Err(SubmissionError::InstructorUnavailable(instructor.id.to_string()));
        }

        Ok(NewAppointment {
            instructor_id: instructor.id.clone(),
            student: StudentSnapshot {
                student_name,
                student_id,
                student_email: Some(email),
                student_program,
                student_year_level: optional(&self.student_year_level),
                mobile_number: optional(&self.mobile_number),
            },
            reason,
            appointment_date,
            appointment_time,
        })
    }
}

/// Validates and persists a student's request. The created row is always `pending`.
pub async fn submit(
    store: &dyn AppointmentStore,
    instructor: &Instructor,
    request: &AppointmentRequest,
    window: &BookingWindow,
    today: NaiveDate,
) -> Result<Appointment, SubmissionError> {
    let payload = match request.validate(instructor, window, today) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(instructor.id = %instructor.id, error = %e, "Rejected appointment submission");
            return Err(e);
        }
    };

    let appointment = store.create(payload).await?;
    info!(
        appointment.id = %appointment.id,
        instructor.id = %appointment.instructor_id,
        date = %appointment.appointment_date,
        "Appointment submitted"
    );
    Ok(appointment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::AppointmentStatus;
    use crate::instructors::{Availability, InstructorId};
    use crate::store::MemoryStore;

    fn instructor(verified: bool) -> Instructor {
        Instructor {
            id: InstructorId::from("instr-1"),
            name: "Prof. Reyes".to_string(),
            availability: Availability::InOffice,
            remarks: String::new(),
            verified,
            profile_image_url: None,
        }
    }

    fn request() -> AppointmentRequest {
        AppointmentRequest {
            student_name: "Ana Cruz".to_string(),
            student_id: Some("2021001".to_string()),
            student_email: "ana@school.edu".to_string(),
            student_program: "BSECE".to_string(),
            student_year_level: Some("3rd Year".to_string()),
            mobile_number: None,
            reason: "Thesis consultation".to_string(),
            appointment_date: "2026-11-02".to_string(),
            appointment_time: "09:30".to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_valid_request_builds_payload() {
        let payload = request()
            .validate(&instructor(true), &BookingWindow::default(), today())
            .unwrap();
        assert_eq!(payload.student.student_name, "Ana Cruz");
        assert_eq!(payload.appointment_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(payload.student.mobile_number, None);
    }

    #[test]
    fn test_time_outside_window_rejected() {
        let mut req = request();
        req.appointment_time = "18:01".to_string();
        let err = req
            .validate(&instructor(true), &BookingWindow::default(), today())
            .unwrap_err();
        assert!(matches!(err, SubmissionError::OutsideBookingWindow { .. }));
        assert_eq!(err.to_string(), "The appointment hours are only 7 am to 6 pm.");

        req.appointment_time = "18:00".to_string();
        assert!(req.validate(&instructor(true), &BookingWindow::default(), today()).is_ok());
    }

    #[test]
    fn test_past_date_and_bad_student_id_rejected() {
        let mut req = request();
        req.appointment_date = "2026-10-18".to_string();
        assert!(matches!(
            req.validate(&instructor(true), &BookingWindow::default(), today()),
            Err(SubmissionError::DateInPast { .. })
        ));

        let mut req = request();
        req.student_id = Some("20-21".to_string());
        assert!(matches!(
            req.validate(&instructor(true), &BookingWindow::default(), today()),
            Err(SubmissionError::InvalidStudentId)
        ));
    }

    #[test]
    fn test_unverified_instructor_refused() {
        assert!(matches!(
            request().validate(&instructor(false), &BookingWindow::default(), today()),
            Err(SubmissionError::InstructorUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_creates_pending_row() {
        let store = MemoryStore::new();
        let created = submit(&store, &instructor(true), &request(), &BookingWindow::default(), today())
            .await
            .unwrap();
        assert_eq!(created.status, AppointmentStatus::Pending);

        let rows = store.list_by_instructor(&InstructorId::from("instr-1")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, AppointmentStatus::Pending);
    }
}
