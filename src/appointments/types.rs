// Core appointment records shared by the store, the workflow engine and the CLI

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::instructors::InstructorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppointmentId(pub Uuid);

impl AppointmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AppointmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AppointmentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle status of an appointment.
///
/// Moves forward only: `pending -> read -> {approved | not_approved}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Read,
    Approved,
    NotApproved,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown appointment status: {0}")]
pub struct ParseStatusError(pub String);

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Read => "read",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::NotApproved => "not_approved",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Approved | AppointmentStatus::NotApproved)
    }

    /// Position along the lifecycle path; both terminal states share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            AppointmentStatus::Pending => 0,
            AppointmentStatus::Read => 1,
            AppointmentStatus::Approved | AppointmentStatus::NotApproved => 2,
        }
    }

    /// Human label used in notices and reply drafts ("Not Approved").
    pub fn label(&self) -> String {
        format_status(Some(self.as_str()))
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(AppointmentStatus::Pending),
            "read" => Ok(AppointmentStatus::Read),
            "approved" => Ok(AppointmentStatus::Approved),
            "not_approved" => Ok(AppointmentStatus::NotApproved),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Renders a snake_case status for display: `not_approved` -> `Not Approved`.
pub fn format_status(status: Option<&str>) -> String {
    let Some(status) = status.filter(|s| !s.is_empty()) else {
        return "N/A".to_string();
    };

    status
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Student details copied into the appointment at creation time.
/// Never re-synced with any live student record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StudentSnapshot {
    pub student_name: String,
    pub student_id: Option<String>,
    pub student_email: Option<String>,
    pub student_program: String,
    pub student_year_level: Option<String>,
    pub mobile_number: Option<String>,
}

impl StudentSnapshot {
    /// The captured email, if it holds anything other than whitespace.
    pub fn recipient(&self) -> Option<&str> {
        self.student_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub instructor_id: InstructorId,
    #[serde(flatten)]
    pub student: StudentSnapshot,
    pub reason: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn with_status(&self, status: AppointmentStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// One-line summary used in listings.
    pub fn summary(&self) -> String {
        format!(
            "{} - {} at {}",
            self.student.student_name,
            self.appointment_date,
            self.appointment_time.format("%H:%M")
        )
    }
}

/// Payload accepted by `AppointmentStore::create`; the store assigns the id,
/// the `pending` status and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub instructor_id: InstructorId,
    #[serde(flatten)]
    pub student: StudentSnapshot,
    pub reason: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
}

impl NewAppointment {
    pub fn into_appointment(self, id: AppointmentId, created_at: DateTime<Utc>) -> Appointment {
        Appointment {
            id,
            instructor_id: self.instructor_id,
            student: self.student,
            reason: self.reason,
            appointment_date: self.appointment_date,
            appointment_time: self.appointment_time,
            status: AppointmentStatus::Pending,
            created_at,
        }
    }
}
