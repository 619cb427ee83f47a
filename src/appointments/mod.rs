// Appointment records and the student-facing submission path

pub mod submission;
pub mod types;

pub use submission::{submit, AppointmentRequest, BookingWindow, SubmissionError};
pub use types::{
    format_status, Appointment, AppointmentId, AppointmentStatus, NewAppointment,
    ParseStatusError, StudentSnapshot,
};
