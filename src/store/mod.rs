//! Appointment and instructor persistence
//!
//! Trait seams for the durable store. The workflow engine, presence manager and
//! directory only ever see these traits, so tests run against `MemoryStore` and
//! the CLI runs against `SqliteStore`.

use async_trait::async_trait;
use thiserror::Error;

use crate::appointments::{Appointment, AppointmentId, AppointmentStatus, NewAppointment};
use crate::instructors::{Availability, Instructor, InstructorId};

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Appointment not found: {0}")]
    AppointmentNotFound(AppointmentId),
    #[error("Instructor not found: {0}")]
    InstructorNotFound(InstructorId),
    #[error("Status update rejected: appointment {id} is {current}, cannot move to {requested}")]
    StatusConflict {
        id: AppointmentId,
        current: AppointmentStatus,
        requested: AppointmentStatus,
    },
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },
    #[error("Database error: {message}")]
    Database { message: String },
    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },
}

/// Whether the store accepts a status write from `current` to `requested`.
///
/// Writes never move an appointment backwards along the lifecycle path and never
/// swap one terminal state for the other. Re-writing the current value is allowed.
pub fn status_write_allowed(current: AppointmentStatus, requested: AppointmentStatus) -> bool {
    if current == requested {
        return true;
    }
    !current.is_terminal() && requested.rank() > current.rank()
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Inserts a new appointment; it always starts `pending`.
    async fn create(&self, payload: NewAppointment) -> Result<Appointment, StoreError>;

    /// Appointments owned by `instructor`, newest `created_at` first.
    async fn list_by_instructor(&self, instructor: &InstructorId) -> Result<Vec<Appointment>, StoreError>;

    /// Fresh read of a single appointment.
    async fn get(&self, id: AppointmentId) -> Result<Appointment, StoreError>;

    /// Conditional status update, see [`status_write_allowed`]. A successful
    /// terminal write clears any marker left by [`AppointmentStore::record_notified`].
    async fn update_status(&self, id: AppointmentId, status: AppointmentStatus) -> Result<(), StoreError>;

    /// Marks that the student was emailed about `status` ahead of the status write.
    async fn record_notified(&self, id: AppointmentId, status: AppointmentStatus) -> Result<(), StoreError>;

    /// The emailed decision whose status write has not landed yet, if any.
    async fn notified_unrecorded(&self, id: AppointmentId) -> Result<Option<AppointmentStatus>, StoreError>;
}

#[async_trait]
pub trait InstructorStore: Send + Sync {
    async fn get_instructor(&self, id: &InstructorId) -> Result<Option<Instructor>, StoreError>;

    /// Instructors visible to students.
    async fn list_verified(&self) -> Result<Vec<Instructor>, StoreError>;

    async fn update_availability(&self, id: &InstructorId, availability: Availability) -> Result<(), StoreError>;

    async fn update_remarks(&self, id: &InstructorId, remarks: &str) -> Result<(), StoreError>;

    /// Registration and admin verification happen outside this crate; this is their write path.
    async fn upsert_instructor(&self, instructor: Instructor) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn test_status_write_rules() {
        assert!(status_write_allowed(Pending, Read));
        assert!(status_write_allowed(Read, Approved));
        assert!(status_write_allowed(Pending, NotApproved));
        assert!(status_write_allowed(Approved, Approved));

        assert!(!status_write_allowed(Read, Pending));
        assert!(!status_write_allowed(Approved, Read));
        assert!(!status_write_allowed(Approved, NotApproved));
        assert!(!status_write_allowed(NotApproved, Approved));
    }
}
