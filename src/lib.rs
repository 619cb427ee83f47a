// Office Hours Library - appointment requests between students and instructors
// This exposes the lifecycle workflow, stores and live sync for the CLI and tests

pub mod appointments;
pub mod config;
pub mod instructors;
pub mod notify;
pub mod session;
pub mod single_flight;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use appointments::{
    format_status, submit, Appointment, AppointmentId, AppointmentRequest, AppointmentStatus,
    BookingWindow, NewAppointment, StudentSnapshot, SubmissionError,
};
pub use config::{config, init_config, OfficeHoursConfig};
pub use instructors::{
    remark_lines, Availability, Directory, DirectoryEntry, Instructor, InstructorId, PresenceError,
    PresenceManager, PresenceSnapshot,
};
pub use notify::{HttpNotificationGateway, Notification, NotificationGateway, NotifyError};
pub use session::{require_session, AuthProvider, SessionContext, SessionError, StaticAuthProvider};
pub use single_flight::SingleFlight;
pub use store::{AppointmentStore, InstructorStore, MemoryStore, StoreError};
#[cfg(feature = "database")]
pub use store::SqliteStore;
pub use sync::{ChangeEvent, ChangeKind, Subscription, SyncHub, SyncSignal, Table};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    Decision, ReplyDraft, ReviewSession, StatusEvent, Transition, TransitionError, WorkflowEngine,
    WorkflowError,
};
