// Appointment lifecycle: pure state machine, reply drafts, and the engine that runs them

pub mod draft;
pub mod engine;
pub mod errors;
pub mod state_machine;

pub use draft::{decision_subject, ReplyDraft, BLANK_SUBJECT};
pub use engine::{Decision, ReviewSession, WorkflowEngine};
pub use errors::WorkflowError;
pub use state_machine::{transition, Effect, StatusEvent, Transition, TransitionError};
