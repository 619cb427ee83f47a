//! Appointment status state machine
//!
//! Pure transition function: given the current status and an event, returns the
//! next status and the side effects the engine must run, in order. Nothing here
//! touches the network or the store.
//!
//! ```text
//! pending --Opened--> read --Decided(approved)------> approved
//!    |                  \---Decided(not_approved)--> not_approved
//!    \--Decided(..)-----------------------------------^
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::appointments::AppointmentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusEvent {
    /// The owning instructor opened the appointment for review.
    Opened,
    /// The instructor chose a final outcome.
    Decided(AppointmentStatus),
    /// Re-notification about an outcome already recorded.
    FollowUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Send the reply to the student. Later effects only run if it succeeds.
    Notify,
    /// Write the status to the store.
    PersistStatus(AppointmentStatus),
    /// Update the engine's collection and open review.
    ReflectLocally(AppointmentStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(status: AppointmentStatus, effects: Vec<Effect>) -> Self {
        Self {
            from: status,
            to: status,
            effects,
        }
    }

    pub fn changes_status(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("This appointment is already {}", .0.label().to_lowercase())]
    AlreadyInStatus(AppointmentStatus),
    #[error("This appointment was already marked as {} and cannot be decided again", .0.label())]
    TerminalState(AppointmentStatus),
    #[error("{} is not a decision; choose approved or not approved", .0.label())]
    InvalidTarget(AppointmentStatus),
    #[error("No decision has been sent for this appointment yet (status: {})", .0.label())]
    NotDecided(AppointmentStatus),
}

pub fn transition(current: AppointmentStatus, event: &StatusEvent) -> Result<Transition, TransitionError> {
    use AppointmentStatus::*;

    match (current, *event) {
        (Pending, StatusEvent::Opened) => Ok(Transition {
            from: Pending,
            to: Read,
            effects: vec![Effect::PersistStatus(Read), Effect::ReflectLocally(Read)],
        }),
        (status, StatusEvent::Opened) => Ok(Transition::stay(status, Vec::new())),

        (_, StatusEvent::Decided(target)) if !target.is_terminal() => Err(TransitionError::InvalidTarget(target)),
        (status, StatusEvent::Decided(target)) if status == target => Err(TransitionError::AlreadyInStatus(target)),
        (status, StatusEvent::Decided(_)) if status.is_terminal() => Err(TransitionError::TerminalState(status)),
        (status, StatusEvent::Decided(target)) => Ok(Transition {
            from: status,
            to: target,
            effects: vec![
                Effect::Notify,
                Effect::PersistStatus(target),
                Effect::ReflectLocally(target),
            ],
        }),

        (status, StatusEvent::FollowUp) if status.is_terminal() => Ok(Transition::stay(status, vec![Effect::Notify])),
        (status, StatusEvent::FollowUp) => Err(TransitionError::NotDecided(status)),
    }
}
