//! Instructor presence
//!
//! Availability changes are applied to the local view first and rolled back to
//! the last confirmed value if the store write fails. Remarks go through an
//! explicit edit/save cycle; only one save may be in flight and a failed save
//! leaves the typed text in place for another attempt.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::types::{Availability, Instructor, InstructorId, MAX_REMARKS_CHARS};
use crate::session::{SessionContext, SessionError};
use crate::single_flight::SingleFlight;
use crate::store::{InstructorStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PresenceError {
    #[error("No instructor profile for {0}")]
    InstructorNotFound(InstructorId),
    #[error("Instructor {0} is awaiting admin approval")]
    UnverifiedInstructor(InstructorId),
    #[error("Remarks are not being edited")]
    NotEditing,
    #[error("Remarks are already being saved")]
    SaveInProgress,
    #[error("Remarks are limited to {max} characters (got {len})")]
    RemarksTooLong { len: usize, max: usize },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Point-in-time copy of what the presence panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSnapshot {
    pub availability: Availability,
    pub remarks: String,
    pub draft_remarks: String,
    pub editing: bool,
    pub saving: bool,
}

#[derive(Debug)]
struct PresenceState {
    shown: Availability,
    confirmed: Availability,
    remarks: String,
    draft: String,
    editing: bool,
}

pub struct PresenceManager {
    instructor_id: InstructorId,
    store: Arc<dyn InstructorStore>,
    state: Mutex<PresenceState>,
    saving: SingleFlight,
}

impl std::fmt::Debug for PresenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceManager")
            .field("instructor_id", &self.instructor_id)
            .field("saving", &self.saving.is_busy())
            .finish()
    }
}

impl PresenceManager {
    /// Loads the signed-in instructor's current presence.
    pub async fn load(session: &SessionContext, store: Arc<dyn InstructorStore>) -> Result<Self, PresenceError> {
        session.ensure_valid()?;
        let instructor = store
            .get_instructor(&session.user_id)
            .await?
            .ok_or_else(|| PresenceError::InstructorNotFound(session.user_id.clone()))?;
        Self::from_instructor(&instructor, store)
    }

    /// Presence controls for `instructor`, who must be verified.
    pub fn from_instructor(instructor: &Instructor, store: Arc<dyn InstructorStore>) -> Result<Self, PresenceError> {
        if !instructor.verified {
            info!(instructor.id = %instructor.id, "Instructor awaiting admin approval, presence locked");
            return Err(PresenceError::UnverifiedInstructor(instructor.id.clone()));
        }
        Ok(Self {
            instructor_id: instructor.id.clone(),
            store,
            state: Mutex::new(PresenceState {
                shown: instructor.availability,
                confirmed: instructor.availability,
                remarks: instructor.remarks.clone(),
                draft: instructor.remarks.clone(),
                editing: false,
            }),
            saving: SingleFlight::new(),
        })
    }

    pub fn instructor_id(&self) -> &InstructorId {
        &self.instructor_id
    }

    pub async fn snapshot(&self) -> PresenceSnapshot {
        let state = self.state.lock().await;
        PresenceSnapshot {
            availability: state.shown,
            remarks: state.remarks.clone(),
            draft_remarks: state.draft.clone(),
            editing: state.editing,
            saving: self.saving.is_busy(),
        }
    }

    pub async fn set_availability(&self, availability: Availability) -> Result<(), PresenceError> {
        self.state.lock().await.shown = availability;

        match self.store.update_availability(&self.instructor_id, availability).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.confirmed = availability;
                info!(instructor.id = %self.instructor_id, availability = %availability, "Availability updated");
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.lock().await;
                // A newer selection made while this write was pending wins.
                if state.shown == availability {
                    state.shown = state.confirmed;
                }
                warn!(
                    instructor.id = %self.instructor_id,
                    requested = %availability,
                    reverted_to = %state.shown,
                    error = %e,
                    "Availability update failed, reverted"
                );
                Err(e.into())
            }
        }
    }

    pub async fn begin_edit_remarks(&self) -> Result<(), PresenceError> {
        if self.saving.is_busy() {
            return Err(PresenceError::SaveInProgress);
        }
        let mut state = self.state.lock().await;
        if !state.editing {
            state.editing = true;
            state.draft = state.remarks.clone();
        }
        Ok(())
    }

    pub async fn edit_remarks(&self, text: &str) -> Result<(), PresenceError> {
        if self.saving.is_busy() {
            return Err(PresenceError::SaveInProgress);
        }
        let len = text.chars().count();
        if len > MAX_REMARKS_CHARS {
            return Err(PresenceError::RemarksTooLong {
                len,
                max: MAX_REMARKS_CHARS,
            });
        }
        let mut state = self.state.lock().await;
        if !state.editing {
            return Err(PresenceError::NotEditing);
        }
        state.draft = text.to_string();
        Ok(())
    }

    /// Drops the draft and leaves edit mode.
    pub async fn cancel_edit_remarks(&self) -> Result<(), PresenceError> {
        if self.saving.is_busy() {
            return Err(PresenceError::SaveInProgress);
        }
        let mut state = self.state.lock().await;
        state.editing = false;
        state.draft = state.remarks.clone();
        Ok(())
    }

    /// Persists the trimmed draft. On failure the draft and edit mode are kept.
    pub async fn save_remarks(&self) -> Result<String, PresenceError> {
        let _flight = self.saving.try_begin().ok_or(PresenceError::SaveInProgress)?;

        let trimmed = {
            let state = self.state.lock().await;
            if !state.editing {
                return Err(PresenceError::NotEditing);
            }
            state.draft.trim().to_string()
        };

        if let Err(e) = self.store.update_remarks(&self.instructor_id, &trimmed).await {
            warn!(instructor.id = %self.instructor_id, error = %e, "Saving remarks failed, draft kept");
            return Err(e.into());
        }

        let mut state = self.state.lock().await;
        state.remarks = trimmed.clone();
        state.draft = trimmed.clone();
        state.editing = false;
        info!(instructor.id = %self.instructor_id, "Remarks saved");
        Ok(trimmed)
    }

    /// Replaces the confirmed values with the store's copy. An open draft and a
    /// pending availability choice are left alone.
    pub async fn reload(&self) -> Result<(), PresenceError> {
        let instructor = self
            .store
            .get_instructor(&self.instructor_id)
            .await?
            .ok_or_else(|| PresenceError::InstructorNotFound(self.instructor_id.clone()))?;

        let mut state = self.state.lock().await;
        if state.shown == state.confirmed {
            state.shown = instructor.availability;
        }
        state.confirmed = instructor.availability;
        state.remarks = instructor.remarks.clone();
        if !state.editing {
            state.draft = instructor.remarks;
        }
        Ok(())
    }
}
