//! Explicit session context
//!
//! The authenticated user travels as a value through every workflow call instead
//! of being looked up from ambient state. `AuthProvider` is the seam to whatever
//! issues sessions; this crate only reads the current session and signs out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

use crate::instructors::InstructorId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No active session")]
    NotSignedIn,
    #[error("Session expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("Session provider error: {0}")]
    Provider(String),
    #[error("Session now belongs to another user: {0}")]
    DifferentUser(InstructorId),
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: InstructorId,
    pub email: Option<String>,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

// Keeps the bearer token out of logs.
impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl SessionContext {
    pub fn new(user_id: impl Into<InstructorId>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Usable for authenticated calls right now: not expired and carrying a token.
    pub fn ensure_valid(&self) -> Result<(), SessionError> {
        if self.access_token.trim().is_empty() {
            return Err(SessionError::NotSignedIn);
        }
        match self.expires_at {
            Some(at) if at <= Utc::now() => Err(SessionError::Expired(at)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_session(&self) -> Result<Option<SessionContext>, SessionError>;

    async fn sign_out(&self) -> Result<(), SessionError>;
}

/// Holds one fixed session until signed out. Used by the CLI (session from
/// configuration) and by tests.
#[derive(Debug, Default)]
pub struct StaticAuthProvider {
    session: Mutex<Option<SessionContext>>,
}

impl StaticAuthProvider {
    pub fn new(session: Option<SessionContext>) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    pub fn signed_in(session: SessionContext) -> Self {
        Self::new(Some(session))
    }

    /// Replaces the held session, as a fresh sign-in would.
    pub fn sign_in(&self, session: SessionContext) {
        let mut held = self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *held = Some(session);
    }

    pub fn is_signed_in(&self) -> bool {
        self.session
            .lock()
            .map(|session| session.is_some())
            .unwrap_or(false)
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn current_session(&self) -> Result<Option<SessionContext>, SessionError> {
        self.session
            .lock()
            .map(|session| session.clone())
            .map_err(|e| SessionError::Provider(e.to_string()))
    }

    async fn sign_out(&self) -> Result<(), SessionError> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| SessionError::Provider(e.to_string()))?;
        if let Some(previous) = session.take() {
            info!(user.id = %previous.user_id, "Signed out");
        }
        Ok(())
    }
}

/// Resolves the current session, failing when there is none or it has expired.
pub async fn require_session(provider: &dyn AuthProvider) -> Result<SessionContext, SessionError> {
    let session = provider
        .current_session()
        .await?
        .ok_or(SessionError::NotSignedIn)?;
    session.ensure_valid()?;
    Ok(session)
}
