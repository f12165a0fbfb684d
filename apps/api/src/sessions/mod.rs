//! Content store: per-session resume text plus the session's processing state.
//!
//! Sessions live in memory only. Every mutation takes the write lock for the
//! duration of a single state change; no guard is held across an outbound call.

pub mod handlers;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::intake::DocumentFormat;
use crate::results::{ResultStore, StoredResult};
pub use state::{ProcessingState, Transition};

/// How the current resume text got into the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextSource {
    Empty,
    Manual,
    Upload {
        filename: String,
        format: DocumentFormat,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    #[serde(rename = "session_id")]
    pub id: Uuid,
    pub resume_text: String,
    pub source: TextSource,
    pub state: ProcessingState,
    pub last_result_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(resume_text: Option<String>) -> Self {
        let now = Utc::now();
        let (resume_text, source) = match resume_text {
            Some(text) => (text, TextSource::Manual),
            None => (String::new(), TextSource::Empty),
        };
        Session {
            id: Uuid::new_v4(),
            resume_text,
            source,
            state: ProcessingState::Idle,
            last_result_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, event: Transition) -> Result<(), AppError> {
        self.state = self
            .state
            .apply(event)
            .map_err(|e| AppError::Internal(e.into()))?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Shared, cloneable handle to every live session.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, resume_text: Option<String>) -> Session {
        let session = Session::new(resume_text);
        self.inner
            .write()
            .await
            .insert(session.id, session.clone());
        debug!("Session {} created", session.id);
        session
    }

    pub async fn get(&self, id: Uuid) -> Result<Session, AppError> {
        self.inner
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    pub async fn remove(&self, id: Uuid) -> Result<Session, AppError> {
        self.inner
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| not_found(id))
    }

    /// Replaces the resume text. Accepts anything, including empty text.
    pub async fn set_text(
        &self,
        id: Uuid,
        resume_text: String,
        source: TextSource,
    ) -> Result<Session, AppError> {
        let mut sessions = self.inner.write().await;
        let session = sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
        session.resume_text = resume_text;
        session.source = source;
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    /// Stores text from a successful upload and clears any previous error.
    pub async fn accept_upload(
        &self,
        id: Uuid,
        resume_text: String,
        filename: String,
        format: DocumentFormat,
    ) -> Result<Session, AppError> {
        let mut sessions = self.inner.write().await;
        let session = sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
        session.apply(Transition::Acknowledge)?;
        session.resume_text = resume_text;
        session.source = TextSource::Upload { filename, format };
        Ok(session.clone())
    }

    /// Moves the session to Processing and returns a snapshot of its text.
    /// A session that is already processing is left untouched.
    pub async fn begin_dispatch(&self, id: Uuid) -> Result<String, AppError> {
        let mut sessions = self.inner.write().await;
        let session = sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
        if session.state.is_processing() {
            return Err(AppError::AlreadyProcessing(id));
        }
        session.apply(Transition::Dispatch)?;
        Ok(session.resume_text.clone())
    }

    /// Records a successful dispatch and files its result, replacing the
    /// session's previous one. Returns `None` when the session was deleted
    /// while the request was in flight; nothing is stored in that case.
    pub async fn complete_dispatch(
        &self,
        id: Uuid,
        parsed: Value,
        results: &ResultStore,
    ) -> Result<Option<StoredResult>, AppError> {
        // Lock order: sessions, then results. Deletion never holds both.
        let mut sessions = self.inner.write().await;
        let Some(session) = sessions.get_mut(&id) else {
            warn!("Session {id} disappeared before its result was recorded");
            return Ok(None);
        };
        session.apply(Transition::Succeed)?;
        let stored = results.replace_for_session(id, parsed).await;
        session.last_result_id = Some(stored.id);
        Ok(Some(stored))
    }

    pub async fn fail_dispatch(&self, id: Uuid, message: String) -> Result<(), AppError> {
        let mut sessions = self.inner.write().await;
        let Some(session) = sessions.get_mut(&id) else {
            warn!("Session {id} disappeared before its failure was recorded");
            return Ok(());
        };
        session.apply(Transition::Fail(message))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Session {id} not found"))
}
