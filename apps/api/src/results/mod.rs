//! Result routing: parsed resumes kept in memory under a result id so the
//! display surface survives a refresh.

pub mod display;
pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct StoredResult {
    #[serde(rename = "result_id")]
    pub id: Uuid,
    pub session_id: Uuid,
    pub parsed_resume: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct ResultStore {
    inner: Arc<RwLock<HashMap<Uuid, StoredResult>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a parsed result and files it under a fresh id.
    /// A session keeps only its latest result; older ones are dropped.
    pub async fn replace_for_session(&self, session_id: Uuid, parsed_resume: Value) -> StoredResult {
        let stored = StoredResult {
            id: Uuid::new_v4(),
            session_id,
            parsed_resume,
            created_at: Utc::now(),
        };
        let mut results = self.inner.write().await;
        results.retain(|_, r| r.session_id != session_id);
        results.insert(stored.id, stored.clone());
        stored
    }

    pub async fn get(&self, id: Uuid) -> Option<StoredResult> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Drops every result belonging to a session. Returns how many went.
    pub async fn remove_for_session(&self, session_id: Uuid) -> usize {
        let mut results = self.inner.write().await;
        let before = results.len();
        results.retain(|_, r| r.session_id != session_id);
        before - results.len()
    }
}
