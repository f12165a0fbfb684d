use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::TextGenerator;
use crate::results::ResultStore;
use crate::sessions::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub results: ResultStore,
    /// Text generator behind every parse. Gemini in production, a stub in tests.
    pub llm: Arc<dyn TextGenerator>,
    pub config: Config,
}

impl AppState {
    pub fn new(llm: Arc<dyn TextGenerator>, config: Config) -> Self {
        Self {
            sessions: SessionStore::new(),
            results: ResultStore::new(),
            llm,
            config,
        }
    }
}
