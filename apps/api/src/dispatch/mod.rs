//! Request dispatcher: one prompt, one outbound call, one decoded JSON value.
//!
//! The session gate lives in `SessionStore::begin_dispatch`: a session that is
//! already Processing never reaches the generator.

pub mod handlers;
pub mod prompts;

use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::{AppError, PROCESSING_FAILED_MESSAGE};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{parse_json_reply, TextGenerator};
use crate::results::{ResultStore, StoredResult};
use crate::sessions::SessionStore;
use prompts::RESUME_PARSE_PROMPT;

/// Message returned when there is nothing to parse.
pub const EMPTY_RESUME_MESSAGE: &str = "Please enter or upload resume content.";

pub fn build_prompt(resume_text: &str) -> String {
    RESUME_PARSE_PROMPT
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
        .replace("{resume_text}", resume_text)
}

/// Rejects empty and whitespace-only text before anything is sent.
pub fn validate_resume_text(resume_text: &str) -> Result<(), AppError> {
    if resume_text.trim().is_empty() {
        return Err(AppError::Validation(EMPTY_RESUME_MESSAGE.to_string()));
    }
    Ok(())
}

/// Sends validated text to the generator and decodes the reply.
pub async fn parse_resume(
    generator: &dyn TextGenerator,
    resume_text: &str,
) -> Result<Value, AppError> {
    validate_resume_text(resume_text)?;

    let prompt = build_prompt(resume_text);
    let started = Instant::now();
    let reply = generator.generate(&prompt).await?;
    info!(
        "Resume parsed by {} in {}ms ({} chars in, {} chars out)",
        generator.model(),
        started.elapsed().as_millis(),
        resume_text.len(),
        reply.len()
    );

    parse_json_reply(&reply).map_err(|e| {
        warn!("Model reply was not JSON: {reply}");
        AppError::from(e)
    })
}

/// Runs a full dispatch for one session: gate, call, then hand the result
/// to the result store. Every failure leaves the session Errored and its
/// resume text untouched.
///
/// Everything after the gate runs on its own task, so the session still
/// leaves Processing when the caller's future is dropped mid-call.
pub async fn dispatch_session(
    sessions: &SessionStore,
    results: &ResultStore,
    generator: Arc<dyn TextGenerator>,
    session_id: Uuid,
) -> Result<StoredResult, AppError> {
    let resume_text = sessions.begin_dispatch(session_id).await?;

    let task = tokio::spawn(finish_dispatch(
        sessions.clone(),
        results.clone(),
        generator,
        session_id,
        resume_text,
    ));

    match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Dispatch task for session {session_id} failed: {e}");
            sessions
                .fail_dispatch(session_id, PROCESSING_FAILED_MESSAGE.to_string())
                .await?;
            Err(AppError::Internal(anyhow!("dispatch task failed: {e}")))
        }
    }
}

async fn finish_dispatch(
    sessions: SessionStore,
    results: ResultStore,
    generator: Arc<dyn TextGenerator>,
    session_id: Uuid,
    resume_text: String,
) -> Result<StoredResult, AppError> {
    match parse_resume(generator.as_ref(), &resume_text).await {
        Ok(parsed) => sessions
            .complete_dispatch(session_id, parsed, &results)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Session {session_id} was deleted while processing"))
            }),
        Err(err) => {
            sessions
                .fail_dispatch(session_id, err.user_message())
                .await?;
            Err(err)
        }
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::Notify;

    use super::testing::{Reply, StubGenerator};
    use super::*;
    use crate::sessions::ProcessingState;

    async fn session_with(sessions: &SessionStore, text: &str) -> Uuid {
        sessions.create(Some(text.to_string())).await.id
    }

    async fn wait_for_calls(stub: &StubGenerator, n: usize) {
        while stub.calls() < n {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_prompt_embeds_text_last() {
        let prompt = build_prompt("Jane Doe, B.Tech O.U.");
        assert!(prompt.contains("Normalize all abbreviations"));
        assert!(prompt.contains("valid JSON only"));
        assert!(prompt.ends_with("Resume content:\nJane Doe, B.Tech O.U."));
    }

    #[test]
    fn test_prompt_does_not_expand_placeholders_in_user_text() {
        let prompt = build_prompt("{json_only}");
        assert!(prompt.ends_with("Resume content:\n{json_only}"));
    }

    #[tokio::test]
    async fn test_round_trip_echo() {
        let sessions = SessionStore::new();
        let results = ResultStore::new();
        let stub = Arc::new(StubGenerator::new(Reply::EchoName));
        let id = session_with(&sessions, "X").await;

        let stored = dispatch_session(&sessions, &results, stub.clone(), id)
            .await
            .unwrap();

        assert_eq!(stored.parsed_resume, json!({"name": "X"}));
        assert_eq!(stub.calls(), 1);
        let session = sessions.get(id).await.unwrap();
        assert_eq!(session.state, ProcessingState::Idle);
        assert_eq!(session.last_result_id, Some(stored.id));
        assert!(results.get(stored.id).await.is_some());
    }

    #[tokio::test]
    async fn test_whitespace_text_never_reaches_generator() {
        let sessions = SessionStore::new();
        let results = ResultStore::new();
        let stub = Arc::new(StubGenerator::new(Reply::EchoName));
        let id = session_with(&sessions, " \n\t ").await;

        let err = dispatch_session(&sessions, &results, stub.clone(), id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(stub.calls(), 0);
        assert_eq!(
            sessions.get(id).await.unwrap().state,
            ProcessingState::Errored {
                message: EMPTY_RESUME_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_decode_error_keeps_text_and_stores_nothing() {
        let sessions = SessionStore::new();
        let results = ResultStore::new();
        let stub = Arc::new(StubGenerator::new(Reply::Text(
            "Here is your resume!".to_string(),
        )));
        let id = session_with(&sessions, "Jane").await;

        let err = dispatch_session(&sessions, &results, stub, id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Decode(_)));
        let session = sessions.get(id).await.unwrap();
        assert_eq!(session.resume_text, "Jane");
        assert!(session.last_result_id.is_none());
        assert!(matches!(session.state, ProcessingState::Errored { .. }));
        assert_eq!(results.remove_for_session(id).await, 0);
    }

    #[tokio::test]
    async fn test_transport_error_then_manual_retry() {
        let sessions = SessionStore::new();
        let results = ResultStore::new();
        let id = session_with(&sessions, "Jane").await;

        let down = Arc::new(StubGenerator::new(Reply::Unreachable));
        let err = dispatch_session(&sessions, &results, down.clone(), id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
        assert_eq!(down.calls(), 1);

        let up = Arc::new(StubGenerator::new(Reply::Text(
            "```json\n{\"ok\": true}\n```".to_string(),
        )));
        let stored = dispatch_session(&sessions, &results, up, id)
            .await
            .unwrap();
        assert_eq!(stored.parsed_resume, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_trigger_while_processing_is_a_no_op() {
        let sessions = SessionStore::new();
        let results = ResultStore::new();
        let gate = Arc::new(Notify::new());
        let stub = Arc::new(StubGenerator::gated(Reply::EchoName, gate.clone()));
        let id = session_with(&sessions, "X").await;

        let in_flight = {
            let (sessions, results, stub) = (sessions.clone(), results.clone(), stub.clone());
            tokio::spawn(async move { dispatch_session(&sessions, &results, stub, id).await })
        };

        wait_for_calls(&stub, 1).await;
        assert!(sessions.get(id).await.unwrap().state.is_processing());

        let err = dispatch_session(&sessions, &results, stub.clone(), id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyProcessing(_)));
        assert_eq!(stub.calls(), 1);

        gate.notify_one();
        let stored = in_flight.await.unwrap().unwrap();
        assert_eq!(stored.parsed_resume, json!({"name": "X"}));
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_strand_session_in_processing() {
        let sessions = SessionStore::new();
        let results = ResultStore::new();
        let gate = Arc::new(Notify::new());
        let stub = Arc::new(StubGenerator::gated(Reply::EchoName, gate.clone()));
        let id = session_with(&sessions, "X").await;

        let caller = {
            let (sessions, results, stub) = (sessions.clone(), results.clone(), stub.clone());
            tokio::spawn(async move { dispatch_session(&sessions, &results, stub, id).await })
        };
        wait_for_calls(&stub, 1).await;

        // A client disconnect drops the handler future mid-call.
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());
        assert!(sessions.get(id).await.unwrap().state.is_processing());

        gate.notify_one();
        tokio::time::timeout(Duration::from_secs(5), async {
            while sessions.get(id).await.unwrap().state.is_processing() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let session = sessions.get(id).await.unwrap();
        assert_eq!(session.state, ProcessingState::Idle);
        let result_id = session.last_result_id.unwrap();
        assert_eq!(
            results.get(result_id).await.unwrap().parsed_resume,
            json!({"name": "X"})
        );

        let retry = Arc::new(StubGenerator::new(Reply::EchoName));
        assert!(dispatch_session(&sessions, &results, retry, id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_during_flight_leaves_no_result() {
        let sessions = SessionStore::new();
        let results = ResultStore::new();
        let gate = Arc::new(Notify::new());
        let stub = Arc::new(StubGenerator::gated(Reply::EchoName, gate.clone()));
        let id = session_with(&sessions, "X").await;

        let in_flight = {
            let (sessions, results, stub) = (sessions.clone(), results.clone(), stub.clone());
            tokio::spawn(async move { dispatch_session(&sessions, &results, stub, id).await })
        };
        wait_for_calls(&stub, 1).await;

        sessions.remove(id).await.unwrap();
        results.remove_for_session(id).await;
        gate.notify_one();

        let err = in_flight.await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(results.remove_for_session(id).await, 0);
    }

    #[tokio::test]
    async fn test_new_parse_replaces_previous_result() {
        let sessions = SessionStore::new();
        let results = ResultStore::new();
        let stub = Arc::new(StubGenerator::new(Reply::EchoName));
        let id = session_with(&sessions, "X").await;

        let first = dispatch_session(&sessions, &results, stub.clone(), id)
            .await
            .unwrap();
        let second = dispatch_session(&sessions, &results, stub.clone(), id)
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert!(results.get(first.id).await.is_none());
        assert!(results.get(second.id).await.is_some());
        assert_eq!(results.remove_for_session(id).await, 1);
    }
}
