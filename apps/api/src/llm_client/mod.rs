/// LLM Client — the single point of entry for all Gemini API calls.
///
/// ARCHITECTURAL RULE: No other module may call the generative-language API
/// directly. Everything goes through `TextGenerator`, which `GeminiClient`
/// implements for production and tests replace with a stub.
///
/// One prompt out, one text reply in. No streaming, no retries.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod prompts;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// A text-generation backend: one prompt in, one complete text reply out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Identifier of the backing model, used in logs.
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, api_base: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().build()?,
            api_key,
            model,
            api_base,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }

    /// Makes a raw call to the Gemini API, returning the full response object.
    pub async fn call(&self, prompt: &str) -> Result<GenerateContentResponse, LlmError> {
        let request_body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        // A 2xx body that is not a valid envelope is a decode failure, not transport.
        let body = response.text().await?;
        let gemini_response: GenerateContentResponse = serde_json::from_str(&body)?;

        if let Some(usage) = &gemini_response.usage_metadata {
            debug!(
                "LLM call succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(gemini_response)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self.call(prompt).await?;
        response.text().ok_or(LlmError::EmptyContent)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Decodes a model reply as JSON, unwrapping markdown code fences first.
pub fn parse_json_reply(text: &str) -> Result<Value, LlmError> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(LlmError::EmptyContent);
    }
    serde_json::from_str(text).map_err(LlmError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
/// The first complete fenced block wins wherever it sits in the reply, with a
/// `json`-tagged block preferred over an untagged one. An opening fence that
/// is never closed is dropped along with its tag.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(block) = fenced_block(text, "```json").or_else(|| fenced_block(text, "```")) {
        block
    } else if let Some(stripped) = text.strip_prefix("```") {
        skip_fence_tag(stripped).trim()
    } else {
        text
    }
}

fn fenced_block<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let body = skip_fence_tag(&text[start..]);
    let len = body.find("```")?;
    Some(body[..len].trim())
}

fn skip_fence_tag(text: &str) -> &str {
    let tag_len = text
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(text.len());
    &text[tag_len..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::HeaderMap, routing::post, Json, Router};
    use serde_json::json;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_block_inside_prose() {
        let input = "Here is the parsed resume:\n```json\n{\"name\": \"Ada\"}\n```\nLet me know!";
        assert_eq!(strip_json_fences(input), "{\"name\": \"Ada\"}");
    }

    #[test]
    fn test_strip_json_fences_leading_block_then_prose() {
        let input = "```json\n{\"name\": \"Ada\"}\n```\nLet me know if you need anything else.";
        assert_eq!(strip_json_fences(input), "{\"name\": \"Ada\"}");
        assert_eq!(parse_json_reply(input).unwrap(), json!({"name": "Ada"}));
    }

    #[test]
    fn test_strip_json_fences_untagged_block_inside_prose() {
        let input = "Parsed:\n```JSON\n{\"a\": 1}\n```\nDone.";
        assert_eq!(strip_json_fences(input), "{\"a\": 1}");
        let input = "Parsed:\n```\n{\"a\": 1}\n```\nDone.";
        assert_eq!(strip_json_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_json_fences_unterminated_opening() {
        assert_eq!(strip_json_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_json_reply_rejects_prose() {
        assert!(matches!(
            parse_json_reply("Sorry, I cannot help with that."),
            Err(LlmError::Parse(_))
        ));
        assert!(matches!(parse_json_reply("   "), Err(LlmError::EmptyContent)));
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":"}, {"text": " 1}"}]}
            }]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_response_text_none_without_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert!(response.text().is_none());
    }

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_gemini_client_sends_key_and_prompt() {
        async fn echo(
            Path(call): Path<String>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            let key = headers
                .get("x-goog-api-key")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let prompt = body["contents"][0]["parts"][0]["text"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let reply = json!({ "call": call, "key": key, "prompt": prompt }).to_string();
            Json(json!({
                "candidates": [{"content": {"parts": [{"text": reply}]}}],
                "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 5}
            }))
        }

        let base = spawn_stub(Router::new().route("/v1beta/models/:call", post(echo))).await;
        let client =
            GeminiClient::new("k-123".to_string(), "gemini-test".to_string(), base).unwrap();

        let text = client.generate("hello").await.unwrap();
        let reply = parse_json_reply(&text).unwrap();
        assert_eq!(reply["call"], "gemini-test:generateContent");
        assert_eq!(reply["key"], "k-123");
        assert_eq!(reply["prompt"], "hello");
    }

    #[tokio::test]
    async fn test_gemini_client_surfaces_api_error_message() {
        async fn reject() -> (axum::http::StatusCode, Json<Value>) {
            (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({"error": {"code": 400, "message": "API key not valid"}})),
            )
        }

        let base = spawn_stub(Router::new().route("/v1beta/models/:call", post(reject))).await;
        let client = GeminiClient::new("bad".to_string(), "m".to_string(), base).unwrap();

        match client.generate("hello").await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_gemini_client_malformed_success_body_is_parse_error() {
        async fn garbage() -> &'static str {
            "not json"
        }

        let base = spawn_stub(Router::new().route("/v1beta/models/:call", post(garbage))).await;
        let client = GeminiClient::new("k".to_string(), "m".to_string(), base).unwrap();

        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)), "got {err:?}");
        assert!(matches!(
            crate::errors::AppError::from(err),
            crate::errors::AppError::Decode(_)
        ));
    }

    #[tokio::test]
    async fn test_gemini_client_unreachable_is_http_error() {
        let client = GeminiClient::new(
            "k".to_string(),
            "m".to_string(),
            "http://127.0.0.1:9".to_string(),
        )
        .unwrap();
        assert!(matches!(
            client.generate("hello").await,
            Err(LlmError::Http(_))
        ));
    }
}
