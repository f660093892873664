use crate::actors::messages::{ActorError, AppError, GenerationMessage};
use crate::actors::traits::GenerationActor;
use crate::config::GENERATION_MODEL;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{error, info};

/// Returned when the upstream answers without any usable candidate text.
pub const FALLBACK_RESPONSE: &str = "Sorry, I couldn't generate a response.";

/// Prompt used by the connectivity probe.
pub const PROBE_PROMPT: &str = "Say hello";

const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// A handle to the `GeminiActor`.
///
/// Public, cloneable interface for sending messages to the running actor. It
/// abstracts away the `mpsc::Sender`.
#[derive(Clone)]
pub struct GeminiActorHandle {
    sender: mpsc::Sender<GenerationMessage>,
}

impl GeminiActorHandle {
    /// Creates a new `GeminiActor` and returns a handle to it.
    ///
    /// This will spawn the `GeminiActorRunner` in a new Tokio task.
    pub fn new(api_key: String, base_url: String) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let actor = GeminiActorRunner::new(receiver, api_key, base_url);
        tokio::spawn(async move { actor.run().await });
        Self { sender }
    }

    async fn request(
        &self,
        msg: GenerationMessage,
        recv: oneshot::Receiver<Result<String, AppError>>,
    ) -> Result<String, AppError> {
        self.sender
            .send(msg)
            .await
            .map_err(|e| ActorError::Generation(format!("Actor unavailable: {}", e)))?;
        timeout(GENERATION_TIMEOUT, recv)
            .await?
            .map_err(|e| ActorError::Generation(format!("Actor dropped response: {}", e)))?
    }
}

#[async_trait]
impl GenerationActor for GeminiActorHandle {
    async fn generate(&self, prompt: String) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        self.request(
            GenerationMessage::Generate {
                prompt,
                responder: send,
            },
            recv,
        )
        .await
    }

    async fn generate_vision(
        &self,
        prompt: String,
        image_bytes: Vec<u8>,
        mime_type: String,
    ) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        self.request(
            GenerationMessage::GenerateVision {
                prompt,
                image_bytes,
                mime_type,
                responder: send,
            },
            recv,
        )
        .await
    }

    async fn probe(&self) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        self.request(GenerationMessage::Probe { responder: send }, recv)
            .await
    }
}

// --- Actor Runner (Internal Logic) ---

struct GeminiActorRunner {
    receiver: mpsc::Receiver<GenerationMessage>,
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiActorRunner {
    fn new(receiver: mpsc::Receiver<GenerationMessage>, api_key: String, base_url: String) -> Self {
        Self {
            receiver,
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    async fn run(mut self) {
        info!("GeminiActor started");

        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }

        info!("GeminiActor stopped");
    }

    async fn handle_message(&mut self, msg: GenerationMessage) {
        match msg {
            GenerationMessage::Generate { prompt, responder } => {
                let result = self.generate_content(prompt).await;
                let _ = responder.send(result);
            }
            GenerationMessage::GenerateVision {
                prompt,
                image_bytes,
                mime_type,
                responder,
            } => {
                let result = self.generate_vision(prompt, image_bytes, mime_type).await;
                let _ = responder.send(result);
            }
            GenerationMessage::Probe { responder } => {
                let result = self.generate_content(PROBE_PROMPT.to_string()).await;
                let _ = responder.send(result);
            }
        }
    }

    async fn generate_content(&self, prompt: String) -> Result<String, AppError> {
        let payload = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        self.dispatch(payload).await
    }

    async fn generate_vision(
        &self,
        prompt: String,
        image_bytes: Vec<u8>,
        mime_type: String,
    ) -> Result<String, AppError> {
        let payload = serde_json::json!({
            "contents": [{ "parts": [
                { "text": prompt },
                { "inline_data": { "mime_type": mime_type, "data": BASE64.encode(&image_bytes) } }
            ] }]
        });
        self.dispatch(payload).await
    }

    /// Sends one generateContent call and extracts the first candidate's
    /// text. Upstream failure bodies are passed through verbatim so the HTTP
    /// layer can pattern-match quota errors.
    async fn dispatch(&self, payload: serde_json::Value) -> Result<String, AppError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, GENERATION_MODEL, self.api_key
        );

        let request_future = self.client.post(&url).json(&payload).send();
        let res = timeout(REQUEST_TIMEOUT, request_future).await??;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!("Generation request failed with status {}: {}", status, body);
            return Err(AppError::Upstream(format!("status {}: {}", status, body)));
        }

        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| ActorError::Generation(e.to_string()))?;

        let text = json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .trim();

        if text.is_empty() {
            Ok(FALLBACK_RESPONSE.to_string())
        } else {
            Ok(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/v1beta/models/gemini-flash-latest:generateContent";

    async fn setup_test_actor(base_url: String) -> GeminiActorHandle {
        let (sender, receiver) = mpsc::channel(32);
        let actor = GeminiActorRunner::new(receiver, "test-key".to_string(), base_url);
        tokio::spawn(async move { actor.run().await });
        GeminiActorHandle { sender }
    }

    fn candidate_body(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
    }

    #[tokio::test]
    async fn test_generate_success() {
        // 1. Arrange
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri()).await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("Namaste!")))
            .mount(&mock_server)
            .await;

        // 2. Act
        let result = handle.generate("Say something".to_string()).await;

        // 3. Assert
        assert_eq!(result.unwrap(), "Namaste!");
    }

    #[tokio::test]
    async fn test_generate_empty_candidates_falls_back() {
        // 1. Arrange
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri()).await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&mock_server)
            .await;

        // 2. Act
        let result = handle.generate("Say something".to_string()).await;

        // 3. Assert
        assert_eq!(result.unwrap(), FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_generate_server_error_surfaces_body() {
        // 1. Arrange
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri()).await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("model exploded"))
            .mount(&mock_server)
            .await;

        // 2. Act
        let result = handle.generate("Say something".to_string()).await;

        // 3. Assert
        match result {
            Err(AppError::Upstream(msg)) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("model exploded"));
            }
            other => panic!("expected an upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_quota_error_keeps_status_text() {
        // 1. Arrange
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri()).await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(
                ResponseTemplate::new(429).set_body_string("Resource quota exhausted"),
            )
            .mount(&mock_server)
            .await;

        // 2. Act
        let result = handle.generate("Say something".to_string()).await;

        // 3. Assert
        match result {
            Err(AppError::Upstream(msg)) => {
                // The HTTP layer remaps on these substrings.
                assert!(msg.contains("429"));
                assert!(msg.to_lowercase().contains("quota"));
            }
            other => panic!("expected an upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_vision_sends_inline_image() {
        // 1. Arrange
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri()).await;

        let expected_data = BASE64.encode(b"fake image bytes");
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [
                    { "text": "Describe this image." },
                    { "inline_data": { "mime_type": "image/png", "data": expected_data } }
                ] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("A temple.")))
            .mount(&mock_server)
            .await;

        // 2. Act
        let result = handle
            .generate_vision(
                "Describe this image.".to_string(),
                b"fake image bytes".to_vec(),
                "image/png".to_string(),
            )
            .await;

        // 3. Assert
        assert_eq!(result.unwrap(), "A temple.");
    }

    #[tokio::test]
    async fn test_probe_sends_probe_prompt() {
        // 1. Arrange
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(mock_server.uri()).await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [{ "text": PROBE_PROMPT }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("Hello!")))
            .mount(&mock_server)
            .await;

        // 2. Act
        let result = handle.probe().await;

        // 3. Assert
        assert_eq!(result.unwrap(), "Hello!");
    }
}
