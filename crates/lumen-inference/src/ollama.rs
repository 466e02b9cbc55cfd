//! Ollama inference backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use lumen_core::{
    ChatBackend, ChatMessage, EmbeddingBackend, Error, InferenceBackend, Result, TokenStream,
    Vector,
};

use crate::streaming::lines_stream;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = lumen_core::defaults::OLLAMA_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = lumen_core::defaults::EMBED_MODEL;

/// Default chat model.
pub const DEFAULT_GEN_MODEL: &str = lumen_core::defaults::GEN_MODEL;

/// Default embedding dimension for nomic-embed-text.
pub const DEFAULT_DIMENSION: usize = lumen_core::defaults::EMBED_DIMENSION;

/// Ollama inference backend.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    embed_model: String,
    gen_model: String,
    dimension: usize,
    embed_timeout_secs: u64,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_EMBED_MODEL.to_string(),
            DEFAULT_GEN_MODEL.to_string(),
            DEFAULT_DIMENSION,
        )
    }

    /// Create a new Ollama backend with custom configuration.
    ///
    /// Timeouts come from `LUMEN_EMBED_TIMEOUT_SECS` and
    /// `LUMEN_GEN_TIMEOUT_SECS` when set.
    pub fn with_config(
        base_url: String,
        embed_model: String,
        gen_model: String,
        dimension: usize,
    ) -> Self {
        let gen_timeout_secs = std::env::var("LUMEN_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(lumen_core::defaults::GEN_TIMEOUT_SECS);

        let embed_timeout_secs = std::env::var("LUMEN_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(lumen_core::defaults::EMBED_TIMEOUT_SECS);

        info!(
            "Initializing Ollama backend: url={}, embed={}, gen={}",
            base_url, embed_model, gen_model
        );

        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            embed_model,
            gen_model,
            dimension,
            embed_timeout_secs,
            gen_timeout_secs,
        }
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `OLLAMA_BASE` | `http://127.0.0.1:11434` |
    /// | `OLLAMA_EMBED_MODEL` | `nomic-embed-text` |
    /// | `OLLAMA_GEN_MODEL` | `llama3.1:8b` |
    /// | `OLLAMA_EMBED_DIM` | `768` |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_BASE").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let embed_model =
            std::env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let gen_model =
            std::env::var("OLLAMA_GEN_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        let dimension = std::env::var("OLLAMA_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DIMENSION);

        Self::with_config(base_url, embed_model, gen_model, dimension)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// One NDJSON line of a streamed `/api/chat` response.
#[derive(Deserialize)]
struct ChatStreamLine {
    #[serde(default)]
    message: Option<ChatStreamMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChatStreamMessage {
    #[serde(default)]
    content: String,
}

/// Decode one NDJSON line into a text delta. Empty deltas yield `None`.
fn parse_chat_line(line: &str) -> Option<Result<String>> {
    match serde_json::from_str::<ChatStreamLine>(line) {
        Ok(ChatStreamLine {
            error: Some(error), ..
        }) => Some(Err(Error::Inference(format!("Ollama stream error: {}", error)))),
        Ok(ChatStreamLine {
            message: Some(message),
            ..
        }) if !message.content.is_empty() => Some(Ok(message.content)),
        Ok(_) => None,
        Err(e) => Some(Err(Error::Inference(format!(
            "Failed to parse stream line: {}",
            e
        )))),
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "ollama", op = "embed_texts", model = %self.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();

        let request = EmbeddingRequest {
            model: self.embed_model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(Duration::from_secs(self.embed_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                result.embeddings.len(),
                texts.len()
            )));
        }

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            result_count = result.embeddings.len(),
            duration_ms = elapsed,
            "Embedding complete"
        );
        if elapsed > lumen_core::defaults::SLOW_EMBED_MS {
            warn!(
                duration_ms = elapsed,
                input_count = texts.len(),
                slow = true,
                "Slow embedding operation"
            );
        }
        Ok(result.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.embed_model
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    #[instrument(skip(self, messages), fields(subsystem = "inference", component = "ollama", op = "chat_stream", model = %self.gen_model, message_count = messages.len()))]
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream> {
        let request = ChatRequest {
            model: &self.gen_model,
            messages,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        debug!("Chat stream opened");

        let deltas = lines_stream(response.bytes_stream())
            .filter_map(|line| async move {
                match line {
                    Ok(line) => parse_chat_line(&line),
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Box::pin(deltas))
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Ollama health check passed");
                    Ok(true)
                } else {
                    warn!("Ollama health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::ChatRole;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> OllamaBackend {
        OllamaBackend::with_config(
            server.uri(),
            "test-embed".to_string(),
            "test-gen".to_string(),
            3,
        )
    }

    // ==========================================================================
    // Constants Tests
    // ==========================================================================

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_OLLAMA_URL, "http://127.0.0.1:11434");
        assert_eq!(DEFAULT_EMBED_MODEL, "nomic-embed-text");
        assert_eq!(DEFAULT_DIMENSION, 768);
    }

    #[test]
    fn test_custom_config_trims_trailing_slash() {
        let backend = OllamaBackend::with_config(
            "http://gpu-box:11434/".to_string(),
            "e".to_string(),
            "g".to_string(),
            1024,
        );
        assert_eq!(backend.base_url(), "http://gpu-box:11434");
        assert_eq!(backend.dimension(), 1024);
        assert_eq!(EmbeddingBackend::model_name(&backend), "e");
        assert_eq!(ChatBackend::model_name(&backend), "g");
    }

    // ==========================================================================
    // Stream Line Parsing Tests
    // ==========================================================================

    #[test]
    fn test_parse_chat_line_content() {
        let line = r#"{"model":"m","message":{"role":"assistant","content":"Hi"},"done":false}"#;
        assert_eq!(parse_chat_line(line).unwrap().unwrap(), "Hi");
    }

    #[test]
    fn test_parse_chat_line_done_is_skipped() {
        let line = r#"{"model":"m","message":{"role":"assistant","content":""},"done":true}"#;
        assert!(parse_chat_line(line).is_none());
    }

    #[test]
    fn test_parse_chat_line_error() {
        let line = r#"{"error":"model not found"}"#;
        let err = parse_chat_line(line).unwrap().unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }

    #[test]
    fn test_parse_chat_line_invalid_json() {
        assert!(parse_chat_line("{nope").unwrap().is_err());
    }

    // ==========================================================================
    // HTTP Tests
    // ==========================================================================

    #[tokio::test]
    async fn test_embed_texts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(serde_json::json!({"model": "test-embed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let vectors = backend
            .embed_texts(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.4, 0.5, 0.6]);
    }

    #[tokio::test]
    async fn test_embed_texts_empty_skips_request() {
        let server = MockServer::start().await;
        let backend = backend_for(&server);
        assert!(backend.embed_texts(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embed_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = backend_for(&server).embed("x").await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_chat_stream_yields_deltas() {
        let server = MockServer::start().await;
        let body = concat!(
            r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":"lo"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":""},"done":true}"#,
            "\n"
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "stream": true,
                "messages": [{"role": "system", "content": "sys"}, {"role": "user", "content": "hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let messages = vec![
            ChatMessage::new(ChatRole::System, "sys"),
            ChatMessage::new(ChatRole::User, "hi"),
        ];
        let stream = backend_for(&server).chat_stream(&messages).await.unwrap();
        let deltas: Vec<String> = stream.map(|d| d.unwrap()).collect().await;
        assert_eq!(deltas, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_chat_stream_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let result = backend_for(&server).chat_stream(&[]).await;
        assert!(matches!(result, Err(Error::Inference(_))));
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OllamaBackend::with_config(
            "http://127.0.0.1:9".to_string(),
            "e".to_string(),
            "g".to_string(),
            3,
        );
        assert!(!backend.health_check().await.unwrap());
    }
}
