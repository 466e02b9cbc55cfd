//! Mock inference backend for deterministic testing.
//!
//! Embeddings are hashed bags of words, so texts sharing vocabulary land
//! close together and a query for a distinctive phrase ranks the document
//! containing it first. Chat replies are a scripted list of deltas, with
//! optional failure injection.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lumen_inference::mock::{ChatFailure, MockInferenceBackend};
//!
//! let backend = MockInferenceBackend::new()
//!     .with_dimension(128)
//!     .with_chat_deltas(["Hello", ", world"])
//!     .with_chat_failure(ChatFailure::None);
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;

use lumen_core::{
    ChatBackend, ChatMessage, EmbeddingBackend, Error, InferenceBackend, Result, TokenStream,
    Vector,
};

/// How the mock chat stream misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFailure {
    /// Stream every scripted delta.
    None,
    /// Refuse to open the stream.
    OnOpen,
    /// Every item of the stream is an error.
    EveryDelta,
    /// Stream this many deltas, then break.
    AfterDeltas(usize),
}

/// Mock inference backend for testing.
#[derive(Clone)]
pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    chat_deltas: Vec<String>,
    chat_failure: ChatFailure,
    fail_embed: bool,
    latency_ms: u64,
}

/// A recorded backend call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
    pub timestamp: Instant,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 256,
            chat_deltas: vec!["Mock".to_string(), " response".to_string()],
            chat_failure: ChatFailure::None,
            fail_embed: false,
            latency_ms: 0,
        }
    }
}

impl MockInferenceBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension.max(1);
        self
    }

    /// Set the deltas streamed by every chat completion.
    pub fn with_chat_deltas<I, S>(mut self, deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::make_mut(&mut self.config).chat_deltas = deltas.into_iter().map(Into::into).collect();
        self
    }

    /// Inject chat failures.
    pub fn with_chat_failure(mut self, failure: ChatFailure) -> Self {
        Arc::make_mut(&mut self.config).chat_failure = failure;
        self
    }

    /// Make every embedding call fail.
    pub fn with_embed_failure(mut self, fail: bool) -> Self {
        Arc::make_mut(&mut self.config).fail_embed = fail;
        self
    }

    /// Delay applied before each embedding call and each streamed delta.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Inputs of logged calls for one operation, in call order.
    pub fn inputs_for(&self, operation: &str) -> Vec<String> {
        self.get_calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .map(|c| c.input)
            .collect()
    }

    fn log_call(&self, operation: &str, input: &str) {
        if let Ok(mut log) = self.call_log.lock() {
            log.push(MockCall {
                operation: operation.to_string(),
                input: input.to_string(),
                timestamp: Instant::now(),
            });
        }
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        for text in texts {
            self.log_call("embed", text);
        }
        self.simulate_latency().await;

        if self.config.fail_embed {
            return Err(Error::Embedding("Simulated failure for testing".to_string()));
        }

        Ok(texts
            .iter()
            .map(|t| MockEmbeddingGenerator::generate(t, self.config.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl ChatBackend for MockInferenceBackend {
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream> {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        self.log_call("chat", last);

        let deltas = self.config.chat_deltas.clone();
        let items: Vec<Result<String>> = match self.config.chat_failure {
            ChatFailure::OnOpen => {
                return Err(Error::Inference("Simulated failure for testing".to_string()))
            }
            ChatFailure::None => deltas.into_iter().map(Ok).collect(),
            ChatFailure::EveryDelta => deltas
                .iter()
                .map(|_| Err(Error::Inference("Simulated delta failure".to_string())))
                .collect(),
            ChatFailure::AfterDeltas(n) => deltas
                .into_iter()
                .take(n)
                .map(Ok)
                .chain(std::iter::once(Err(Error::Inference(
                    "Simulated stream break".to_string(),
                ))))
                .collect(),
        };

        let latency = self.config.latency_ms;
        let stream = futures::stream::iter(items).then(move |item| async move {
            if latency > 0 {
                tokio::time::sleep(Duration::from_millis(latency)).await;
            }
            item
        });
        Ok(Box::pin(stream))
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

#[async_trait]
impl InferenceBackend for MockInferenceBackend {
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Mock embedding generator with deterministic output.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Hash each lowercase word into a bucket and normalize.
    ///
    /// The same text always produces the same embedding.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let idx = (fnv1a(&word.to_lowercase()) % dimension as u64) as usize;
            vec[idx] += 1.0;
        }

        Self::normalize(&mut vec);
        vec
    }

    fn normalize(vec: &mut [f32]) {
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325u64, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}
