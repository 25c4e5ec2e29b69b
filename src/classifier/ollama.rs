//! Ollama HTTP client behind the `ChatModel` trait.
//!
//! The engine treats the classifier as an untrusted, possibly-absent
//! collaborator: every call carries timeouts, and callers above the
//! gateway never see an error. Older Ollama builds lack `/api/chat`, so a
//! 404 falls back to `/api/generate` with the system text inlined.

use serde::{Deserialize, Serialize};

use super::ClassifierError;

/// A blocking chat-style text model.
pub trait ChatModel: Send + Sync {
    /// One system+user exchange; returns the raw completion text.
    fn chat(&self, system: &str, user: &str) -> Result<String, ClassifierError>;

    /// Cheap reachability probe.
    fn is_available(&self) -> bool;

    /// Identifier baked into cache keys and run metadata.
    fn model_name(&self) -> &str;
}

pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    read_timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        model: &str,
        connect_timeout: std::time::Duration,
        read_timeout: std::time::Duration,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| ClassifierError::Connection(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            read_timeout_secs: read_timeout.as_secs(),
        })
    }

    fn map_error(&self, e: reqwest::Error) -> ClassifierError {
        if e.is_connect() {
            ClassifierError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            ClassifierError::Timeout(self.read_timeout_secs)
        } else {
            ClassifierError::Connection(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    options: ChatOptions,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
    num_predict: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            num_predict: 80,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
    response: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: ChatOptions,
}

impl ChatModel for OllamaClient {
    fn chat(&self, system: &str, user: &str) -> Result<String, ClassifierError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            stream: false,
            options: ChatOptions::default(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_error(e))?;

        let response = if response.status() == reqwest::StatusCode::NOT_FOUND {
            // Old Ollama without /api/chat.
            let url = format!("{}/api/generate", self.base_url);
            let body = GenerateRequest {
                model: &self.model,
                prompt: format!("### System\n{system}\n\n### User\n{user}\n"),
                stream: false,
                options: ChatOptions::default(),
            };
            self.client
                .post(&url)
                .json(&body)
                .send()
                .map_err(|e| self.map_error(e))?
        } else {
            response
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClassifierError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ClassifierError::ResponseParsing(e.to_string()))?;
        Ok(parsed
            .message
            .map(|m| m.content)
            .or(parsed.response)
            .unwrap_or_default())
    }

    fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send() {
            Ok(r) => r.status().is_success(),
            Err(_) => false,
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Scripted classifier for tests: canned responses, switchable
/// availability, and a call counter for cache assertions.
pub struct MockChatModel {
    responses: std::sync::Mutex<Vec<String>>,
    fallback: String,
    available: bool,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockChatModel {
    /// A model that always answers with `response`.
    pub fn always(response: &str) -> Self {
        Self {
            responses: std::sync::Mutex::new(Vec::new()),
            fallback: response.to_string(),
            available: true,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// A model whose availability probe fails; `chat` also errors.
    pub fn offline() -> Self {
        Self {
            available: false,
            ..Self::always("")
        }
    }

    /// Queue responses returned in order before falling back.
    pub fn with_queue(mut self, responses: Vec<String>) -> Self {
        self.responses = std::sync::Mutex::new(responses);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl ChatModel for MockChatModel {
    fn chat(&self, _system: &str, _user: &str) -> Result<String, ClassifierError> {
        if !self.available {
            return Err(ClassifierError::Connection("offline".into()));
        }
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut queue = self.responses.lock().expect("mock response queue");
        if queue.is_empty() {
            Ok(self.fallback.clone())
        } else {
            Ok(queue.remove(0))
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
