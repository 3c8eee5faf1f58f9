//! # Model Client
//!
//! The seam between the DJ managers and a chat-completion model.
//!
//! - [`ModelClient`]: `ask(prompt, cancel)` returning text or a [`ModelError`]
//! - [`CancelFlag`]: shared cooperative cancellation signal
//! - [`ChatClient`]: OpenAI-compatible `/chat/completions` implementation
//!
//! Every [`ModelError`] degrades to "nothing queued" in the managers. The
//! variants exist so logs can tell an empty answer from a network failure.
//!
//! ## Cancellation
//!
//! [`ChatClient`] sends the HTTP request from a worker thread and waits on a
//! channel in short slices, checking the flag between slices. Once the flag is
//! set `ask` returns [`ModelError::Cancelled`] straight away; the abandoned
//! worker finishes on its own and its result is dropped, so no partial answer
//! ever reaches the caller.

use crate::config::ModelSettings;
use crate::history::HistoryStore;
use crossbeam_channel::{bounded, RecvTimeoutError};
use log::{debug, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// How often a waiting `ask` re-checks its cancel flag.
const CANCEL_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Request cancelled")]
    Cancelled,

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Model endpoint returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Could not decode model response: {0}")]
    Decode(String),

    #[error("Model client not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ModelError::Decode(e.to_string())
        } else {
            ModelError::Http(e.to_string())
        }
    }
}

/// Cooperative cancellation signal shared between the input side and model calls.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Text-in, text-out model.
pub trait ModelClient: Send + Sync {
    /// Send `prompt` and return the generated text.
    ///
    /// Implementations should return [`ModelError::Cancelled`] promptly once
    /// `cancel` is set, and [`ModelError::EmptyResponse`] for blank output.
    fn ask(&self, prompt: &str, cancel: Option<&CancelFlag>) -> Result<String, ModelError>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Blocking client for OpenAI-compatible chat-completions endpoints.
///
/// Works against api.openai.com as well as local servers exposing the same
/// route. Successful exchanges are appended to the history store when one is
/// attached.
pub struct ChatClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    system_prompt: Option<String>,
    history: Option<Arc<HistoryStore>>,
}

impl ChatClient {
    /// Build a client from settings.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotConfigured`] when `api_base` or `model` is blank, or
    /// the HTTP client cannot be constructed.
    pub fn new(settings: &ModelSettings) -> Result<Self, ModelError> {
        let base = settings.api_base.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(ModelError::NotConfigured("model.api_base is empty".to_string()));
        }
        if settings.model.trim().is_empty() {
            return Err(ModelError::NotConfigured("model.model is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| ModelError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{base}/chat/completions"),
            api_key: settings.resolved_api_key(),
            model: settings.model.clone(),
            system_prompt: settings.system_prompt.clone().filter(|s| !s.trim().is_empty()),
            history: None,
        })
    }

    #[must_use]
    pub fn with_history(mut self, history: Arc<HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    fn request_body(&self, prompt: &str) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.8,
        }
    }

    fn log_exchange(&self, prompt: &str, response: &str) {
        if let Some(history) = &self.history {
            if let Err(e) = history.record_exchange(prompt, response) {
                warn!("Failed to record model exchange: {e}");
            }
        }
    }
}

fn send_chat(
    http: &Client,
    endpoint: &str,
    api_key: Option<&str>,
    body: &ChatRequest,
) -> Result<String, ModelError> {
    let mut request = http.post(endpoint).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send()?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ModelError::Status {
            code: status.as_u16(),
            body,
        });
    }

    let parsed: ChatResponse = response.json()?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(ModelError::EmptyResponse)
}

impl ModelClient for ChatClient {
    fn ask(&self, prompt: &str, cancel: Option<&CancelFlag>) -> Result<String, ModelError> {
        if cancel.is_some_and(CancelFlag::is_set) {
            return Err(ModelError::Cancelled);
        }
        debug!("Model prompt:\n{prompt}");

        let (tx, rx) = bounded(1);
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let api_key = self.api_key.clone();
        let body = self.request_body(prompt);

        thread::spawn(move || {
            let result = send_chat(&http, &endpoint, api_key.as_deref(), &body);
            // Receiver is gone when the caller cancelled
            let _ = tx.send(result);
        });

        let result = loop {
            match rx.recv_timeout(CANCEL_POLL) {
                Ok(result) => break result,
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_some_and(CancelFlag::is_set) {
                        debug!("Model request cancelled while in flight");
                        return Err(ModelError::Cancelled);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(ModelError::Http("request worker exited".to_string()));
                }
            }
        };

        let text = result?;
        debug!("Model response:\n{text}");
        self.log_exchange(prompt, &text);
        Ok(text)
    }
}
