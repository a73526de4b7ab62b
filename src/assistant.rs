//! Ollama client for the reading assistant.
//!
//! The assistant answers questions about the page the reader is viewing.
//! Requests are blocking with no retries or streaming; the chat surface
//! keeps at most one request in flight. [`AssistantClient::ask`] is the
//! surface the views consume: it never fails, turning every error into a
//! visible reply prefixed with [`ERROR_INDICATOR`].

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, warn};

/// Prefix of every reply produced from a failed request.
pub const ERROR_INDICATOR: &str = "[assistant error]";

const SYSTEM_PROMPT: &str = "You are a reading assistant. Answer questions about the \
     document page the reader is viewing. Be concise; quote the page when it helps.";

/// Errors from the assistant subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum AssistantError {
    #[error("Ollama is not available at {url}")]
    #[diagnostic(
        code(quire::assistant::unavailable),
        help("Start Ollama with `ollama serve`, or point base_url at a reachable server.")
    )]
    Unavailable { url: String },

    #[error("Ollama request failed: {message}")]
    #[diagnostic(
        code(quire::assistant::request_failed),
        help("Check that Ollama is running and the configured model is pulled.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse Ollama response: {message}")]
    #[diagnostic(
        code(quire::assistant::parse_error),
        help("The model returned an unexpected response format.")
    )]
    ParseError { message: String },
}

/// Configuration for the assistant client.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 120,
        }
    }
}

/// Client for the Ollama REST API.
pub struct AssistantClient {
    config: AssistantConfig,
    available: bool,
    /// Models available locally after `probe()`.
    available_models: Vec<String>,
}

impl AssistantClient {
    /// Create a new client with the given configuration.
    ///
    /// The client starts unavailable; call [`probe`](Self::probe) once at
    /// startup before asking anything.
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            config,
            available: false,
            available_models: Vec::new(),
        }
    }

    /// Probe the Ollama server to check availability.
    ///
    /// Sends a lightweight request to the `/api/tags` endpoint and parses
    /// the list of locally available models.
    pub fn probe(&mut self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(5))
            .build();

        match agent.get(&url).call() {
            Ok(resp) => {
                if resp.status() != 200 {
                    self.available = false;
                    return false;
                }
                self.available = true;

                if let Ok(body) = resp.into_string() {
                    if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) {
                        self.available_models = json["models"]
                            .as_array()
                            .map(|arr| {
                                arr.iter()
                                    .filter_map(|m| m["name"].as_str().map(|s| s.to_string()))
                                    .collect()
                            })
                            .unwrap_or_default();
                    }
                }

                debug!(models = self.available_models.len(), "assistant reachable");
                true
            }
            Err(_) => {
                self.available = false;
                self.available_models.clear();
                false
            }
        }
    }

    /// Whether the Ollama server responded to the last probe.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Whether the configured model is locally available.
    pub fn has_model(&self) -> bool {
        let target = &self.config.model;
        self.available_models
            .iter()
            .any(|m| m == target || m.split(':').next() == Some(target.as_str()))
    }

    /// The model name being used.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Generate a completion.
    ///
    /// `context` is quoted into the prompt as the page the reader is viewing;
    /// `image` is attached through Ollama's base64 `images` field for
    /// multimodal models.
    pub fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        context: Option<&str>,
        image: Option<&[u8]>,
    ) -> Result<String, AssistantError> {
        if !self.available {
            return Err(AssistantError::Unavailable {
                url: self.config.base_url.clone(),
            });
        }

        let full_prompt = match context {
            Some(page) => format!(
                "The reader is currently viewing this page:\n\"\"\"\n{page}\n\"\"\"\n\n{prompt}"
            ),
            None => prompt.to_string(),
        };

        let url = format!("{}/api/generate", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "prompt": full_prompt,
            "stream": false,
        });

        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys.to_string());
        }
        if let Some(bytes) = image {
            body["images"] = serde_json::json!([BASE64.encode(bytes)]);
        }

        let body_str = serde_json::to_string(&body).map_err(|e| AssistantError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let resp = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body_str)
            .map_err(|e: ureq::Error| AssistantError::RequestFailed {
                message: e.to_string(),
            })?;

        let resp_str = resp.into_string().map_err(|e| AssistantError::ParseError {
            message: e.to_string(),
        })?;

        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| AssistantError::ParseError {
                message: e.to_string(),
            })?;

        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AssistantError::ParseError {
                message: "missing 'response' field".into(),
            })
    }

    /// Ask a question, with optional page text and image context.
    ///
    /// Never fails: errors come back as a reply string starting with
    /// [`ERROR_INDICATOR`], which the chat surface renders like any other
    /// answer instead of dropping the turn.
    pub fn ask(
        &self,
        prompt: &str,
        context_text: Option<&str>,
        context_image: Option<&[u8]>,
    ) -> String {
        match self.generate(prompt, Some(SYSTEM_PROMPT), context_text, context_image) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "assistant request failed");
                format!("{ERROR_INDICATOR} {e}")
            }
        }
    }
}

impl std::fmt::Debug for AssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("available", &self.available)
            .finish()
    }
}
