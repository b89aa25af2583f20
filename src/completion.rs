//! Remote chat-completion client
//!
//! Sends a single-message conversation to an OpenAI-compatible endpoint and
//! returns the first generated message.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CompletionConfig;

/// Why a completion produced no answer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// The credential variable is unset or empty
    #[error("API key not configured (set {0})")]
    MissingCredential(String),

    /// Connection refused, DNS failure, timeout
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("completion API error {status}: {body}")]
    Status { status: u16, body: String },

    /// Response carried no choices or no message text
    #[error("empty completion response")]
    EmptyResponse,

    /// Response body could not be decoded
    #[error("malformed completion response: {0}")]
    Malformed(String),
}

impl CompletionError {
    /// Sentence spoken to the user for this failure
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::MissingCredential(_) => "I am sorry, the AI brain API key is not configured.",
            Self::Transport(_) => "Sorry, I couldn't connect to my AI brain.",
            Self::Status { .. } => "Sorry, my AI brain returned an error.",
            Self::EmptyResponse => "Sorry, I received an empty response from the AI brain.",
            Self::Malformed(_) => "An unexpected error occurred while thinking.",
        }
    }
}

/// One message of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chat completion request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Raw HTTP reply handed back by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Performs the HTTP exchange for a completion request
pub trait ChatTransport {
    /// POST `request` to `endpoint` with a bearer `api_key`
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::Transport`] when no HTTP reply arrives
    fn post(
        &self,
        endpoint: &str,
        api_key: &SecretString,
        request: &ChatRequest,
    ) -> Result<HttpReply, CompletionError>;
}

/// Blocking HTTPS transport
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(timeout: std::time::Duration) -> crate::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl ChatTransport for HttpTransport {
    fn post(
        &self,
        endpoint: &str,
        api_key: &SecretString,
        request: &ChatRequest,
    ) -> Result<HttpReply, CompletionError> {
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(request)
            .send()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(HttpReply { status, body })
    }
}

/// Answers free-form questions through a hosted language model
pub struct CompletionClient {
    transport: Box<dyn ChatTransport>,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key_env: String,
    api_key: Option<SecretString>,
}

impl CompletionClient {
    /// Create a client over the blocking HTTPS transport
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: CompletionConfig) -> crate::Result<Self> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, Box::new(transport)))
    }

    /// Create a client over a custom transport
    #[must_use]
    pub fn with_transport(config: CompletionConfig, transport: Box<dyn ChatTransport>) -> Self {
        if config.api_key.is_none() {
            tracing::warn!(
                variable = %config.api_key_env,
                "no completion API key configured, questions will not be answered"
            );
        }

        Self {
            transport,
            endpoint: config.endpoint,
            model: config.model,
            max_tokens: config.max_tokens,
            api_key_env: config.api_key_env,
            api_key: config.api_key,
        }
    }

    /// Build the request body for `question`
    #[must_use]
    pub fn build_request(&self, question: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: question.to_string(),
            }],
            max_tokens: self.max_tokens,
        }
    }

    /// Ask a question and return the generated answer
    ///
    /// A missing credential short-circuits before any request is made.
    ///
    /// # Errors
    ///
    /// Returns the [`CompletionError`] describing the failure
    pub fn ask(&self, question: &str) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| CompletionError::MissingCredential(self.api_key_env.clone()))?;

        let request = self.build_request(question);
        tracing::debug!(model = %self.model, question, "sending completion request");

        let reply = self.transport.post(&self.endpoint, api_key, &request)?;

        if !(200..300).contains(&reply.status) {
            return Err(CompletionError::Status {
                status: reply.status,
                body: reply.body,
            });
        }

        let answer = parse_answer(&reply.body)?;
        tracing::debug!(answer_len = answer.len(), "completion received");
        Ok(answer)
    }

    /// Ask a question and return text fit to speak, answer or apology
    ///
    /// Failures are logged with their technical detail.
    #[must_use]
    pub fn answer(&self, question: &str) -> String {
        match self.ask(question) {
            Ok(answer) => answer,
            Err(e) => {
                match &e {
                    CompletionError::EmptyResponse => {
                        tracing::warn!(error = %e, "completion returned no choices");
                    }
                    _ => tracing::error!(error = %e, "completion failed"),
                }
                e.user_message().to_string()
            }
        }
    }
}

/// Extract the first choice's message text from a response body
///
/// # Errors
///
/// Returns `Malformed` for undecodable JSON and `EmptyResponse` when no
/// choice carries text
pub fn parse_answer(body: &str) -> Result<String, CompletionError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Malformed(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(CompletionError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_choice() {
        let body = r#"{"choices":[
            {"message":{"role":"assistant","content":" Paris. "}},
            {"message":{"role":"assistant","content":"Lyon"}}
        ]}"#;
        assert_eq!(parse_answer(body).unwrap(), "Paris.");
    }

    #[test]
    fn test_parse_empty_choices() {
        assert_eq!(parse_answer(r#"{"choices":[]}"#), Err(CompletionError::EmptyResponse));
        assert_eq!(parse_answer("{}"), Err(CompletionError::EmptyResponse));
    }

    #[test]
    fn test_parse_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(parse_answer(body), Err(CompletionError::EmptyResponse));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_answer("<html>"), Err(CompletionError::Malformed(_))));
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "llama3-8b-8192".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "the capital of france".to_string(),
            }],
            max_tokens: 1024,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "llama3-8b-8192",
                "messages": [{"role": "user", "content": "the capital of france"}],
                "max_tokens": 1024
            })
        );
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let errors = [
            CompletionError::MissingCredential("GROQ_API_KEY".to_string()),
            CompletionError::Transport("refused".to_string()),
            CompletionError::Status {
                status: 500,
                body: String::new(),
            },
            CompletionError::EmptyResponse,
            CompletionError::Malformed("eof".to_string()),
        ];
        let mut messages: Vec<&str> = errors.iter().map(CompletionError::user_message).collect();
        messages.sort_unstable();
        messages.dedup();
        assert_eq!(messages.len(), errors.len());
    }
}
