//! The external large-language-model collaborator: an opaque text-in,
//! text-out service the Architect and Coder agents call with a bounded
//! timeout (spec.md §1, §4.6, §4.7).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// Why an LLM call failed.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The call did not complete within its timeout.
    #[error("llm call exceeded its {0:?} timeout")]
    Timeout(Duration),
    /// The transport itself failed (connection refused, TLS error, ...).
    #[error("llm transport error: {0}")]
    Transport(String),
    /// The collaborator replied with a non-success status.
    #[error("llm collaborator returned status {0}")]
    BadStatus(u16),
    /// The reply body could not be parsed into the expected chat-completion shape.
    #[error("llm reply had an unexpected shape: {0}")]
    MalformedReply(String),
}

/// An external, opaque text-in/text-out collaborator. Two implementations
/// ship: [`HttpLlmClient`] against a live OpenAI-compatible endpoint, and
/// [`StubLlmClient`] for deterministic end-to-end tests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a two-part prompt and return the raw reply text, failing if
    /// `timeout` elapses first.
    async fn complete(&self, system: &str, user: &str, timeout: Duration) -> Result<String, LlmError>;
}

/// A thin `reqwest`-based client against an OpenAI-compatible
/// `/chat/completions` endpoint.
pub struct HttpLlmClient {
    endpoint: String,
    api_key: Option<String>,
    model: String,
    http: reqwest::Client,
}

impl HttpLlmClient {
    /// Build a client targeting `endpoint` (the full `/chat/completions`
    /// URL) using `model`, optionally authenticating with a bearer token.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        HttpLlmClient {
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, system: &str, user: &str, timeout: Duration) -> Result<String, LlmError> {
        let request = self
            .http
            .post(&self.endpoint)
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage { role: "system", content: system }, ChatMessage { role: "user", content: user }],
            });
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| LlmError::Timeout(timeout))?
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::BadStatus(response.status().as_u16()));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| LlmError::MalformedReply(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::MalformedReply("no choices in reply".to_string()))
    }
}

/// A deterministic, table-driven stand-in for the LLM collaborator, used by
/// the end-to-end scenarios of spec.md §8. Matches the *user* prompt against
/// a list of substring patterns in order and returns the first hit's reply;
/// falls back to `default_reply` when nothing matches.
pub struct StubLlmClient {
    routes: Vec<(String, String)>,
    default_reply: String,
}

impl StubLlmClient {
    /// A stub whose every call returns `default_reply`.
    pub fn always(default_reply: impl Into<String>) -> Self {
        StubLlmClient {
            routes: Vec::new(),
            default_reply: default_reply.into(),
        }
    }

    /// Add a routing rule: when `user` contains `pattern`, reply with `reply`.
    pub fn with_route(mut self, pattern: impl Into<String>, reply: impl Into<String>) -> Self {
        self.routes.push((pattern.into(), reply.into()));
        self
    }
}

#[async_trait]
impl LlmClient for StubLlmClient {
    async fn complete(&self, _system: &str, user: &str, _timeout: Duration) -> Result<String, LlmError> {
        for (pattern, reply) in &self.routes {
            if user.contains(pattern.as_str()) {
                return Ok(reply.clone());
            }
        }
        Ok(self.default_reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_falls_back_to_default_when_no_route_matches() {
        let stub = StubLlmClient::always("fallback").with_route("foo", "matched foo");
        let reply = stub.complete("sys", "bar baz", Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply, "fallback");
    }

    #[tokio::test]
    async fn stub_prefers_the_first_matching_route() {
        let stub = StubLlmClient::always("fallback")
            .with_route("plan", "plan reply")
            .with_route("plan for wander", "more specific reply");
        let reply = stub.complete("sys", "plan for wander please", Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply, "plan reply");
    }
}
